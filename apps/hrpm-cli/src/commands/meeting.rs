// meeting.rs - Meeting subcommands: request, list, review, join.

use chrono::NaiveDate;
use clap::Subcommand;
use hrpm_schedule::{ClockTime, JoinStatus, Meeting, MeetingFilter, MeetingRequest, MeetingStatus};
use uuid::Uuid;

use super::{truncate, Context};

#[derive(Subcommand)]
pub enum MeetingCommands {
    /// Request a meeting inside the approver's free slots.
    Request {
        /// Meeting title.
        title: String,
        #[arg(long)]
        employee: String,
        /// Whose calendar the meeting books.
        #[arg(long)]
        approver: String,
        /// YYYY-MM-DD.
        #[arg(long)]
        date: NaiveDate,
        /// HH:MM.
        #[arg(long)]
        start: ClockTime,
        /// Length in minutes.
        #[arg(long, default_value_t = 30)]
        duration: u32,
        /// Video call link shown when the meeting is about to start.
        #[arg(long)]
        link: Option<String>,
        /// Who is asking (defaults to the employee).
        #[arg(long)]
        requested_by: Option<String>,
    },
    /// List meetings.
    List {
        #[arg(long)]
        employee: Option<String>,
        #[arg(long)]
        approver: Option<String>,
        /// Filter by status (e.g., "pending").
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one meeting.
    Show { id: Uuid },
    /// Approve a pending meeting and reserve its time.
    Approve {
        id: Uuid,
        #[arg(long)]
        approver: String,
    },
    /// Reject a pending meeting.
    Reject {
        id: Uuid,
        #[arg(long)]
        approver: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Cancel a pending or approved meeting.
    Cancel {
        id: Uuid,
        #[arg(long)]
        by: String,
    },
    /// Mark an approved meeting as held.
    Complete {
        id: Uuid,
        #[arg(long)]
        by: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Whether the meeting link can be used right now.
    Join { id: Uuid },
}

pub fn execute(cmd: &MeetingCommands, ctx: &Context) -> anyhow::Result<()> {
    let service = ctx.schedule_service()?;
    match cmd {
        MeetingCommands::Request {
            title,
            employee,
            approver,
            date,
            start,
            duration,
            link,
            requested_by,
        } => {
            let request = MeetingRequest {
                employee_id: employee.clone(),
                approver_id: approver.clone(),
                title: title.clone(),
                date: *date,
                start: *start,
                duration_minutes: *duration,
                link: link.clone(),
                requested_by: requested_by.clone().unwrap_or_else(|| employee.clone()),
            };
            let meeting = service.request_meeting(request, ctx.now)?;
            println!("Meeting requested: {}", meeting.meeting_id);
            println!("  {} {} with {}", meeting.date, meeting.interval, meeting.approver_id);
            Ok(())
        }
        MeetingCommands::List {
            employee,
            approver,
            status,
        } => {
            let mut filter = MeetingFilter {
                employee_id: employee.clone(),
                approver_id: approver.clone(),
                ..MeetingFilter::default()
            };
            if let Some(status) = status {
                filter = filter.with_status(status.as_str());
            }
            print_meeting_table(&service.list_meetings(&filter)?);
            Ok(())
        }
        MeetingCommands::Show { id } => {
            show_meeting(&service.get_meeting(*id)?);
            Ok(())
        }
        MeetingCommands::Approve { id, approver } => {
            let m = service.approve(*id, approver, ctx.now)?;
            println!("Meeting approved; {} {} is now reserved.", m.date, m.interval);
            Ok(())
        }
        MeetingCommands::Reject {
            id,
            approver,
            reason,
        } => {
            service.reject(*id, approver, reason.clone(), ctx.now)?;
            println!("Meeting rejected.");
            Ok(())
        }
        MeetingCommands::Cancel { id, by } => {
            service.cancel(*id, by, ctx.now)?;
            println!("Meeting cancelled.");
            Ok(())
        }
        MeetingCommands::Complete { id, by, notes } => {
            service.complete(*id, by, notes.clone(), ctx.now)?;
            println!("Meeting completed.");
            Ok(())
        }
        MeetingCommands::Join { id } => {
            println!("{}", describe_join(&service.join_status(*id, ctx.now)?));
            Ok(())
        }
    }
}

fn describe_join(status: &JoinStatus) -> String {
    match status {
        JoinStatus::NotApproved => "Meeting is not approved.".to_string(),
        JoinStatus::NoLink => "No meeting link has been set.".to_string(),
        JoinStatus::NotYetAvailable { opens_at } => {
            format!("Not yet available; opens at {}.", opens_at.to_rfc3339())
        }
        JoinStatus::Joinable { link } => format!("Join now: {}", link),
        JoinStatus::Ended => "Meeting has ended.".to_string(),
    }
}

fn print_meeting_table(meetings: &[Meeting]) {
    if meetings.is_empty() {
        println!("No meetings found.");
        return;
    }
    println!(
        "{:<38} {:<10} {:<15} {:<12} {:<12} {:<10}",
        "ID", "DATE", "TIME", "EMPLOYEE", "APPROVER", "STATUS"
    );
    println!("{}", "-".repeat(102));
    for m in meetings {
        println!(
            "{:<38} {:<10} {:<15} {:<12} {:<12} {:<10}",
            m.meeting_id,
            m.date,
            m.interval.to_string(),
            truncate(&m.employee_id, 12),
            truncate(&m.approver_id, 12),
            m.status.name(),
        );
    }
    println!("\n{} meeting(s) total.", meetings.len());
}

fn show_meeting(m: &Meeting) {
    println!("Meeting:  {}", m.meeting_id);
    println!("Title:    {}", m.title);
    println!("When:     {} {} ({} min)", m.date, m.interval, m.duration_minutes());
    println!("Employee: {}", m.employee_id);
    println!("Approver: {}", m.approver_id);
    println!("Status:   {}", m.status);
    match &m.status {
        MeetingStatus::Approved { reviewed_by, .. } => println!("  Approved by {}", reviewed_by),
        MeetingStatus::Rejected {
            reviewed_by,
            rejection_reason,
            ..
        } => println!(
            "  Rejected by {}: {}",
            reviewed_by,
            rejection_reason.as_deref().unwrap_or("no reason given")
        ),
        MeetingStatus::Cancelled { cancelled_by, .. } => println!("  Cancelled by {}", cancelled_by),
        MeetingStatus::Completed { notes: Some(notes), .. } => println!("  Notes: {}", notes),
        _ => {}
    }
    if let Some(link) = &m.link {
        println!("Link:     {}", link);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::context;
    use hrpm_schedule::TimeInterval;

    #[test]
    fn request_and_approve_through_cli() {
        let (_project, ctx) = context();
        let monday = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
        let service = ctx.schedule_service().unwrap();
        service
            .availability()
            .add_rule(
                "mgr-1",
                1,
                TimeInterval::new("14:00".parse().unwrap(), "15:00".parse().unwrap()).unwrap(),
                ctx.now,
            )
            .unwrap();

        execute(
            &MeetingCommands::Request {
                title: "Mid-year review".to_string(),
                employee: "emp-1".to_string(),
                approver: "mgr-1".to_string(),
                date: monday,
                start: "14:00".parse().unwrap(),
                duration: 60,
                link: None,
                requested_by: None,
            },
            &ctx,
        )
        .unwrap();

        let pending = service
            .list_meetings(&MeetingFilter::all().with_status("pending"))
            .unwrap();
        assert_eq!(pending.len(), 1);
        execute(
            &MeetingCommands::Approve {
                id: pending[0].meeting_id,
                approver: "mgr-1".to_string(),
            },
            &ctx,
        )
        .unwrap();

        assert!(service.slots("mgr-1", monday).unwrap().is_empty());
        assert!(ctx.config.schedule_file.exists());
    }

    #[test]
    fn join_messages_are_specific() {
        assert_eq!(describe_join(&JoinStatus::Ended), "Meeting has ended.");
        assert!(describe_join(&JoinStatus::Joinable {
            link: "https://x".to_string()
        })
        .contains("https://x"));
    }
}
