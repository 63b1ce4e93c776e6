// goal.rs - Goal subcommands: create, list, show, progress, extensions, summary.

use chrono::NaiveDate;
use clap::Subcommand;
use hrpm_goal::{
    ExtensionDecision, ExtensionVerdict, GoalFilter, GoalStatus, GoalUnit, NewGoal,
    PerformanceGoal,
};
use uuid::Uuid;

use super::{truncate, Context};

#[derive(Subcommand)]
pub enum GoalCommands {
    /// Create a goal for an employee.
    Create {
        /// Goal title.
        title: String,
        #[arg(long)]
        employee: String,
        /// Target value (must be positive).
        #[arg(long)]
        target: f64,
        /// percentage, count or hours.
        #[arg(long, default_value = "count")]
        unit: GoalUnit,
        /// First day of the goal (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,
        /// Deadline (YYYY-MM-DD).
        #[arg(long)]
        end: NaiveDate,
        #[arg(long, default_value = "")]
        description: String,
        /// Who is creating the goal (defaults to the employee).
        #[arg(long)]
        created_by: Option<String>,
    },
    /// List goals.
    List {
        #[arg(long)]
        employee: Option<String>,
        /// Filter by status (e.g., "overdue", "in_progress").
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one goal.
    Show {
        id: Uuid,
        /// Print the stored record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Record progress.
    Progress {
        id: Uuid,
        /// New current value.
        value: f64,
        /// Replace the target value as well.
        #[arg(long)]
        target: Option<f64>,
        #[arg(long)]
        actor: String,
    },
    /// Mark one goal overdue now (the sweep does this in bulk).
    MarkOverdue {
        id: Uuid,
        #[arg(long, default_value = "system")]
        actor: String,
    },
    /// Ask for a new deadline on an overdue goal.
    Extend {
        id: Uuid,
        /// Requested new deadline (YYYY-MM-DD).
        #[arg(long)]
        deadline: NaiveDate,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        by: String,
    },
    /// Approve or reject the pending extension request.
    Decide {
        id: Uuid,
        #[arg(long)]
        approver: String,
        /// Reject with this reason instead of approving.
        #[arg(long)]
        reject: Option<String>,
    },
    /// Acknowledge an extension decision.
    Ack {
        id: Uuid,
        #[arg(long)]
        by: String,
    },
    /// Cancel a goal.
    Cancel {
        id: Uuid,
        #[arg(long)]
        by: String,
    },
    /// List goals with an undecided extension request.
    Pending {
        #[arg(long)]
        employee: Option<String>,
    },
    /// Counts and completion timing.
    Summary {
        #[arg(long)]
        employee: Option<String>,
    },
}

pub fn execute(cmd: &GoalCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        GoalCommands::Create {
            title,
            employee,
            target,
            unit,
            start,
            end,
            description,
            created_by,
        } => {
            let input = NewGoal {
                employee_id: employee.clone(),
                title: title.clone(),
                description: description.clone(),
                unit: *unit,
                target_value: *target,
                start_date: *start,
                end_date: *end,
                created_by: created_by.clone().unwrap_or_else(|| employee.clone()),
            };
            create_goal(ctx, input)
        }
        GoalCommands::List { employee, status } => {
            list_goals(ctx, employee.as_deref(), status.as_deref())
        }
        GoalCommands::Show { id, json } => show_goal(ctx, *id, *json),
        GoalCommands::Progress {
            id,
            value,
            target,
            actor,
        } => record_progress(ctx, *id, *value, *target, actor),
        GoalCommands::MarkOverdue { id, actor } => {
            let goal = ctx.goal_service()?.mark_overdue(*id, actor, ctx.now)?;
            println!("Goal {} is now {}.", goal.goal_id, describe_status(&goal.status));
            Ok(())
        }
        GoalCommands::Extend {
            id,
            deadline,
            reason,
            by,
        } => {
            let goal = ctx
                .goal_service()?
                .request_extension(*id, *deadline, reason, by, ctx.now)?;
            println!("Extension to {} requested for goal {}.", deadline, goal.goal_id);
            Ok(())
        }
        GoalCommands::Decide {
            id,
            approver,
            reject,
        } => decide(ctx, *id, approver, reject.as_deref()),
        GoalCommands::Ack { id, by } => {
            ctx.goal_service()?.acknowledge_decision(*id, by, ctx.now)?;
            println!("Decision acknowledged.");
            Ok(())
        }
        GoalCommands::Cancel { id, by } => {
            let goal = ctx.goal_service()?.cancel_goal(*id, by, ctx.now)?;
            println!("Goal {} cancelled.", goal.goal_id);
            Ok(())
        }
        GoalCommands::Pending { employee } => list_pending(ctx, employee.as_deref()),
        GoalCommands::Summary { employee } => show_summary(ctx, employee.as_deref()),
    }
}

fn filter_for(employee: Option<&str>) -> GoalFilter {
    match employee {
        Some(e) => GoalFilter::for_employee(e),
        None => GoalFilter::all(),
    }
}

fn describe_status(status: &GoalStatus) -> String {
    match status.days_overdue() {
        Some(days) => format!("{} ({}d)", status, days),
        None => status.to_string(),
    }
}

fn create_goal(ctx: &Context, input: NewGoal) -> anyhow::Result<()> {
    let goal = ctx.goal_service()?.create_goal(input, ctx.now)?;
    println!("Goal created: {}", goal.goal_id);
    println!("  Title:    {}", goal.title);
    println!("  Employee: {}", goal.employee_id);
    println!("  Target:   {} {}", goal.target_value, goal.unit);
    println!("  Window:   {} .. {}", goal.start_date, goal.end_date);
    Ok(())
}

fn list_goals(ctx: &Context, employee: Option<&str>, status: Option<&str>) -> anyhow::Result<()> {
    let mut filter = filter_for(employee);
    if let Some(status) = status {
        filter = filter.with_status(status);
    }
    let goals = ctx.goal_service()?.list_goals(&filter)?;
    print_goal_table(&goals);
    Ok(())
}

fn print_goal_table(goals: &[PerformanceGoal]) {
    if goals.is_empty() {
        println!("No goals found.");
        return;
    }

    println!(
        "{:<38} {:<12} {:<28} {:<16} {:>8} {:<10}",
        "ID", "EMPLOYEE", "TITLE", "STATUS", "PROGRESS", "DEADLINE"
    );
    println!("{}", "-".repeat(117));
    for g in goals {
        println!(
            "{:<38} {:<12} {:<28} {:<16} {:>7.1}% {:<10}",
            g.goal_id,
            truncate(&g.employee_id, 12),
            truncate(&g.title, 26),
            describe_status(&g.status),
            g.progress,
            g.end_date,
        );
    }
    println!("\n{} goal(s) total.", goals.len());
}

fn show_goal(ctx: &Context, id: Uuid, json: bool) -> anyhow::Result<()> {
    let g = ctx.goal_service()?.get_goal(id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&g)?);
        return Ok(());
    }

    println!("Goal:      {}", g.goal_id);
    println!("Title:     {}", g.title);
    if !g.description.is_empty() {
        println!("About:     {}", g.description);
    }
    println!("Employee:  {}", g.employee_id);
    println!("Status:    {}", describe_status(&g.status));
    println!(
        "Progress:  {} / {} {} ({:.1}%)",
        g.current_value, g.target_value, g.unit, g.progress
    );
    println!("Window:    {} .. {}", g.start_date, g.end_date);
    if let Some(c) = &g.completion {
        let timing = if c.days_early_or_late >= 0 {
            format!("{} day(s) early", c.days_early_or_late)
        } else {
            format!("{} day(s) late", -c.days_early_or_late)
        };
        println!(
            "Completed: {} after {} day(s), {}",
            c.completed_date.to_rfc3339(),
            c.days_to_complete,
            timing
        );
    }
    if let Some(ext) = &g.extension {
        println!("Extension: {} to {}", ext.state_name(), ext.requested_new_deadline);
        println!("  Reason:  {}", ext.request_reason);
        match &ext.decision {
            ExtensionDecision::Unset => {}
            ExtensionDecision::Approved { approved_by, .. } => {
                println!("  Approved by {}", approved_by)
            }
            ExtensionDecision::Rejected {
                rejected_by,
                rejection_reason,
                ..
            } => println!("  Rejected by {}: {}", rejected_by, rejection_reason),
        }
    }
    println!("Updated:   {}", g.updated_at.to_rfc3339());
    Ok(())
}

fn record_progress(
    ctx: &Context,
    id: Uuid,
    value: f64,
    target: Option<f64>,
    actor: &str,
) -> anyhow::Result<()> {
    let outcome = ctx
        .goal_service()?
        .apply_progress(id, value, target, actor, ctx.now)?;
    if outcome.completed_now {
        println!("Goal completed!");
    } else {
        println!(
            "Progress: {:.1}% ({})",
            outcome.goal.progress,
            describe_status(&outcome.goal.status)
        );
    }
    Ok(())
}

fn decide(ctx: &Context, id: Uuid, approver: &str, reject: Option<&str>) -> anyhow::Result<()> {
    let verdict = match reject {
        Some(reason) => ExtensionVerdict::Reject {
            approver_id: approver.to_string(),
            reason: reason.to_string(),
        },
        None => ExtensionVerdict::Approve {
            approver_id: approver.to_string(),
        },
    };
    let goal = ctx.goal_service()?.decide_extension(id, verdict, ctx.now)?;
    match reject {
        Some(_) => println!("Extension rejected; goal stays {}.", describe_status(&goal.status)),
        None => println!("Extension approved; new deadline {}.", goal.end_date),
    }
    Ok(())
}

fn list_pending(ctx: &Context, employee: Option<&str>) -> anyhow::Result<()> {
    let goals = ctx.goal_service()?.pending_extensions(&filter_for(employee))?;
    if goals.is_empty() {
        println!("No pending extension requests.");
        return Ok(());
    }
    println!(
        "{:<38} {:<12} {:<28} {:<10} {:<30}",
        "ID", "EMPLOYEE", "TITLE", "NEW DATE", "REASON"
    );
    println!("{}", "-".repeat(122));
    for g in &goals {
        if let Some(ext) = &g.extension {
            println!(
                "{:<38} {:<12} {:<28} {:<10} {:<30}",
                g.goal_id,
                truncate(&g.employee_id, 12),
                truncate(&g.title, 26),
                ext.requested_new_deadline,
                truncate(&ext.request_reason, 30),
            );
        }
    }
    Ok(())
}

fn show_summary(ctx: &Context, employee: Option<&str>) -> anyhow::Result<()> {
    let s = ctx.goal_service()?.summary(&filter_for(employee))?;
    println!("Goals:        {}", s.total);
    println!("  not started {}", s.not_started);
    println!("  in progress {}", s.in_progress);
    println!("  overdue     {}", s.overdue);
    println!("  completed   {} ({} early)", s.completed, s.completed_early);
    println!("  cancelled   {}", s.cancelled);
    println!("Completion:   {:.1}%", s.completion_rate());
    if let Some(avg) = s.average_days_early_or_late {
        println!("Avg timing:   {:+.1} day(s)", avg);
    }
    println!("Pending extensions:      {}", s.pending_extensions);
    println!("Awaiting acknowledgment: {}", s.awaiting_acknowledgment);
    Ok(())
}
