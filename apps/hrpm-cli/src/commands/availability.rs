// availability.rs - Availability subcommands: rules, blackouts, slots.

use chrono::NaiveDate;
use clap::Subcommand;
use hrpm_schedule::{ClockTime, TimeInterval};
use uuid::Uuid;

use super::Context;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Subcommand)]
pub enum AvailabilityCommands {
    /// Add a recurring weekly window.
    AddRule {
        #[arg(long)]
        owner: String,
        /// 0 = Sunday .. 6 = Saturday.
        #[arg(long)]
        day: u8,
        #[arg(long)]
        start: ClockTime,
        #[arg(long)]
        end: ClockTime,
    },
    /// Delete a recurring window.
    RemoveRule { id: Uuid },
    /// List an owner's recurring windows.
    Rules {
        #[arg(long)]
        owner: String,
    },
    /// Block time on a specific date.
    Block {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        start: ClockTime,
        #[arg(long)]
        end: ClockTime,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Remove a manual block.
    Unblock { id: Uuid },
    /// Show bookable slots on a date.
    Slots {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        date: NaiveDate,
    },
}

pub fn execute(cmd: &AvailabilityCommands, ctx: &Context) -> anyhow::Result<()> {
    let service = ctx.schedule_service()?;
    let engine = service.availability();
    match cmd {
        AvailabilityCommands::AddRule {
            owner,
            day,
            start,
            end,
        } => {
            let rule = engine.add_rule(owner, *day, TimeInterval::new(*start, *end)?, ctx.now)?;
            println!("Rule added: {}", rule.rule_id);
            Ok(())
        }
        AvailabilityCommands::RemoveRule { id } => {
            engine.remove_rule(*id)?;
            println!("Rule removed.");
            Ok(())
        }
        AvailabilityCommands::Rules { owner } => {
            let rules = engine.rules(owner)?;
            if rules.is_empty() {
                println!("No availability rules for {}.", owner);
                return Ok(());
            }
            println!("{:<38} {:<4} {:<15}", "ID", "DAY", "WINDOW");
            println!("{}", "-".repeat(59));
            for r in &rules {
                println!(
                    "{:<38} {:<4} {:<15}",
                    r.rule_id,
                    DAY_NAMES[usize::from(r.day_of_week) % 7],
                    r.interval.to_string()
                );
            }
            Ok(())
        }
        AvailabilityCommands::Block {
            owner,
            date,
            start,
            end,
            reason,
        } => {
            let exception = engine.block_exception(
                owner,
                *date,
                TimeInterval::new(*start, *end)?,
                reason.clone(),
                ctx.now,
            )?;
            println!("Blocked {} {}: {}", date, exception.interval, exception.exception_id);
            Ok(())
        }
        AvailabilityCommands::Unblock { id } => {
            engine.remove_exception(*id)?;
            println!("Block removed.");
            Ok(())
        }
        AvailabilityCommands::Slots { owner, date } => show_slots(ctx, owner, *date),
    }
}

fn show_slots(ctx: &Context, owner: &str, date: NaiveDate) -> anyhow::Result<()> {
    let service = ctx.schedule_service()?;
    let slots = service.slots(owner, date)?;
    if slots.is_empty() {
        println!("{} has no free slots on {}.", owner, date);
        return Ok(());
    }
    println!("Free slots for {} on {}:", owner, date);
    for slot in &slots {
        println!("  {}", slot);
    }
    for blocked in service.availability().exceptions(owner, date)? {
        println!(
            "  blocked {} {}",
            blocked.interval,
            blocked.reason.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::context;

    #[test]
    fn rules_and_blocks_round_trip_through_disk() {
        let (_project, ctx) = context();
        let monday = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
        execute(
            &AvailabilityCommands::AddRule {
                owner: "mgr-1".to_string(),
                day: 1,
                start: "09:00".parse().unwrap(),
                end: "10:00".parse().unwrap(),
            },
            &ctx,
        )
        .unwrap();
        execute(
            &AvailabilityCommands::Block {
                owner: "mgr-1".to_string(),
                date: monday,
                start: "09:15".parse().unwrap(),
                end: "09:45".parse().unwrap(),
                reason: Some("offsite".to_string()),
            },
            &ctx,
        )
        .unwrap();

        let service = ctx.schedule_service().unwrap();
        assert!(service.slots("mgr-1", monday).unwrap().is_empty());
        show_slots(&ctx, "mgr-1", monday).unwrap();
    }

    #[test]
    fn reversed_window_is_rejected() {
        let (_project, ctx) = context();
        let result = execute(
            &AvailabilityCommands::AddRule {
                owner: "mgr-1".to_string(),
                day: 1,
                start: "10:00".parse().unwrap(),
                end: "09:00".parse().unwrap(),
            },
            &ctx,
        );
        assert!(result.is_err());
    }
}
