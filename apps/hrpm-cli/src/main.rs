//! # hrpm
//!
//! Command-line front end for the performance-management engine:
//! - `hrpm goal create/list/show/progress/extend/decide/ack/cancel/summary`
//! - `hrpm sweep`: mark past-deadline goals overdue
//! - `hrpm availability add-rule/remove-rule/block/unblock/slots`
//! - `hrpm meeting request/list/show/approve/reject/cancel/complete/join`
//!
//! State lives under `.hrpm/` in the project root. Logs go to stderr
//! (`RUST_LOG` overrides the default `hrpm=info`).

mod commands;
mod config;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::Context;
use crate::config::HrpmConfig;

/// HR performance management: goals, extensions, availability and meetings.
#[derive(Parser)]
#[command(name = "hrpm", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Evaluate as of this RFC 3339 instant instead of the current time.
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, update and inspect performance goals.
    Goal {
        #[command(subcommand)]
        command: commands::goal::GoalCommands,
    },
    /// Mark goals past their deadline as overdue.
    Sweep {
        /// Only sweep this employee's goals.
        #[arg(long)]
        employee: Option<String>,
    },
    /// Manage an approver's bookable time.
    Availability {
        #[command(subcommand)]
        command: commands::availability::AvailabilityCommands,
    },
    /// Request and review meetings.
    Meeting {
        #[command(subcommand)]
        command: commands::meeting::MeetingCommands,
    },
}

fn init_logging() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("hrpm=info".parse()?)
                .add_directive("hrpm_goal=info".parse()?)
                .add_directive("hrpm_schedule=info".parse()?)
                .add_directive("hrpm_events=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = HrpmConfig::load(&project_root)?;
    let ctx = Context::new(config, cli.now.unwrap_or_else(Utc::now));

    match &cli.command {
        Commands::Goal { command } => commands::goal::execute(command, &ctx),
        Commands::Sweep { employee } => commands::sweep::execute(&ctx, employee.as_deref()),
        Commands::Availability { command } => commands::availability::execute(command, &ctx),
        Commands::Meeting { command } => commands::meeting::execute(command, &ctx),
    }
}
