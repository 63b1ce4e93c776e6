// sweep.rs - `hrpm sweep`: run the overdue sweep once.

use hrpm_goal::SweepScope;

use super::Context;

pub fn execute(ctx: &Context, employee: Option<&str>) -> anyhow::Result<()> {
    let scope = match employee {
        Some(e) => SweepScope::Employee(e.to_string()),
        None => SweepScope::All,
    };
    let report = ctx.goal_service()?.run_sweep(&scope, ctx.now)?;

    if report.debounced {
        println!(
            "Sweep of {} skipped: another sweep ran less than {}s ago.",
            report.scope, ctx.config.settings.sweep.cooldown_secs
        );
        return Ok(());
    }
    println!(
        "Sweep of {}: {} examined, {} marked overdue, {} overdue count(s) refreshed.",
        report.scope, report.examined, report.updated, report.refreshed
    );
    if !report.conflicts.is_empty() {
        println!(
            "{} goal(s) changed during the sweep and were skipped; they will be retried next time.",
            report.conflicts.len()
        );
    }
    Ok(())
}
