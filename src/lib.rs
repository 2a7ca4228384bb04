// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod suite;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::PlanFile;
use crate::engine::{ConsoleListener, InMemoryRunTracker, Orchestrator, Stoppable};
use crate::exec::ProcessLauncher;
use crate::suite::UnitGroups;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading
/// - process launcher, console listener and run tracker
/// - the orchestrator
/// - Ctrl-C handling
///
/// Returns whether the run finished with every unit passing.
pub async fn run(args: CliArgs) -> Result<bool> {
    let plan = load_and_validate(&args.plan)?;
    let options = plan.run_options(args.debug);

    if args.dry_run {
        print_dry_run(&plan, options.debug);
        return Ok(true);
    }

    let tracker = Arc::new(InMemoryRunTracker::new());
    let orchestrator = Orchestrator::new(
        ProcessLauncher::new(),
        plan.surrounder(),
        ConsoleListener::stdout(args.show_output),
        tracker.clone(),
        options,
    );

    // Ctrl-C -> stop the run and kill its environments.
    {
        let control = orchestrator.control();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; stopping run");
            control.stop();
        });
    }

    let listener = orchestrator.run(plan.units()).await;

    if !tracker.running_ids().is_empty() {
        debug!(running = ?tracker.running_ids(), "runs still registered after completion");
    }

    Ok(listener.is_success())
}

/// Print the environment groups in scheduling order, fixtures spliced in.
fn print_dry_run(plan: &PlanFile, debug: bool) {
    let units = plan.units();
    let mut groups = UnitGroups::from_units(&units, debug);
    groups.surround_with(&plan.surrounder());

    println!("suiterun dry-run");
    println!("  config.poll_interval_ms = {}", plan.config.poll_interval_ms);
    println!(
        "  config.shutdown_timeout_ms = {}",
        plan.config.shutdown_timeout_ms
    );
    println!("  config.debug = {debug}");
    println!();

    println!(
        "environments ({}), units to run ({}):",
        groups.len(),
        groups.scheduled_count()
    );
    for (descriptor, units) in groups.iter() {
        println!("  - {descriptor}");
        for unit in units {
            if unit.is_suite_fixture() {
                println!("      {} [{}]", unit.name, unit.role);
            } else {
                println!("      {}", unit.name);
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
