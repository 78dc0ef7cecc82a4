use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use mec_scheduler::domain::mec_system_model::coordinator::coordinator::SchedulerCoordinator;
use mec_scheduler::domain::mec_system_model::coordinator::replay::{scenario_events, scenario_topology};
use mec_scheduler::domain::mec_system_model::coordinator::runtime::{CoordinatorDriver, CoordinatorEvent};
use mec_scheduler::domain::mec_system_model::profile::ProfileDatabase;
use mec_scheduler::domain::mec_system_model::utils::statistics;
use mec_scheduler::domain::simulator::simulator::{SharedSimulator, Simulator};
use mec_scheduler::generate_scenario_runner;
use mec_scheduler::loader::parser::{load_scenario, load_scheduler_config};
use mec_scheduler::logger;

/// Runs a recorded MEC scenario through the scheduler and prints every grant as JSON.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Scheduler configuration (JSON)
    #[arg(long)]
    config: String,

    /// Scenario with profiles, topology and timed events (JSON)
    #[arg(long)]
    scenario: String,

    /// Number of scheduling cycles to run
    #[arg(long, default_value_t = 10)]
    cycles: usize,

    /// Write per-cycle statistics to this CSV file
    #[arg(long)]
    stats: Option<String>,

    /// Directory for the structured analytics log
    #[arg(long)]
    analytics_dir: Option<String>,

    /// Deliver the events in real time to the async driver instead of replaying them on a simulated clock
    #[arg(long)]
    live: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init();
    let _analytics_guard = args.analytics_dir.as_deref().and_then(|dir| logger::init_analytics(dir, "analytics.log"));
    if let Some(path) = &args.stats {
        statistics::init_global(Some(path.clone()));
    }

    if args.live {
        run_live(&args).await?;
    } else {
        run_replay(&args)?;
    }

    statistics::flush_global();
    Ok(())
}

fn run_replay(args: &Args) -> anyhow::Result<()> {
    let mut runner = generate_scenario_runner(&args.config, &args.scenario)
        .with_context(|| format!("failed to set up scenario '{}' with config '{}'", args.scenario, args.config))?;

    for _ in 0..args.cycles {
        let cycle = runner.run_cycle().context("scheduling cycle aborted")?;
        for grant in &cycle.grants {
            println!("{}", serde_json::to_string(grant)?);
        }
        log::info!(
            "Cycle at {} ms: {:?}, {} pending, {} granted, {} running.",
            cycle.report.time_ms,
            cycle.report.outcome,
            cycle.report.pending,
            cycle.report.granted.len(),
            cycle.report.running
        );
    }

    log::info!("Replay finished, {} events left undelivered.", runner.remaining_events());
    Ok(())
}

async fn run_live(args: &Args) -> anyhow::Result<()> {
    let config = load_scheduler_config(&args.config).with_context(|| format!("failed to load config '{}'", args.config))?;
    let scenario = load_scenario(&args.scenario).with_context(|| format!("failed to load scenario '{}'", args.scenario))?;

    let run_for = Duration::from_millis(config.scheduling_interval_ms as u64 * args.cycles as u64);
    let topology = scenario_topology(scenario.topology.as_ref(), config.max_hops)?;
    let profile = Arc::new(ProfileDatabase::from(scenario.profile));
    let coordinator = SchedulerCoordinator::new(config, profile, SharedSimulator(Arc::new(Simulator::new(true))))?;

    let (driver, events, mut grants) = CoordinatorDriver::channel(coordinator, 256);
    let driver = tokio::spawn(driver.run());

    events.send(CoordinatorEvent::BecomeLeader).await?;
    if let Some(adjacency) = topology {
        events.send(CoordinatorEvent::Topology(adjacency)).await?;
    }

    let timed = scenario_events(scenario.events);
    let start = tokio::time::Instant::now();
    let feeder = tokio::spawn(async move {
        for (at_ms, event) in timed {
            tokio::time::sleep_until(start + Duration::from_millis(at_ms.max(0) as u64)).await;
            if events.send(event).await.is_err() {
                return;
            }
        }
        tokio::time::sleep_until(start + run_for).await;
        let _ = events.send(CoordinatorEvent::Shutdown).await;
    });

    while let Some(grant) = grants.recv().await {
        println!("{}", serde_json::to_string(&grant)?);
    }

    feeder.await?;
    let coordinator = driver.await?.context("coordinator stopped with an error")?;
    log::info!("Live run finished with {} known jobs.", coordinator.jobs().count());
    Ok(())
}
