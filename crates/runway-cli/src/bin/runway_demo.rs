//! Scripted runway allocation scenarios.
//!
//! Each scenario loads the seed data, replays a fixed sequence of operations
//! step by step (no background workers unless `run` is chosen), and prints
//! the resulting registries and event logs as JSON.
//!
//! Usage:
//!   cargo run -p runway-cli --bin runway-demo -- preemption
//!   cargo run -p runway-cli --bin runway-demo -- run --seconds 30

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use runway_control::{
    load_seed_file, logging, Assignment, Config, ControlService, ControlState, CycleOutcome,
    Snapshot, WorkerId,
};
use runway_core::{LandingEvent, SystemEvent};

/// Runway allocation demo
#[derive(Parser, Debug)]
#[command(author, version, about = "Replay runway allocation scenarios against seed data")]
struct Args {
    /// Seed file (runways, aircraft, flights, alerts)
    #[arg(long, default_value_t = Config::default().seed_path)]
    seed: String,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    scenario: Scenario,
}

#[derive(Subcommand, Debug)]
enum Scenario {
    /// Low-fuel aircraft displaces a lower-priority occupant before touchdown
    Preemption,
    /// A storm closes every runway, then clears
    Weather {
        /// Weather alert id to activate
        #[arg(long, default_value = "WA001")]
        alert: String,
    },
    /// One aircraft from request to runway release
    RoundTrip {
        #[arg(long, default_value = "AC001")]
        aircraft: String,
    },
    /// Print the seeded state without changing it
    Snapshot,
    /// Start the worker pool and let it drain the queue
    Run {
        /// Wall-clock seconds to let workers run
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    scenario: &'static str,
    finished_at: DateTime<Utc>,
    snapshot: Snapshot,
    landing_events: Vec<LandingEvent>,
    system_events: Vec<SystemEvent>,
}

impl Report {
    fn of(scenario: &'static str, state: &ControlState) -> Result<Self> {
        Ok(Self {
            scenario,
            finished_at: Utc::now(),
            snapshot: state.snapshot(),
            landing_events: all_landing_events(state)?,
            system_events: all_system_events(state)?,
        })
    }
}

fn all_landing_events(state: &ControlState) -> Result<Vec<LandingEvent>> {
    let mut events = Vec::new();
    let mut offset = 0;
    loop {
        let page = state.landing_events(offset, runway_core::MAX_PAGE_SIZE)?;
        events.extend(page.items);
        match page.next_offset {
            Some(next) => offset = next,
            None => return Ok(events),
        }
    }
}

fn all_system_events(state: &ControlState) -> Result<Vec<SystemEvent>> {
    let mut events = Vec::new();
    let mut offset = 0;
    loop {
        let page = state.system_events(offset, runway_core::MAX_PAGE_SIZE)?;
        events.extend(page.items);
        match page.next_offset {
            Some(next) => offset = next,
            None => return Ok(events),
        }
    }
}

fn expect_assignment(outcome: CycleOutcome) -> Result<Assignment> {
    match outcome {
        CycleOutcome::Assigned(assignment) => Ok(assignment),
        other => bail!("expected a runway assignment, got {:?}", other),
    }
}

fn land(state: &ControlState, assignment: &Assignment) -> Result<()> {
    state.begin_landing(assignment)?;
    state.complete_landing(assignment)?;
    println!(
        "  {} landed on {} ({})",
        assignment.aircraft_id, assignment.runway_id, assignment.worker_id
    );
    Ok(())
}

/// AC002 holds a runway; AC003 burns down to 5% and takes it over.
fn preemption(state: &ControlState) -> Result<()> {
    let routine = WorkerId::routine(1);
    let emergency = WorkerId::emergency(1);

    // Drain seeded requests so only the two protagonists compete.
    let drained = state.drain_queue();
    println!("Cleared {} seeded requests", drained.len());
    for runway in state.snapshot().runways.iter().skip(1) {
        state.begin_maintenance(&runway.runway_id, "DEMO_SINGLE_RUNWAY")?;
    }

    state.submit_landing_request("AC002", Some("Operator"))?;
    let held = expect_assignment(state.run_cycle(&routine)?)?;
    println!("1. {} assigned to {}", held.aircraft_id, held.runway_id);

    state.submit_landing_request("AC003", Some("Operator"))?;
    let observation = state.observe_fuel("AC003", 5)?;
    println!(
        "2. AC003 fuel at 5% (alert {:?}, escalated: {})",
        observation.alert.as_ref().map(|a| a.alert_id.as_str()),
        observation.escalated
    );

    let taken = expect_assignment(state.run_cycle(&emergency)?)?;
    println!(
        "3. {} took {} from {}",
        taken.aircraft_id,
        taken.runway_id,
        taken.preempted.as_deref().unwrap_or("nobody")
    );
    if let Err(err) = state.begin_landing(&held) {
        println!("   {} cannot touch down: {}", held.aircraft_id, err);
    }

    land(state, &taken)?;
    let again = expect_assignment(state.run_cycle(&routine)?)?;
    land(state, &again)?;
    Ok(())
}

fn weather(state: &ControlState, alert_id: &str) -> Result<()> {
    let activation = state.activate_registered_weather_alert(alert_id)?;
    println!(
        "1. {} active at {}: closing {:?}, {} flights affected",
        alert_id,
        activation.alert.affected_airport,
        activation.runways_to_close,
        activation.alert.affected_flights.len()
    );

    match state.run_cycle(&WorkerId::routine(1))? {
        CycleOutcome::Requeued { aircraft_id } => {
            println!("2. {} held: no open runway", aircraft_id)
        }
        other => println!("2. cycle: {:?}", other),
    }

    if let Some(deactivation) = state.deactivate_weather_alert(alert_id)? {
        println!("3. {} ended, reopening {:?}", alert_id, deactivation.runways_to_reopen);
    }
    if let Some(average) = state.average_weather_delay() {
        println!("   average weather delay {:.1} min", average);
    }

    let assignment = expect_assignment(state.run_cycle(&WorkerId::routine(1))?)?;
    land(state, &assignment)
}

fn round_trip(state: &ControlState, aircraft_id: &str) -> Result<()> {
    let request = state.submit_landing_request(aircraft_id, Some("Operator"))?;
    println!(
        "1. {} filed (priority {}, queue position {:?})",
        aircraft_id,
        request.priority,
        state.queue_position(aircraft_id)
    );

    // Serve the queue until this aircraft gets a runway.
    let worker = WorkerId::routine(1);
    loop {
        let assignment = expect_assignment(state.run_cycle(&worker)?)?;
        let ours = assignment.aircraft_id == aircraft_id;
        land(state, &assignment)?;
        if ours {
            return Ok(());
        }
    }
}

async fn run_pool(state: Arc<ControlState>, seconds: u64) -> Result<()> {
    let service = ControlService::start(state.clone());
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for ctrl-c")?;
        }
    }
    let pending = service.shutdown().await;
    if !pending.is_empty() {
        tracing::warn!("{} requests still waiting at shutdown", pending.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init("runway_demo=info,runway_control=info", args.json_logs)?;

    let config = Config {
        seed_path: args.seed.clone(),
        ..Config::from_env()
    };
    let seed = load_seed_file(&config.seed_path)?;
    let state = Arc::new(ControlState::from_seed(config, seed)?);
    tracing::info!("Loaded seed from {}", args.seed);

    let name = match &args.scenario {
        Scenario::Preemption => {
            preemption(&state)?;
            "preemption"
        }
        Scenario::Weather { alert } => {
            weather(&state, alert)?;
            "weather"
        }
        Scenario::RoundTrip { aircraft } => {
            round_trip(&state, aircraft)?;
            "round-trip"
        }
        Scenario::Snapshot => "snapshot",
        Scenario::Run { seconds } => {
            run_pool(state.clone(), *seconds).await?;
            "run"
        }
    };

    let report = Report::of(name, &state)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
