use std::sync::Arc;
use std::time::Duration;

use runway_control::{Config, ControlService, ControlState, SeedData};
use runway_core::{Aircraft, AircraftStatus, Flight, LandingEventType, Runway, SystemEventType};

fn fast_config(landing_workers: usize) -> Config {
    Config {
        landing_workers,
        emergency_workers: 1,
        approach: Duration::from_millis(400),
        emergency_approach: Duration::from_millis(100),
        rollout: Duration::from_millis(200),
        idle_backoff_max: Duration::from_millis(200),
        weather_sweep: Duration::from_millis(500),
        integrity_sweep: Duration::from_millis(500),
        ..Config::default()
    }
}

fn fleet(ids: &[(&str, u8, u8)]) -> Vec<Aircraft> {
    ids.iter()
        .map(|(id, fuel, priority)| {
            Aircraft::new(*id, format!("CS{}", id), *fuel)
                .with_status(AircraftStatus::Airborne)
                .with_priority(*priority)
        })
        .collect()
}

async fn wait_for(state: &ControlState, mut done: impl FnMut(&ControlState) -> bool) {
    for _ in 0..2_000 {
        if done(state) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached; snapshot: {:?}", state.snapshot());
}

#[tokio::test(start_paused = true)]
async fn pool_lands_every_requested_aircraft() {
    let seed = SeedData {
        runways: vec![Runway::new("RW01"), Runway::new("RW02")],
        aircraft: fleet(&[
            ("AC001", 70, 3),
            ("AC002", 60, 2),
            ("AC003", 50, 3),
            ("AC004", 80, 1),
            ("AC005", 90, 3),
        ]),
        ..SeedData::default()
    };
    let state = Arc::new(ControlState::from_seed(fast_config(3), seed).unwrap());
    let service = ControlService::start(state.clone());

    for id in ["AC001", "AC002", "AC003", "AC004", "AC005"] {
        state.submit_landing_request(id, None).unwrap();
    }
    wait_for(&state, |s| s.statistics().total_landings == 5).await;

    let pending = service.shutdown().await;
    assert!(pending.is_empty());

    let snapshot = state.snapshot();
    assert!(snapshot
        .aircraft
        .iter()
        .all(|a| a.status == AircraftStatus::Landed && a.assigned_runway.is_none()));
    assert!(snapshot
        .runways
        .iter()
        .all(|r| r.current_aircraft.is_none()));
    assert_eq!(
        snapshot.runways.iter().map(|r| r.total_usage).sum::<u32>(),
        5
    );
    assert_eq!(state.landing_event_count(LandingEventType::LandingCompleted), 5);

    let system = state.system_events(0, 500).unwrap();
    let last = system.items.last().unwrap();
    assert_eq!(last.event_type, SystemEventType::SystemShutdown);
    assert_eq!(last.details["pendingRequests"], 0);
    assert!(state.loop_heartbeats().len() >= 4);
}

#[tokio::test(start_paused = true)]
async fn emergency_worker_preempts_and_both_aircraft_land() {
    let seed = SeedData {
        runways: vec![Runway::new("RW01")],
        aircraft: fleet(&[("AC002", 60, 2), ("AC003", 15, 3)]),
        flights: vec![
            Flight::new("FL002", "UA202", "LAX", "JFK").operated_by("AC002"),
            Flight::new("FL003", "AF303", "CDG", "JFK").operated_by("AC003"),
        ],
        ..SeedData::default()
    };
    let state = Arc::new(ControlState::from_seed(fast_config(1), seed).unwrap());
    let service = ControlService::start(state.clone());

    state.submit_landing_request("AC002", None).unwrap();
    wait_for(&state, |s| {
        s.runway("RW01")
            .map(|r| r.current_aircraft.as_deref() == Some("AC002"))
            .unwrap_or(false)
    })
    .await;

    state.observe_fuel("AC003", 5).unwrap();
    wait_for(&state, |s| s.statistics().total_landings == 2).await;
    service.shutdown().await;

    assert_eq!(state.statistics().preemptions, 1);
    assert_eq!(state.statistics().emergency_landings, 1);

    let completed: Vec<String> = state
        .landing_events(0, 500)
        .unwrap()
        .items
        .into_iter()
        .filter(|e| e.event_type == LandingEventType::LandingCompleted)
        .map(|e| e.aircraft_id)
        .collect();
    assert_eq!(completed, vec!["AC003", "AC002"]);

    assert!(state.active_fuel_alerts().is_empty());
}
