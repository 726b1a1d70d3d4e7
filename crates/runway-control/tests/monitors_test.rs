use chrono::{Duration, Utc};

use runway_control::{load_seed_file, Config, ControlState, CycleOutcome, SeedData, WorkerId};
use runway_core::{
    Aircraft, AircraftStatus, CoreError, DelayReason, Runway, RunwayStatus, SystemEventType,
    WeatherAlert, WeatherAlertType, WeatherSeverity,
};

fn fixture_state() -> ControlState {
    let seed = load_seed_file(Config::default().seed_path).unwrap();
    ControlState::from_seed(Config::default(), seed).unwrap()
}

#[test]
fn fixture_refiles_waiting_aircraft_in_order() {
    let state = fixture_state();
    let queued: Vec<String> = state
        .queued()
        .into_iter()
        .map(|request| request.aircraft_id)
        .collect();
    assert_eq!(queued, vec!["AC001", "AC003", "AC005"]);
    assert!(state.quarantined().is_empty());

    let started = state.system_events(0, 10).unwrap().items;
    assert_eq!(started[0].event_type, SystemEventType::SystemStart);
}

#[test]
fn storm_closes_runways_and_delays_flights_until_it_ends() {
    let state = fixture_state();
    let activation = state.activate_registered_weather_alert("WA001").unwrap();
    assert_eq!(activation.alert.affected_flights.len(), 5);

    for runway_id in ["RW01", "RW02"] {
        let runway = state.runway(runway_id).unwrap();
        assert_eq!(runway.status, RunwayStatus::Closed);
        assert!(!runway.is_open);
        assert_eq!(runway.closure_reason.as_deref(), Some("STORM"));
    }
    assert_eq!(
        state.airports_with_active_alerts(),
        vec!["JFK".to_string(), "LAX".to_string()]
    );

    let fl005 = state.flight("FL005").unwrap();
    assert!(fl005.is_affected_by_weather);
    assert_eq!(fl005.delay_reason, Some(DelayReason::Weather));
    assert!(fl005.delay_minutes > 0);
    assert!(state
        .flights_delayed_by_weather()
        .iter()
        .any(|flight| flight.flight_id == "FL004"));

    assert_eq!(
        state.run_cycle(&WorkerId::routine(1)).unwrap(),
        CycleOutcome::Requeued {
            aircraft_id: "AC001".into()
        }
    );

    let ended = state.deactivate_weather_alert("WA001").unwrap().unwrap();
    assert_eq!(ended.runways_to_reopen, vec!["RW01", "RW02"]);
    assert_eq!(state.runway("RW01").unwrap().status, RunwayStatus::Free);
    assert!(state.runway("RW02").unwrap().is_open);
    assert!(state.deactivate_weather_alert("WA001").unwrap().is_none());

    assert!(matches!(
        state.run_cycle(&WorkerId::routine(1)).unwrap(),
        CycleOutcome::Assigned(_)
    ));
}

#[test]
fn weather_over_occupied_runway_closes_it_after_landing() {
    let state = fixture_state();
    let assignment = match state.run_cycle(&WorkerId::routine(1)).unwrap() {
        CycleOutcome::Assigned(assignment) => assignment,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(assignment.runway_id, "RW01");

    state.activate_registered_weather_alert("WA001").unwrap();
    let runway = state.runway("RW01").unwrap();
    assert_eq!(runway.status, RunwayStatus::Occupied);
    assert!(!runway.is_open);

    state.begin_landing(&assignment).unwrap();
    state.complete_landing(&assignment).unwrap();
    let runway = state.runway("RW01").unwrap();
    assert_eq!(runway.status, RunwayStatus::Closed);
    assert_eq!(runway.current_aircraft, None);
}

#[test]
fn expired_alerts_reopen_their_runways() {
    let state = fixture_state();
    let now = Utc::now();
    let mut alert = WeatherAlert::new(
        "WA010",
        WeatherAlertType::Wind,
        WeatherSeverity::Low,
        "JFK",
    )
    .covering(["RW02"])
    .until(now + Duration::minutes(5));
    alert.description = Some("Crosswind gusts".into());
    state.activate_weather_alert(alert).unwrap();
    assert_eq!(state.runway("RW02").unwrap().status, RunwayStatus::Closed);

    assert!(state.expire_weather_alerts(now).is_empty());
    let expired = state.expire_weather_alerts(now + Duration::minutes(10));
    assert_eq!(expired.len(), 1);
    assert_eq!(state.runway("RW02").unwrap().status, RunwayStatus::Free);
}

#[test]
fn resolving_a_fuel_alert_twice_changes_nothing() {
    let state = fixture_state();
    assert_eq!(state.active_fuel_alerts().len(), 1);

    let resolved = state.resolve_fuel_alert("FA001", "REFUELED").unwrap().unwrap();
    assert!(resolved.is_resolved);
    assert_eq!(resolved.resolution.as_deref(), Some("REFUELED"));
    let events_after_first = state.system_events(0, 500).unwrap().total;

    assert!(state.resolve_fuel_alert("FA001", "REFUELED").unwrap().is_none());
    assert_eq!(state.system_events(0, 500).unwrap().total, events_after_first);
    assert!(state.active_fuel_alerts().is_empty());

    assert!(matches!(
        state.resolve_fuel_alert("FA999", "REFUELED"),
        Err(CoreError::NotFound { .. })
    ));
}

#[test]
fn fuel_readings_move_an_open_alert_between_levels() {
    let state = fixture_state();
    let observation = state.observe_fuel("AC002", 12).unwrap();
    assert!(observation.alert.is_none() || !observation.escalated);
    assert_eq!(state.aircraft("AC002").unwrap().fuel_level, 12);

    let observation = state.observe_fuel("AC002", 8).unwrap();
    assert!(observation.escalated);
    let aircraft = state.aircraft("AC002").unwrap();
    assert!(aircraft.is_emergency);
    assert_eq!(aircraft.priority, 1);
    // The emergency files a landing request on the aircraft's behalf.
    assert_eq!(state.queue_position("AC002"), Some(1));
    assert!(state
        .critical_fuel_aircraft()
        .iter()
        .any(|a| a.aircraft_id == "AC002"));

    let statistics = state.fuel_statistics();
    assert!(statistics.by_status["CRITICAL"] >= 1);
}

#[test]
fn mismatched_assignment_quarantines_aircraft_until_released() {
    let mut landing = Aircraft::new("AC003", "AF303", 40)
        .with_status(AircraftStatus::Landing)
        .with_priority(3);
    landing.assigned_runway = Some("RW01".into());
    landing.request_time = Some(Utc::now());
    let seed = SeedData {
        runways: vec![Runway::new("RW01")],
        aircraft: vec![landing],
        ..SeedData::default()
    };
    let state = ControlState::from_seed(Config::default(), seed).unwrap();

    let quarantined = state.quarantined();
    assert_eq!(quarantined.len(), 1);
    assert_eq!(quarantined[0].entity_id, "AC003");
    assert!(matches!(
        state.submit_landing_request("AC003", None),
        Err(CoreError::Quarantined { .. })
    ));

    state.release_quarantine("AC003").unwrap();
    let aircraft = state.aircraft("AC003").unwrap();
    assert_eq!(aircraft.assigned_runway, None);
    assert_eq!(aircraft.status, AircraftStatus::Approaching);
    assert_eq!(state.queue_position("AC003"), Some(1));
    assert!(state.quarantined().is_empty());

    assert!(matches!(
        state.release_quarantine("AC003"),
        Err(CoreError::NotFound { .. })
    ));
}

#[test]
fn inconsistent_runway_is_skipped_until_released() {
    let mut broken = Runway::new("RW01");
    broken.status = RunwayStatus::Occupied;
    let seed = SeedData {
        runways: vec![broken, Runway::new("RW02")],
        aircraft: vec![Aircraft::new("AC001", "BA101", 70).with_status(AircraftStatus::Airborne)],
        ..SeedData::default()
    };
    let state = ControlState::from_seed(Config::default(), seed).unwrap();
    assert_eq!(state.quarantined()[0].entity_id, "RW01");

    let critical = state
        .system_events(0, 500)
        .unwrap()
        .items
        .into_iter()
        .filter(|event| event.event_type == SystemEventType::IntegrationEvent)
        .count();
    assert_eq!(critical, 1);

    state.submit_landing_request("AC001", None).unwrap();
    let assignment = match state.run_cycle(&WorkerId::routine(1)).unwrap() {
        CycleOutcome::Assigned(assignment) => assignment,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(assignment.runway_id, "RW02");

    // Sweeps do not report the same violation twice.
    assert!(state.verify_integrity().is_empty());

    state.release_quarantine("RW01").unwrap();
    let runway = state.runway("RW01").unwrap();
    assert_eq!(runway.status, RunwayStatus::Free);
    assert!(state.quarantined().is_empty());
}
