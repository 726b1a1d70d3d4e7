//! Process-scoped control state.
//!
//! Registries are keyed by id: aircraft live in a `DashMap`, runways in a
//! fixed, id-sorted vector of slots with one mutex each. Lock order, when more
//! than one is held: dispatch, then a single runway slot, then a single
//! aircraft entry, then at most one of the leaf mutexes (queue, fuel, weather,
//! flights, events). Events are appended after the locks guarding the
//! mutation are released.

mod integrity;
mod monitors;
mod runways;
mod scheduler;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Notify;

use runway_core::{
    Aircraft, AircraftStatus, CoreError, CoreResult, EventLog, EventSeverity, Flight,
    FlightBoard, FuelAlert, FuelMonitor, LandingEvent, LandingEventType, LandingQueue,
    LandingRequest, Page, Runway, SchedulingRules, SystemEvent, SystemEventType, WeatherAlert,
    WeatherBoard,
};

use crate::config::Config;
use crate::seed::SeedData;

pub use integrity::IntegrityViolation;
pub use scheduler::{Assignment, CycleOutcome, WorkerId, WorkerRole};

use runways::RunwaySlot;

/// Lock a std mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingStatistics {
    pub total_landings: u64,
    pub emergency_landings: u64,
    pub preemptions: u64,
    pub queue_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantineEntry {
    pub entity_kind: &'static str,
    pub entity_id: String,
    pub reason: String,
}

/// Read-only view of the registries at one instant (per registry).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub aircraft: Vec<Aircraft>,
    pub runways: Vec<Runway>,
    pub flights: Vec<Flight>,
    pub queue: Vec<LandingRequest>,
    pub weather_alerts: Vec<WeatherAlert>,
    pub fuel_alerts: Vec<FuelAlert>,
    pub quarantined: Vec<QuarantineEntry>,
    pub statistics: LandingStatistics,
}

pub struct ControlState {
    config: Config,
    rules: SchedulingRules,
    aircraft: DashMap<String, Aircraft>,
    runways: Vec<RunwaySlot>,
    runway_index: HashMap<String, usize>,
    dispatch: Mutex<()>,
    queue: Mutex<LandingQueue>,
    queue_signal: Notify,
    fuel: Mutex<FuelMonitor>,
    weather: Mutex<WeatherBoard>,
    flights: Mutex<FlightBoard>,
    events: Mutex<EventLog>,
    quarantined_aircraft: DashMap<String, String>,
    total_landings: AtomicU64,
    emergency_landings: AtomicU64,
    preemptions: AtomicU64,
    loop_heartbeats: DashMap<String, DateTime<Utc>>,
}

impl ControlState {
    /// Build the registries from administrative seed data, then re-apply
    /// active weather closures, run an integrity sweep, and re-file aircraft
    /// that were already waiting to land.
    pub fn from_seed(config: Config, seed: SeedData) -> CoreResult<Self> {
        seed.validate()?;
        let rules = config.rules()?;

        let mut fuel = FuelMonitor::new(rules.fuel)?;
        for alert in seed.fuel_alerts {
            fuel.insert_alert(alert)?;
        }
        let mut weather = WeatherBoard::new();
        for alert in seed.weather_alerts {
            weather.register(alert)?;
        }
        let mut flights = FlightBoard::new();
        for flight in seed.flights {
            flights.insert(flight)?;
        }

        let aircraft: DashMap<String, Aircraft> = seed
            .aircraft
            .into_iter()
            .map(|a| (a.aircraft_id.clone(), a))
            .collect();

        let mut seeded_runways = seed.runways;
        seeded_runways.sort_by(|a, b| a.runway_id.cmp(&b.runway_id));
        let runways: Vec<RunwaySlot> = seeded_runways
            .into_iter()
            .map(|runway| {
                let occupant = runway
                    .current_aircraft
                    .as_deref()
                    .and_then(|id| aircraft.get(id).map(|a| seeded_request(&a)));
                RunwaySlot::new(runway, occupant)
            })
            .collect();
        let runway_index = runways
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.runway_id.clone(), i))
            .collect();

        let state = Self {
            config,
            rules,
            aircraft,
            runways,
            runway_index,
            dispatch: Mutex::new(()),
            queue: Mutex::new(LandingQueue::new()),
            queue_signal: Notify::new(),
            fuel: Mutex::new(fuel),
            weather: Mutex::new(weather),
            flights: Mutex::new(flights),
            events: Mutex::new(EventLog::new()),
            quarantined_aircraft: DashMap::new(),
            total_landings: AtomicU64::new(0),
            emergency_landings: AtomicU64::new(0),
            preemptions: AtomicU64::new(0),
            loop_heartbeats: DashMap::new(),
        };
        state.start_up();
        Ok(state)
    }

    fn start_up(&self) {
        self.record_system(
            SystemEvent::new(
                SystemEventType::SystemStart,
                "ControlState",
                format!(
                    "loaded {} runways, {} aircraft",
                    self.runways.len(),
                    self.aircraft.len()
                ),
            )
            .detail("fuelCriticalThreshold", self.rules.fuel.critical_threshold)
            .detail("fuelLowThreshold", self.rules.fuel.low_threshold),
        );

        let active = lock(&self.weather).active_alerts();
        for alert in &active {
            self.apply_weather_closure(alert);
        }

        let violations = self.verify_integrity();
        if !violations.is_empty() {
            tracing::warn!("Seed data has {} integrity violations", violations.len());
        }

        let mut waiting: Vec<Aircraft> = self
            .aircraft
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|a| {
                matches!(a.status, AircraftStatus::Approaching | AircraftStatus::Emergency)
                    && a.request_time.is_some()
                    && a.assigned_runway.is_none()
            })
            .filter(|a| !self.quarantined_aircraft.contains_key(&a.aircraft_id))
            .collect();
        waiting.sort_by(|a, b| a.aircraft_id.cmp(&b.aircraft_id));

        let mut queue = lock(&self.queue);
        for aircraft in &waiting {
            tracing::debug!("Re-filing seeded request for {}", aircraft.aircraft_id);
            queue.push(seeded_request(aircraft));
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rules(&self) -> &SchedulingRules {
        &self.rules
    }

    pub(crate) fn slot(&self, runway_id: &str) -> CoreResult<&RunwaySlot> {
        self.runway_index
            .get(runway_id)
            .and_then(|&i| self.runways.get(i))
            .ok_or_else(|| CoreError::not_found("runway", runway_id))
    }

    /// Wakes idle workers after the queue or a runway changed.
    pub fn queue_signal(&self) -> &Notify {
        &self.queue_signal
    }

    pub(crate) fn notify_workers(&self) {
        self.queue_signal.notify_waiters();
    }

    pub(crate) fn record(&self, event: LandingEvent) {
        tracing::info!(
            event_type = %event.event_type,
            aircraft = %event.aircraft_id,
            runway = event.runway_id.as_deref().unwrap_or("-"),
            worker = event.worker_id.as_deref().unwrap_or("-"),
            "landing event"
        );
        lock(&self.events).append_landing(event);
    }

    pub(crate) fn record_system(&self, event: SystemEvent) {
        let message = event.message.clone().unwrap_or_default();
        match event.severity {
            EventSeverity::Info => {
                tracing::info!(event_type = %event.event_type, "{}", message)
            }
            EventSeverity::Warning => {
                tracing::warn!(event_type = %event.event_type, "{}", message)
            }
            EventSeverity::Error | EventSeverity::Critical => {
                tracing::error!(event_type = %event.event_type, "{}", message)
            }
        }
        lock(&self.events).append_system(event);
    }

    pub fn mark_loop_heartbeat(&self, name: &str) {
        self.loop_heartbeats.insert(name.to_string(), Utc::now());
    }

    pub fn loop_heartbeats(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut beats: Vec<(String, DateTime<Utc>)> = self
            .loop_heartbeats
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        beats.sort();
        beats
    }

    pub fn aircraft(&self, aircraft_id: &str) -> CoreResult<Aircraft> {
        self.aircraft
            .get(aircraft_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CoreError::not_found("aircraft", aircraft_id))
    }

    pub fn runway(&self, runway_id: &str) -> CoreResult<Runway> {
        Ok(self.slot(runway_id)?.snapshot())
    }

    pub fn flight(&self, flight_id: &str) -> CoreResult<Flight> {
        lock(&self.flights)
            .get(flight_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("flight", flight_id))
    }

    pub(crate) fn fleet(&self) -> Vec<Aircraft> {
        let mut fleet: Vec<Aircraft> = self
            .aircraft
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        fleet.sort_by(|a, b| a.aircraft_id.cmp(&b.aircraft_id));
        fleet
    }

    pub fn queued(&self) -> Vec<LandingRequest> {
        lock(&self.queue).snapshot()
    }

    pub fn queue_position(&self, aircraft_id: &str) -> Option<usize> {
        lock(&self.queue).position(aircraft_id)
    }

    pub fn statistics(&self) -> LandingStatistics {
        LandingStatistics {
            total_landings: self.total_landings.load(Ordering::SeqCst),
            emergency_landings: self.emergency_landings.load(Ordering::SeqCst),
            preemptions: self.preemptions.load(Ordering::SeqCst),
            queue_length: lock(&self.queue).len(),
        }
    }

    pub fn quarantined(&self) -> Vec<QuarantineEntry> {
        let mut entries: Vec<QuarantineEntry> = self
            .runways
            .iter()
            .filter_map(|slot| {
                let state = slot.lock();
                state.quarantine.clone().map(|reason| QuarantineEntry {
                    entity_kind: "runway",
                    entity_id: slot.runway_id.clone(),
                    reason,
                })
            })
            .collect();
        let mut aircraft: Vec<QuarantineEntry> = self
            .quarantined_aircraft
            .iter()
            .map(|entry| QuarantineEntry {
                entity_kind: "aircraft",
                entity_id: entry.key().clone(),
                reason: entry.value().clone(),
            })
            .collect();
        aircraft.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        entries.extend(aircraft);
        entries
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            taken_at: Utc::now(),
            aircraft: self.fleet(),
            runways: self.runways.iter().map(RunwaySlot::snapshot).collect(),
            flights: lock(&self.flights).all(),
            queue: self.queued(),
            weather_alerts: lock(&self.weather).all_alerts(),
            fuel_alerts: lock(&self.fuel).all_alerts(),
            quarantined: self.quarantined(),
            statistics: self.statistics(),
        }
    }

    pub fn landing_events(&self, offset: usize, limit: usize) -> CoreResult<Page<LandingEvent>> {
        lock(&self.events).landing_page(offset, limit)
    }

    pub fn system_events(&self, offset: usize, limit: usize) -> CoreResult<Page<SystemEvent>> {
        lock(&self.events).system_page(offset, limit)
    }

    pub fn landing_events_for(&self, aircraft_id: &str) -> Vec<LandingEvent> {
        lock(&self.events).landing_events_for(aircraft_id)
    }

    pub fn landing_event_count(&self, event_type: LandingEventType) -> usize {
        lock(&self.events).count_of(event_type)
    }

    /// Remove every pending request. Used at teardown.
    pub fn drain_queue(&self) -> Vec<LandingRequest> {
        lock(&self.queue).drain()
    }
}

/// Request for an aircraft that was already waiting (or landing) when the
/// state was loaded.
fn seeded_request(aircraft: &Aircraft) -> LandingRequest {
    LandingRequest {
        aircraft_id: aircraft.aircraft_id.clone(),
        priority: aircraft.priority,
        request_time: aircraft.request_time.unwrap_or_else(Utc::now),
        fuel_level: aircraft.fuel_level,
        is_emergency: aircraft.is_emergency,
        front_of_class: false,
        prior_status: AircraftStatus::Airborne,
    }
}
