//! Per-runway slots.
//!
//! Each runway's status/occupant pair lives behind its own mutex so claims on
//! different runways never contend. Every mutation of a slot bumps or checks
//! the claim counter, which is what workers compare against when they come
//! back to a runway after the approach delay.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use runway_core::{LandingRequest, Runway, RunwayStatus};

use super::lock;

#[derive(Debug)]
pub(crate) struct SlotState {
    pub runway: Runway,
    /// Incremented on every claim, displacement, and maintenance override
    pub claim: u64,
    /// Set once the occupant passes the touchdown commit point
    pub touchdown: bool,
    pub occupant: Option<LandingRequest>,
    pub quarantine: Option<String>,
}

impl SlotState {
    /// Free, open, not weather-gated, not quarantined.
    pub fn is_claimable(&self, weather_closed: bool) -> bool {
        self.quarantine.is_none() && !weather_closed && self.runway.is_assignable()
    }

    pub fn holds(&self, aircraft_id: &str, claim: u64) -> bool {
        self.claim == claim && self.runway.current_aircraft.as_deref() == Some(aircraft_id)
    }

    /// Bind the runway to a new occupant and return the claim token.
    pub fn occupy(&mut self, request: LandingRequest, now: DateTime<Utc>) -> u64 {
        self.claim += 1;
        self.touchdown = false;
        self.runway.status = RunwayStatus::Occupied;
        self.runway.current_aircraft = Some(request.aircraft_id.clone());
        self.runway.last_used = Some(now);
        self.occupant = Some(request);
        self.claim
    }

    /// Clear the occupant. The runway falls back to CLOSED when a gate went
    /// down while it was occupied.
    pub fn vacate(&mut self, now: DateTime<Utc>) -> Option<LandingRequest> {
        self.touchdown = false;
        self.runway.current_aircraft = None;
        self.runway.last_used = Some(now);
        self.runway.status = if self.runway.is_open {
            RunwayStatus::Free
        } else {
            RunwayStatus::Closed
        };
        self.occupant.take()
    }

    pub fn close_gate(&mut self, reason: &str) {
        self.runway.is_open = false;
        if self.runway.status == RunwayStatus::Maintenance {
            return;
        }
        self.runway.closure_reason = Some(reason.to_string());
        if self.runway.status == RunwayStatus::Free {
            self.runway.status = RunwayStatus::Closed;
        }
    }

    pub fn open_gate(&mut self) {
        if self.runway.status == RunwayStatus::Maintenance {
            return;
        }
        self.runway.is_open = true;
        self.runway.closure_reason = None;
        if self.runway.status == RunwayStatus::Closed {
            self.runway.status = RunwayStatus::Free;
        }
    }
}

#[derive(Debug)]
pub(crate) struct RunwaySlot {
    pub runway_id: String,
    state: Mutex<SlotState>,
}

impl RunwaySlot {
    pub fn new(runway: Runway, occupant: Option<LandingRequest>) -> Self {
        Self {
            runway_id: runway.runway_id.clone(),
            state: Mutex::new(SlotState {
                runway,
                claim: 0,
                touchdown: false,
                occupant,
                quarantine: None,
            }),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, SlotState> {
        lock(&self.state)
    }

    pub fn snapshot(&self) -> Runway {
        self.lock().runway.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runway_core::AircraftStatus;

    fn request(id: &str) -> LandingRequest {
        LandingRequest {
            aircraft_id: id.to_string(),
            priority: 3,
            request_time: Utc::now(),
            fuel_level: 60,
            is_emergency: false,
            front_of_class: false,
            prior_status: AircraftStatus::Airborne,
        }
    }

    #[test]
    fn occupy_and_vacate_keep_occupancy_consistent() {
        let slot = RunwaySlot::new(Runway::new("RW01"), None);
        let mut state = slot.lock();
        let claim = state.occupy(request("AC001"), Utc::now());
        assert!(state.runway.occupancy_consistent());
        assert!(state.holds("AC001", claim));

        let released = state.vacate(Utc::now()).unwrap();
        assert_eq!(released.aircraft_id, "AC001");
        assert_eq!(state.runway.status, RunwayStatus::Free);
        assert!(state.runway.occupancy_consistent());
        assert!(!state.holds("AC001", claim));
    }

    #[test]
    fn gate_closed_while_occupied_takes_effect_on_release() {
        let slot = RunwaySlot::new(Runway::new("RW01"), None);
        let mut state = slot.lock();
        state.occupy(request("AC001"), Utc::now());
        state.close_gate("STORM");
        assert_eq!(state.runway.status, RunwayStatus::Occupied);
        assert!(!state.runway.is_open);

        state.vacate(Utc::now());
        assert_eq!(state.runway.status, RunwayStatus::Closed);
        assert_eq!(state.runway.closure_reason.as_deref(), Some("STORM"));

        state.open_gate();
        assert_eq!(state.runway.status, RunwayStatus::Free);
        assert!(state.is_claimable(false));
        assert!(!state.is_claimable(true));
    }

    #[test]
    fn quarantined_slot_is_never_claimable() {
        let slot = RunwaySlot::new(Runway::new("RW02"), None);
        let mut state = slot.lock();
        state.quarantine = Some("occupied with no occupant".into());
        assert!(!state.is_claimable(false));
    }
}
