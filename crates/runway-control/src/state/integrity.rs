//! Consistency sweeps, quarantine, and operator overrides.
//!
//! A violated invariant quarantines the entity it was found on. Nothing is
//! repaired automatically; `release_quarantine` is the operator's way back.

use chrono::Utc;
use serde::Serialize;

use runway_core::models::PRIORITY_HIGHEST;
use runway_core::{
    AircraftStatus, CoreError, CoreResult, DelayReason, EventSeverity, LandingEvent,
    LandingEventType, RunwayStatus, SystemEvent, SystemEventType,
};

use super::{lock, ControlState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityViolation {
    pub entity_kind: &'static str,
    pub entity_id: String,
    pub reason: String,
}

impl IntegrityViolation {
    fn runway(runway_id: &str, reason: impl Into<String>) -> Self {
        Self {
            entity_kind: "runway",
            entity_id: runway_id.to_string(),
            reason: reason.into(),
        }
    }

    fn aircraft(aircraft_id: &str, reason: impl Into<String>) -> Self {
        Self {
            entity_kind: "aircraft",
            entity_id: aircraft_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn to_error(&self) -> CoreError {
        CoreError::Integrity {
            entity: format!("{} {}", self.entity_kind, self.entity_id),
            reason: self.reason.clone(),
        }
    }
}

impl ControlState {
    /// Check every runway/aircraft invariant, quarantining offenders. Entities
    /// already in quarantine are skipped. Returns the new violations.
    pub fn verify_integrity(&self) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();

        for slot in &self.runways {
            let mut state = slot.lock();
            if state.quarantine.is_some() {
                continue;
            }
            let runway = &state.runway;
            let reason = if !runway.occupancy_consistent() {
                Some(format!(
                    "status {} with occupant {}",
                    runway.status,
                    runway.current_aircraft.as_deref().unwrap_or("none")
                ))
            } else if runway.status == RunwayStatus::Closed && runway.is_open {
                Some("CLOSED runway is marked open".to_string())
            } else if let Some(occupant) = runway.current_aircraft.as_deref() {
                match self.aircraft.get(occupant) {
                    None => Some(format!("occupant {} is not registered", occupant)),
                    Some(aircraft)
                        if aircraft.assigned_runway.as_deref() != Some(slot.runway_id.as_str()) =>
                    {
                        Some(format!(
                            "occupant {} is assigned to {}",
                            occupant,
                            aircraft.assigned_runway.as_deref().unwrap_or("none")
                        ))
                    }
                    Some(_) => None,
                }
            } else {
                None
            };
            if let Some(reason) = reason {
                state.quarantine = Some(reason.clone());
                violations.push(IntegrityViolation::runway(&slot.runway_id, reason));
            }
        }

        for aircraft in self.fleet() {
            let aircraft_id = aircraft.aircraft_id.as_str();
            if self.quarantined_aircraft.contains_key(aircraft_id) {
                continue;
            }
            let reason = if aircraft.is_emergency && aircraft.priority != PRIORITY_HIGHEST {
                Some(format!(
                    "emergency aircraft carries priority {}",
                    aircraft.priority
                ))
            } else if let Some(runway_id) = aircraft.assigned_runway.as_deref() {
                self.assignment_mismatch(aircraft_id, runway_id)
            } else {
                None
            };
            if let Some(reason) = reason {
                self.quarantined_aircraft
                    .insert(aircraft_id.to_string(), reason.clone());
                lock(&self.queue).remove(aircraft_id);
                violations.push(IntegrityViolation::aircraft(aircraft_id, reason));
            }
        }

        for violation in &violations {
            self.record_system(
                SystemEvent::new(
                    SystemEventType::IntegrationEvent,
                    "IntegrityMonitor",
                    format!(
                        "quarantined {} {}: {}",
                        violation.entity_kind, violation.entity_id, violation.reason
                    ),
                )
                .with_severity(EventSeverity::Critical)
                .detail("entityKind", violation.entity_kind)
                .detail("entityId", violation.entity_id.as_str())
                .detail("reason", violation.reason.as_str()),
            );
        }
        violations
    }

    /// Re-read the pair under the runway lock so an in-flight claim is seen
    /// whole.
    fn assignment_mismatch(&self, aircraft_id: &str, runway_id: &str) -> Option<String> {
        let Ok(slot) = self.slot(runway_id) else {
            return Some(format!("assigned to unknown runway {}", runway_id));
        };
        let state = slot.lock();
        let current = self.aircraft.get(aircraft_id)?;
        if current.assigned_runway.as_deref() != Some(runway_id) {
            return None;
        }
        if state.runway.current_aircraft.as_deref() == Some(aircraft_id) {
            return None;
        }
        Some(format!(
            "assigned to {} but runway holds {}",
            runway_id,
            state.runway.current_aircraft.as_deref().unwrap_or("none")
        ))
    }

    /// Operator intervention: lift a quarantine on a runway or aircraft id.
    /// Dangling references on the released entity are cleared, and a released
    /// aircraft that was waiting to land is filed again.
    pub fn release_quarantine(&self, entity_id: &str) -> CoreResult<()> {
        if let Ok(slot) = self.slot(entity_id) {
            let mut state = slot.lock();
            let Some(reason) = state.quarantine.take() else {
                return Err(CoreError::not_found("quarantine", entity_id));
            };
            let holds_back = state
                .runway
                .current_aircraft
                .as_deref()
                .and_then(|id| self.aircraft.get(id))
                .map(|a| a.assigned_runway.as_deref() == Some(entity_id))
                .unwrap_or(false);
            if (!holds_back && state.runway.current_aircraft.is_some())
                || !state.runway.occupancy_consistent()
            {
                state.occupant = None;
                state.vacate(Utc::now());
            }
            if state.runway.status == RunwayStatus::Closed && state.runway.is_open {
                state.runway.status = RunwayStatus::Free;
            }
            drop(state);
            tracing::warn!("Runway {} released from quarantine ({})", entity_id, reason);
            self.record_system(
                SystemEvent::new(
                    SystemEventType::IntegrationEvent,
                    "IntegrityMonitor",
                    format!("runway {} released from quarantine", entity_id),
                )
                .with_severity(EventSeverity::Warning)
                .detail("previousReason", reason),
            );
            self.notify_workers();
            return Ok(());
        }

        let (_, reason) = self
            .quarantined_aircraft
            .remove(entity_id)
            .ok_or_else(|| CoreError::not_found("quarantine", entity_id))?;

        let assigned = self.aircraft(entity_id)?.assigned_runway;
        if let Some(runway_id) = assigned {
            let held = match self.slot(&runway_id) {
                Ok(slot) => {
                    let state = slot.lock();
                    // Lock held so the check and the clear see the same occupancy.
                    let held = state.runway.current_aircraft.as_deref() == Some(entity_id);
                    if !held {
                        self.clear_dangling_assignment(entity_id, &runway_id);
                    }
                    held
                }
                Err(_) => {
                    self.clear_dangling_assignment(entity_id, &runway_id);
                    false
                }
            };
            tracing::debug!("{} released, runway {} held: {}", entity_id, runway_id, held);
        }
        if let Some(mut aircraft) = self.aircraft.get_mut(entity_id) {
            if aircraft.is_emergency {
                aircraft.priority = PRIORITY_HIGHEST;
            }
        }

        tracing::warn!("Aircraft {} released from quarantine ({})", entity_id, reason);
        self.record_system(
            SystemEvent::new(
                SystemEventType::IntegrationEvent,
                "IntegrityMonitor",
                format!("aircraft {} released from quarantine", entity_id),
            )
            .with_severity(EventSeverity::Warning)
            .detail("previousReason", reason),
        );

        let aircraft = self.aircraft(entity_id)?;
        if !aircraft.has_landed()
            && aircraft.assigned_runway.is_none()
            && aircraft.request_time.is_some()
        {
            self.submit_landing_request(entity_id, None)?;
        }
        Ok(())
    }

    /// Caller holds the runway slot lock.
    fn clear_dangling_assignment(&self, aircraft_id: &str, runway_id: &str) {
        if let Some(mut aircraft) = self.aircraft.get_mut(aircraft_id) {
            if aircraft.assigned_runway.as_deref() == Some(runway_id) {
                aircraft.assigned_runway = None;
                if aircraft.status == AircraftStatus::Landing {
                    aircraft.status = if aircraft.is_emergency {
                        AircraftStatus::Emergency
                    } else {
                        AircraftStatus::Airborne
                    };
                }
            }
        }
    }

    /// Operator override: take a runway out of service. An occupant that has
    /// not touched down is displaced and re-enqueued at the front of its
    /// class; one past touchdown blocks the override. Returns the displaced
    /// aircraft, if any.
    pub fn begin_maintenance(&self, runway_id: &str, reason: &str) -> CoreResult<Option<String>> {
        let slot = self.slot(runway_id)?;
        let displaced = {
            let mut state = slot.lock();
            if state.runway.status == RunwayStatus::Maintenance {
                return Ok(None);
            }
            let displaced = match state.runway.current_aircraft.clone() {
                Some(occupant) if state.touchdown => {
                    return Err(CoreError::PastTouchdown {
                        aircraft_id: occupant,
                        runway_id: runway_id.to_string(),
                    });
                }
                Some(occupant) => {
                    let request = state.vacate(Utc::now());
                    Some((occupant.clone(), self.unbind_displaced(request, &occupant)))
                }
                None => None,
            };
            state.claim += 1;
            state.runway.status = RunwayStatus::Maintenance;
            state.runway.is_open = false;
            state.runway.closure_reason = Some(reason.to_string());
            displaced
        };

        let displaced_id = displaced.map(|(aircraft_id, request)| {
            lock(&self.queue).push_front_of_class(request);
            lock(&self.flights).delay_aircraft_flight(
                &aircraft_id,
                self.rules.preemption_delay_minutes,
                DelayReason::Runway,
            );
            self.record(
                LandingEvent::new(LandingEventType::RunwayReleased, &aircraft_id)
                    .on_runway(runway_id)
                    .detail("maintenanceOverride", true)
                    .detail("reason", reason),
            );
            aircraft_id
        });

        self.record_system(
            SystemEvent::new(
                SystemEventType::IntegrationEvent,
                "RunwayRegistry",
                format!("runway {} in maintenance: {}", runway_id, reason),
            )
            .with_severity(EventSeverity::Warning)
            .detail("runwayId", runway_id)
            .detail("displacedAircraft", displaced_id.clone()),
        );
        self.notify_workers();
        Ok(displaced_id)
    }

    /// Return a runway from maintenance. It comes back CLOSED if a weather
    /// alert still covers it.
    pub fn end_maintenance(&self, runway_id: &str) -> CoreResult<()> {
        let slot = self.slot(runway_id)?;
        let status = {
            let mut state = slot.lock();
            if state.runway.status != RunwayStatus::Maintenance {
                return Err(CoreError::UnexpectedRunwayStatus {
                    runway_id: runway_id.to_string(),
                    expected: RunwayStatus::Maintenance.to_string(),
                    actual: state.runway.status.to_string(),
                });
            }
            let closing = lock(&self.weather)
                .closing_alert(runway_id)
                .map(|alert| alert.alert_type);
            state.runway.status = RunwayStatus::Closed;
            match closing {
                Some(alert_type) => state.close_gate(alert_type.as_str()),
                None => state.open_gate(),
            }
            state.runway.status
        };

        self.record_system(
            SystemEvent::new(
                SystemEventType::IntegrationEvent,
                "RunwayRegistry",
                format!("runway {} back from maintenance as {}", runway_id, status),
            )
            .detail("runwayId", runway_id)
            .detail("status", status.as_str()),
        );
        self.notify_workers();
        Ok(())
    }
}
