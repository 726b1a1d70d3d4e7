//! Priority scheduler: request intake, emergency escalation, runway claims,
//! preemption, and landing completion.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::MutexGuard;

use chrono::Utc;
use serde::Serialize;

use runway_core::models::{PRIORITY_HIGHEST, PRIORITY_LOWEST};
use runway_core::{
    Aircraft, AircraftStatus, CoreError, CoreResult, DelayReason, LandingEvent, LandingEventType,
    LandingQueue, LandingRequest, RunwayStatus,
};

use super::runways::{RunwaySlot, SlotState};
use super::{lock, ControlState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    /// Serves the head of the queue, whatever its class
    Routine,
    /// Serves only emergency requests
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId {
    pub role: WorkerRole,
    pub index: usize,
}

impl WorkerId {
    pub fn routine(index: usize) -> Self {
        Self {
            role: WorkerRole::Routine,
            index,
        }
    }

    pub fn emergency(index: usize) -> Self {
        Self {
            role: WorkerRole::Emergency,
            index,
        }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            WorkerRole::Routine => write!(f, "LandingWorker-{}", self.index),
            WorkerRole::Emergency => write!(f, "EmergencyWorker-{}", self.index),
        }
    }
}

/// A successful runway claim. The claim token ties follow-up steps to this
/// exact occupancy; it goes stale if the aircraft is displaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub aircraft_id: String,
    pub runway_id: String,
    pub claim: u64,
    pub worker_id: String,
    pub emergency: bool,
    pub preempted: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing this worker may serve
    Idle,
    Assigned(Assignment),
    /// No assignable runway and no viable preemption
    Requeued { aircraft_id: String },
    /// The request was stale (landed, already assigned, quarantined)
    Dropped { aircraft_id: String, reason: String },
}

struct Victim {
    index: usize,
    claim: u64,
    priority: u8,
}

/// Status a displaced aircraft falls back to.
fn prior_status_of(status: AircraftStatus) -> AircraftStatus {
    match status {
        AircraftStatus::Scheduled => AircraftStatus::Scheduled,
        _ => AircraftStatus::Airborne,
    }
}

/// Caller holds the aircraft entry and the queue lock.
fn file_request(
    aircraft: &mut Aircraft,
    prior_status: AircraftStatus,
    queue: &mut LandingQueue,
) -> (LandingRequest, usize) {
    let request_time = *aircraft.request_time.get_or_insert_with(Utc::now);
    aircraft.status = if aircraft.is_emergency {
        AircraftStatus::Emergency
    } else {
        AircraftStatus::Approaching
    };
    let request = LandingRequest {
        aircraft_id: aircraft.aircraft_id.clone(),
        priority: aircraft.priority,
        request_time,
        fuel_level: aircraft.fuel_level,
        is_emergency: aircraft.is_emergency,
        front_of_class: false,
        prior_status,
    };
    queue.push(request.clone());
    let position = queue.position(&aircraft.aircraft_id).unwrap_or(queue.len());
    (request, position)
}

/// Bring a request's ordering fields in line with the registry.
fn refresh_request(request: &mut LandingRequest, aircraft: &Aircraft) {
    request.priority = aircraft.priority;
    request.is_emergency = aircraft.is_emergency;
    request.fuel_level = aircraft.fuel_level;
}

impl ControlState {
    /// File a landing request. Returns the queued request; re-filing an
    /// aircraft that is already queued, or being served by a worker, returns
    /// its existing request.
    pub fn submit_landing_request(
        &self,
        aircraft_id: &str,
        worker: Option<&str>,
    ) -> CoreResult<LandingRequest> {
        if let Some(reason) = self.quarantined_aircraft.get(aircraft_id) {
            return Err(CoreError::Quarantined {
                entity: format!("aircraft {}", aircraft_id),
                reason: reason.value().clone(),
            });
        }

        let (request, position) = {
            let mut entry = self
                .aircraft
                .get_mut(aircraft_id)
                .ok_or_else(|| CoreError::not_found("aircraft", aircraft_id))?;
            if entry.has_landed() {
                return Err(CoreError::AlreadyLanded {
                    aircraft_id: aircraft_id.to_string(),
                });
            }
            if let Some(runway_id) = &entry.assigned_runway {
                return Err(CoreError::DuplicateAssignment {
                    aircraft_id: aircraft_id.to_string(),
                    runway_id: runway_id.clone(),
                });
            }

            let mut queue = lock(&self.queue);
            let pending = queue
                .get(aircraft_id)
                .or_else(|| queue.dispatching(aircraft_id));
            if let Some(existing) = pending {
                tracing::debug!("{} already pending, ignoring re-submission", aircraft_id);
                return Ok(existing.clone());
            }

            let prior_status = prior_status_of(entry.status);
            file_request(&mut entry, prior_status, &mut queue)
        };

        self.record_request(aircraft_id, worker, &request, position);
        self.notify_workers();
        Ok(request)
    }

    fn record_request(
        &self,
        aircraft_id: &str,
        worker: Option<&str>,
        request: &LandingRequest,
        position: usize,
    ) {
        self.record(
            LandingEvent::new(LandingEventType::LandingRequest, aircraft_id)
                .by_worker(worker)
                .detail("fuelLevel", request.fuel_level)
                .detail("priority", request.priority)
                .detail("isEmergency", request.is_emergency)
                .detail("queuePosition", position),
        );
    }

    /// Flag an aircraft as an emergency and escalate it to priority 1. Only
    /// the aircraft's own fields and its queue position change; runways are
    /// left to the next scheduling cycle. An aircraft with no pending request
    /// and no runway gets one filed. Returns `false` when the aircraft was
    /// already an emergency.
    pub fn declare_emergency(
        &self,
        aircraft_id: &str,
        reason: &str,
        worker: Option<&str>,
    ) -> CoreResult<bool> {
        let quarantined = self.quarantined_aircraft.contains_key(aircraft_id);
        let (previous_priority, fuel_level, filed) = {
            let mut entry = self
                .aircraft
                .get_mut(aircraft_id)
                .ok_or_else(|| CoreError::not_found("aircraft", aircraft_id))?;
            if entry.has_landed() {
                return Err(CoreError::AlreadyLanded {
                    aircraft_id: aircraft_id.to_string(),
                });
            }
            if entry.is_emergency {
                return Ok(false);
            }
            let prior_status = prior_status_of(entry.status);
            let previous = entry.priority;
            entry.is_emergency = true;
            entry.priority = PRIORITY_HIGHEST;

            let mut queue = lock(&self.queue);
            let pending = queue.escalate(aircraft_id, entry.fuel_level).is_some();
            let filed = if pending || quarantined || entry.assigned_runway.is_some() {
                None
            } else {
                Some(file_request(&mut entry, prior_status, &mut queue))
            };
            if entry.assigned_runway.is_none() {
                entry.status = AircraftStatus::Emergency;
            }
            (previous, entry.fuel_level, filed)
        };

        self.record(
            LandingEvent::new(LandingEventType::EmergencyDeclared, aircraft_id)
                .by_worker(worker)
                .detail("reason", reason)
                .detail("fuelLevel", fuel_level),
        );
        if previous_priority != PRIORITY_HIGHEST {
            self.record(
                LandingEvent::new(LandingEventType::PriorityEscalated, aircraft_id)
                    .by_worker(worker)
                    .detail("previousPriority", previous_priority)
                    .detail("newPriority", PRIORITY_HIGHEST),
            );
        }
        if let Some((request, position)) = &filed {
            self.record_request(aircraft_id, worker, request, *position);
        }
        self.notify_workers();
        Ok(true)
    }

    /// One scheduling cycle for one worker: take the best request it may
    /// serve, claim the lowest-id free runway, or preempt for an emergency.
    /// Pop and claim run under the dispatch lock so the queue order is the
    /// assignment order.
    pub fn run_cycle(&self, worker: &WorkerId) -> CoreResult<CycleOutcome> {
        let _dispatch = lock(&self.dispatch);

        let taken = lock(&self.queue).checkout(worker.role == WorkerRole::Emergency);
        let Some(request) = taken else {
            return Ok(CycleOutcome::Idle);
        };
        let aircraft_id = request.aircraft_id.clone();
        let outcome = self.serve(request, worker);
        lock(&self.queue).settle(&aircraft_id);
        outcome
    }

    fn serve(&self, mut request: LandingRequest, worker: &WorkerId) -> CoreResult<CycleOutcome> {
        let aircraft_id = request.aircraft_id.clone();

        if let Some(reason) = self.stale_reason(&aircraft_id) {
            tracing::warn!("{} dropped request for {}: {}", worker, aircraft_id, reason);
            return Ok(CycleOutcome::Dropped {
                aircraft_id,
                reason,
            });
        }
        // Escalations landed on the registry while the request sat queued.
        if let Some(aircraft) = self.aircraft.get(&aircraft_id) {
            refresh_request(&mut request, &aircraft);
        }

        let worker_id = worker.to_string();
        if let Some(assignment) = self.claim_free_runway(&request, &worker_id)? {
            return Ok(CycleOutcome::Assigned(assignment));
        }
        if request.is_emergency {
            if let Some(assignment) = self.preempt_runway(&request, &worker_id)? {
                return Ok(CycleOutcome::Assigned(assignment));
            }
        }

        // Entry held so a concurrent emergency declaration either lands
        // before the refresh or finds the request back in the queue.
        let requeued = {
            let Some(aircraft) = self.aircraft.get(&aircraft_id) else {
                return Ok(CycleOutcome::Dropped {
                    aircraft_id,
                    reason: "unknown aircraft".to_string(),
                });
            };
            if let Some(reason) = self.quarantined_aircraft.get(&aircraft_id) {
                return Ok(CycleOutcome::Dropped {
                    aircraft_id,
                    reason: format!("quarantined: {}", reason.value()),
                });
            }
            refresh_request(&mut request, &aircraft);
            lock(&self.queue).requeue(request)
        };
        if requeued {
            tracing::debug!("{} found no runway for {}, requeueing", worker, aircraft_id);
        } else {
            tracing::debug!("{} found no runway for {}, already re-filed", worker, aircraft_id);
        }
        Ok(CycleOutcome::Requeued { aircraft_id })
    }

    fn stale_reason(&self, aircraft_id: &str) -> Option<String> {
        if let Some(reason) = self.quarantined_aircraft.get(aircraft_id) {
            return Some(format!("quarantined: {}", reason.value()));
        }
        let Some(aircraft) = self.aircraft.get(aircraft_id) else {
            return Some("unknown aircraft".to_string());
        };
        if aircraft.has_landed() {
            return Some("already landed".to_string());
        }
        aircraft
            .assigned_runway
            .as_ref()
            .map(|runway_id| format!("already holds {}", runway_id))
    }

    fn claim_free_runway(
        &self,
        request: &LandingRequest,
        worker_id: &str,
    ) -> CoreResult<Option<Assignment>> {
        for slot in &self.runways {
            let claim = {
                let mut state = slot.lock();
                let weather_closed = lock(&self.weather).is_runway_closed(&slot.runway_id);
                if !state.is_claimable(weather_closed) {
                    continue;
                }
                let claim = state.occupy(request.clone(), Utc::now());
                if let Err(err) = self.bind_aircraft(&request.aircraft_id, &slot.runway_id) {
                    state.vacate(Utc::now());
                    return Err(err);
                }
                claim
            };

            self.record(
                LandingEvent::new(LandingEventType::RunwayAssigned, &request.aircraft_id)
                    .on_runway(&slot.runway_id)
                    .by_worker(Some(worker_id))
                    .detail("priority", request.priority)
                    .detail("isEmergency", request.is_emergency),
            );
            return Ok(Some(Assignment {
                aircraft_id: request.aircraft_id.clone(),
                runway_id: slot.runway_id.clone(),
                claim,
                worker_id: worker_id.to_string(),
                emergency: request.is_emergency,
                preempted: None,
            }));
        }
        Ok(None)
    }

    /// Caller holds the runway slot lock.
    fn bind_aircraft(&self, aircraft_id: &str, runway_id: &str) -> CoreResult<()> {
        let mut entry = self
            .aircraft
            .get_mut(aircraft_id)
            .ok_or_else(|| CoreError::not_found("aircraft", aircraft_id))?;
        entry.assigned_runway = Some(runway_id.to_string());
        entry.status = AircraftStatus::Landing;
        Ok(())
    }

    /// Caller holds the runway slot lock. Returns the request to re-enqueue.
    pub(super) fn unbind_displaced(
        &self,
        occupant: Option<LandingRequest>,
        aircraft_id: &str,
    ) -> LandingRequest {
        let now = Utc::now();
        let mut entry = self.aircraft.get_mut(aircraft_id);
        let prior_status = occupant
            .as_ref()
            .map(|r| r.prior_status)
            .unwrap_or(AircraftStatus::Airborne);
        if let Some(aircraft) = entry.as_deref_mut() {
            aircraft.assigned_runway = None;
            aircraft.status = prior_status;
        }
        let (priority, fuel_level, is_emergency, request_time) = match entry.as_deref() {
            Some(a) => (a.priority, a.fuel_level, a.is_emergency, a.request_time),
            None => (PRIORITY_LOWEST, 0, false, None),
        };
        let mut request = occupant.unwrap_or_else(|| LandingRequest {
            aircraft_id: aircraft_id.to_string(),
            priority,
            request_time: request_time.unwrap_or(now),
            fuel_level,
            is_emergency,
            front_of_class: false,
            prior_status,
        });
        request.priority = priority;
        request.fuel_level = fuel_level;
        request.is_emergency = is_emergency;
        request
    }

    /// The occupant to displace: non-emergency, before touchdown, strictly
    /// lower priority than the request; largest priority number wins, ties
    /// go to the lowest runway id.
    fn pick_victim(&self, request: &LandingRequest) -> Option<Victim> {
        let mut best: Option<Victim> = None;
        for (index, slot) in self.runways.iter().enumerate() {
            let state = slot.lock();
            if state.runway.status != RunwayStatus::Occupied
                || !state.runway.is_open
                || state.touchdown
                || state.quarantine.is_some()
            {
                continue;
            }
            let Some(occupant_id) = state.runway.current_aircraft.as_deref() else {
                continue;
            };
            let Some(occupant) = self.aircraft.get(occupant_id) else {
                continue;
            };
            if occupant.is_emergency || occupant.priority <= request.priority {
                continue;
            }
            if best.as_ref().map_or(true, |b| occupant.priority > b.priority) {
                best = Some(Victim {
                    index,
                    claim: state.claim,
                    priority: occupant.priority,
                });
            }
        }
        best
    }

    fn preempt_runway(
        &self,
        request: &LandingRequest,
        worker_id: &str,
    ) -> CoreResult<Option<Assignment>> {
        let Some(victim) = self.pick_victim(request) else {
            return Ok(None);
        };
        let Some(slot) = self.runways.get(victim.index) else {
            return Ok(None);
        };

        let (claim, displaced_id, displaced_request) = {
            let mut state = slot.lock();
            // The occupant may have touched down or left since it was picked.
            if state.claim != victim.claim || state.touchdown || !state.runway.is_open {
                return Ok(None);
            }
            let Some(displaced_id) = state.runway.current_aircraft.clone() else {
                return Ok(None);
            };
            let occupant = state.vacate(Utc::now());
            let displaced_request = self.unbind_displaced(occupant, &displaced_id);
            let claim = state.occupy(request.clone(), Utc::now());
            if let Err(err) = self.bind_aircraft(&request.aircraft_id, &slot.runway_id) {
                state.vacate(Utc::now());
                return Err(err);
            }
            (claim, displaced_id, displaced_request)
        };

        lock(&self.queue).push_front_of_class(displaced_request);
        lock(&self.flights).delay_aircraft_flight(
            &displaced_id,
            self.rules.preemption_delay_minutes,
            DelayReason::Runway,
        );
        self.preemptions.fetch_add(1, Ordering::SeqCst);

        tracing::warn!(
            "{} displaced {} from {} for emergency {}",
            worker_id,
            displaced_id,
            slot.runway_id,
            request.aircraft_id
        );
        self.record(
            LandingEvent::new(LandingEventType::RunwayAssigned, &request.aircraft_id)
                .on_runway(&slot.runway_id)
                .by_worker(Some(worker_id))
                .detail("priority", request.priority)
                .detail("isEmergency", true)
                .detail("emergencyOverride", true)
                .detail("previousAircraftCleared", displaced_id.as_str()),
        );
        self.notify_workers();

        Ok(Some(Assignment {
            aircraft_id: request.aircraft_id.clone(),
            runway_id: slot.runway_id.clone(),
            claim,
            worker_id: worker_id.to_string(),
            emergency: true,
            preempted: Some(displaced_id),
        }))
    }

    /// Touchdown commit point. After this the occupant can no longer be
    /// displaced. Fails with `NotAssigned` if the claim went stale.
    pub fn begin_landing(&self, assignment: &Assignment) -> CoreResult<()> {
        let slot = self.slot(&assignment.runway_id)?;
        {
            let mut state = slot.lock();
            if !state.holds(&assignment.aircraft_id, assignment.claim) {
                return Err(CoreError::NotAssigned {
                    aircraft_id: assignment.aircraft_id.clone(),
                    runway_id: assignment.runway_id.clone(),
                    claim: assignment.claim,
                });
            }
            if state.touchdown {
                return Ok(());
            }
            state.touchdown = true;
        }

        self.record(
            LandingEvent::new(LandingEventType::LandingStarted, &assignment.aircraft_id)
                .on_runway(&assignment.runway_id)
                .by_worker(Some(assignment.worker_id.as_str()))
                .detail("emergency", assignment.emergency),
        );
        Ok(())
    }

    /// Finish the landing held under `assignment` and free the runway.
    pub fn complete_landing(&self, assignment: &Assignment) -> CoreResult<()> {
        let slot = self.slot(&assignment.runway_id)?;
        let state = slot.lock();
        if !state.holds(&assignment.aircraft_id, assignment.claim) {
            return Err(CoreError::NotAssigned {
                aircraft_id: assignment.aircraft_id.clone(),
                runway_id: assignment.runway_id.clone(),
                claim: assignment.claim,
            });
        }
        self.finish_landing(slot, state, Some(assignment.worker_id.as_str()))
            .map(|_| ())
    }

    /// Release a runway by id, completing whatever landing holds it. Rejects
    /// runways that are not OCCUPIED. Returns the aircraft that landed.
    pub fn release_runway(&self, runway_id: &str, worker: Option<&str>) -> CoreResult<String> {
        let slot = self.slot(runway_id)?;
        let state = slot.lock();
        if state.runway.status != RunwayStatus::Occupied || state.runway.current_aircraft.is_none()
        {
            return Err(CoreError::RunwayNotOccupied {
                runway_id: runway_id.to_string(),
                status: state.runway.status.to_string(),
            });
        }
        self.finish_landing(slot, state, worker)
    }

    fn finish_landing(
        &self,
        slot: &RunwaySlot,
        mut state: MutexGuard<'_, SlotState>,
        worker: Option<&str>,
    ) -> CoreResult<String> {
        let aircraft_id = state
            .runway
            .current_aircraft
            .clone()
            .ok_or_else(|| CoreError::RunwayNotOccupied {
                runway_id: slot.runway_id.clone(),
                status: state.runway.status.to_string(),
            })?;
        let now = Utc::now();
        state.vacate(now);
        state.runway.total_usage = state.runway.total_usage.saturating_add(1);
        let runway_status = state.runway.status;

        let emergency = match self.aircraft.get_mut(&aircraft_id) {
            Some(mut aircraft) => {
                aircraft.status = AircraftStatus::Landed;
                aircraft.assigned_runway = None;
                aircraft.is_emergency
            }
            None => false,
        };
        drop(state);

        let resolved = lock(&self.fuel).resolve_on_landing(&aircraft_id);
        let flight = lock(&self.flights).on_landed(&aircraft_id, now);
        self.total_landings.fetch_add(1, Ordering::SeqCst);
        if emergency {
            self.emergency_landings.fetch_add(1, Ordering::SeqCst);
        }

        let mut completed = LandingEvent::new(LandingEventType::LandingCompleted, &aircraft_id)
            .on_runway(&slot.runway_id)
            .by_worker(worker)
            .detail("emergency", emergency);
        if let Some(flight) = &flight {
            completed = completed.detail("flightId", flight.flight_id.as_str());
        }
        if let Some(alert) = &resolved {
            completed = completed
                .detail("fuelAlertResolved", alert.alert_id.as_str())
                .detail("resolution", alert.resolution.clone().unwrap_or_default());
        }
        self.record(completed);
        self.record(
            LandingEvent::new(LandingEventType::RunwayReleased, &aircraft_id)
                .on_runway(&slot.runway_id)
                .by_worker(worker)
                .detail("runwayStatus", runway_status.as_str()),
        );
        self.notify_workers();
        Ok(aircraft_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_names_follow_role() {
        assert_eq!(WorkerId::routine(2).to_string(), "LandingWorker-2");
        assert_eq!(WorkerId::emergency(1).to_string(), "EmergencyWorker-1");
    }
}
