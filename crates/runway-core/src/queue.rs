//! Priority-ordered landing request queue.
//!
//! Requests are ordered by `(priority, lane, requestTime, fuelLevel, seq)`:
//! priority 1 before 2 before 3, and inside a priority class emergencies come
//! first, then aircraft pushed back to the front (displaced), then everyone
//! else first-in-first-out. Fuel level ascending breaks exact time ties.
//!
//! A request taken by a worker stays visible as in flight until the worker
//! settles it or hands it back, so escalation and re-filing still find it.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{AircraftStatus, PRIORITY_HIGHEST};

/// A pending landing request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingRequest {
    pub aircraft_id: String,
    pub priority: u8,
    pub request_time: DateTime<Utc>,
    pub fuel_level: u8,
    pub is_emergency: bool,
    /// Re-enqueued at the front of its class after losing a runway
    pub front_of_class: bool,
    /// Status the aircraft had before filing; displaced aircraft fall back to it
    pub prior_status: AircraftStatus,
}

impl LandingRequest {
    fn lane(&self) -> u8 {
        if self.is_emergency {
            0
        } else if self.front_of_class {
            1
        } else {
            2
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    priority: u8,
    lane: u8,
    request_time: DateTime<Utc>,
    fuel_level: u8,
    seq: u64,
}

/// Ordered queue with O(log n) removal by aircraft id.
#[derive(Debug, Default)]
pub struct LandingQueue {
    ordered: BTreeMap<QueueKey, LandingRequest>,
    index: HashMap<String, QueueKey>,
    dispatching: HashMap<String, LandingRequest>,
    next_seq: u64,
}

impl LandingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn contains(&self, aircraft_id: &str) -> bool {
        self.index.contains_key(aircraft_id)
    }

    /// Insert a request, replacing any earlier one for the same aircraft.
    pub fn push(&mut self, request: LandingRequest) {
        let seq = match self.index.remove(&request.aircraft_id) {
            Some(old) => {
                self.ordered.remove(&old);
                old.seq
            }
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };
        self.insert_with_seq(request, seq);
    }

    /// Put a displaced aircraft back at the front of its (unchanged) class.
    pub fn push_front_of_class(&mut self, mut request: LandingRequest) {
        request.front_of_class = true;
        self.push(request);
    }

    fn insert_with_seq(&mut self, request: LandingRequest, seq: u64) {
        let key = QueueKey {
            priority: request.priority,
            lane: request.lane(),
            request_time: request.request_time,
            fuel_level: request.fuel_level,
            seq,
        };
        self.index.insert(request.aircraft_id.clone(), key.clone());
        self.ordered.insert(key, request);
    }

    pub fn get(&self, aircraft_id: &str) -> Option<&LandingRequest> {
        let key = self.index.get(aircraft_id)?;
        self.ordered.get(key)
    }

    pub fn peek(&self) -> Option<&LandingRequest> {
        self.ordered.values().next()
    }

    pub fn pop(&mut self) -> Option<LandingRequest> {
        let (_, request) = self.ordered.pop_first()?;
        self.index.remove(&request.aircraft_id);
        Some(request)
    }

    /// Pop the head only if it is an emergency. Emergencies always sort ahead
    /// of everything else, so checking the head is enough.
    pub fn pop_emergency(&mut self) -> Option<LandingRequest> {
        if !self.peek()?.is_emergency {
            return None;
        }
        self.pop()
    }

    /// Take the next request a worker may serve and hold it as in flight.
    pub fn checkout(&mut self, emergency_only: bool) -> Option<LandingRequest> {
        let request = if emergency_only {
            self.pop_emergency()?
        } else {
            self.pop()?
        };
        self.dispatching
            .insert(request.aircraft_id.clone(), request.clone());
        Some(request)
    }

    /// The in-flight request for an aircraft, if a worker holds one.
    pub fn dispatching(&self, aircraft_id: &str) -> Option<&LandingRequest> {
        self.dispatching.get(aircraft_id)
    }

    /// Forget an in-flight request once its worker is done with it.
    pub fn settle(&mut self, aircraft_id: &str) {
        self.dispatching.remove(aircraft_id);
    }

    /// Hand an in-flight request back to the queue. A request filed for the
    /// same aircraft in the meantime wins and `false` is returned.
    pub fn requeue(&mut self, request: LandingRequest) -> bool {
        self.dispatching.remove(&request.aircraft_id);
        if self.contains(&request.aircraft_id) {
            return false;
        }
        self.push(request);
        true
    }

    pub fn remove(&mut self, aircraft_id: &str) -> Option<LandingRequest> {
        let key = self.index.remove(aircraft_id)?;
        self.ordered.remove(&key)
    }

    /// Mark a pending aircraft as an emergency and move it to the front of
    /// priority class 1. Returns the priority it held before, or `None` when
    /// the aircraft is neither queued nor in flight.
    pub fn escalate(&mut self, aircraft_id: &str, fuel_level: u8) -> Option<u8> {
        if let Some(request) = self.dispatching.get_mut(aircraft_id) {
            let previous = request.priority;
            request.priority = PRIORITY_HIGHEST;
            request.is_emergency = true;
            request.fuel_level = fuel_level;
            return Some(previous);
        }
        let key = self.index.remove(aircraft_id)?;
        let mut request = self.ordered.remove(&key)?;
        let previous = request.priority;
        request.priority = PRIORITY_HIGHEST;
        request.is_emergency = true;
        request.fuel_level = fuel_level;
        self.insert_with_seq(request, key.seq);
        Some(previous)
    }

    /// Refresh the fuel level used as the secondary tie-break.
    pub fn update_fuel(&mut self, aircraft_id: &str, fuel_level: u8) {
        if let Some(request) = self.dispatching.get_mut(aircraft_id) {
            request.fuel_level = fuel_level;
        }
        let Some(key) = self.index.remove(aircraft_id) else {
            return;
        };
        if let Some(mut request) = self.ordered.remove(&key) {
            request.fuel_level = fuel_level;
            self.insert_with_seq(request, key.seq);
        }
    }

    /// 1-based queue position.
    pub fn position(&self, aircraft_id: &str) -> Option<usize> {
        let key = self.index.get(aircraft_id)?;
        Some(self.ordered.range(..key).count() + 1)
    }

    /// Requests in service order.
    pub fn snapshot(&self) -> Vec<LandingRequest> {
        self.ordered.values().cloned().collect()
    }

    pub fn drain(&mut self) -> Vec<LandingRequest> {
        self.index.clear();
        self.dispatching.clear();
        std::mem::take(&mut self.ordered).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(id: &str, priority: u8, offset_secs: i64) -> LandingRequest {
        let base = DateTime::parse_from_rfc3339("2026-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        LandingRequest {
            aircraft_id: id.to_string(),
            priority,
            request_time: base + Duration::seconds(offset_secs),
            fuel_level: 50,
            is_emergency: false,
            front_of_class: false,
            prior_status: AircraftStatus::Airborne,
        }
    }

    fn order(queue: &LandingQueue) -> Vec<String> {
        queue.snapshot().into_iter().map(|r| r.aircraft_id).collect()
    }

    #[test]
    fn orders_by_priority_then_request_time() {
        let mut queue = LandingQueue::new();
        queue.push(request("AC001", 3, 0));
        queue.push(request("AC002", 1, 30));
        queue.push(request("AC003", 3, -10));
        queue.push(request("AC004", 2, 5));

        assert_eq!(order(&queue), vec!["AC002", "AC004", "AC003", "AC001"]);
        assert_eq!(queue.position("AC003"), Some(3));
    }

    #[test]
    fn escalation_moves_to_front_of_class_one() {
        let mut queue = LandingQueue::new();
        queue.push(request("AC001", 1, 0));
        queue.push(request("AC002", 3, 60));

        assert_eq!(queue.escalate("AC002", 5), Some(3));
        assert_eq!(order(&queue), vec!["AC002", "AC001"]);
        assert!(queue.peek().unwrap().is_emergency);
        assert_eq!(queue.escalate("AC999", 5), None);
    }

    #[test]
    fn simultaneous_emergencies_break_ties_on_fuel() {
        let mut queue = LandingQueue::new();
        queue.push(request("AC001", 2, 0));
        queue.push(request("AC002", 2, 0));
        queue.escalate("AC001", 9);
        queue.escalate("AC002", 4);

        assert_eq!(order(&queue), vec!["AC002", "AC001"]);
    }

    #[test]
    fn displaced_aircraft_lead_their_class_behind_emergencies() {
        let mut queue = LandingQueue::new();
        queue.push(request("AC001", 2, 0));
        queue.push(request("AC002", 1, 10));
        queue.push_front_of_class(request("AC003", 2, 100));

        assert_eq!(order(&queue), vec!["AC002", "AC003", "AC001"]);
    }

    #[test]
    fn pop_emergency_only_takes_emergencies() {
        let mut queue = LandingQueue::new();
        queue.push(request("AC001", 1, 0));
        assert!(queue.pop_emergency().is_none());

        queue.push(request("AC002", 3, 0));
        queue.escalate("AC002", 3);
        assert_eq!(queue.pop_emergency().unwrap().aircraft_id, "AC002");
        assert_eq!(queue.pop().unwrap().aircraft_id, "AC001");
        assert!(queue.is_empty());
    }

    #[test]
    fn push_replaces_existing_request() {
        let mut queue = LandingQueue::new();
        queue.push(request("AC001", 3, 0));
        queue.push(request("AC001", 2, 0));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek().unwrap().priority, 2);

        assert!(queue.remove("AC001").is_some());
        assert!(!queue.contains("AC001"));
    }

    #[test]
    fn escalation_reaches_request_held_by_a_worker() {
        let mut queue = LandingQueue::new();
        queue.push(request("AC001", 3, 0));
        let taken = queue.checkout(false).unwrap();
        assert!(queue.is_empty());

        assert_eq!(queue.escalate("AC001", 6), Some(3));
        let held = queue.dispatching("AC001").unwrap();
        assert!(held.is_emergency);
        assert_eq!(held.priority, PRIORITY_HIGHEST);
        assert!(!taken.is_emergency);

        queue.settle("AC001");
        assert!(queue.dispatching("AC001").is_none());
        assert_eq!(queue.escalate("AC001", 6), None);
    }

    #[test]
    fn requeue_keeps_a_request_filed_meanwhile() {
        let mut queue = LandingQueue::new();
        queue.push(request("AC001", 3, 0));
        let stale = queue.checkout(false).unwrap();

        let mut refiled = request("AC001", 1, 0);
        refiled.is_emergency = true;
        queue.push(refiled);

        assert!(!queue.requeue(stale));
        assert_eq!(queue.len(), 1);
        assert!(queue.peek().unwrap().is_emergency);
        assert!(queue.dispatching("AC001").is_none());

        let taken = queue.checkout(true).unwrap();
        assert!(queue.requeue(taken));
        assert_eq!(queue.position("AC001"), Some(1));
    }
}
