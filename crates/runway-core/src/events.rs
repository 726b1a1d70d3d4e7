//! Append-only event log with paginated reads.

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::models::{LandingEvent, LandingEventType, SystemEvent};

pub const MAX_PAGE_SIZE: usize = 500;

/// One page of an event stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: usize,
    pub total: usize,
    pub next_offset: Option<usize>,
}

fn page_of<T: Clone>(items: &[T], offset: usize, limit: usize) -> CoreResult<Page<T>> {
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(CoreError::validation(
            "limit",
            format!("must be within 1..={}", MAX_PAGE_SIZE),
        ));
    }
    let total = items.len();
    let start = offset.min(total);
    let end = start.saturating_add(limit).min(total);
    Ok(Page {
        items: items[start..end].to_vec(),
        offset: start,
        total,
        next_offset: (end < total).then_some(end),
    })
}

/// Landing and system events in append order. Nothing is ever removed.
#[derive(Debug, Default)]
pub struct EventLog {
    landing: Vec<LandingEvent>,
    system: Vec<SystemEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a landing event, returning its 1-based sequence number.
    pub fn append_landing(&mut self, event: LandingEvent) -> usize {
        self.landing.push(event);
        self.landing.len()
    }

    pub fn append_system(&mut self, event: SystemEvent) -> usize {
        self.system.push(event);
        self.system.len()
    }

    pub fn landing_page(&self, offset: usize, limit: usize) -> CoreResult<Page<LandingEvent>> {
        page_of(&self.landing, offset, limit)
    }

    pub fn system_page(&self, offset: usize, limit: usize) -> CoreResult<Page<SystemEvent>> {
        page_of(&self.system, offset, limit)
    }

    pub fn landing_events(&self) -> &[LandingEvent] {
        &self.landing
    }

    pub fn system_events(&self) -> &[SystemEvent] {
        &self.system
    }

    pub fn landing_events_for(&self, aircraft_id: &str) -> Vec<LandingEvent> {
        self.landing
            .iter()
            .filter(|event| event.aircraft_id == aircraft_id)
            .cloned()
            .collect()
    }

    pub fn count_of(&self, event_type: LandingEventType) -> usize {
        self.landing
            .iter()
            .filter(|event| event.event_type == event_type)
            .count()
    }

    pub fn len(&self) -> usize {
        self.landing.len() + self.system.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landing.is_empty() && self.system.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SystemEventType;

    fn log_with(n: usize) -> EventLog {
        let mut log = EventLog::new();
        for i in 0..n {
            log.append_landing(LandingEvent::new(
                LandingEventType::LandingRequest,
                format!("AC{:03}", i + 1),
            ));
        }
        log
    }

    #[test]
    fn pages_walk_the_log_in_order() {
        let log = log_with(5);
        let first = log.landing_page(0, 2).unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[0].aircraft_id, "AC001");
        assert_eq!(first.next_offset, Some(2));

        let last = log.landing_page(4, 2).unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.next_offset, None);
        assert_eq!(last.total, 5);
    }

    #[test]
    fn offset_past_end_is_empty() {
        let log = log_with(2);
        let page = log.landing_page(10, 5).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.offset, 2);
    }

    #[test]
    fn rejects_unbounded_limits() {
        let log = log_with(1);
        assert!(log.landing_page(0, 0).is_err());
        assert!(log.system_page(0, MAX_PAGE_SIZE + 1).is_err());
    }

    #[test]
    fn sequences_count_each_stream() {
        let mut log = log_with(2);
        let seq = log.append_system(SystemEvent::new(
            SystemEventType::SystemStart,
            "ControlState",
            "started",
        ));
        assert_eq!(seq, 1);
        assert_eq!(log.len(), 3);
        assert_eq!(log.count_of(LandingEventType::LandingRequest), 2);
        assert_eq!(log.landing_events_for("AC002").len(), 1);
    }
}
