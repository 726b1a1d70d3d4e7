//! Weather alert board.
//!
//! Tracks which alerts are active and which runways they hold closed. The
//! board only computes closure sets; applying them to runways is the caller's
//! job since runway state is guarded elsewhere.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::models::WeatherAlert;

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherActivation {
    pub alert: WeatherAlert,
    /// Runways the alert covers; all of them must be gated closed
    pub runways_to_close: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherDeactivation {
    pub alert: WeatherAlert,
    /// Covered runways that no other active alert still closes
    pub runways_to_reopen: Vec<String>,
}

#[derive(Debug, Default)]
pub struct WeatherBoard {
    alerts: BTreeMap<String, WeatherAlert>,
    ended: BTreeSet<String>,
}

impl WeatherBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an alert without applying it. Inactive alerts that carry an end
    /// time are treated as finished and cannot be reactivated.
    pub fn register(&mut self, alert: WeatherAlert) -> CoreResult<()> {
        alert.validate()?;
        if !alert.is_active && alert.end_time.is_some() {
            self.ended.insert(alert.alert_id.clone());
        }
        self.alerts.insert(alert.alert_id.clone(), alert);
        Ok(())
    }

    pub fn activate(
        &mut self,
        mut alert: WeatherAlert,
        now: DateTime<Utc>,
    ) -> CoreResult<WeatherActivation> {
        alert.validate()?;
        if self.ended.contains(&alert.alert_id) || !alert.window_open(now) {
            return Err(CoreError::AlertEnded {
                alert_id: alert.alert_id,
            });
        }
        if let Some(existing) = self.alerts.get(&alert.alert_id) {
            alert.affected_flights.extend(existing.affected_flights.iter().cloned());
        }
        alert.is_active = true;
        alert.start_time.get_or_insert(now);

        let runways_to_close = alert.affected_runways.iter().cloned().collect();
        self.alerts.insert(alert.alert_id.clone(), alert.clone());
        Ok(WeatherActivation {
            alert,
            runways_to_close,
        })
    }

    /// Activate a previously registered alert by id.
    pub fn activate_registered(
        &mut self,
        alert_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<WeatherActivation> {
        let alert = self
            .alerts
            .get(alert_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("weather alert", alert_id))?;
        self.activate(alert, now)
    }

    /// End an alert. Returns `Ok(None)` if it had already ended.
    pub fn deactivate(
        &mut self,
        alert_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<WeatherDeactivation>> {
        let alert = self
            .alerts
            .get_mut(alert_id)
            .ok_or_else(|| CoreError::not_found("weather alert", alert_id))?;
        if !alert.is_active {
            return Ok(None);
        }
        alert.is_active = false;
        match alert.end_time {
            Some(end) if end <= now => {}
            _ => alert.end_time = Some(now),
        }
        let alert = alert.clone();
        self.ended.insert(alert.alert_id.clone());

        let runways_to_reopen = alert
            .affected_runways
            .iter()
            .filter(|runway_id| !self.is_runway_closed(runway_id))
            .cloned()
            .collect();
        Ok(Some(WeatherDeactivation {
            alert,
            runways_to_reopen,
        }))
    }

    /// Deactivate every active alert whose end time has passed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<WeatherDeactivation> {
        let due: Vec<String> = self
            .alerts
            .values()
            .filter(|alert| alert.is_active && !alert.window_open(now))
            .map(|alert| alert.alert_id.clone())
            .collect();

        due.iter()
            .filter_map(|alert_id| self.deactivate(alert_id, now).ok().flatten())
            .collect()
    }

    pub fn is_runway_closed(&self, runway_id: &str) -> bool {
        self.closing_alert(runway_id).is_some()
    }

    /// The active alert (lowest id) holding a runway closed.
    pub fn closing_alert(&self, runway_id: &str) -> Option<&WeatherAlert> {
        self.alerts
            .values()
            .find(|alert| alert.is_active && alert.affected_runways.contains(runway_id))
    }

    pub fn record_affected_flights<I>(&mut self, alert_id: &str, flight_ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        if let Some(alert) = self.alerts.get_mut(alert_id) {
            alert.affected_flights.extend(flight_ids);
        }
    }

    pub fn alert(&self, alert_id: &str) -> Option<&WeatherAlert> {
        self.alerts.get(alert_id)
    }

    pub fn active_alerts(&self) -> Vec<WeatherAlert> {
        self.alerts
            .values()
            .filter(|alert| alert.is_active)
            .cloned()
            .collect()
    }

    pub fn all_alerts(&self) -> Vec<WeatherAlert> {
        self.alerts.values().cloned().collect()
    }

    pub fn airports_with_active_alerts(&self) -> Vec<String> {
        self.alerts
            .values()
            .filter(|alert| alert.is_active)
            .map(|alert| alert.affected_airport.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WeatherAlertType, WeatherSeverity};
    use chrono::Duration;

    fn storm(id: &str, runways: &[&str]) -> WeatherAlert {
        WeatherAlert::new(id, WeatherAlertType::Storm, WeatherSeverity::High, "JFK")
            .covering(runways.iter().copied())
    }

    #[test]
    fn activation_closes_covered_runways() {
        let mut board = WeatherBoard::new();
        let activation = board.activate(storm("WA001", &["RW01", "RW02"]), Utc::now()).unwrap();
        assert_eq!(activation.runways_to_close, vec!["RW01", "RW02"]);
        assert!(activation.alert.is_active);
        assert!(activation.alert.start_time.is_some());
        assert!(board.is_runway_closed("RW02"));
        assert_eq!(board.airports_with_active_alerts(), vec!["JFK"]);
    }

    #[test]
    fn overlapping_alert_keeps_runway_closed() {
        let mut board = WeatherBoard::new();
        let now = Utc::now();
        board.activate(storm("WA001", &["RW01", "RW02"]), now).unwrap();
        board
            .activate(
                WeatherAlert::new("WA002", WeatherAlertType::Fog, WeatherSeverity::Medium, "JFK")
                    .covering(["RW02"]),
                now,
            )
            .unwrap();

        let ended = board.deactivate("WA001", now).unwrap().unwrap();
        assert_eq!(ended.runways_to_reopen, vec!["RW01"]);
        assert!(board.is_runway_closed("RW02"));
        assert_eq!(
            board.closing_alert("RW02").unwrap().alert_type,
            WeatherAlertType::Fog
        );
    }

    #[test]
    fn ended_alerts_cannot_restart() {
        let mut board = WeatherBoard::new();
        let now = Utc::now();
        board.activate(storm("WA001", &["RW01"]), now).unwrap();
        let ended = board.deactivate("WA001", now).unwrap().unwrap();
        assert_eq!(ended.alert.end_time, Some(now));
        assert!(!ended.alert.is_active);

        assert!(board.deactivate("WA001", now).unwrap().is_none());
        assert!(matches!(
            board.activate(storm("WA001", &["RW01"]), now),
            Err(CoreError::AlertEnded { .. })
        ));
    }

    #[test]
    fn expire_ends_alerts_past_their_window() {
        let mut board = WeatherBoard::new();
        let now = Utc::now();
        board
            .activate(storm("WA001", &["RW01"]).until(now + Duration::minutes(30)), now)
            .unwrap();
        board.activate(storm("WA002", &["RW02"]), now).unwrap();

        assert!(board.expire(now).is_empty());
        let expired = board.expire(now + Duration::minutes(31));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].alert.alert_id, "WA001");
        assert_eq!(expired[0].alert.end_time, Some(now + Duration::minutes(30)));
        assert_eq!(board.active_alerts().len(), 1);
    }

    #[test]
    fn registered_historic_alert_counts_as_ended() {
        let mut board = WeatherBoard::new();
        let now = Utc::now();
        let mut wind = WeatherAlert::new("WA003", WeatherAlertType::Wind, WeatherSeverity::Low, "LHR")
            .until(now - Duration::minutes(30));
        wind.start_time = Some(now - Duration::hours(2));
        board.register(wind).unwrap();

        assert!(board.activate_registered("WA003", now).is_err());
        assert!(board.active_alerts().is_empty());
    }
}
