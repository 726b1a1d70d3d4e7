//! Fuel monitoring: threshold evaluation and fuel alert bookkeeping.
//!
//! The monitor never touches runways. Escalation is reported back to the
//! caller, which flips the aircraft's emergency flag and re-orders the queue.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::models::{Aircraft, FuelAlert, FuelAlertLevel, PERCENT_MAX};
use crate::rules::FuelThresholds;

pub const RESOLUTION_RECOVERED: &str = "FUEL_RECOVERED";
pub const RESOLUTION_LANDED: &str = "LANDED_SAFELY";
pub const RESOLUTION_EMERGENCY_LANDED: &str = "EMERGENCY_LANDING_COMPLETED";

/// Where a fuel reading falls relative to the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuelBand {
    /// Above the low threshold
    Recovered,
    /// Exactly at the low threshold; an open alert is left as is
    AtLowThreshold,
    Low,
    Critical,
    Emergency,
}

impl FuelBand {
    pub fn classify(fuel_level: u8, thresholds: &FuelThresholds) -> Self {
        if fuel_level < thresholds.critical_threshold {
            FuelBand::Emergency
        } else if fuel_level == thresholds.critical_threshold {
            FuelBand::Critical
        } else if fuel_level < thresholds.low_threshold {
            FuelBand::Low
        } else if fuel_level == thresholds.low_threshold {
            FuelBand::AtLowThreshold
        } else {
            FuelBand::Recovered
        }
    }

    fn alert_level(self) -> Option<FuelAlertLevel> {
        match self {
            FuelBand::Emergency => Some(FuelAlertLevel::Emergency),
            FuelBand::Critical => Some(FuelAlertLevel::Critical),
            FuelBand::Low => Some(FuelAlertLevel::Low),
            FuelBand::AtLowThreshold | FuelBand::Recovered => None,
        }
    }
}

/// What an observation did to the aircraft's alert.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertChange {
    None,
    Raised,
    LevelChanged { from: FuelAlertLevel },
    Resolved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuelObservation {
    pub change: AlertChange,
    pub alert: Option<FuelAlert>,
    /// The alert crossed into EMERGENCY for the first time
    pub escalated: bool,
}

impl FuelObservation {
    fn nothing() -> Self {
        Self {
            change: AlertChange::None,
            alert: None,
            escalated: false,
        }
    }
}

/// Fuel alert store keyed by alert id, at most one open alert per aircraft.
#[derive(Debug)]
pub struct FuelMonitor {
    thresholds: FuelThresholds,
    alerts: BTreeMap<String, FuelAlert>,
    open_by_aircraft: HashMap<String, String>,
    next_id: u32,
}

impl FuelMonitor {
    pub fn new(thresholds: FuelThresholds) -> CoreResult<Self> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            alerts: BTreeMap::new(),
            open_by_aircraft: HashMap::new(),
            next_id: 1,
        })
    }

    pub fn thresholds(&self) -> FuelThresholds {
        self.thresholds
    }

    /// Load a persisted alert (seed data).
    pub fn insert_alert(&mut self, alert: FuelAlert) -> CoreResult<()> {
        alert.validate()?;
        if !alert.is_resolved {
            if let Some(existing) = self.open_by_aircraft.get(&alert.aircraft_id) {
                return Err(CoreError::validation(
                    "aircraftId",
                    format!(
                        "aircraft {} already has open alert {}",
                        alert.aircraft_id, existing
                    ),
                ));
            }
            self.open_by_aircraft
                .insert(alert.aircraft_id.clone(), alert.alert_id.clone());
        }
        self.alerts.insert(alert.alert_id.clone(), alert);
        Ok(())
    }

    fn next_alert_id(&mut self) -> String {
        loop {
            let id = format!("FA{:03}", self.next_id);
            self.next_id += 1;
            if !self.alerts.contains_key(&id) {
                return id;
            }
        }
    }

    /// Evaluate one fuel reading for an aircraft.
    pub fn observe(
        &mut self,
        aircraft_id: &str,
        flight_id: Option<&str>,
        fuel_level: u8,
        now: DateTime<Utc>,
    ) -> CoreResult<FuelObservation> {
        if fuel_level > PERCENT_MAX {
            return Err(CoreError::validation(
                "fuelLevel",
                format!("{} exceeds {}", fuel_level, PERCENT_MAX),
            ));
        }

        let band = FuelBand::classify(fuel_level, &self.thresholds);
        let open_id = self.open_by_aircraft.get(aircraft_id).cloned();

        match (band.alert_level(), open_id) {
            (Some(level), None) => {
                let alert = FuelAlert {
                    alert_id: self.next_alert_id(),
                    aircraft_id: aircraft_id.to_string(),
                    flight_id: flight_id.map(str::to_string),
                    current_fuel_level: fuel_level,
                    critical_threshold: self.thresholds.critical_threshold,
                    low_threshold: self.thresholds.low_threshold,
                    alert_time: now,
                    alert_level: level,
                    is_resolved: false,
                    resolution: None,
                    escalated_to_emergency: level == FuelAlertLevel::Emergency,
                };
                self.open_by_aircraft
                    .insert(aircraft_id.to_string(), alert.alert_id.clone());
                self.alerts.insert(alert.alert_id.clone(), alert.clone());
                Ok(FuelObservation {
                    change: AlertChange::Raised,
                    escalated: alert.escalated_to_emergency,
                    alert: Some(alert),
                })
            }
            (Some(level), Some(open_id)) => {
                let Some(alert) = self.alerts.get_mut(&open_id) else {
                    return Err(CoreError::Integrity {
                        entity: format!("fuel alert {}", open_id),
                        reason: "indexed alert missing from store".into(),
                    });
                };
                alert.current_fuel_level = fuel_level;
                alert.alert_time = now;
                if alert.alert_level == level {
                    return Ok(FuelObservation {
                        change: AlertChange::None,
                        alert: Some(alert.clone()),
                        escalated: false,
                    });
                }
                let from = alert.alert_level;
                alert.alert_level = level;
                let escalated = level == FuelAlertLevel::Emergency && !alert.escalated_to_emergency;
                if escalated {
                    alert.escalated_to_emergency = true;
                }
                Ok(FuelObservation {
                    change: AlertChange::LevelChanged { from },
                    alert: Some(alert.clone()),
                    escalated,
                })
            }
            (None, Some(open_id)) if band == FuelBand::Recovered => {
                let alert = self.close(&open_id, RESOLUTION_RECOVERED, Some(fuel_level))?;
                Ok(FuelObservation {
                    change: AlertChange::Resolved,
                    alert: Some(alert),
                    escalated: false,
                })
            }
            (None, _) => Ok(FuelObservation::nothing()),
        }
    }

    fn close(
        &mut self,
        alert_id: &str,
        resolution: &str,
        fuel_level: Option<u8>,
    ) -> CoreResult<FuelAlert> {
        let alert = self
            .alerts
            .get_mut(alert_id)
            .ok_or_else(|| CoreError::not_found("fuel alert", alert_id))?;
        alert.is_resolved = true;
        alert.resolution = Some(resolution.to_string());
        if let Some(level) = fuel_level {
            alert.current_fuel_level = level;
        }
        self.open_by_aircraft.remove(&alert.aircraft_id);
        Ok(alert.clone())
    }

    /// Resolve an alert by id. Returns `Ok(None)` when it was already resolved.
    pub fn resolve(&mut self, alert_id: &str, resolution: &str) -> CoreResult<Option<FuelAlert>> {
        let alert = self
            .alerts
            .get(alert_id)
            .ok_or_else(|| CoreError::not_found("fuel alert", alert_id))?;
        if alert.is_resolved {
            return Ok(None);
        }
        self.close(alert_id, resolution, None).map(Some)
    }

    /// Resolve the aircraft's open alert after it lands.
    pub fn resolve_on_landing(&mut self, aircraft_id: &str) -> Option<FuelAlert> {
        let alert_id = self.open_by_aircraft.get(aircraft_id)?.clone();
        let resolution = match self.alerts.get(&alert_id) {
            Some(alert) if alert.escalated_to_emergency => RESOLUTION_EMERGENCY_LANDED,
            _ => RESOLUTION_LANDED,
        };
        self.close(&alert_id, resolution, None).ok()
    }

    pub fn alert(&self, alert_id: &str) -> Option<&FuelAlert> {
        self.alerts.get(alert_id)
    }

    pub fn open_alert_for(&self, aircraft_id: &str) -> Option<&FuelAlert> {
        let id = self.open_by_aircraft.get(aircraft_id)?;
        self.alerts.get(id)
    }

    pub fn active_alerts(&self) -> Vec<FuelAlert> {
        self.alerts
            .values()
            .filter(|alert| !alert.is_resolved)
            .cloned()
            .collect()
    }

    pub fn all_alerts(&self) -> Vec<FuelAlert> {
        self.alerts.values().cloned().collect()
    }
}

/// Fleet-wide fuel summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelStatistics {
    /// Counts grouped as NORMAL / LOW / CRITICAL
    pub by_status: BTreeMap<&'static str, usize>,
    pub average_fuel_level: Option<f64>,
}

fn stats_bucket(fuel_level: u8, thresholds: &FuelThresholds) -> &'static str {
    match FuelBand::classify(fuel_level, thresholds) {
        FuelBand::Emergency | FuelBand::Critical => "CRITICAL",
        FuelBand::Low | FuelBand::AtLowThreshold => "LOW",
        FuelBand::Recovered => "NORMAL",
    }
}

/// Aircraft still flying at or below the low threshold, lowest fuel first.
pub fn low_fuel_aircraft(fleet: &[Aircraft], thresholds: &FuelThresholds) -> Vec<Aircraft> {
    let mut low: Vec<Aircraft> = fleet
        .iter()
        .filter(|aircraft| !aircraft.has_landed())
        .filter(|aircraft| aircraft.fuel_level <= thresholds.low_threshold)
        .cloned()
        .collect();
    low.sort_by(|a, b| {
        a.fuel_level
            .cmp(&b.fuel_level)
            .then_with(|| a.aircraft_id.cmp(&b.aircraft_id))
    });
    low
}

/// Aircraft still flying at or below the critical threshold.
pub fn critical_fuel_aircraft(fleet: &[Aircraft], thresholds: &FuelThresholds) -> Vec<Aircraft> {
    low_fuel_aircraft(fleet, thresholds)
        .into_iter()
        .filter(|aircraft| aircraft.fuel_level <= thresholds.critical_threshold)
        .collect()
}

pub fn fuel_statistics(fleet: &[Aircraft], thresholds: &FuelThresholds) -> FuelStatistics {
    let mut by_status = BTreeMap::new();
    for aircraft in fleet {
        *by_status
            .entry(stats_bucket(aircraft.fuel_level, thresholds))
            .or_insert(0) += 1;
    }
    let average_fuel_level = if fleet.is_empty() {
        None
    } else {
        let total: u32 = fleet.iter().map(|a| u32::from(a.fuel_level)).sum();
        Some(f64::from(total) / fleet.len() as f64)
    };
    FuelStatistics {
        by_status,
        average_fuel_level,
    }
}
