//! Scheduling rules and thresholds.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::models::{WeatherSeverity, PERCENT_MAX};

/// Fuel boundaries that drive alert levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelThresholds {
    /// Below this the aircraft is escalated to an emergency
    pub critical_threshold: u8,
    /// Below this a LOW/CRITICAL alert is raised
    pub low_threshold: u8,
}

impl Default for FuelThresholds {
    fn default() -> Self {
        Self {
            critical_threshold: 10,
            low_threshold: 20,
        }
    }
}

impl FuelThresholds {
    /// Build thresholds, rejecting `critical >= low` and values above 100.
    pub fn new(critical_threshold: u8, low_threshold: u8) -> CoreResult<Self> {
        let thresholds = Self {
            critical_threshold,
            low_threshold,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.critical_threshold > PERCENT_MAX {
            return Err(CoreError::validation(
                "criticalThreshold",
                format!("{} exceeds {}", self.critical_threshold, PERCENT_MAX),
            ));
        }
        if self.low_threshold > PERCENT_MAX {
            return Err(CoreError::validation(
                "lowThreshold",
                format!("{} exceeds {}", self.low_threshold, PERCENT_MAX),
            ));
        }
        if self.critical_threshold >= self.low_threshold {
            return Err(CoreError::ThresholdMisconfigured {
                critical: self.critical_threshold,
                low: self.low_threshold,
            });
        }
        Ok(())
    }
}

/// Tunables for the scheduler and its monitors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingRules {
    pub fuel: FuelThresholds,
    /// Delay charged to a flight whose aircraft escalates on fuel
    pub fuel_delay_minutes: u32,
    /// Delay charged to a flight whose aircraft is displaced from a runway
    pub preemption_delay_minutes: u32,
    /// Delay per weather severity
    pub weather_delay: WeatherDelayTable,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            fuel: FuelThresholds::default(),
            fuel_delay_minutes: 15,
            preemption_delay_minutes: 10,
            weather_delay: WeatherDelayTable::default(),
        }
    }
}

impl SchedulingRules {
    pub fn validate(&self) -> CoreResult<()> {
        self.fuel.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherDelayTable {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub critical: u32,
}

impl Default for WeatherDelayTable {
    fn default() -> Self {
        Self {
            low: 30,
            medium: 90,
            high: 180,
            critical: 360, // airport effectively closed
        }
    }
}

impl WeatherDelayTable {
    pub fn minutes_for(&self, severity: WeatherSeverity) -> u32 {
        match severity {
            WeatherSeverity::Low => self.low,
            WeatherSeverity::Medium => self.medium,
            WeatherSeverity::High => self.high,
            WeatherSeverity::Critical => self.critical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_are_valid() {
        assert!(SchedulingRules::default().validate().is_ok());
    }

    #[test]
    fn thresholds_reject_inverted_or_equal() {
        assert!(matches!(
            FuelThresholds::new(20, 20),
            Err(CoreError::ThresholdMisconfigured { critical: 20, low: 20 })
        ));
        assert!(FuelThresholds::new(30, 10).is_err());
        assert!(FuelThresholds::new(5, 101).is_err());
        assert!(FuelThresholds::new(5, 15).is_ok());
    }

    #[test]
    fn weather_delay_grows_with_severity() {
        let table = WeatherDelayTable::default();
        assert_eq!(table.minutes_for(WeatherSeverity::Low), 30);
        assert_eq!(table.minutes_for(WeatherSeverity::High), 180);
        assert!(table.minutes_for(WeatherSeverity::Critical) > table.minutes_for(WeatherSeverity::Medium));
    }
}
