//! Service configuration from environment.

use std::env;
use std::time::Duration;

use runway_core::{CoreResult, FuelThresholds, SchedulingRules};

#[derive(Debug, Clone)]
pub struct Config {
    pub seed_path: String,
    pub landing_workers: usize,
    pub emergency_workers: usize,
    pub approach: Duration,
    pub emergency_approach: Duration,
    pub rollout: Duration,
    pub idle_backoff_max: Duration,
    pub weather_sweep: Duration,
    pub integrity_sweep: Duration,
    pub fuel_critical: u8,
    pub fuel_low: u8,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed_path: concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/seed.json").to_string(),
            landing_workers: 3,
            emergency_workers: 1,
            approach: Duration::from_millis(8_000),
            emergency_approach: Duration::from_millis(2_000),
            rollout: Duration::from_millis(6_000),
            idle_backoff_max: Duration::from_millis(5_000),
            weather_sweep: Duration::from_secs(5),
            integrity_sweep: Duration::from_secs(15),
            fuel_critical: 10,
            fuel_low: 20,
            log_json: false,
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

fn millis(key: &str) -> Option<Duration> {
    parsed::<u64>(key).map(Duration::from_millis)
}

fn secs(key: &str) -> Option<Duration> {
    parsed::<u64>(key).map(Duration::from_secs)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            seed_path: env::var("RUNWAY_SEED_PATH").unwrap_or(defaults.seed_path),
            landing_workers: parsed("RUNWAY_LANDING_WORKERS").unwrap_or(defaults.landing_workers),
            emergency_workers: parsed("RUNWAY_EMERGENCY_WORKERS")
                .unwrap_or(defaults.emergency_workers),
            approach: millis("RUNWAY_APPROACH_MS").unwrap_or(defaults.approach),
            emergency_approach: millis("RUNWAY_EMERGENCY_APPROACH_MS")
                .unwrap_or(defaults.emergency_approach),
            rollout: millis("RUNWAY_ROLLOUT_MS").unwrap_or(defaults.rollout),
            idle_backoff_max: millis("RUNWAY_IDLE_BACKOFF_MAX_MS")
                .unwrap_or(defaults.idle_backoff_max),
            weather_sweep: secs("RUNWAY_WEATHER_SWEEP_SECS").unwrap_or(defaults.weather_sweep),
            integrity_sweep: secs("RUNWAY_INTEGRITY_SWEEP_SECS")
                .unwrap_or(defaults.integrity_sweep),
            fuel_critical: parsed("RUNWAY_FUEL_CRITICAL").unwrap_or(defaults.fuel_critical),
            fuel_low: parsed("RUNWAY_FUEL_LOW").unwrap_or(defaults.fuel_low),
            log_json: env::var("RUNWAY_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// Scheduling rules with the configured fuel thresholds. Fails when the
    /// thresholds are inverted.
    pub fn rules(&self) -> CoreResult<SchedulingRules> {
        let rules = SchedulingRules {
            fuel: FuelThresholds::new(self.fuel_critical, self.fuel_low)?,
            ..SchedulingRules::default()
        };
        rules.validate()?;
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_yields_valid_rules() {
        let rules = Config::default().rules().unwrap();
        assert_eq!(rules.fuel.critical_threshold, 10);
        assert_eq!(rules.fuel.low_threshold, 20);
    }

    #[test]
    fn inverted_thresholds_are_rejected_at_setup() {
        let config = Config {
            fuel_critical: 25,
            fuel_low: 20,
            ..Config::default()
        };
        assert!(config.rules().is_err());
    }
}
