//! Administrative seed data: the fleet and airport configuration loaded at
//! startup, shaped like the persisted collections.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use runway_core::{Aircraft, CoreError, CoreResult, Flight, FuelAlert, Runway, WeatherAlert};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    #[serde(default)]
    pub runways: Vec<Runway>,
    #[serde(default)]
    pub aircraft: Vec<Aircraft>,
    #[serde(default)]
    pub flights: Vec<Flight>,
    #[serde(default)]
    pub weather_alerts: Vec<WeatherAlert>,
    #[serde(default)]
    pub fuel_alerts: Vec<FuelAlert>,
}

fn unique<'a, I>(kind: &'static str, ids: I) -> CoreResult<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CoreError::validation(kind, format!("duplicate id {}", id)));
        }
    }
    Ok(())
}

impl SeedData {
    /// Record-level validation plus id uniqueness. Cross-record consistency
    /// (runway/aircraft occupancy) is left to the integrity sweep.
    pub fn validate(&self) -> CoreResult<()> {
        if self.runways.is_empty() {
            return Err(CoreError::validation("runways", "at least one runway is required"));
        }
        unique("runwayId", self.runways.iter().map(|r| r.runway_id.as_str()))?;
        unique("aircraftId", self.aircraft.iter().map(|a| a.aircraft_id.as_str()))?;
        unique("flightId", self.flights.iter().map(|f| f.flight_id.as_str()))?;
        unique("alertId", self.weather_alerts.iter().map(|w| w.alert_id.as_str()))?;
        unique("alertId", self.fuel_alerts.iter().map(|f| f.alert_id.as_str()))?;

        for runway in &self.runways {
            runway.validate()?;
        }
        for aircraft in &self.aircraft {
            aircraft.validate()?;
        }
        for flight in &self.flights {
            flight.validate()?;
        }
        for alert in &self.weather_alerts {
            alert.validate()?;
        }
        for alert in &self.fuel_alerts {
            alert.validate()?;
        }
        Ok(())
    }
}

pub fn load_seed_file(path: impl AsRef<Path>) -> Result<SeedData> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let seed: SeedData = serde_json::from_str(&raw)
        .with_context(|| format!("parsing seed file {}", path.display()))?;
    seed.validate()
        .with_context(|| format!("validating seed file {}", path.display()))?;
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_fixture_parses_and_validates() {
        let raw = include_str!("../fixtures/seed.json");
        let seed: SeedData = serde_json::from_str(raw).unwrap();
        seed.validate().unwrap();
        assert_eq!(seed.runways.len(), 2);
        assert_eq!(seed.aircraft.len(), 5);
        assert_eq!(seed.flights.len(), 5);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let seed = SeedData {
            runways: vec![Runway::new("RW01"), Runway::new("RW01")],
            ..SeedData::default()
        };
        assert!(matches!(
            seed.validate(),
            Err(CoreError::Validation { field: "runwayId", .. })
        ));
    }

    #[test]
    fn out_of_range_fuel_is_rejected() {
        let seed = SeedData {
            runways: vec![Runway::new("RW01")],
            aircraft: vec![Aircraft::new("AC001", "BA101", 120)],
            ..SeedData::default()
        };
        assert!(seed.validate().is_err());
    }
}
