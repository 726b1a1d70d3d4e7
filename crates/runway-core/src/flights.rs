//! Flight synchronizer.
//!
//! Mirrors aircraft transitions onto flight records and keeps the delay
//! reason pointed at the most safety-critical active cause.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::models::{DelayReason, Flight, FlightStatus, WeatherAlert};

#[derive(Debug, Default)]
pub struct FlightBoard {
    flights: BTreeMap<String, Flight>,
    causes: HashMap<String, BTreeSet<DelayReason>>,
}

impl FlightBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flight: Flight) -> CoreResult<()> {
        flight.validate()?;
        let causes = self.causes.entry(flight.flight_id.clone()).or_default();
        causes.clear();
        if let Some(reason) = flight.delay_reason {
            causes.insert(reason);
        }
        self.flights.insert(flight.flight_id.clone(), flight);
        Ok(())
    }

    pub fn get(&self, flight_id: &str) -> Option<&Flight> {
        self.flights.get(flight_id)
    }

    pub fn all(&self) -> Vec<Flight> {
        self.flights.values().cloned().collect()
    }

    /// The open flight an aircraft is operating, earliest departure first.
    pub fn current_flight_for(&self, aircraft_id: &str) -> Option<&Flight> {
        self.flights
            .values()
            .filter(|flight| flight.aircraft_id.as_deref() == Some(aircraft_id))
            .filter(|flight| !flight.is_closed())
            .min_by_key(|flight| (flight.scheduled_departure, flight.flight_id.clone()))
    }

    /// Aircraft reached LANDED: stamp arrival and close its open flight.
    pub fn on_landed(&mut self, aircraft_id: &str, at: DateTime<Utc>) -> Option<Flight> {
        let flight_id = self.current_flight_for(aircraft_id)?.flight_id.clone();
        let flight = self.flights.get_mut(&flight_id)?;
        flight.actual_arrival = Some(at);
        flight.status = FlightStatus::Landed;
        Some(flight.clone())
    }

    /// Add delay for one cause. Closed flights are left untouched.
    pub fn apply_delay(
        &mut self,
        flight_id: &str,
        minutes: u32,
        reason: DelayReason,
    ) -> CoreResult<Option<Flight>> {
        let flight = self
            .flights
            .get_mut(flight_id)
            .ok_or_else(|| CoreError::not_found("flight", flight_id))?;
        if flight.is_closed() {
            return Ok(None);
        }
        let causes = self.causes.entry(flight_id.to_string()).or_default();
        causes.insert(reason);

        flight.delay_minutes = flight.delay_minutes.saturating_add(minutes);
        flight.delay_reason = causes.iter().next().copied();
        if matches!(flight.status, FlightStatus::Scheduled | FlightStatus::Boarding) {
            flight.status = FlightStatus::Delayed;
        }
        Ok(Some(flight.clone()))
    }

    pub fn delay_aircraft_flight(
        &mut self,
        aircraft_id: &str,
        minutes: u32,
        reason: DelayReason,
    ) -> Option<Flight> {
        let flight_id = self.current_flight_for(aircraft_id)?.flight_id.clone();
        self.apply_delay(&flight_id, minutes, reason).ok().flatten()
    }

    /// Mark every open flight touching the alert's airport and charge it the
    /// weather delay. Returns the affected flights.
    pub fn apply_weather(&mut self, alert: &WeatherAlert, minutes: u32) -> Vec<Flight> {
        let affected: Vec<String> = self
            .flights
            .values()
            .filter(|flight| flight.serves_airport(&alert.affected_airport))
            .filter(|flight| !flight.is_closed())
            .map(|flight| flight.flight_id.clone())
            .collect();

        let mut updated = Vec::with_capacity(affected.len());
        for flight_id in affected {
            self.mark_weather_affected(&flight_id, &alert.alert_id);
            if let Ok(Some(flight)) = self.apply_delay(&flight_id, minutes, DelayReason::Weather) {
                updated.push(flight);
            }
        }
        updated
    }

    /// Flag a flight as weather-affected without charging delay.
    pub fn mark_weather_affected(&mut self, flight_id: &str, alert_id: &str) -> bool {
        let Some(flight) = self.flights.get_mut(flight_id) else {
            return false;
        };
        flight.is_affected_by_weather = true;
        flight.weather_alerts.insert(alert_id.to_string());
        if flight.delay_minutes > 0 {
            let causes = self.causes.entry(flight_id.to_string()).or_default();
            causes.insert(DelayReason::Weather);
            flight.delay_reason = causes.iter().next().copied();
        }
        true
    }

    /// Weather-delayed flights, longest delay first.
    pub fn delayed_by_weather(&self) -> Vec<Flight> {
        let mut delayed: Vec<Flight> = self
            .flights
            .values()
            .filter(|flight| flight.delay_minutes > 0)
            .filter(|flight| flight.delay_reason == Some(DelayReason::Weather))
            .cloned()
            .collect();
        delayed.sort_by(|a, b| b.delay_minutes.cmp(&a.delay_minutes));
        delayed
    }

    pub fn average_weather_delay(&self) -> Option<f64> {
        let delays: Vec<u32> = self
            .flights
            .values()
            .filter(|flight| flight.delay_reason == Some(DelayReason::Weather))
            .map(|flight| flight.delay_minutes)
            .collect();
        if delays.is_empty() {
            return None;
        }
        Some(f64::from(delays.iter().sum::<u32>()) / delays.len() as f64)
    }

    pub fn statistics(&self) -> FlightStatistics {
        let total = self.flights.len();
        let on_time = self
            .flights
            .values()
            .filter(|flight| flight.delay_minutes == 0)
            .count();
        let mut by_status = BTreeMap::new();
        for flight in self.flights.values() {
            *by_status.entry(flight.status).or_insert(0) += 1;
        }
        let (on_time_percentage, average_delay) = if total == 0 {
            (0.0, 0.0)
        } else {
            let delay_sum: u64 = self
                .flights
                .values()
                .map(|flight| u64::from(flight.delay_minutes))
                .sum();
            (
                on_time as f64 / total as f64 * 100.0,
                delay_sum as f64 / total as f64,
            )
        };
        FlightStatistics {
            total_flights: total,
            on_time_percentage,
            average_delay,
            flights_by_status: by_status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightStatistics {
    pub total_flights: usize,
    pub on_time_percentage: f64,
    pub average_delay: f64,
    pub flights_by_status: BTreeMap<FlightStatus, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WeatherAlertType, WeatherSeverity};

    fn board() -> FlightBoard {
        let mut board = FlightBoard::new();
        let mut in_flight = Flight::new("FL002", "UA202", "LAX", "JFK").operated_by("AC002");
        in_flight.status = FlightStatus::InFlight;
        board.insert(Flight::new("FL001", "BA101", "JFK", "LHR").operated_by("AC001")).unwrap();
        board.insert(in_flight).unwrap();
        board.insert(Flight::new("FL006", "QF606", "SYD", "LAX").operated_by("AC006")).unwrap();
        board
    }

    #[test]
    fn landing_closes_the_open_flight() {
        let mut board = board();
        let at = Utc::now();
        let flight = board.on_landed("AC002", at).unwrap();
        assert_eq!(flight.status, FlightStatus::Landed);
        assert_eq!(flight.actual_arrival, Some(at));
        assert!(board.on_landed("AC002", at).is_none());
    }

    #[test]
    fn fuel_outranks_weather_and_runway() {
        let mut board = board();
        board.apply_delay("FL001", 10, DelayReason::Runway).unwrap();
        board.apply_delay("FL001", 30, DelayReason::Weather).unwrap();
        let flight = board.get("FL001").unwrap();
        assert_eq!(flight.delay_reason, Some(DelayReason::Weather));
        assert_eq!(flight.status, FlightStatus::Delayed);

        let flight = board.apply_delay("FL001", 15, DelayReason::Fuel).unwrap().unwrap();
        assert_eq!(flight.delay_reason, Some(DelayReason::Fuel));
        assert_eq!(flight.delay_minutes, 55);

        let flight = board.apply_delay("FL001", 5, DelayReason::Atc).unwrap().unwrap();
        assert_eq!(flight.delay_reason, Some(DelayReason::Fuel));
    }

    #[test]
    fn weather_marks_flights_at_the_airport() {
        let mut board = board();
        let alert = WeatherAlert::new("WA001", WeatherAlertType::Storm, WeatherSeverity::High, "JFK");
        let affected: Vec<String> = board
            .apply_weather(&alert, 180)
            .into_iter()
            .map(|f| f.flight_id)
            .collect();
        assert_eq!(affected, vec!["FL001", "FL002"]);

        let in_flight = board.get("FL002").unwrap();
        assert!(in_flight.is_affected_by_weather);
        assert!(in_flight.weather_alerts.contains("WA001"));
        assert_eq!(in_flight.status, FlightStatus::InFlight);
        assert!(!board.get("FL006").unwrap().is_affected_by_weather);

        assert_eq!(board.delayed_by_weather().len(), 2);
        assert_eq!(board.average_weather_delay(), Some(180.0));
    }

    #[test]
    fn closed_flights_take_no_delay() {
        let mut board = board();
        board.on_landed("AC001", Utc::now());
        assert!(board.apply_delay("FL001", 30, DelayReason::Weather).unwrap().is_none());
        assert!(board.apply_delay("FL999", 30, DelayReason::Weather).is_err());
    }

    #[test]
    fn statistics_summarise_delays() {
        let mut board = board();
        board.apply_delay("FL006", 60, DelayReason::Technical).unwrap();
        let stats = board.statistics();
        assert_eq!(stats.total_flights, 3);
        assert!((stats.on_time_percentage - 66.666).abs() < 0.01);
        assert_eq!(stats.average_delay, 20.0);
        assert_eq!(stats.flights_by_status.get(&FlightStatus::Delayed), Some(&1));
    }
}
