//! Fuel and weather monitors wired into the registries, plus the read-side
//! queries over alerts and flights.

use chrono::{DateTime, Utc};

use runway_core::fuel::{critical_fuel_aircraft, fuel_statistics, low_fuel_aircraft};
use runway_core::models::PERCENT_MAX;
use runway_core::{
    Aircraft, AlertChange, CoreError, CoreResult, DelayReason, EventSeverity, Flight,
    FlightStatistics, FuelAlert, FuelAlertLevel, FuelObservation, FuelStatistics, SystemEvent,
    SystemEventType, WeatherActivation, WeatherAlert, WeatherDeactivation,
};

use super::{lock, ControlState};

fn fuel_severity(level: FuelAlertLevel) -> EventSeverity {
    match level {
        FuelAlertLevel::Low => EventSeverity::Warning,
        FuelAlertLevel::Critical => EventSeverity::Error,
        FuelAlertLevel::Emergency => EventSeverity::Critical,
    }
}

impl ControlState {
    /// Record a fuel reading. Crossing below the critical threshold declares
    /// an emergency, which re-orders the queue; runways are not touched here.
    pub fn observe_fuel(&self, aircraft_id: &str, fuel_level: u8) -> CoreResult<FuelObservation> {
        if fuel_level > PERCENT_MAX {
            return Err(CoreError::validation(
                "fuelLevel",
                format!("{} exceeds {}", fuel_level, PERCENT_MAX),
            ));
        }
        let flight_id = lock(&self.flights)
            .current_flight_for(aircraft_id)
            .map(|flight| flight.flight_id.clone());

        {
            let mut entry = self
                .aircraft
                .get_mut(aircraft_id)
                .ok_or_else(|| CoreError::not_found("aircraft", aircraft_id))?;
            if entry.has_landed() {
                return Err(CoreError::AlreadyLanded {
                    aircraft_id: aircraft_id.to_string(),
                });
            }
            entry.fuel_level = fuel_level;
            lock(&self.queue).update_fuel(aircraft_id, fuel_level);
        }

        let observation = lock(&self.fuel).observe(
            aircraft_id,
            flight_id.as_deref(),
            fuel_level,
            Utc::now(),
        )?;

        if let Some(alert) = &observation.alert {
            let message = match &observation.change {
                AlertChange::Raised => Some(format!(
                    "fuel alert {} raised for {} at {}% ({})",
                    alert.alert_id, aircraft_id, fuel_level, alert.alert_level
                )),
                AlertChange::LevelChanged { from } => Some(format!(
                    "fuel alert {} for {} moved {} -> {} at {}%",
                    alert.alert_id, aircraft_id, from, alert.alert_level, fuel_level
                )),
                AlertChange::Resolved => Some(format!(
                    "fuel alert {} for {} resolved at {}%",
                    alert.alert_id, aircraft_id, fuel_level
                )),
                AlertChange::None => None,
            };
            if let Some(message) = message {
                let severity = if observation.change == AlertChange::Resolved {
                    EventSeverity::Info
                } else {
                    fuel_severity(alert.alert_level)
                };
                self.record_system(
                    SystemEvent::new(SystemEventType::IntegrationEvent, "FuelMonitor", message)
                        .with_severity(severity)
                        .detail("alertId", alert.alert_id.as_str())
                        .detail("aircraftId", aircraft_id)
                        .detail("alertLevel", alert.alert_level.as_str())
                        .detail("fuelLevel", fuel_level)
                        .detail("recommendedAction", alert.recommended_action()),
                );
            }
        }

        if observation.escalated {
            match self.declare_emergency(aircraft_id, "FUEL_CRITICAL", None) {
                Ok(_) => {
                    lock(&self.flights).delay_aircraft_flight(
                        aircraft_id,
                        self.rules.fuel_delay_minutes,
                        DelayReason::Fuel,
                    );
                }
                // Touched down between the reading and the declaration.
                Err(CoreError::AlreadyLanded { .. }) => {
                    tracing::warn!("{} landed before its fuel emergency was declared", aircraft_id);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(observation)
    }

    /// Resolve a fuel alert by id. Resolving an already-resolved alert
    /// changes nothing and records nothing.
    pub fn resolve_fuel_alert(
        &self,
        alert_id: &str,
        resolution: &str,
    ) -> CoreResult<Option<FuelAlert>> {
        let resolved = lock(&self.fuel).resolve(alert_id, resolution)?;
        if let Some(alert) = &resolved {
            self.record_system(
                SystemEvent::new(
                    SystemEventType::IntegrationEvent,
                    "FuelMonitor",
                    format!("fuel alert {} resolved: {}", alert.alert_id, resolution),
                )
                .detail("alertId", alert.alert_id.as_str())
                .detail("aircraftId", alert.aircraft_id.as_str())
                .detail("resolution", resolution),
            );
        }
        Ok(resolved)
    }

    /// Activate a weather alert: gate its runways, delay and mark flights at
    /// its airport.
    pub fn activate_weather_alert(&self, alert: WeatherAlert) -> CoreResult<WeatherActivation> {
        let activation = lock(&self.weather).activate(alert, Utc::now())?;
        self.apply_activation(activation)
    }

    /// Activate an alert already known to the board (seeded or registered).
    pub fn activate_registered_weather_alert(
        &self,
        alert_id: &str,
    ) -> CoreResult<WeatherActivation> {
        let activation = lock(&self.weather).activate_registered(alert_id, Utc::now())?;
        self.apply_activation(activation)
    }

    fn apply_activation(&self, mut activation: WeatherActivation) -> CoreResult<WeatherActivation> {
        let closed = self.apply_weather_closure(&activation.alert);

        let minutes = self
            .rules
            .weather_delay
            .minutes_for(activation.alert.severity);
        let affected: Vec<String> = lock(&self.flights)
            .apply_weather(&activation.alert, minutes)
            .into_iter()
            .map(|flight| flight.flight_id)
            .collect();
        lock(&self.weather).record_affected_flights(&activation.alert.alert_id, affected.clone());
        activation.alert.affected_flights.extend(affected.iter().cloned());

        self.record_system(
            SystemEvent::new(
                SystemEventType::IntegrationEvent,
                "WeatherMonitor",
                format!(
                    "weather alert {} ({} {}) active at {}",
                    activation.alert.alert_id,
                    activation.alert.severity,
                    activation.alert.alert_type,
                    activation.alert.affected_airport
                ),
            )
            .with_severity(EventSeverity::Warning)
            .detail("alertId", activation.alert.alert_id.as_str())
            .detail("closedRunways", closed)
            .detail("affectedFlights", affected)
            .detail("delayMinutes", minutes),
        );
        self.notify_workers();
        Ok(activation)
    }

    /// Gate every registered runway the alert covers. Returns the runway ids
    /// that were gated.
    pub(crate) fn apply_weather_closure(&self, alert: &WeatherAlert) -> Vec<String> {
        let mut gated = Vec::new();
        for runway_id in &alert.affected_runways {
            let Ok(slot) = self.slot(runway_id) else {
                tracing::debug!(
                    "Weather alert {} covers unknown runway {}",
                    alert.alert_id,
                    runway_id
                );
                continue;
            };
            let mut state = slot.lock();
            // Re-check under the runway lock; the alert may have ended.
            let closing = lock(&self.weather)
                .closing_alert(runway_id)
                .map(|a| a.alert_type);
            let Some(alert_type) = closing else {
                continue;
            };
            state.close_gate(alert_type.as_str());
            gated.push(runway_id.clone());
        }
        gated
    }

    fn apply_weather_reopen(&self, deactivation: &WeatherDeactivation) -> Vec<String> {
        let mut reopened = Vec::new();
        for runway_id in &deactivation.runways_to_reopen {
            let Ok(slot) = self.slot(runway_id) else {
                continue;
            };
            let mut state = slot.lock();
            if lock(&self.weather).is_runway_closed(runway_id) {
                continue;
            }
            state.open_gate();
            reopened.push(runway_id.clone());
        }
        reopened
    }

    /// End a weather alert. Returns `Ok(None)` when it had already ended.
    pub fn deactivate_weather_alert(
        &self,
        alert_id: &str,
    ) -> CoreResult<Option<WeatherDeactivation>> {
        let deactivation = lock(&self.weather).deactivate(alert_id, Utc::now())?;
        if let Some(deactivation) = &deactivation {
            self.finish_deactivation(deactivation, "ended");
        }
        Ok(deactivation)
    }

    /// Deactivate every active alert whose end time has passed.
    pub fn expire_weather_alerts(&self, now: DateTime<Utc>) -> Vec<WeatherDeactivation> {
        let expired = lock(&self.weather).expire(now);
        for deactivation in &expired {
            self.finish_deactivation(deactivation, "expired");
        }
        expired
    }

    fn finish_deactivation(&self, deactivation: &WeatherDeactivation, how: &str) {
        let reopened = self.apply_weather_reopen(deactivation);
        self.record_system(
            SystemEvent::new(
                SystemEventType::IntegrationEvent,
                "WeatherMonitor",
                format!("weather alert {} {}", deactivation.alert.alert_id, how),
            )
            .detail("alertId", deactivation.alert.alert_id.as_str())
            .detail("reopenedRunways", reopened),
        );
        self.notify_workers();
    }

    pub fn active_weather_alerts(&self) -> Vec<WeatherAlert> {
        lock(&self.weather).active_alerts()
    }

    pub fn weather_alert(&self, alert_id: &str) -> CoreResult<WeatherAlert> {
        lock(&self.weather)
            .alert(alert_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("weather alert", alert_id))
    }

    pub fn airports_with_active_alerts(&self) -> Vec<String> {
        lock(&self.weather).airports_with_active_alerts()
    }

    pub fn flights_delayed_by_weather(&self) -> Vec<Flight> {
        lock(&self.flights).delayed_by_weather()
    }

    pub fn average_weather_delay(&self) -> Option<f64> {
        lock(&self.flights).average_weather_delay()
    }

    pub fn flight_statistics(&self) -> FlightStatistics {
        lock(&self.flights).statistics()
    }

    pub fn active_fuel_alerts(&self) -> Vec<FuelAlert> {
        lock(&self.fuel).active_alerts()
    }

    pub fn fuel_alert(&self, alert_id: &str) -> CoreResult<FuelAlert> {
        lock(&self.fuel)
            .alert(alert_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("fuel alert", alert_id))
    }

    pub fn recommended_action(&self, alert_id: &str) -> CoreResult<&'static str> {
        Ok(self.fuel_alert(alert_id)?.recommended_action())
    }

    pub fn low_fuel_aircraft(&self) -> Vec<Aircraft> {
        low_fuel_aircraft(&self.fleet(), &self.rules.fuel)
    }

    pub fn critical_fuel_aircraft(&self) -> Vec<Aircraft> {
        critical_fuel_aircraft(&self.fleet(), &self.rules.fuel)
    }

    pub fn fuel_statistics(&self) -> FuelStatistics {
        fuel_statistics(&self.fleet(), &self.rules.fuel)
    }
}
