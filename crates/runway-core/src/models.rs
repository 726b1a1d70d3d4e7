//! Core data models for runway allocation.
//!
//! Field names and enumeration spellings are the persisted record contract and
//! serialize exactly as stored (`aircraftId`, `RUNWAY_ASSIGNED`, ...).

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

pub const PRIORITY_HIGHEST: u8 = 1;
pub const PRIORITY_LOWEST: u8 = 3;
pub const PERCENT_MAX: u8 = 100;

/// Free-form event details, stored as a JSON object.
pub type Details = Map<String, Value>;

macro_rules! record_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant,)+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

record_enum!(
    /// Lifecycle of an aircraft from the scheduler's point of view.
    AircraftStatus {
        Scheduled => "SCHEDULED",
        Approaching => "APPROACHING",
        Landing => "LANDING",
        Landed => "LANDED",
        Airborne => "AIRBORNE",
        Emergency => "EMERGENCY",
    }
);

record_enum!(
    RunwayStatus {
        Free => "FREE",
        Occupied => "OCCUPIED",
        Closed => "CLOSED",
        Maintenance => "MAINTENANCE",
    }
);

record_enum!(
    FlightStatus {
        Scheduled => "SCHEDULED",
        Delayed => "DELAYED",
        Cancelled => "CANCELLED",
        InFlight => "IN_FLIGHT",
        Landed => "LANDED",
        Boarding => "BOARDING",
    }
);

record_enum!(
    /// Cause of a flight delay. Declared in precedence order: when several
    /// causes hold at once the smallest variant wins.
    DelayReason {
        Fuel => "FUEL",
        Weather => "WEATHER",
        Technical => "TECHNICAL",
        Atc => "ATC",
        Runway => "RUNWAY",
    }
);

record_enum!(
    LandingEventType {
        LandingRequest => "LANDING_REQUEST",
        RunwayAssigned => "RUNWAY_ASSIGNED",
        LandingStarted => "LANDING_STARTED",
        LandingCompleted => "LANDING_COMPLETED",
        RunwayReleased => "RUNWAY_RELEASED",
        EmergencyDeclared => "EMERGENCY_DECLARED",
        PriorityEscalated => "PRIORITY_ESCALATED",
    }
);

record_enum!(
    WeatherAlertType {
        Storm => "STORM",
        Fog => "FOG",
        Wind => "WIND",
        Snow => "SNOW",
        Rain => "RAIN",
        Turbulence => "TURBULENCE",
    }
);

record_enum!(
    WeatherSeverity {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Critical => "CRITICAL",
    }
);

record_enum!(
    FuelAlertLevel {
        Low => "LOW",
        Critical => "CRITICAL",
        Emergency => "EMERGENCY",
    }
);

record_enum!(
    SystemEventType {
        SystemStart => "SYSTEM_START",
        SystemShutdown => "SYSTEM_SHUTDOWN",
        ThreadStarted => "THREAD_STARTED",
        ThreadStopped => "THREAD_STOPPED",
        DatabaseConnected => "DATABASE_CONNECTED",
        DatabaseError => "DATABASE_ERROR",
        GuiAction => "GUI_ACTION",
        IntegrationEvent => "INTEGRATION_EVENT",
    }
);

record_enum!(
    EventSource {
        Core => "core",
        Part2 => "PART2",
        Shared => "SHARED",
        Gui => "GUI",
        Database => "DATABASE",
    }
);

record_enum!(
    EventSeverity {
        Info => "INFO",
        Warning => "WARNING",
        Error => "ERROR",
        Critical => "CRITICAL",
    }
);

fn check_percent(field: &'static str, value: u8) -> CoreResult<()> {
    if value > PERCENT_MAX {
        return Err(CoreError::validation(
            field,
            format!("{} exceeds {}", value, PERCENT_MAX),
        ));
    }
    Ok(())
}

fn check_id(field: &'static str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// An aircraft known to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aircraft {
    pub aircraft_id: String,
    pub callsign: String,
    pub fuel_level: u8,
    pub status: AircraftStatus,
    #[serde(default)]
    pub is_emergency: bool,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub request_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_runway: Option<String>,
}

fn default_priority() -> u8 {
    PRIORITY_LOWEST
}

impl Aircraft {
    pub fn new(aircraft_id: impl Into<String>, callsign: impl Into<String>, fuel_level: u8) -> Self {
        Self {
            aircraft_id: aircraft_id.into(),
            callsign: callsign.into(),
            fuel_level,
            status: AircraftStatus::Scheduled,
            is_emergency: false,
            priority: PRIORITY_LOWEST,
            request_time: None,
            assigned_runway: None,
        }
    }

    pub fn with_status(mut self, status: AircraftStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Reject out-of-range fields before the record enters a registry.
    pub fn validate(&self) -> CoreResult<()> {
        check_id("aircraftId", &self.aircraft_id)?;
        check_id("callsign", &self.callsign)?;
        check_percent("fuelLevel", self.fuel_level)?;
        if !(PRIORITY_HIGHEST..=PRIORITY_LOWEST).contains(&self.priority) {
            return Err(CoreError::validation(
                "priority",
                format!(
                    "{} outside {}..={}",
                    self.priority, PRIORITY_HIGHEST, PRIORITY_LOWEST
                ),
            ));
        }
        if self.is_emergency && self.priority != PRIORITY_HIGHEST {
            return Err(CoreError::validation(
                "priority",
                "emergency aircraft must carry priority 1",
            ));
        }
        Ok(())
    }

    pub fn has_landed(&self) -> bool {
        self.status == AircraftStatus::Landed
    }
}

/// A physical runway and its current occupant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runway {
    pub runway_id: String,
    pub is_open: bool,
    pub status: RunwayStatus,
    #[serde(default)]
    pub current_aircraft: Option<String>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closure_reason: Option<String>,
    #[serde(default)]
    pub total_usage: u32,
}

impl Runway {
    pub fn new(runway_id: impl Into<String>) -> Self {
        Self {
            runway_id: runway_id.into(),
            is_open: true,
            status: RunwayStatus::Free,
            current_aircraft: None,
            last_used: None,
            closure_reason: None,
            total_usage: 0,
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        check_id("runwayId", &self.runway_id)?;
        if self.status == RunwayStatus::Closed && self.is_open {
            return Err(CoreError::validation(
                "isOpen",
                "a CLOSED runway cannot be open",
            ));
        }
        Ok(())
    }

    /// Check the occupancy invariant: OCCUPIED iff an occupant is recorded.
    pub fn occupancy_consistent(&self) -> bool {
        (self.status == RunwayStatus::Occupied) == self.current_aircraft.is_some()
    }

    pub fn is_assignable(&self) -> bool {
        self.is_open && self.status == RunwayStatus::Free
    }
}

/// A scheduled flight operated by one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub flight_id: String,
    pub flight_number: String,
    #[serde(default)]
    pub aircraft_id: Option<String>,
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub scheduled_departure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_arrival: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_departure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_arrival: Option<DateTime<Utc>>,
    pub status: FlightStatus,
    #[serde(default)]
    pub delay_minutes: u32,
    #[serde(default)]
    pub delay_reason: Option<DelayReason>,
    #[serde(default)]
    pub weather_alerts: BTreeSet<String>,
    #[serde(default)]
    pub is_affected_by_weather: bool,
}

impl Flight {
    pub fn new(
        flight_id: impl Into<String>,
        flight_number: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            flight_id: flight_id.into(),
            flight_number: flight_number.into(),
            aircraft_id: None,
            origin: origin.into(),
            destination: destination.into(),
            scheduled_departure: None,
            scheduled_arrival: None,
            actual_departure: None,
            actual_arrival: None,
            status: FlightStatus::Scheduled,
            delay_minutes: 0,
            delay_reason: None,
            weather_alerts: BTreeSet::new(),
            is_affected_by_weather: false,
        }
    }

    pub fn operated_by(mut self, aircraft_id: impl Into<String>) -> Self {
        self.aircraft_id = Some(aircraft_id.into());
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        check_id("flightId", &self.flight_id)?;
        check_id("flightNumber", &self.flight_number)?;
        check_id("origin", &self.origin)?;
        check_id("destination", &self.destination)?;
        Ok(())
    }

    pub fn serves_airport(&self, airport: &str) -> bool {
        self.origin == airport || self.destination == airport
    }

    /// Landed and cancelled flights no longer accrue delay.
    pub fn is_closed(&self) -> bool {
        matches!(self.status, FlightStatus::Landed | FlightStatus::Cancelled)
    }
}

/// Immutable record of one scheduler transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingEvent {
    pub event_type: LandingEventType,
    pub aircraft_id: String,
    #[serde(default)]
    pub runway_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub details: Details,
}

impl LandingEvent {
    pub fn new(event_type: LandingEventType, aircraft_id: impl Into<String>) -> Self {
        Self {
            event_type,
            aircraft_id: aircraft_id.into(),
            runway_id: None,
            timestamp: Utc::now(),
            worker_id: None,
            details: Details::new(),
        }
    }

    pub fn on_runway(mut self, runway_id: impl Into<String>) -> Self {
        self.runway_id = Some(runway_id.into());
        self
    }

    pub fn by_worker(mut self, worker_id: Option<&str>) -> Self {
        self.worker_id = worker_id.map(str::to_string);
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Operational record that is not tied to a single landing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemEvent {
    pub event_type: SystemEventType,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Details,
    #[serde(default = "default_severity")]
    pub severity: EventSeverity,
}

fn default_severity() -> EventSeverity {
    EventSeverity::Info
}

impl SystemEvent {
    pub fn new(
        event_type: SystemEventType,
        component: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            source: EventSource::Core,
            component: Some(component.into()),
            message: Some(message.into()),
            details: Details::new(),
            severity: EventSeverity::Info,
        }
    }

    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn from_source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Weather advisory that may close runways at one airport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherAlert {
    pub alert_id: String,
    pub alert_type: WeatherAlertType,
    pub severity: WeatherSeverity,
    pub affected_airport: String,
    #[serde(default)]
    pub affected_runways: BTreeSet<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub affected_flights: BTreeSet<String>,
}

impl WeatherAlert {
    pub fn new(
        alert_id: impl Into<String>,
        alert_type: WeatherAlertType,
        severity: WeatherSeverity,
        affected_airport: impl Into<String>,
    ) -> Self {
        Self {
            alert_id: alert_id.into(),
            alert_type,
            severity,
            affected_airport: affected_airport.into(),
            affected_runways: BTreeSet::new(),
            start_time: None,
            end_time: None,
            description: None,
            is_active: false,
            affected_flights: BTreeSet::new(),
        }
    }

    pub fn covering<I, S>(mut self, runways: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affected_runways = runways.into_iter().map(Into::into).collect();
        self
    }

    pub fn until(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        check_id("alertId", &self.alert_id)?;
        check_id("affectedAirport", &self.affected_airport)?;
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end < start {
                return Err(CoreError::validation(
                    "endTime",
                    "alert cannot end before it starts",
                ));
            }
        }
        Ok(())
    }

    /// Whether the alert window is still open at `now`.
    pub fn window_open(&self, now: DateTime<Utc>) -> bool {
        self.end_time.map(|end| end > now).unwrap_or(true)
    }
}

/// Fuel advisory raised for one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelAlert {
    pub alert_id: String,
    pub aircraft_id: String,
    #[serde(default)]
    pub flight_id: Option<String>,
    pub current_fuel_level: u8,
    pub critical_threshold: u8,
    pub low_threshold: u8,
    #[serde(default = "Utc::now")]
    pub alert_time: DateTime<Utc>,
    pub alert_level: FuelAlertLevel,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub escalated_to_emergency: bool,
}

impl FuelAlert {
    pub fn validate(&self) -> CoreResult<()> {
        check_id("alertId", &self.alert_id)?;
        check_id("aircraftId", &self.aircraft_id)?;
        check_percent("currentFuelLevel", self.current_fuel_level)?;
        check_percent("criticalThreshold", self.critical_threshold)?;
        check_percent("lowThreshold", self.low_threshold)?;
        if self.critical_threshold >= self.low_threshold {
            return Err(CoreError::ThresholdMisconfigured {
                critical: self.critical_threshold,
                low: self.low_threshold,
            });
        }
        Ok(())
    }

    /// Operator guidance for the alert's current level.
    pub fn recommended_action(&self) -> &'static str {
        if self.is_resolved {
            return "NONE";
        }
        match self.alert_level {
            FuelAlertLevel::Low => "MONITOR_AND_EXPEDITE",
            FuelAlertLevel::Critical => "PRIORITY_LANDING",
            FuelAlertLevel::Emergency => "IMMEDIATE_LANDING",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aircraft_serializes_with_record_field_names() {
        let aircraft = Aircraft::new("AC001", "BA101", 75).with_status(AircraftStatus::Approaching);
        let value = serde_json::to_value(&aircraft).unwrap();
        assert_eq!(value["aircraftId"], "AC001");
        assert_eq!(value["fuelLevel"], 75);
        assert_eq!(value["status"], "APPROACHING");
        assert_eq!(value["isEmergency"], false);
        assert_eq!(value["assignedRunway"], serde_json::Value::Null);
    }

    #[test]
    fn enumerations_keep_stored_spelling() {
        assert_eq!(json!(FlightStatus::InFlight), json!("IN_FLIGHT"));
        assert_eq!(json!(DelayReason::Atc), json!("ATC"));
        assert_eq!(json!(EventSource::Core), json!("core"));
        assert_eq!(json!(EventSource::Part2), json!("PART2"));
        assert_eq!(
            json!(LandingEventType::PriorityEscalated),
            json!("PRIORITY_ESCALATED")
        );
    }

    #[test]
    fn delay_reason_order_is_precedence() {
        assert!(DelayReason::Fuel < DelayReason::Weather);
        assert!(DelayReason::Weather < DelayReason::Technical);
        assert!(DelayReason::Weather < DelayReason::Runway);
    }

    #[test]
    fn aircraft_validation_rejects_bad_fields() {
        let mut aircraft = Aircraft::new("AC001", "BA101", 101);
        assert!(aircraft.validate().is_err());

        aircraft.fuel_level = 50;
        aircraft.priority = 4;
        assert!(aircraft.validate().is_err());

        aircraft.priority = 2;
        aircraft.is_emergency = true;
        assert!(aircraft.validate().is_err());

        aircraft.priority = 1;
        assert!(aircraft.validate().is_ok());
    }

    #[test]
    fn closed_runway_must_not_be_open() {
        let mut runway = Runway::new("RW01");
        runway.status = RunwayStatus::Closed;
        assert!(runway.validate().is_err());
        runway.is_open = false;
        assert!(runway.validate().is_ok());
    }

    #[test]
    fn weather_window_follows_end_time() {
        let now = Utc::now();
        let alert = WeatherAlert::new("WA001", WeatherAlertType::Storm, WeatherSeverity::High, "JFK");
        assert!(alert.window_open(now));
        let ended = alert.clone().until(now - chrono::Duration::minutes(1));
        assert!(!ended.window_open(now));
    }

    #[test]
    fn fuel_alert_rejects_inverted_thresholds() {
        let alert = FuelAlert {
            alert_id: "FA001".into(),
            aircraft_id: "AC002".into(),
            flight_id: None,
            current_fuel_level: 15,
            critical_threshold: 20,
            low_threshold: 10,
            alert_time: Utc::now(),
            alert_level: FuelAlertLevel::Low,
            is_resolved: false,
            resolution: None,
            escalated_to_emergency: false,
        };
        assert!(matches!(
            alert.validate(),
            Err(CoreError::ThresholdMisconfigured { .. })
        ));
    }

    #[test]
    fn landing_event_collects_details() {
        let event = LandingEvent::new(LandingEventType::RunwayAssigned, "AC003")
            .on_runway("RW01")
            .by_worker(Some("EmergencyWorker-1"))
            .detail("emergencyOverride", true)
            .detail("previousAircraftCleared", "AC002");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["eventType"], "RUNWAY_ASSIGNED");
        assert_eq!(value["details"]["previousAircraftCleared"], "AC002");
        assert_eq!(value["workerId"], "EmergencyWorker-1");
    }
}
