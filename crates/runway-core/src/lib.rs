pub mod error;
pub mod events;
pub mod flights;
pub mod fuel;
pub mod models;
pub mod queue;
pub mod rules;
pub mod weather;

pub use error::{CoreError, CoreResult, ErrorKind};
pub use events::{EventLog, Page, MAX_PAGE_SIZE};
pub use flights::{FlightBoard, FlightStatistics};
pub use fuel::{AlertChange, FuelBand, FuelMonitor, FuelObservation, FuelStatistics};
pub use models::{
    Aircraft, AircraftStatus, DelayReason, Details, EventSeverity, EventSource, Flight,
    FlightStatus, FuelAlert, FuelAlertLevel, LandingEvent, LandingEventType, Runway,
    RunwayStatus, SystemEvent, SystemEventType, WeatherAlert, WeatherAlertType,
    WeatherSeverity,
};
pub use queue::{LandingQueue, LandingRequest};
pub use rules::{FuelThresholds, SchedulingRules, WeatherDelayTable};
pub use weather::{WeatherActivation, WeatherBoard, WeatherDeactivation};
