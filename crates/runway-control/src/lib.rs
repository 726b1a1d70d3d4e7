//! Runway control: process-scoped registries, the priority scheduler, and the
//! worker pool that drives it.

pub mod backoff;
pub mod config;
pub mod logging;
pub mod loops;
pub mod seed;
pub mod service;
pub mod state;

pub use config::Config;
pub use seed::{load_seed_file, SeedData};
pub use service::ControlService;
pub use state::{
    Assignment, ControlState, CycleOutcome, IntegrityViolation, LandingStatistics,
    QuarantineEntry, Snapshot, WorkerId, WorkerRole,
};
