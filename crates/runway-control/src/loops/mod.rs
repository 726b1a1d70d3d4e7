//! Scheduling workers and background sweeps.

pub mod integrity_loop;
pub mod landing_worker;
pub mod weather_expiry_loop;
