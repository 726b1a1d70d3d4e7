//! Weather expiry loop.
//!
//! Ends alerts whose end time has passed so their runways reopen without an
//! explicit deactivation.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::interval;

use crate::state::ControlState;

pub async fn run_weather_expiry_loop(
    state: Arc<ControlState>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(state.config().weather_sweep);
    state.mark_loop_heartbeat("weather-expiry");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Weather expiry loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                state.mark_loop_heartbeat("weather-expiry");
                let expired = state.expire_weather_alerts(Utc::now());
                for deactivation in &expired {
                    tracing::info!(
                        "Weather alert {} expired, reopened {:?}",
                        deactivation.alert.alert_id,
                        deactivation.runways_to_reopen
                    );
                }
            }
        }
    }
}
