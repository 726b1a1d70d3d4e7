//! Integrity loop.
//!
//! Periodically re-checks the runway/aircraft invariants and reports runway
//! status. Violations quarantine the entity; see `ControlState::verify_integrity`.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::interval;

use crate::state::ControlState;

pub async fn run_integrity_loop(state: Arc<ControlState>, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = interval(state.config().integrity_sweep);
    state.mark_loop_heartbeat("integrity");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Integrity loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                state.mark_loop_heartbeat("integrity");
                let violations = state.verify_integrity();
                if !violations.is_empty() {
                    tracing::error!("Integrity sweep quarantined {} entities", violations.len());
                }

                let snapshot = state.snapshot();
                for runway in &snapshot.runways {
                    tracing::debug!(
                        "Runway {}: {} (open: {}, occupant: {}, landings: {})",
                        runway.runway_id,
                        runway.status,
                        runway.is_open,
                        runway.current_aircraft.as_deref().unwrap_or("-"),
                        runway.total_usage
                    );
                }
                tracing::debug!(
                    "Queue length {}, {} landings, {} preemptions",
                    snapshot.statistics.queue_length,
                    snapshot.statistics.total_landings,
                    snapshot.statistics.preemptions
                );
            }
        }
    }
}
