//! Worker pool and background loop supervision.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use runway_core::{EventSeverity, LandingRequest, SystemEvent, SystemEventType};

use crate::loops::{integrity_loop, landing_worker, weather_expiry_loop};
use crate::state::{ControlState, WorkerId};

/// Running scheduler: routine and emergency workers plus the weather and
/// integrity sweeps, all sharing one shutdown broadcast.
pub struct ControlService {
    state: Arc<ControlState>,
    session_id: Uuid,
    shutdown: broadcast::Sender<()>,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl ControlService {
    /// Spawn every task on the current tokio runtime.
    pub fn start(state: Arc<ControlState>) -> Self {
        let session_id = Uuid::new_v4();
        let (shutdown, _) = broadcast::channel(1);
        let mut handles = Vec::new();

        let config = state.config().clone();
        for index in 1..=config.landing_workers {
            let worker = WorkerId::routine(index);
            handles.push((
                worker.to_string(),
                tokio::spawn(landing_worker::run_landing_worker(
                    state.clone(),
                    worker,
                    shutdown.subscribe(),
                )),
            ));
        }
        for index in 1..=config.emergency_workers {
            let worker = WorkerId::emergency(index);
            handles.push((
                worker.to_string(),
                tokio::spawn(landing_worker::run_landing_worker(
                    state.clone(),
                    worker,
                    shutdown.subscribe(),
                )),
            ));
        }
        handles.push((
            "weather-expiry".to_string(),
            tokio::spawn(weather_expiry_loop::run_weather_expiry_loop(
                state.clone(),
                shutdown.subscribe(),
            )),
        ));
        handles.push((
            "integrity".to_string(),
            tokio::spawn(integrity_loop::run_integrity_loop(
                state.clone(),
                shutdown.subscribe(),
            )),
        ));

        tracing::info!(
            "Control service {} started with {} landing and {} emergency workers",
            session_id,
            config.landing_workers,
            config.emergency_workers
        );
        Self {
            state,
            session_id,
            shutdown,
            handles,
        }
    }

    pub fn state(&self) -> &Arc<ControlState> {
        &self.state
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Stop every task, wait for landings in progress to finish, then drain
    /// the queue. SYSTEM_SHUTDOWN is the last event recorded. Returns the
    /// requests that were still waiting.
    pub async fn shutdown(self) -> Vec<LandingRequest> {
        let _ = self.shutdown.send(());
        for (name, handle) in self.handles {
            if let Err(err) = handle.await {
                tracing::error!("{} ended abnormally: {}", name, err);
                self.state.record_system(
                    SystemEvent::new(
                        SystemEventType::ThreadStopped,
                        name.as_str(),
                        format!("{} ended abnormally: {}", name, err),
                    )
                    .with_severity(EventSeverity::Error),
                );
            }
        }

        let pending = self.state.drain_queue();
        for request in &pending {
            tracing::warn!(
                "Shutdown with {} still waiting (priority {})",
                request.aircraft_id,
                request.priority
            );
        }
        let statistics = self.state.statistics();
        self.state.record_system(
            SystemEvent::new(
                SystemEventType::SystemShutdown,
                "ControlService",
                format!(
                    "session {} stopped after {} landings",
                    self.session_id, statistics.total_landings
                ),
            )
            .detail("sessionId", self.session_id.to_string())
            .detail("pendingRequests", pending.len())
            .detail("preemptions", statistics.preemptions),
        );
        pending
    }
}
