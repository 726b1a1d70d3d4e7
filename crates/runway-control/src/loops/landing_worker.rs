//! Landing workers.
//!
//! Stateless workers pulling from the shared landing queue. A worker owns
//! nothing but the assignment it is currently flying; once a claim succeeds
//! the landing runs to completion even if shutdown is requested, unless the
//! aircraft is displaced before touchdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::sleep;

use runway_core::{SystemEvent, SystemEventType};

use crate::backoff::Backoff;
use crate::state::{Assignment, ControlState, CycleOutcome, WorkerId};

const IDLE_BACKOFF_BASE: Duration = Duration::from_millis(100);

pub async fn run_landing_worker(
    state: Arc<ControlState>,
    worker: WorkerId,
    mut shutdown: broadcast::Receiver<()>,
) {
    let name = worker.to_string();
    let mut backoff = Backoff::new(IDLE_BACKOFF_BASE, state.config().idle_backoff_max);
    state.mark_loop_heartbeat(&name);
    state.record_system(SystemEvent::new(
        SystemEventType::ThreadStarted,
        name.as_str(),
        format!("{} started", name),
    ));

    loop {
        match shutdown.try_recv() {
            Err(TryRecvError::Empty) => {}
            _ => break,
        }

        let outcome = match state.run_cycle(&worker) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("{} scheduling cycle failed: {}", name, err);
                CycleOutcome::Idle
            }
        };
        state.mark_loop_heartbeat(&name);

        match outcome {
            CycleOutcome::Assigned(assignment) => {
                backoff.reset();
                fly(&state, &assignment).await;
            }
            CycleOutcome::Dropped { .. } => {}
            CycleOutcome::Idle | CycleOutcome::Requeued { .. } => {
                let delay = backoff.next_delay();
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = state.queue_signal().notified() => {}
                    _ = sleep(delay) => {}
                }
            }
        }
    }

    tracing::info!("{} shutting down", name);
    state.record_system(SystemEvent::new(
        SystemEventType::ThreadStopped,
        name.as_str(),
        format!("{} stopped", name),
    ));
}

/// Approach, touchdown, rollout, release.
async fn fly(state: &ControlState, assignment: &Assignment) {
    let config = state.config();
    let approach = if assignment.emergency {
        config.emergency_approach
    } else {
        config.approach
    };
    sleep(approach).await;

    if let Err(err) = state.begin_landing(assignment) {
        tracing::warn!(
            "{} lost {} on {} before touchdown: {}",
            assignment.worker_id,
            assignment.aircraft_id,
            assignment.runway_id,
            err
        );
        return;
    }

    sleep(config.rollout).await;

    if let Err(err) = state.complete_landing(assignment) {
        tracing::error!(
            "{} could not complete landing of {} on {}: {}",
            assignment.worker_id,
            assignment.aircraft_id,
            assignment.runway_id,
            err
        );
    }
}
