use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use trolley_core_types::{ActionId, ActionKind, AuthState, OutcomeStatus, SessionId};
use trolley_executor::StepEvents;

use crate::model::SessionShared;

/// One progress notification on a session's broadcast bus. Stamped when
/// published; slow subscribers lag and drop, they never slow the worker.
#[derive(Clone, Debug)]
pub struct SessionEvent {
    pub at: DateTime<Utc>,
    pub session: SessionId,
    pub detail: EventDetail,
}

impl SessionEvent {
    pub(crate) fn now(session: SessionId, detail: EventDetail) -> Self {
        Self {
            at: Utc::now(),
            session,
            detail,
        }
    }
}

/// What happened. `Accepted` fires at submit time, everything else from the
/// worker, so per-action details arrive in execution order.
#[derive(Clone, Debug)]
pub enum EventDetail {
    /// The action made it into the queue.
    Accepted { action: ActionId, kind: ActionKind },
    /// The worker dequeued the action and is about to run it.
    Started { action: ActionId, kind: ActionKind },
    AttemptStarted { action: ActionId, attempt: u32 },
    /// A target resolved; `strategy_index` says which fallback carried it.
    TargetResolved {
        action: ActionId,
        target: String,
        strategy_index: usize,
    },
    AttemptFinished {
        action: ActionId,
        status: OutcomeStatus,
        attempt: u32,
    },
    /// The action reached a terminal outcome (any status, success or not).
    Finished {
        action: ActionId,
        status: OutcomeStatus,
    },
    /// Cancelled while queued; the action never touched the page.
    Cancelled { action: ActionId },
    /// The session's auth state moved, driven by page evidence.
    AuthChanged { from: AuthState, to: AuthState },
    /// The session tore down; queued actions were drained with this reason.
    Failed { reason: String },
    Closed,
}

/// Forwards executor step events onto the session bus, so subscribers see
/// per-attempt progress between `Started` and `Finished`.
pub(crate) struct EventBridge {
    shared: Arc<SessionShared>,
}

impl EventBridge {
    pub(crate) fn new(shared: Arc<SessionShared>) -> Self {
        Self { shared }
    }
}

#[async_trait]
impl StepEvents for EventBridge {
    async fn attempt_started(&self, action: &ActionId, _kind: ActionKind, attempt: u32) {
        self.shared.publish(EventDetail::AttemptStarted {
            action: action.clone(),
            attempt,
        });
    }

    async fn target_resolved(&self, action: &ActionId, target: &str, strategy_index: usize) {
        self.shared.publish(EventDetail::TargetResolved {
            action: action.clone(),
            target: target.to_string(),
            strategy_index,
        });
    }

    async fn attempt_finished(&self, action: &ActionId, status: &OutcomeStatus, attempt: u32) {
        self.shared.publish(EventDetail::AttemptFinished {
            action: action.clone(),
            status: status.clone(),
            attempt,
        });
    }
}
