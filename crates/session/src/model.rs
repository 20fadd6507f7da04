use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

use trolley_core_types::{
    ActionId, ActionOutcome, ActionRequest, AuthState, CartState, SessionId, SiteId,
};

use crate::errors::SessionError;
use crate::events::{EventDetail, SessionEvent};

/// State both sides of the queue can see: the handle reads it, the worker
/// writes it. Everything behind short non-async locks; nothing here is held
/// across an await.
pub(crate) struct SessionShared {
    pub(crate) id: SessionId,
    pub(crate) site: SiteId,
    pub(crate) auth: RwLock<AuthState>,
    pub(crate) cart: RwLock<Option<CartState>>,
    /// Set exactly once, by the worker, when the session tears down.
    pub(crate) failed: RwLock<Option<String>>,
    /// Cancel tokens for actions still queued. The worker removes an entry
    /// the moment it dequeues the action, which is what makes cancellation
    /// queue-only.
    pub(crate) pending: Mutex<HashMap<ActionId, CancellationToken>>,
    pub(crate) closing: CancellationToken,
    pub(crate) events: broadcast::Sender<SessionEvent>,
}

impl SessionShared {
    pub(crate) fn auth(&self) -> AuthState {
        *self.auth.read()
    }

    pub(crate) fn failure(&self) -> Option<String> {
        self.failed.read().clone()
    }

    /// Publish never blocks and never fails the worker; a bus with no
    /// subscribers just drops the event.
    pub(crate) fn publish(&self, detail: EventDetail) {
        let _ = self.events.send(SessionEvent::now(self.id.clone(), detail));
    }
}

/// One action as it sits in the queue.
pub(crate) struct QueuedAction {
    pub(crate) action_id: ActionId,
    pub(crate) request: ActionRequest,
    pub(crate) completion: oneshot::Sender<Result<ActionOutcome, SessionError>>,
    pub(crate) cancel: CancellationToken,
}

/// The caller's end of a submitted action: an id for correlation, a future
/// resolving to the terminal result, and a cancel lever that only works
/// while the action is still waiting its turn.
#[derive(Debug)]
pub struct SubmitHandle {
    pub action_id: ActionId,
    receiver: oneshot::Receiver<Result<ActionOutcome, SessionError>>,
    cancel: CancellationToken,
}

impl SubmitHandle {
    pub(crate) fn new(
        action_id: ActionId,
        receiver: oneshot::Receiver<Result<ActionOutcome, SessionError>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            action_id,
            receiver,
            cancel,
        }
    }

    /// Waits for the terminal result. Every accepted action gets exactly one:
    /// an outcome if it ran, a [`SessionError`] if the session refused or
    /// lost it.
    pub async fn outcome(self) -> Result<ActionOutcome, SessionError> {
        match self.receiver.await {
            Ok(result) => result,
            // The worker resolves every action it ever dequeues, so a dropped
            // sender means the whole session task went away.
            Err(_) => Err(SessionError::Failed(
                "session dropped the action without resolving it".to_string(),
            )),
        }
    }

    /// Requests cancellation. A no-op once the worker has picked the action
    /// up; in-flight work always runs to its own terminal state.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
