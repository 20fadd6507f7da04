use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use trolley_core_types::{ActionId, ActionRequest, AuthState, CartState, SessionId, SiteId};
use trolley_driver_port::Driver;
use trolley_locator::DriverResolver;
use trolley_policy::PolicyView;
use trolley_site_profiles::SiteProfile;

use crate::errors::SessionError;
use crate::events::{EventDetail, SessionEvent};
use crate::model::{QueuedAction, SessionShared, SubmitHandle};
use crate::worker::Worker;

/// The caller's side of one session. Cheap to clone; every clone talks to
/// the same worker and the same queue.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
    queue: mpsc::Sender<QueuedAction>,
    capacity: usize,
}

impl SessionHandle {
    /// Spawns the worker that owns `driver` for the rest of the session's
    /// life. The handle returned here is the only way to reach it.
    pub fn open(driver: Box<dyn Driver>, profile: SiteProfile, policy: PolicyView) -> Self {
        let capacity = policy.queue.capacity.max(1);
        let (events, _) = broadcast::channel(policy.queue.event_buffer.max(16));
        let (queue, inbox) = mpsc::channel(capacity);
        let shared = Arc::new(SessionShared {
            id: SessionId::new(),
            site: profile.id.clone(),
            auth: RwLock::new(AuthState::Anonymous),
            cart: RwLock::new(None),
            failed: RwLock::new(None),
            pending: Mutex::new(HashMap::new()),
            closing: CancellationToken::new(),
            events,
        });
        info!(
            target: "session",
            session = %shared.id,
            site = %shared.site,
            capacity,
            "session opened"
        );
        let worker = Worker {
            shared: Arc::clone(&shared),
            queue: inbox,
            driver,
            resolver: DriverResolver::new(),
            profile,
            policy,
        };
        tokio::spawn(worker.run());
        Self {
            shared,
            queue,
            capacity,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.shared.id
    }

    pub fn site(&self) -> &SiteId {
        &self.shared.site
    }

    pub fn auth(&self) -> AuthState {
        self.shared.auth()
    }

    /// Last verified cart snapshot, replaced wholesale after each verified
    /// mutation. `None` until the first action that read the cart.
    pub fn cart(&self) -> Option<CartState> {
        self.shared.cart.read().clone()
    }

    /// The teardown reason, once there is one.
    pub fn failure(&self) -> Option<String> {
        self.shared.failure()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Enqueues an action. Refused outright when the session is failed or
    /// closed, and when the bounded queue is full; acceptance is the only
    /// path that allocates a waiter.
    pub fn submit(&self, request: ActionRequest) -> Result<SubmitHandle, SessionError> {
        if let Some(reason) = self.shared.failure() {
            return Err(SessionError::Failed(reason));
        }
        if self.shared.closing.is_cancelled() {
            return Err(SessionError::Closed);
        }
        let action_id = ActionId::new();
        let cancel = CancellationToken::new();
        let (completion, receiver) = oneshot::channel();
        let kind = request.kind;
        let queued = QueuedAction {
            action_id: action_id.clone(),
            request,
            completion,
            cancel: cancel.clone(),
        };
        // Registered before the hand-off so the worker always finds the
        // entry it removes on dequeue.
        self.shared
            .pending
            .lock()
            .insert(action_id.clone(), cancel.clone());
        match self.queue.try_send(queued) {
            Ok(()) => {
                debug!(
                    target: "session",
                    session = %self.shared.id,
                    action = %action_id,
                    kind = %kind,
                    "action accepted"
                );
                self.shared.publish(EventDetail::Accepted {
                    action: action_id.clone(),
                    kind,
                });
                Ok(SubmitHandle::new(action_id, receiver, cancel))
            }
            Err(TrySendError::Full(spilled)) => {
                self.shared.pending.lock().remove(&spilled.action_id);
                Err(SessionError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(spilled)) => {
                self.shared.pending.lock().remove(&spilled.action_id);
                match self.shared.failure() {
                    Some(reason) => Err(SessionError::Failed(reason)),
                    None => Err(SessionError::Closed),
                }
            }
        }
    }

    /// Cancels an action still waiting in the queue. `false` once the worker
    /// owns it (or the id is unknown); in-flight work always runs to its own
    /// terminal state.
    pub fn cancel(&self, action: &ActionId) -> bool {
        let pending = self.shared.pending.lock();
        match pending.get(action) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Stops the session: no new submissions, queued actions resolve as
    /// closed, the action already running finishes first.
    pub fn close(&self) {
        debug!(target: "session", session = %self.shared.id, "session close requested");
        self.shared.closing.cancel();
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast;
    use tokio::time::{sleep, Duration};

    use trolley_core_types::{ActionKind, ActionRequest};
    use trolley_driver_port::Driver;
    use trolley_policy::PolicyView;

    use crate::errors::SessionError;
    use crate::events::{EventDetail, SessionEvent};
    use crate::testkit::{cart_row_page, fast_policy, item_page, open_session, ITEM};

    fn add_one() -> ActionRequest {
        ActionRequest::new(ActionKind::AddToCart)
    }

    /// Settle long enough that the first action is still running while the
    /// test pokes at the queue behind it.
    fn slow_policy() -> PolicyView {
        let mut policy = fast_policy();
        policy.exec.settle_ms = 150;
        policy
    }

    async fn wait_for_started(events: &mut broadcast::Receiver<SessionEvent>) {
        loop {
            let event = events.recv().await.unwrap();
            if matches!(event.detail, EventDetail::Started { .. }) {
                return;
            }
        }
    }

    #[tokio::test]
    async fn a_full_queue_refuses_the_submit() {
        let mut policy = slow_policy();
        policy.queue.capacity = 1;
        let (session, spy) = open_session(vec![item_page(), cart_row_page(0)], policy);
        spy.navigate(ITEM).await.unwrap();
        let mut events = session.subscribe();

        let running = session.submit(add_one()).unwrap();
        wait_for_started(&mut events).await;
        let queued = session.submit(add_one()).unwrap();

        let refused = session.submit(add_one()).unwrap_err();
        assert_eq!(refused, SessionError::QueueFull { capacity: 1 });

        assert!(running.outcome().await.unwrap().is_success());
        assert!(queued.outcome().await.unwrap().is_success());
    }

    #[tokio::test]
    async fn cancel_only_reaches_actions_still_queued() {
        let (session, spy) = open_session(vec![item_page(), cart_row_page(0)], slow_policy());
        spy.navigate(ITEM).await.unwrap();
        let mut events = session.subscribe();

        let running = session.submit(add_one()).unwrap();
        wait_for_started(&mut events).await;
        let queued = session.submit(add_one()).unwrap();

        // Too late for the running action, in time for the queued one.
        assert!(!session.cancel(&running.action_id));
        queued.cancel();

        let cancelled = queued.outcome().await.unwrap_err();
        assert_eq!(cancelled, SessionError::Cancelled);
        assert!(running.outcome().await.unwrap().is_success());
        assert_eq!(spy.clicks_on(ITEM, "add"), 1);
    }

    #[tokio::test]
    async fn close_finishes_the_running_action_and_drops_the_rest() {
        let (session, spy) = open_session(vec![item_page(), cart_row_page(0)], slow_policy());
        spy.navigate(ITEM).await.unwrap();
        let mut events = session.subscribe();

        let running = session.submit(add_one()).unwrap();
        wait_for_started(&mut events).await;
        let queued = session.submit(add_one()).unwrap();
        session.close();

        assert!(running.outcome().await.unwrap().is_success());
        assert_eq!(queued.outcome().await.unwrap_err(), SessionError::Closed);
        assert_eq!(session.submit(add_one()).unwrap_err(), SessionError::Closed);

        sleep(Duration::from_millis(20)).await;
        let mut closed = false;
        while let Ok(event) = events.try_recv() {
            closed |= matches!(event.detail, EventDetail::Closed);
        }
        assert!(closed);
    }

    #[tokio::test]
    async fn cancelling_a_finished_action_is_a_no_op() {
        let (session, spy) = open_session(vec![item_page(), cart_row_page(0)], fast_policy());
        spy.navigate(ITEM).await.unwrap();

        let handle = session.submit(add_one()).unwrap();
        let id = handle.action_id.clone();
        assert!(handle.outcome().await.unwrap().is_success());
        assert!(!session.cancel(&id));
    }
}
