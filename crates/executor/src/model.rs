use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use trolley_core_types::{ActionId, ActionOutcome, AuthState, CartState, SiteId};
use trolley_driver_port::Driver;
use trolley_locator::ElementResolver;
use trolley_policy::PolicyView;
use trolley_site_profiles::SiteProfile;

use crate::events::StepEvents;

/// Execution context delivered by the session worker.
#[derive(Clone, Debug)]
pub struct ExecCtx {
    pub action_id: ActionId,
    pub site: SiteId,
    /// Lane the session believes it is in when the action starts. Decides
    /// which credential step a `SubmitCredential` performs.
    pub auth: AuthState,
    /// Whole-action deadline, retries included.
    pub deadline: Instant,
    pub cancel: CancellationToken,
}

impl ExecCtx {
    pub fn new(site: SiteId, auth: AuthState, budget: Duration) -> Self {
        Self {
            action_id: ActionId::new(),
            site,
            auth,
            deadline: Instant::now() + budget,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_action_id(mut self, action_id: ActionId) -> Self {
        self.action_id = action_id;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Budget left before the whole-action deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Borrowed ports for one run. The session owns the real resources and
/// lends them per call; the executor keeps nothing.
pub struct ExecDeps<'a> {
    pub driver: &'a dyn Driver,
    pub resolver: &'a dyn ElementResolver,
    pub profile: &'a SiteProfile,
    pub policy: &'a PolicyView,
    pub events: &'a dyn StepEvents,
}

/// What one run hands back to the session: the terminal outcome plus the
/// side observations the session folds into its own state.
#[derive(Clone, Debug)]
pub struct ExecReport {
    pub outcome: ActionOutcome,
    /// Lane the page evidence says the session is in now, when the run
    /// produced any evidence at all.
    pub auth_observed: Option<AuthState>,
    /// Fresh cart read-back, present when the action rebuilt the cart.
    pub cart: Option<CartState>,
    /// A fatal barrier rule fired; the session must tear down.
    pub fatal_barrier: bool,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub latency_ms: u128,
}

impl ExecReport {
    pub fn new(outcome: ActionOutcome, started_at: Instant) -> Self {
        Self {
            outcome,
            auth_observed: None,
            cart: None,
            fatal_barrier: false,
            started_at,
            finished_at: started_at,
            latency_ms: 0,
        }
    }

    pub fn finish(mut self, finished_at: Instant) -> Self {
        self.finished_at = finished_at;
        self.latency_ms = finished_at
            .saturating_duration_since(self.started_at)
            .as_millis();
        self
    }
}
