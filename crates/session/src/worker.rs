//! The session worker: one task that owns the driver outright and drains
//! the action queue in submission order, one action at a time.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use trolley_core_types::{ActionOutcome, AuthState};
use trolley_driver_port::Driver;
use trolley_executor::{execute, ExecCtx, ExecDeps, ExecError};
use trolley_locator::DriverResolver;
use trolley_policy::PolicyView;
use trolley_site_profiles::SiteProfile;

use crate::auth;
use crate::errors::SessionError;
use crate::events::{EventBridge, EventDetail};
use crate::model::{QueuedAction, SessionShared};

pub(crate) struct Worker {
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) queue: mpsc::Receiver<QueuedAction>,
    pub(crate) driver: Box<dyn Driver>,
    pub(crate) resolver: DriverResolver,
    pub(crate) profile: SiteProfile,
    pub(crate) policy: PolicyView,
}

impl Worker {
    pub(crate) async fn run(mut self) {
        debug!(
            target: "session",
            session = %self.shared.id,
            site = %self.shared.site,
            "session worker up"
        );
        loop {
            let next = tokio::select! {
                biased;
                () = self.shared.closing.cancelled() => None,
                next = self.queue.recv() => next,
            };
            let Some(action) = next else { break };
            // From here on the action is the worker's; cancel tokens only
            // matter while the entry is still in this map.
            self.shared.pending.lock().remove(&action.action_id);
            if action.cancel.is_cancelled() {
                self.shared.publish(EventDetail::Cancelled {
                    action: action.action_id.clone(),
                });
                let _ = action.completion.send(Err(SessionError::Cancelled));
                continue;
            }
            if let Err(reason) = self.run_action(action).await {
                self.fail(reason).await;
                return;
            }
        }
        self.drain(SessionError::Closed).await;
        self.shared.publish(EventDetail::Closed);
        debug!(target: "session", session = %self.shared.id, "session worker down");
    }

    /// Runs one action to its terminal result. `Err` carries a teardown
    /// reason and means the session must not run anything else.
    async fn run_action(&self, action: QueuedAction) -> Result<(), String> {
        let QueuedAction {
            action_id,
            request,
            completion,
            ..
        } = action;
        let kind = request.kind;
        self.shared.publish(EventDetail::Started {
            action: action_id.clone(),
            kind,
        });

        let auth = self.shared.auth();
        if kind.requires_auth_lane() && auth.is_terminal() {
            // Terminal means terminal: the page is not even touched.
            let outcome = ActionOutcome::blocked(
                "rate_limited",
                "session is rate limited; open a new session to retry",
            );
            info!(
                target: "session",
                session = %self.shared.id,
                action = %action_id,
                "credential request refused by the sticky rate limit"
            );
            self.shared.publish(EventDetail::Finished {
                action: action_id,
                status: outcome.status.clone(),
            });
            let _ = completion.send(Ok(outcome));
            return Ok(());
        }

        let ctx = ExecCtx::new(self.shared.site.clone(), auth, self.policy.action_timeout())
            .with_action_id(action_id.clone());
        let bridge = EventBridge::new(Arc::clone(&self.shared));
        let deps = ExecDeps {
            driver: self.driver.as_ref(),
            resolver: &self.resolver,
            profile: &self.profile,
            policy: &self.policy,
            events: &bridge,
        };
        match execute(&ctx, &request, &deps).await {
            Ok(report) => {
                if let Some(observed) = report.auth_observed {
                    self.commit_auth(observed);
                }
                if let Some(cart) = report.cart {
                    *self.shared.cart.write() = Some(cart);
                }
                let teardown = report.fatal_barrier.then(|| {
                    format!(
                        "fatal '{}' barrier on {}",
                        report.outcome.blocked_reason().unwrap_or("unknown"),
                        self.shared.site
                    )
                });
                self.shared.publish(EventDetail::Finished {
                    action: action_id,
                    status: report.outcome.status.clone(),
                });
                let _ = completion.send(Ok(report.outcome));
                match teardown {
                    Some(reason) => Err(reason),
                    None => Ok(()),
                }
            }
            Err(err) if err.is_fatal() => {
                let reason = err.to_string();
                let _ = completion.send(Err(SessionError::Failed(reason.clone())));
                Err(reason)
            }
            Err(ExecError::Cancelled) => {
                self.shared.publish(EventDetail::Cancelled { action: action_id });
                let _ = completion.send(Err(SessionError::Cancelled));
                Ok(())
            }
            Err(err) => {
                // Bad request, not a bad session; the queue keeps moving.
                let _ = completion.send(Err(SessionError::Rejected(err.to_string())));
                Ok(())
            }
        }
    }

    /// Folds a page observation into the session's auth state and announces
    /// the move if one happened.
    fn commit_auth(&self, observed: AuthState) {
        let mut slot = self.shared.auth.write();
        let current = *slot;
        let next = auth::advance(current, observed);
        if next == current {
            return;
        }
        *slot = next;
        drop(slot);
        info!(
            target: "session",
            session = %self.shared.id,
            from = %current,
            to = %next,
            "auth state moved"
        );
        self.shared.publish(EventDetail::AuthChanged {
            from: current,
            to: next,
        });
    }

    async fn fail(&mut self, reason: String) {
        warn!(
            target: "session",
            session = %self.shared.id,
            %reason,
            "session failed; draining the queue"
        );
        *self.shared.failed.write() = Some(reason.clone());
        self.shared.publish(EventDetail::Failed {
            reason: reason.clone(),
        });
        self.drain(SessionError::Failed(reason)).await;
    }

    /// Closes the queue and resolves everything still buffered with `error`.
    /// Every accepted action gets an answer, even on the way down.
    async fn drain(&mut self, error: SessionError) {
        self.queue.close();
        while let Some(action) = self.queue.recv().await {
            self.shared.pending.lock().remove(&action.action_id);
            let _ = action.completion.send(Err(error.clone()));
        }
    }
}
