use dashmap::DashMap;
use tracing::debug;

use trolley_core_types::SessionId;
use trolley_driver_port::Driver;
use trolley_policy::PolicyView;
use trolley_site_profiles::SiteProfile;

use crate::api::SessionHandle;

/// Id-to-handle directory for the sessions a process has open. Sessions
/// share nothing with each other; this map is the whole of the coupling.
pub struct SessionSupervisor {
    policy: PolicyView,
    sessions: DashMap<SessionId, SessionHandle>,
}

impl SessionSupervisor {
    pub fn new(policy: PolicyView) -> Self {
        Self {
            policy,
            sessions: DashMap::new(),
        }
    }

    /// Opens a session over `driver` for the given site and registers it.
    pub fn open(&self, driver: Box<dyn Driver>, profile: SiteProfile) -> SessionHandle {
        let handle = SessionHandle::open(driver, profile, self.policy.clone());
        self.sessions.insert(handle.id().clone(), handle.clone());
        handle
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Closes and deregisters. `false` when the id was never here (or was
    /// already closed and removed).
    pub fn close(&self, id: &SessionId) -> bool {
        match self.sessions.remove(id) {
            Some((_, handle)) => {
                handle.close();
                true
            }
            None => false,
        }
    }

    /// Closes every open session; the directory ends up empty.
    pub fn close_all(&self) {
        debug!(target: "session", count = self.sessions.len(), "closing all sessions");
        for entry in self.sessions.iter() {
            entry.value().close();
        }
        self.sessions.clear();
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
