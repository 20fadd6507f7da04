use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use trolley_core_types::SiteId;

use crate::api::CredentialStore;
use crate::errors::CredentialError;
use crate::model::SavedIdentifier;

/// In-memory store for tests and embedders that manage persistence
/// themselves.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<SiteId, SavedIdentifier>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, site: &SiteId) -> Result<Option<SavedIdentifier>, CredentialError> {
        Ok(self.entries.read().get(site).cloned())
    }

    async fn save(
        &self,
        site: &SiteId,
        identifier: SavedIdentifier,
    ) -> Result<(), CredentialError> {
        self.entries.write().insert(site.clone(), identifier);
        Ok(())
    }

    async fn forget(&self, site: &SiteId) -> Result<(), CredentialError> {
        self.entries.write().remove(site);
        Ok(())
    }

    async fn sites(&self) -> Result<Vec<SiteId>, CredentialError> {
        let mut sites: Vec<SiteId> = self.entries.read().keys().cloned().collect();
        sites.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(sites)
    }
}
