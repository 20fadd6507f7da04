use async_trait::async_trait;

use trolley_core_types::SiteId;

use crate::errors::CredentialError;
use crate::model::SavedIdentifier;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, site: &SiteId) -> Result<Option<SavedIdentifier>, CredentialError>;

    async fn save(
        &self,
        site: &SiteId,
        identifier: SavedIdentifier,
    ) -> Result<(), CredentialError>;

    async fn forget(&self, site: &SiteId) -> Result<(), CredentialError>;

    async fn sites(&self) -> Result<Vec<SiteId>, CredentialError>;
}
