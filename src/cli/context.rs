use std::path::{Path, PathBuf};

use anyhow::Result;

use trolley_credential_store::FileStore;
use trolley_policy::{PolicySnapshot, PolicyView};
use trolley_site_profiles::ProfileRegistry;

/// Everything a command needs, loaded once by [`super::runtime::load_stack`].
pub struct CliContext {
    snapshot: PolicySnapshot,
    policy_path: Option<PathBuf>,
    registry: ProfileRegistry,
    credentials_path: Option<PathBuf>,
}

impl CliContext {
    pub fn new(
        snapshot: PolicySnapshot,
        policy_path: Option<PathBuf>,
        registry: ProfileRegistry,
        credentials_path: Option<PathBuf>,
    ) -> Self {
        Self {
            snapshot,
            policy_path,
            registry,
            credentials_path,
        }
    }

    pub fn snapshot(&self) -> &PolicySnapshot {
        &self.snapshot
    }

    /// Frozen view sessions run under.
    pub fn view(&self) -> PolicyView {
        self.snapshot.clone().into()
    }

    pub fn policy_path(&self) -> Option<&Path> {
        self.policy_path.as_deref()
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn store(&self) -> Result<FileStore> {
        match &self.credentials_path {
            Some(path) => Ok(FileStore::new(path.clone())),
            None => Ok(FileStore::at_default_location()?),
        }
    }
}
