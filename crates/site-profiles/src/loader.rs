use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use trolley_core_types::SiteId;

use crate::builtin::{builtin_profiles, default_barriers};
use crate::errors::ProfileError;
use crate::model::SiteProfile;

/// Loads one profile file. A file that defines no barrier rules gets the
/// default set; a site with genuinely no barriers is not a thing we have
/// met.
pub fn load_file(path: &Path) -> Result<SiteProfile, ProfileError> {
    let text = fs::read_to_string(path).map_err(|source| ProfileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut profile: SiteProfile =
        serde_yaml::from_str(&text).map_err(|source| ProfileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if profile.barriers.is_empty() {
        debug!(site = %profile.id, "profile defines no barriers, applying defaults");
        profile.barriers = default_barriers();
    }
    Ok(profile)
}

/// Loads every `*.yaml` / `*.yml` in `dir`, sorted by file name. A missing
/// directory is an empty set, not an error.
pub fn load_dir(dir: &Path) -> Result<Vec<SiteProfile>, ProfileError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|source| ProfileError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    paths.sort();

    let mut profiles = Vec::with_capacity(paths.len());
    for path in paths {
        profiles.push(load_file(&path)?);
    }
    Ok(profiles)
}

/// All known profiles, builtins plus whatever an operator dropped into the
/// profile directory. File entries replace builtins with the same id.
pub struct ProfileRegistry {
    profiles: HashMap<SiteId, SiteProfile>,
}

impl ProfileRegistry {
    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for profile in builtin_profiles() {
            registry.profiles.insert(profile.id.clone(), profile);
        }
        registry
    }

    pub fn insert(&mut self, profile: SiteProfile) {
        if self.profiles.contains_key(&profile.id) {
            info!(site = %profile.id, "profile replaced");
        }
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Returns how many profiles the directory contributed.
    pub fn merge_dir(&mut self, dir: &Path) -> Result<usize, ProfileError> {
        let loaded = load_dir(dir)?;
        let count = loaded.len();
        if count == 0 {
            warn!(dir = %dir.display(), "no profiles found, builtins only");
        }
        for profile in loaded {
            self.insert(profile);
        }
        Ok(count)
    }

    pub fn get(&self, site: &SiteId) -> Option<&SiteProfile> {
        self.profiles.get(site)
    }

    pub fn require(&self, site: &SiteId) -> Result<&SiteProfile, ProfileError> {
        self.get(site).ok_or_else(|| ProfileError::UnknownSite {
            site: site.to_string(),
        })
    }

    pub fn ids(&self) -> Vec<SiteId> {
        let mut ids: Vec<SiteId> = self.profiles.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
