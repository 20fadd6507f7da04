use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use trolley_core_types::SiteId;

use crate::api::CredentialStore;
use crate::errors::CredentialError;
use crate::model::{LoginKind, SavedIdentifier};

/// Marker stored in the password slot of OTP accounts; kept for file-level
/// compatibility with older tooling that reads the same store.
const OTP_MARKER: &str = "otp_required";

/// On-disk record. `password` is only ever the OTP marker or a secret some
/// other tool wrote; this crate reads around it and never returns it.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct FileRecord {
    username: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    login_type: Option<String>,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    fn kind(&self) -> LoginKind {
        let marked_otp = self.login_type.as_deref() == Some("otp")
            || self.password.as_deref() == Some(OTP_MARKER);
        if marked_otp {
            LoginKind::Otp
        } else {
            LoginKind::Password
        }
    }
}

/// Single-file store: a JSON map keyed by site id, base64-encoded at rest.
/// The encoding is obfuscation against shoulder surfing, not cryptography;
/// the file lives under the user config dir with owner-only permissions.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_default_location() -> Result<Self, CredentialError> {
        let mut path = dirs::config_dir().ok_or(CredentialError::NoConfigDir)?;
        path.push("trolley");
        path.push("credentials.dat");
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, FileRecord>, CredentialError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(err) => return Err(CredentialError::Io(err.to_string())),
        };
        let decoded = Base64
            .decode(raw.trim())
            .map_err(|err| CredentialError::Corrupt(format!("base64: {err}")))?;
        serde_json::from_slice(&decoded)
            .map_err(|err| CredentialError::Corrupt(format!("json: {err}")))
    }

    fn write_all(&self, records: &BTreeMap<String, FileRecord>) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| CredentialError::Io(err.to_string()))?;
        }
        let json =
            serde_json::to_vec(records).map_err(|err| CredentialError::Io(err.to_string()))?;
        fs::write(&self.path, Base64.encode(json))
            .map_err(|err| CredentialError::Io(err.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, perms)
                .map_err(|err| CredentialError::Io(err.to_string()))?;
        }
        debug!(path = %self.path.display(), entries = records.len(), "credential store written");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn get(&self, site: &SiteId) -> Result<Option<SavedIdentifier>, CredentialError> {
        let records = self.read_all()?;
        Ok(records.get(site.as_str()).map(|record| SavedIdentifier {
            username: record.username.clone(),
            kind: record.kind(),
            saved_at: record.saved_at.unwrap_or_else(Utc::now),
        }))
    }

    async fn save(
        &self,
        site: &SiteId,
        identifier: SavedIdentifier,
    ) -> Result<(), CredentialError> {
        let mut records = self.read_all()?;
        let record = FileRecord {
            username: identifier.username,
            password: match identifier.kind {
                LoginKind::Otp => Some(OTP_MARKER.to_string()),
                // No secret ever enters through this API; keep whatever an
                // older record carried.
                LoginKind::Password => records
                    .get(site.as_str())
                    .and_then(|old| old.password.clone()),
            },
            login_type: Some(match identifier.kind {
                LoginKind::Otp => "otp".to_string(),
                LoginKind::Password => "password".to_string(),
            }),
            saved_at: Some(identifier.saved_at),
        };
        records.insert(site.as_str().to_string(), record);
        self.write_all(&records)
    }

    async fn forget(&self, site: &SiteId) -> Result<(), CredentialError> {
        let mut records = self.read_all()?;
        if records.remove(site.as_str()).is_some() {
            self.write_all(&records)?;
        }
        Ok(())
    }

    async fn sites(&self) -> Result<Vec<SiteId>, CredentialError> {
        let records = self.read_all()?;
        Ok(records.keys().map(|site| SiteId::new(site.as_str())).collect())
    }
}
