use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginKind {
    /// The site sends a one-time code; there is no password to store.
    Otp,
    Password,
}

/// What the store hands out: enough to prefill the identifier field,
/// nothing more.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SavedIdentifier {
    pub username: String,
    pub kind: LoginKind,
    pub saved_at: DateTime<Utc>,
}

impl SavedIdentifier {
    pub fn otp(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            kind: LoginKind::Otp,
            saved_at: Utc::now(),
        }
    }

    pub fn is_otp(&self) -> bool {
        self.kind == LoginKind::Otp
    }
}
