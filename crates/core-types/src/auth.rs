use std::fmt;

use serde::{Deserialize, Serialize};

/// Authentication phase of a session, driven only by what the page shows.
/// Sending an identifier does not move the state; seeing the OTP challenge
/// does.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Anonymous,
    AwaitingOtp,
    Authenticated,
    /// Sticky: once a session lands here it stays here. Starting over means
    /// a new session.
    RateLimited,
}

impl AuthState {
    pub fn name(&self) -> &'static str {
        match self {
            AuthState::Anonymous => "anonymous",
            AuthState::AwaitingOtp => "awaiting_otp",
            AuthState::Authenticated => "authenticated",
            AuthState::RateLimited => "rate_limited",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::RateLimited)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
