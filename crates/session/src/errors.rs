use thiserror::Error;

use trolley_core_types::TrolleyError;

/// Ways a session can refuse or lose an action without producing an
/// [`ActionOutcome`](trolley_core_types::ActionOutcome). `Failed` is the
/// load-bearing one: it means the session itself is dead (driver gone or a
/// fatal barrier hit) and every action still waiting resolves with it, so
/// callers can tell "your action lost its session" apart from "your action
/// ran and this is what the page said".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session tore down. Carried verbatim to every queued action and to
    /// every later submit attempt.
    #[error("session failed: {0}")]
    Failed(String),

    /// The bounded queue had no room. The action was never accepted; nothing
    /// waits on it.
    #[error("session queue is full ({capacity} slots)")]
    QueueFull { capacity: usize },

    /// The session was closed before the action could run.
    #[error("session is closed")]
    Closed,

    /// Cancelled while still queued. Actions already running are never
    /// interrupted by a cancel.
    #[error("action cancelled while queued")]
    Cancelled,

    /// The request itself was unusable (a search with no query, say). The
    /// session is fine; resubmit a corrected request.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl From<SessionError> for TrolleyError {
    fn from(err: SessionError) -> Self {
        TrolleyError::new(err.to_string())
    }
}
