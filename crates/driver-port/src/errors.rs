use thiserror::Error;

use trolley_core_types::TrolleyError;

#[derive(Debug, Error, Clone)]
pub enum DriverError {
    /// The handle refers to an element the page no longer renders the same
    /// way. Callers re-resolve; they never retry the handle.
    #[error("stale element handle: {handle}")]
    StaleHandle { handle: String },

    #[error("invalid selector '{expression}': {reason}")]
    InvalidSelector { expression: String, reason: String },

    #[error("selector kind {kind} not supported by this driver")]
    UnsupportedKind { kind: String },

    #[error("unknown tab: {tab}")]
    UnknownTab { tab: String },

    /// The browser or its connection is gone. Fatal to the owning session.
    #[error("driver i/o failure: {message}")]
    Io { message: String },

    #[error("driver timed out: {what}")]
    Timeout { what: String },
}

impl DriverError {
    pub fn stale(handle: impl Into<String>) -> Self {
        Self::StaleHandle {
            handle: handle.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, DriverError::StaleHandle { .. })
    }

    /// Fatal errors tear the session down; everything else is answered with
    /// an outcome and the session lives on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::Io { .. })
    }
}

impl From<DriverError> for TrolleyError {
    fn from(err: DriverError) -> Self {
        TrolleyError::new(err.to_string())
    }
}
