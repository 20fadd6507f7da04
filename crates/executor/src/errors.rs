use thiserror::Error;

use trolley_core_types::TrolleyError;
use trolley_driver_port::DriverError;

/// Failures that have no expression as a terminal outcome: the caller broke
/// the contract, the run was cancelled before it touched the page, or the
/// driver connection itself died. Everything else an action can hit comes
/// back as an outcome, not an error.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("action cancelled before it ran")]
    Cancelled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl ExecError {
    /// Fatal errors end the owning session, not just the action.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecError::Driver(err) if err.is_fatal())
    }
}

impl From<ExecError> for TrolleyError {
    fn from(err: ExecError) -> Self {
        TrolleyError::new(err.to_string())
    }
}
