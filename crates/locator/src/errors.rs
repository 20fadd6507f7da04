use thiserror::Error;

use trolley_core_types::TrolleyError;
use trolley_driver_port::DriverError;

#[derive(Debug, Error)]
pub enum LocatorError {
    /// Every strategy in the target's list was tried; none produced a
    /// usable candidate. `tried` names each strategy and why it failed.
    #[error("no element for '{target}': {tried}")]
    NotFound { target: String, tried: String },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl LocatorError {
    /// True when resolving again with a fresh page read may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LocatorError::NotFound { .. } => false,
            LocatorError::Driver(err) => err.is_stale(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        match self {
            LocatorError::NotFound { .. } => false,
            LocatorError::Driver(err) => err.is_fatal(),
        }
    }
}

impl From<LocatorError> for TrolleyError {
    fn from(err: LocatorError) -> Self {
        TrolleyError::new(err.to_string())
    }
}
