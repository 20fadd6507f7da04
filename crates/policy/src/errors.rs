use thiserror::Error;

use trolley_core_types::TrolleyError;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid policy: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<PolicyError> for TrolleyError {
    fn from(value: PolicyError) -> Self {
        TrolleyError::new(value.to_string())
    }
}
