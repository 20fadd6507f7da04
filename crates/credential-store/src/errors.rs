use thiserror::Error;

use trolley_core_types::TrolleyError;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential store i/o: {0}")]
    Io(String),

    #[error("credential store is corrupt: {0}")]
    Corrupt(String),

    #[error("no config directory on this system")]
    NoConfigDir,
}

impl From<CredentialError> for TrolleyError {
    fn from(err: CredentialError) -> Self {
        TrolleyError::new(err.to_string())
    }
}
