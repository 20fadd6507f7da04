use std::path::PathBuf;

use thiserror::Error;

use trolley_core_types::TrolleyError;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("cannot read profile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse profile {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no profile registered for site '{site}'")]
    UnknownSite { site: String },
}

impl From<ProfileError> for TrolleyError {
    fn from(err: ProfileError) -> Self {
        TrolleyError::new(err.to_string())
    }
}
