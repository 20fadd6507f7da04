use thiserror::Error;

/// Workspace-spanning error wrapper. Leaf crates keep their own error enums
/// and convert into this at the boundary.
#[derive(Debug, Error, Clone)]
pub enum TrolleyError {
    #[error("{message}")]
    Message { message: String },
}

impl TrolleyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}
