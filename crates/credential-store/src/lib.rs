//! Saved identifiers for login flows.
//!
//! The executor only ever needs "which email/phone do I type for this
//! site", so that is all the port hands out. OTP accounts have no password
//! at all; password-kind records written by other tooling are recognized
//! but their secret never crosses this API.

mod api;
mod errors;
mod file;
mod memory;
mod model;

pub use api::CredentialStore;
pub use errors::CredentialError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use model::{LoginKind, SavedIdentifier};
