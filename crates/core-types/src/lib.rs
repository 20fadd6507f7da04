//! Shared vocabulary for the Trolley workspace.
//!
//! Everything here is plain data: ids, locator strategies, action requests
//! and outcomes, cart snapshots and auth states. No crate in the workspace
//! talks to a page through anything not described by these types.

mod action;
mod auth;
mod cart;
mod error;
mod ids;
mod target;

pub use action::{ActionKind, ActionOutcome, ActionPayload, ActionRequest, OutcomeStatus};
pub use auth::AuthState;
pub use cart::{CartItem, CartState};
pub use error::TrolleyError;
pub use ids::{ActionId, SessionId, SiteId};
pub use target::{LocatorStrategy, SelectorKind, TargetSpec};
