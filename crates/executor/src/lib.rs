//! Runs one action against one driver, to a terminal outcome.
//!
//! The pipeline for every kind is the same shape: resolve the target
//! through its fallback list, dispatch the primitive, give the page a
//! moment to settle, then poll for the kind's post-condition until the
//! verify window closes. Nothing is believed without that read-back; a
//! dispatched click whose effect never shows up is a `Timeout`, not a
//! success.
//!
//! Only transient failures (stale handles, verify timeouts) are retried,
//! each retry a fresh resolution. `Blocked` and `NotFound` end the action
//! on the spot. The executor holds no state between runs; the session
//! owns the driver and folds the report's observations into its own
//! cart and auth state.

mod auth;
mod cart;
mod errors;
mod events;
mod model;
mod runner;

pub use auth::{classify, detect_barrier, BarrierHit, PageAuthSignal};
pub use cart::{CartProbe, CartReader};
pub use errors::ExecError;
pub use events::{NoopEvents, StepEvents};
pub use model::{ExecCtx, ExecDeps, ExecReport};
pub use runner::execute;
