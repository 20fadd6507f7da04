//! One session = one driver, one worker task, one bounded queue.
//!
//! The worker owns the browser handle outright; callers reach it only
//! through [`SessionHandle::submit`], which queues work and hands back a
//! [`SubmitHandle`] resolving to the action's terminal result. Actions run
//! strictly in submission order, one at a time. Cancellation reaches
//! queued actions only; whatever is already touching the page runs to its
//! own terminal state.
//!
//! The session is also where observations become state: auth transitions
//! reported by the executor are committed here (with `RateLimited` sticky
//! until the session dies), and the last verified cart snapshot is cached
//! for cheap reads. A fatal driver loss or fatal barrier drains the queue
//! with [`SessionError::Failed`] and refuses everything afterwards, which
//! keeps "the session died" distinct from every page-level outcome.

mod api;
mod auth;
mod errors;
mod events;
mod model;
mod supervisor;
mod worker;

#[cfg(test)]
mod testkit;

pub use api::SessionHandle;
pub use errors::SessionError;
pub use events::{EventDetail, SessionEvent};
pub use model::SubmitHandle;
pub use supervisor::SessionSupervisor;
