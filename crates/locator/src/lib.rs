//! Multi-strategy element resolution.
//!
//! A target is an ordered list of locator strategies. Resolution walks the
//! list: the first strategy that yields at least one usable candidate wins
//! and later strategies are never consulted. Ties inside a strategy go to
//! document order unless the caller addresses the n-th match explicitly.
//!
//! Nothing here caches. A resolution is good for one attempt; retries and
//! confirmation steps resolve again from scratch.

mod errors;
mod resolver;

pub use errors::LocatorError;
pub use resolver::{DriverResolver, ElementResolver, ResolveOptions, Resolution, ResolutionSet};
