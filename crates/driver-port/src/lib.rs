//! The driver seam.
//!
//! Trolley never speaks CDP, WebDriver or anything browser-shaped itself;
//! everything goes through the [`Driver`] trait and whoever constructs a
//! session injects an implementation. The crate also ships
//! [`ScriptedDriver`], a deterministic in-memory implementation that the
//! rest of the workspace tests against and the CLI uses for dry runs.

mod errors;
mod port;
mod scripted;

pub use errors::DriverError;
pub use port::{Driver, ElementHandle, TabId};
pub use scripted::{ScriptedDriver, ScriptedEffect, ScriptedElement, ScriptedPage};
