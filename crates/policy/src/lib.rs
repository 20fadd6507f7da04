//! Runtime tunables.
//!
//! Layered the usual way: builtin defaults, then an optional YAML file,
//! then `TROLLEY_POLICY__` environment overlays (double underscore walks
//! into nested sections, `TROLLEY_POLICY__EXEC__MAX_ATTEMPTS=5`). Sessions
//! and the executor consume a frozen [`PolicyView`]; nothing re-reads the
//! environment after startup.

mod defaults;
mod errors;
mod loader;
mod model;

pub use defaults::default_snapshot;
pub use errors::PolicyError;
pub use loader::load_snapshot;
pub use model::{
    ExecPolicy, PolicyProvenance, PolicySnapshot, PolicySource, PolicyView, QueuePolicy,
    VerifyPolicy,
};
