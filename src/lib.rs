//! Trolley: verified retail automation behind a driver seam.
//!
//! This crate is the front door. It carries the CLI and re-exports the
//! workspace surface, so embedders depend on one crate and the `trolley`
//! binary and the integration tests speak the same names.

pub mod cli;

// Re-export the workspace surface for embedders and integration tests.
pub use trolley_core_types::{
    ActionId, ActionKind, ActionOutcome, ActionPayload, ActionRequest, AuthState, CartItem,
    CartState, LocatorStrategy, OutcomeStatus, SelectorKind, SessionId, SiteId, TargetSpec,
    TrolleyError,
};
pub use trolley_credential_store::{
    CredentialError, CredentialStore, FileStore, LoginKind, MemoryStore, SavedIdentifier,
};
pub use trolley_driver_port::{
    Driver, DriverError, ElementHandle, ScriptedDriver, ScriptedEffect, ScriptedElement,
    ScriptedPage, TabId,
};
pub use trolley_executor::{execute, ExecCtx, ExecDeps, ExecError, ExecReport, StepEvents};
pub use trolley_locator::{DriverResolver, ElementResolver, LocatorError, ResolveOptions};
pub use trolley_policy::{
    default_snapshot, load_snapshot, ExecPolicy, PolicyError, PolicySnapshot, PolicySource,
    PolicyView, QueuePolicy, VerifyPolicy,
};
pub use trolley_session::{
    EventDetail, SessionError, SessionEvent, SessionHandle, SessionSupervisor, SubmitHandle,
};
pub use trolley_site_profiles::{
    builtin_profiles, default_barriers, load_dir, load_file, BarrierRule, ProfileError,
    ProfileRegistry, SiteProfile, TargetSlot, TargetTable,
};
