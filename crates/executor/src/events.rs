use async_trait::async_trait;

use trolley_core_types::{ActionId, ActionKind, OutcomeStatus};

/// Step-level telemetry hooks. The session worker forwards these onto its
/// event bus; callers that do not care plug in [`NoopEvents`].
#[async_trait]
pub trait StepEvents: Send + Sync {
    async fn attempt_started(&self, action: &ActionId, kind: ActionKind, attempt: u32);

    /// Which entry of the fallback list produced the element that carries
    /// the action.
    async fn target_resolved(&self, action: &ActionId, target: &str, strategy_index: usize);

    async fn attempt_finished(&self, action: &ActionId, status: &OutcomeStatus, attempt: u32);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEvents;

#[async_trait]
impl StepEvents for NoopEvents {
    async fn attempt_started(&self, _action: &ActionId, _kind: ActionKind, _attempt: u32) {}

    async fn target_resolved(&self, _action: &ActionId, _target: &str, _strategy_index: usize) {}

    async fn attempt_finished(&self, _action: &ActionId, _status: &OutcomeStatus, _attempt: u32) {}
}
