use std::fmt;

use serde::{Deserialize, Serialize};

use crate::target::TargetSpec;

/// The high-level actions the executor knows how to run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Search,
    AddToCart,
    RemoveFromCart,
    SubmitCredential,
    ConfirmDialog,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Search => "search",
            ActionKind::AddToCart => "add_to_cart",
            ActionKind::RemoveFromCart => "remove_from_cart",
            ActionKind::SubmitCredential => "submit_credential",
            ActionKind::ConfirmDialog => "confirm_dialog",
        }
    }

    /// Kinds that make no sense once the session is rate limited.
    pub fn requires_auth_lane(&self) -> bool {
        matches!(self, ActionKind::SubmitCredential)
    }

    /// Kinds whose success is only believed after a cart read-back.
    pub fn mutates_cart(&self) -> bool {
        matches!(self, ActionKind::AddToCart | ActionKind::RemoveFromCart)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional per-action input: text to type, or a zero-based index picking
/// the n-th match of an index-addressed target (cart rows mostly).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPayload {
    Text(String),
    Index(usize),
}

impl ActionPayload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ActionPayload::Text(text) => Some(text),
            ActionPayload::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            ActionPayload::Text(_) => None,
            ActionPayload::Index(index) => Some(*index),
        }
    }
}

/// One unit of work for a session: what to do, where to find the element,
/// and what to feed it. `target` overrides the site profile's table entry
/// for the kind; leaving it out means "use the profile".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionRequest {
    pub kind: ActionKind,
    #[serde(default)]
    pub target: Option<TargetSpec>,
    #[serde(default)]
    pub payload: Option<ActionPayload>,
    /// Units to add for `AddToCart`; ignored by other kinds.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl ActionRequest {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            target: None,
            payload: None,
            quantity: 1,
        }
    }

    pub fn with_target(mut self, target: TargetSpec) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.payload = Some(ActionPayload::Text(text.into()));
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.payload = Some(ActionPayload::Index(index));
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.payload.as_ref().and_then(ActionPayload::as_text)
    }

    pub fn index(&self) -> Option<usize> {
        self.payload.as_ref().and_then(ActionPayload::as_index)
    }
}

/// Terminal classification of one action.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    /// Every strategy in the target list was tried and none matched.
    NotFound,
    /// A handle went stale and retries ran out before a fresh one worked.
    StaleElement,
    /// A barrier (rate limit wall, captcha, ...) stopped the action. Never
    /// retried automatically.
    Blocked { reason: String },
    /// The action dispatched but the expected post-condition never showed
    /// up inside the verify window.
    Timeout,
}

impl OutcomeStatus {
    pub fn name(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::NotFound => "not_found",
            OutcomeStatus::StaleElement => "stale_element",
            OutcomeStatus::Blocked { .. } => "blocked",
            OutcomeStatus::Timeout => "timeout",
        }
    }

    /// Worth another attempt with a fresh resolution. `NotFound` is not:
    /// the whole fallback list was already exhausted.
    pub fn is_transient(&self) -> bool {
        matches!(self, OutcomeStatus::StaleElement | OutcomeStatus::Timeout)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Blocked { reason } => write!(f, "blocked({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// What came back from running one `ActionRequest`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub status: OutcomeStatus,
    /// Free-form diagnostic for logs and operators; never parsed.
    pub message: String,
    /// Which strategy in the target list produced the element that carried
    /// the action. Selector-table health telemetry: a drifting site shows up
    /// as this index creeping away from zero.
    pub strategy_index: Option<usize>,
    /// Attempts consumed, including the successful one.
    pub attempts: u32,
}

impl ActionOutcome {
    pub fn new(status: OutcomeStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            strategy_index: None,
            attempts: 1,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Success, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::NotFound, message)
    }

    pub fn stale(message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::StaleElement, message)
    }

    pub fn blocked(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            OutcomeStatus::Blocked {
                reason: reason.into(),
            },
            message,
        )
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Timeout, message)
    }

    pub fn with_strategy(mut self, index: usize) -> Self {
        self.strategy_index = Some(index);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    pub fn blocked_reason(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Blocked { reason } => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::LocatorStrategy;

    #[test]
    fn request_builder_round_trip() {
        let req = ActionRequest::new(ActionKind::AddToCart)
            .with_target(TargetSpec::single(
                "add",
                LocatorStrategy::css("button.add"),
            ))
            .with_quantity(2);
        assert_eq!(req.kind, ActionKind::AddToCart);
        assert_eq!(req.quantity, 2);
        assert!(req.text().is_none());
    }

    #[test]
    fn quantity_defaults_to_one_in_serde() {
        let json = r#"{ "kind": "add_to_cart" }"#;
        let req: ActionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.quantity, 1);
        assert!(req.target.is_none());
    }

    #[test]
    fn transient_statuses() {
        assert!(OutcomeStatus::StaleElement.is_transient());
        assert!(OutcomeStatus::Timeout.is_transient());
        assert!(!OutcomeStatus::NotFound.is_transient());
        assert!(!OutcomeStatus::Blocked {
            reason: "rate_limited".into()
        }
        .is_transient());
    }

    #[test]
    fn blocked_reason_is_readable() {
        let outcome = ActionOutcome::blocked("rate_limited", "login wall");
        assert_eq!(outcome.blocked_reason(), Some("rate_limited"));
        assert_eq!(outcome.status.to_string(), "blocked(rate_limited)");
    }
}
