use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::default_snapshot;

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PolicySnapshot {
    pub rev: u64,
    pub exec: ExecPolicy,
    pub verify: VerifyPolicy,
    pub queue: QueuePolicy,
    pub provenance: HashMap<String, PolicyProvenance>,
}

impl PolicySnapshot {
    pub fn set_provenance(&mut self, path: &str, source: PolicySource) {
        self.provenance.insert(
            path.to_string(),
            PolicyProvenance {
                path: path.to_string(),
                source,
            },
        );
    }
}

/// Attempt budget and pacing for one action.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ExecPolicy {
    /// Attempts per action, the first one included. Only transient
    /// failures (stale handle, verify timeout) consume extra attempts.
    pub max_attempts: u32,
    /// Base backoff between attempts; attempt n waits n times this.
    pub backoff_ms: u64,
    /// Budget for one attempt end to end.
    pub step_timeout_ms: u64,
    /// Budget for the whole action, all retries included.
    pub action_timeout_ms: u64,
    /// Pause between dispatching a primitive and the first verification
    /// read, so the site gets a chance to repaint.
    pub settle_ms: u64,
}

/// Read-back verification pacing.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct VerifyPolicy {
    pub verify_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// How long a confirmation dialog gets to appear after the primary
    /// click before the flow proceeds without one.
    pub confirm_window_ms: u64,
}

/// Per-session queue sizing.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct QueuePolicy {
    pub capacity: usize,
    pub event_buffer: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyProvenance {
    pub path: String,
    pub source: PolicySource,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PolicySource {
    Builtin,
    File,
    Env,
}

/// Frozen, provenance-free copy handed to sessions and the executor.
#[derive(Clone, Debug)]
pub struct PolicyView {
    pub rev: u64,
    pub exec: ExecPolicy,
    pub verify: VerifyPolicy,
    pub queue: QueuePolicy,
}

impl From<PolicySnapshot> for PolicyView {
    fn from(snapshot: PolicySnapshot) -> Self {
        Self {
            rev: snapshot.rev,
            exec: snapshot.exec,
            verify: snapshot.verify,
            queue: snapshot.queue,
        }
    }
}

impl Default for PolicyView {
    fn default() -> Self {
        default_snapshot().into()
    }
}

impl PolicyView {
    pub fn max_attempts(&self) -> u32 {
        self.exec.max_attempts.max(1)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.exec.backoff_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.exec.step_timeout_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.exec.action_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.exec.settle_ms)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify.verify_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.verify.poll_interval_ms.max(10))
    }

    pub fn confirm_window(&self) -> Duration {
        Duration::from_millis(self.verify.confirm_window_ms)
    }
}
