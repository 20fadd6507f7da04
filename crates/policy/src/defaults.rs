use crate::model::{ExecPolicy, PolicySnapshot, QueuePolicy, VerifyPolicy};

/// The numbers Trolley runs with when nobody configures anything. Tuned
/// against slow retail pages: generous verify windows, few attempts.
pub fn default_snapshot() -> PolicySnapshot {
    PolicySnapshot {
        rev: 1,
        exec: ExecPolicy {
            max_attempts: 3,
            backoff_ms: 250,
            step_timeout_ms: 8_000,
            action_timeout_ms: 25_000,
            settle_ms: 400,
        },
        verify: VerifyPolicy {
            verify_timeout_ms: 4_000,
            poll_interval_ms: 150,
            confirm_window_ms: 2_000,
        },
        queue: QueuePolicy {
            capacity: 32,
            event_buffer: 256,
        },
        provenance: Default::default(),
    }
}
