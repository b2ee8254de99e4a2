//! Error types for the spike scheduler, graph registries, and propagator.

use thiserror::Error;

use spikenet_storage::ValidationReport;

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors produced by the engine core (§7's taxonomy, resolved into Rust types).
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Wraps an error from the persistence/identifier layer.
    #[error("storage error: {source}")]
    Storage {
        #[from]
        source: spikenet_storage::StorageError,
    },

    /// A `schedule_spike`/`schedule_retrograde_spike` call named a time
    /// beyond `N_slots * step_ms` from the scheduler's current time.
    #[error("scheduled time {scheduled_time_ms}ms is beyond the {horizon_ms}ms look-ahead horizon")]
    HorizonOverflow {
        scheduled_time_ms: f64,
        horizon_ms: f64,
    },

    /// A scheduling call named a time in a slot that has already drained.
    #[error("scheduled time {scheduled_time_ms}ms falls in a slot already drained at {current_time_ms}ms")]
    SlotAlreadyDrained {
        scheduled_time_ms: f64,
        current_time_ms: f64,
    },

    /// `schedule_spike` was called while the scheduler is Idle or Stopping.
    #[error("scheduler is not running")]
    SchedulerNotRunning,

    /// A registry lookup resolved to no known entity of the expected kind.
    #[error("unknown {kind} id {id}")]
    UnknownId { kind: &'static str, id: u64 },

    /// A worker-pool task panicked during delivery. Contained to the pool;
    /// the scheduler and its other tasks continue unaffected.
    #[error("worker task failed: {reason}")]
    TaskFailure { reason: String },

    /// Structural or connectivity validation failed. Carries the full
    /// report rather than a single message — callers inspect severities.
    #[error("validation failed with {} issue(s)", .0.issues.len())]
    ValidationFailed(ValidationReport),

    /// A configuration struct (`SchedulerConfig`, `StdpParams`, `NeuronConfig`)
    /// failed its `validate()` check at construction time.
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
}

impl RuntimeError {
    pub fn unknown_id(kind: &'static str, id: u64) -> Self {
        Self::UnknownId { kind, id }
    }

    pub fn invalid_config(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidConfig { field, reason }
    }

    pub fn horizon_overflow(scheduled_time_ms: f64, horizon_ms: f64) -> Self {
        Self::HorizonOverflow {
            scheduled_time_ms,
            horizon_ms,
        }
    }

    pub fn slot_already_drained(scheduled_time_ms: f64, current_time_ms: f64) -> Self {
        Self::SlotAlreadyDrained {
            scheduled_time_ms,
            current_time_ms,
        }
    }

    pub fn task_failure(reason: impl Into<String>) -> Self {
        Self::TaskFailure {
            reason: reason.into(),
        }
    }
}
