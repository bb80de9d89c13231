//! Error taxonomy of the simulation kernel.

use thiserror::Error;

/// A strategy or sink tried to schedule an event it may not schedule.
///
/// This is a programmer error and is fatal to the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulingError {
    #[error("event time {time} is negative")]
    NegativeTime { time: f64 },

    #[error("event time {time} is before the current time {now}")]
    PastScheduling { time: f64, now: f64 },

    #[error("an equal event is already pending at time {time} with priority {priority}")]
    DuplicateEvent { time: f64, priority: i32 },

    #[error("event time {time} is not finite")]
    NonFiniteTime { time: f64 },
}

/// Invalid setup, raised before the run starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Batch runs must end on their own.
    #[error("unattended runs need a finite event or time limit")]
    Unbounded,

    #[error("configuration is frozen once the run has started")]
    Frozen,

    #[error("unknown recovery strategy {0:?}")]
    UnknownStrategy(String),
}

impl ConfigurationError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// A fault that halted a run. Preserved in
/// [`StopReason::Fault`](crate::StopReason::Fault); never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationFault {
    /// The event sink returned an error.
    #[error("event handler failed: {0}")]
    Handler(String),

    /// The event sink panicked.
    #[error("event handler panicked: {0}")]
    Panic(String),

    /// The event sink returned an event that could not be scheduled.
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}
