//! Simulator error types.

use hdrhistogram::CreationError;
use resilience_core::{ConfigurationError, SchedulingError, SimulationFault};
use resilience_recovery::RecoveryError;
use resilience_types::StateError;
use thiserror::Error;

/// Errors raised while building or running a scenario.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("invalid topology: {0}")]
    Topology(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    #[error("cannot create latency histogram: {0}")]
    Histogram(#[from] CreationError),

    /// The run halted on a fault instead of reaching its limits.
    #[error("run stopped by a fault: {0}")]
    Fault(SimulationFault),
}
