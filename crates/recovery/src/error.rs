//! Recovery error types.

use resilience_core::ConfigurationError;
use resilience_types::StateError;
use thiserror::Error;

/// Errors raised by the resilience engine and recovery strategies.
///
/// Any of these returned from event processing halts the run with a fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecoveryError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A strategy failed outside of the per-route recovery attempts.
    #[error("strategy {strategy} failed: {reason}")]
    Strategy {
        strategy: &'static str,
        reason: String,
    },

    /// `process_event` was called before `initialize`.
    #[error("strategy {0} is not initialized")]
    NotInitialized(&'static str),
}
