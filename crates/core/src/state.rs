//! Run state machine states.

use crate::SimulationFault;
use std::fmt;

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// Stopped by an external control request.
    Requested,
    /// The event set drained in unattended mode, or a termination limit was reached.
    EndOfSimulation,
    /// The event sink failed.
    Fault(SimulationFault),
}

/// State of a simulation run.
///
/// ```text
/// NotStarted → Running ⇄ Paused ⇄ Step → Stopped
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationState {
    NotStarted,
    Running,
    Paused,
    /// Process exactly one event, then pause.
    Step,
    /// Terminal.
    Stopped(StopReason),
}

impl SimulationState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, SimulationState::Stopped(_))
    }

    /// Whether the driver is allowed to start another event in this state.
    pub fn is_processing(&self) -> bool {
        matches!(self, SimulationState::Running | SimulationState::Step)
    }

    /// Get a human-readable name for this state.
    pub fn name(&self) -> &'static str {
        match self {
            SimulationState::NotStarted => "NotStarted",
            SimulationState::Running => "Running",
            SimulationState::Paused => "Paused",
            SimulationState::Step => "Step",
            SimulationState::Stopped(_) => "Stopped",
        }
    }

    /// The fault carried by a faulted stop, if any.
    pub fn fault(&self) -> Option<&SimulationFault> {
        match self {
            SimulationState::Stopped(StopReason::Fault(fault)) => Some(fault),
            _ => None,
        }
    }
}

impl fmt::Display for SimulationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationState::Stopped(StopReason::Fault(fault)) => write!(f, "Stopped({fault})"),
            SimulationState::Stopped(reason) => write!(f, "Stopped({reason:?})"),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_queries() {
        assert!(SimulationState::Running.is_processing());
        assert!(SimulationState::Step.is_processing());
        assert!(!SimulationState::Paused.is_processing());

        let faulted = SimulationState::Stopped(StopReason::Fault(SimulationFault::Handler(
            "boom".to_string(),
        )));
        assert!(faulted.is_stopped());
        assert_eq!(
            faulted.fault(),
            Some(&SimulationFault::Handler("boom".to_string()))
        );
        assert_eq!(faulted.to_string(), "Stopped(event handler failed: boom)");
        assert_eq!(
            SimulationState::Stopped(StopReason::EndOfSimulation).to_string(),
            "Stopped(EndOfSimulation)"
        );
    }
}
