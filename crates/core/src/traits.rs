//! The event sink driven by the simulation driver.

use crate::{SimulationState, TimedEvent};
use std::fmt::Display;

/// Consumer of timed events.
///
/// The driver pops events in order and hands them to the sink one at a time.
/// Exactly one event is in flight at any moment, so implementations mutate
/// their own state without synchronization.
///
/// # Example
///
/// ```ignore
/// impl EventSink for ResilienceEngine {
///     type Payload = NetworkEvent;
///     type Error = RecoveryError;
///
///     fn process_event(
///         &mut self,
///         event: TimedEvent<NetworkEvent>,
///     ) -> Result<Vec<TimedEvent<NetworkEvent>>, RecoveryError> {
///         let effect = self.compute_effect(event.payload())?;
///         // ... let the strategy react, apply its actions
///         Ok(self.failure_model.follow_up(&event))
///     }
/// }
/// ```
pub trait EventSink {
    /// Event payload type.
    type Payload;

    /// Error returned by [`process_event`](EventSink::process_event). Any
    /// error halts the run with a fault.
    type Error: Display;

    /// Process one event, returning new events to schedule.
    ///
    /// # Guarantees
    ///
    /// - **Serialized**: never called concurrently with itself or any other
    ///   method of the sink
    /// - **Ordered**: events arrive in non-decreasing time order
    ///
    /// Returned events must not be dated before `event.time()`.
    fn process_event(
        &mut self,
        event: TimedEvent<Self::Payload>,
    ) -> Result<Vec<TimedEvent<Self::Payload>>, Self::Error>;

    /// Called once when the transitory period ends.
    fn end_of_transitory(&mut self, _time: f64) {}

    /// Progress notification. `force` is set at the end of a run segment.
    fn refresh(&mut self, _force: bool) {}

    /// Called after every run state transition.
    fn simulation_state_changed(&mut self, _state: &SimulationState) {}
}
