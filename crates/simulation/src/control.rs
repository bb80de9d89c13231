//! Cross-thread control of a running driver.
//!
//! The driver owns the run; a [`DriverHandle`] posts pause/resume/step/stop
//! requests from any other thread. Requests are linearized against event
//! processing: a request made while an event is in flight blocks until the
//! event completes, and the driver only picks requests up between events.

use parking_lot::{Condvar, Mutex};
use resilience_core::SimulationState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// A state-change request posted to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    Pause,
    Resume,
    /// Process exactly one event, then pause.
    Step,
    Stop,
}

/// Snapshot of the driver as seen from a control thread.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverStatus {
    pub state: SimulationState,
    pub events_processed: u64,
}

#[derive(Debug)]
struct Shared {
    state: SimulationState,
    events_processed: u64,
    request: Option<ControlRequest>,
    in_flight: bool,
}

#[derive(Debug)]
pub(crate) struct DriverControl {
    shared: Mutex<Shared>,
    changed: Condvar,
}

impl DriverControl {
    pub(crate) fn new() -> Self {
        Self {
            shared: Mutex::new(Shared {
                state: SimulationState::NotStarted,
                events_processed: 0,
                request: None,
                in_flight: false,
            }),
            changed: Condvar::new(),
        }
    }

    /// Claim the next event slot.
    ///
    /// Returns the pending request instead when there is one; the event slot
    /// is then not claimed.
    pub(crate) fn begin_event(&self) -> Result<(), ControlRequest> {
        let mut shared = self.shared.lock();
        if let Some(request) = shared.request.take() {
            return Err(request);
        }
        shared.in_flight = true;
        Ok(())
    }

    /// Release the event slot and wake blocked requesters.
    pub(crate) fn end_event(&self, events_processed: u64) {
        let mut shared = self.shared.lock();
        shared.in_flight = false;
        shared.events_processed = events_processed;
        self.changed.notify_all();
    }

    pub(crate) fn publish_state(&self, state: &SimulationState) {
        let mut shared = self.shared.lock();
        shared.state = state.clone();
        self.changed.notify_all();
    }

    /// Block until a request is posted and take it.
    pub(crate) fn wait_for_request(&self) -> ControlRequest {
        let mut shared = self.shared.lock();
        loop {
            if let Some(request) = shared.request.take() {
                return request;
            }
            self.changed.wait(&mut shared);
        }
    }

    pub(crate) fn reset(&self) {
        let mut shared = self.shared.lock();
        shared.state = SimulationState::NotStarted;
        shared.events_processed = 0;
        shared.request = None;
        shared.in_flight = false;
        self.changed.notify_all();
    }

    fn post(&self, request: ControlRequest) -> bool {
        let mut shared = self.shared.lock();
        while shared.in_flight {
            self.changed.wait(&mut shared);
        }
        if shared.state.is_stopped() {
            return false;
        }
        // A stop cannot be overridden by a later request.
        if shared.request != Some(ControlRequest::Stop) {
            shared.request = Some(request);
        }
        self.changed.notify_all();
        true
    }
}

/// Control handle for a [`SimulationDriver`](crate::SimulationDriver).
///
/// Cheap to clone and `Send`, so it can be moved to a UI or supervisor
/// thread while the driver runs on its own worker thread.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    control: Arc<DriverControl>,
}

impl DriverHandle {
    pub(crate) fn new(control: Arc<DriverControl>) -> Self {
        Self { control }
    }

    /// Current state and progress.
    pub fn status(&self) -> DriverStatus {
        let shared = self.control.shared.lock();
        DriverStatus {
            state: shared.state.clone(),
            events_processed: shared.events_processed,
        }
    }

    pub fn state(&self) -> SimulationState {
        self.control.shared.lock().state.clone()
    }

    /// Ask the driver to pause after the in-flight event.
    ///
    /// Returns `false` when the run has already stopped.
    pub fn pause(&self) -> bool {
        self.request(ControlRequest::Pause)
    }

    pub fn resume(&self) -> bool {
        self.request(ControlRequest::Resume)
    }

    /// Ask a paused driver to process one event.
    pub fn step(&self) -> bool {
        self.request(ControlRequest::Step)
    }

    /// Ask the driver to stop. No event starts once the stop is observed.
    pub fn stop(&self) -> bool {
        self.request(ControlRequest::Stop)
    }

    /// Post a request, blocking while an event is in flight.
    pub fn request(&self, request: ControlRequest) -> bool {
        let posted = self.control.post(request);
        debug!(?request, posted, "Control request");
        posted
    }

    /// Block until `predicate` holds for the driver status or `timeout`
    /// elapses. Returns whether the predicate held.
    pub fn wait_until<F>(&self, timeout: Duration, mut predicate: F) -> bool
    where
        F: FnMut(&DriverStatus) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut shared = self.control.shared.lock();
        loop {
            let status = DriverStatus {
                state: shared.state.clone(),
                events_processed: shared.events_processed,
            };
            if predicate(&status) {
                return true;
            }
            if self
                .control
                .changed
                .wait_until(&mut shared, deadline)
                .timed_out()
            {
                let status = DriverStatus {
                    state: shared.state.clone(),
                    events_processed: shared.events_processed,
                };
                return predicate(&status);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience_core::StopReason;

    #[test]
    fn test_request_taken_instead_of_event_slot() {
        let control = DriverControl::new();
        let handle = DriverHandle::new(Arc::new(control));
        assert!(handle.pause());
        assert_eq!(handle.control.begin_event(), Err(ControlRequest::Pause));
        assert_eq!(handle.control.begin_event(), Ok(()));
        handle.control.end_event(1);
        assert_eq!(handle.status().events_processed, 1);
    }

    #[test]
    fn test_stop_is_sticky() {
        let handle = DriverHandle::new(Arc::new(DriverControl::new()));
        handle.stop();
        handle.resume();
        assert_eq!(handle.control.wait_for_request(), ControlRequest::Stop);
    }

    #[test]
    fn test_requests_ignored_after_stop() {
        let handle = DriverHandle::new(Arc::new(DriverControl::new()));
        handle
            .control
            .publish_state(&SimulationState::Stopped(StopReason::EndOfSimulation));
        assert!(!handle.pause());
        assert_eq!(handle.control.begin_event(), Ok(()));
    }

    #[test]
    fn test_wait_until_times_out() {
        let handle = DriverHandle::new(Arc::new(DriverControl::new()));
        assert!(!handle.wait_until(Duration::from_millis(10), |s| s.state.is_stopped()));
        assert!(handle.wait_until(Duration::from_millis(10), |s| {
            s.state == SimulationState::NotStarted
        }));
    }

    #[test]
    fn test_request_blocks_while_event_in_flight() {
        let control = Arc::new(DriverControl::new());
        let handle = DriverHandle::new(Arc::clone(&control));
        control.begin_event().unwrap();

        let requester = std::thread::spawn(move || handle.stop());
        std::thread::sleep(Duration::from_millis(20));
        assert!(control.shared.lock().request.is_none());

        control.end_event(1);
        assert!(requester.join().unwrap());
        assert_eq!(control.wait_for_request(), ControlRequest::Stop);
    }
}
