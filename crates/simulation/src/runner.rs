//! The simulation driver.
//!
//! Pops events from the [`EventClock`] in order and hands them to an
//! [`EventSink`], applying the run state machine around each event.

use crate::config::{DriverConfig, RunMode};
use crate::control::{ControlRequest, DriverControl, DriverHandle};
use crate::event_queue::{EventClock, EventKey};
use resilience_core::{
    ConfigurationError, EventSink, SchedulingError, SimulationFault, SimulationState, StopReason,
    TimedEvent,
};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Statistics collected during a run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SimulationStats {
    /// Events handed to the sink.
    pub events_processed: u64,
    /// Events accepted by the clock, initial ones included.
    pub events_scheduled: u64,
    /// Wall-clock time spent inside the sink, measured on the driver thread.
    pub handler_time: Duration,
    /// Progress notifications sent, forced ones included.
    pub refreshes: u64,
    /// Simulated time at which the transitory period ended.
    pub transitory_end_time: Option<f64>,
}

impl SimulationStats {
    /// Mean sink time per processed event.
    pub fn mean_handler_time(&self) -> Duration {
        if self.events_processed == 0 {
            Duration::ZERO
        } else {
            self.handler_time / self.events_processed.min(u32::MAX as u64) as u32
        }
    }
}

/// What happened to the slot claimed for one event.
enum EventOutcome {
    Processed,
    Drained,
    Halted,
}

/// Discrete-event simulation driver.
///
/// The driver is single-threaded with respect to the sink: exactly one event
/// is in flight at a time. Control requests arrive through a
/// [`DriverHandle`] and are applied between events.
pub struct SimulationDriver<S: EventSink> {
    sink: S,
    clock: EventClock<S::Payload>,
    config: DriverConfig,
    control: Arc<DriverControl>,
    state: SimulationState,
    in_transitory: bool,
    stats: SimulationStats,
    handler_time_since_refresh: Duration,
}

impl<S: EventSink> SimulationDriver<S> {
    /// Create a driver. The configuration is validated here.
    pub fn new(config: DriverConfig, sink: S) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let in_transitory = config.has_transitory();
        Ok(Self {
            sink,
            clock: EventClock::new(),
            config,
            control: Arc::new(DriverControl::new()),
            state: SimulationState::NotStarted,
            in_transitory,
            stats: SimulationStats::default(),
            handler_time_since_refresh: Duration::ZERO,
        })
    }

    /// A handle for controlling this driver from another thread.
    pub fn handle(&self) -> DriverHandle {
        DriverHandle::new(Arc::clone(&self.control))
    }

    /// Schedule an event.
    pub fn schedule(&mut self, event: TimedEvent<S::Payload>) -> Result<EventKey, SchedulingError> {
        let key = self.clock.schedule(event)?;
        self.stats.events_scheduled += 1;
        Ok(key)
    }

    /// Schedule several events, stopping at the first failure.
    pub fn schedule_all<I>(&mut self, events: I) -> Result<u64, SchedulingError>
    where
        I: IntoIterator<Item = TimedEvent<S::Payload>>,
    {
        let mut scheduled = 0;
        for event in events {
            self.schedule(event)?;
            scheduled += 1;
        }
        Ok(scheduled)
    }

    /// Replace the configuration. Only allowed before the first run.
    pub fn set_config(&mut self, config: DriverConfig) -> Result<(), ConfigurationError> {
        if self.state != SimulationState::NotStarted {
            return Err(ConfigurationError::Frozen);
        }
        config.validate()?;
        self.in_transitory = config.has_transitory();
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn clock(&self) -> &EventClock<S::Payload> {
        &self.clock
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Whether the transitory period is still running.
    pub fn in_transitory(&self) -> bool {
        self.in_transitory
    }

    /// Run until the state machine reaches `Stopped`.
    ///
    /// In batch mode this returns once the event set drains or a limit is
    /// reached. In interactive mode a drained event set pauses the driver,
    /// which then blocks until resumed with new events or stopped.
    pub fn run(&mut self) -> SimulationState {
        if self.state.is_stopped() {
            return self.state.clone();
        }
        if matches!(self.state, SimulationState::NotStarted) {
            info!(
                pending = self.clock.len(),
                mode = ?self.config.mode,
                "Starting simulation"
            );
        }
        if !self.state.is_processing() {
            self.transition(SimulationState::Running);
        }

        while !self.state.is_stopped() {
            if matches!(self.state, SimulationState::Paused) {
                let request = self.control.wait_for_request();
                self.apply_request(request);
                continue;
            }

            if let Err(request) = self.control.begin_event() {
                self.apply_request(request);
                continue;
            }
            let outcome = self.process_next();
            self.control.end_event(self.stats.events_processed);

            match outcome {
                EventOutcome::Processed => {
                    if matches!(self.state, SimulationState::Step) {
                        self.transition(SimulationState::Paused);
                    }
                }
                EventOutcome::Drained => self.drained(),
                EventOutcome::Halted => {}
            }
        }

        info!(
            state = %self.state,
            events = self.stats.events_processed,
            sim_time = self.clock.current_time(),
            "Simulation finished"
        );
        self.state.clone()
    }

    /// Clear the clock, statistics and run state so the driver can run again.
    ///
    /// The sink is left untouched.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.stats = SimulationStats::default();
        self.handler_time_since_refresh = Duration::ZERO;
        self.in_transitory = self.config.has_transitory();
        self.state = SimulationState::NotStarted;
        self.control.reset();
        debug!("Simulation driver reset");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Event processing
    // ═══════════════════════════════════════════════════════════════════════

    /// Process the next pending event, honoring the transitory period and
    /// termination limits.
    fn process_next(&mut self) -> EventOutcome {
        let Some(next_time) = self.clock.peek_time() else {
            return EventOutcome::Drained;
        };
        let processed = self.clock.processed_count();

        if self.in_transitory && self.transitory_ended(processed, next_time) {
            let time = self.clock.current_time();
            self.in_transitory = false;
            self.stats.transitory_end_time = Some(time);
            info!(time, events = processed, "End of transitory period");
            self.sink.end_of_transitory(time);
        }

        if self.limit_reached(processed, next_time) {
            info!(
                events = processed,
                next_time,
                pending = self.clock.len(),
                "Termination limit reached"
            );
            self.halt(StopReason::EndOfSimulation);
            return EventOutcome::Halted;
        }

        let Some(event) = self.clock.next() else {
            return EventOutcome::Drained;
        };
        self.stats.events_processed += 1;
        let time = event.time();
        trace!(time, priority = event.priority(), "Processing event");

        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| self.sink.process_event(event)));
        let elapsed = started.elapsed();
        self.stats.handler_time += elapsed;
        self.handler_time_since_refresh += elapsed;

        let new_events = match result {
            Ok(Ok(events)) => events,
            Ok(Err(error)) => {
                return self.fault(SimulationFault::Handler(error.to_string()), time);
            }
            Err(panic) => {
                return self.fault(SimulationFault::Panic(panic_message(panic.as_ref())), time);
            }
        };

        for new_event in new_events {
            if let Err(error) = self.schedule(new_event) {
                return self.fault(SimulationFault::Scheduling(error), time);
            }
        }

        if self.handler_time_since_refresh > self.config.refresh_interval {
            self.refresh(false);
        }
        EventOutcome::Processed
    }

    fn transitory_ended(&self, processed: u64, next_time: f64) -> bool {
        self.config
            .transitory_events
            .is_some_and(|events| processed >= events)
            || self
                .config
                .transitory_time
                .is_some_and(|time| next_time >= time)
    }

    fn limit_reached(&self, processed: u64, next_time: f64) -> bool {
        self.config
            .total_events
            .is_some_and(|events| processed >= events)
            || self
                .config
                .total_sim_time
                .is_some_and(|time| next_time > time)
    }

    /// The event set is empty.
    fn drained(&mut self) {
        self.refresh(true);
        match self.config.mode {
            RunMode::Batch => {
                debug!(time = self.clock.current_time(), "Event set drained");
                self.transition(SimulationState::Stopped(StopReason::EndOfSimulation));
            }
            RunMode::Interactive => {
                debug!(
                    time = self.clock.current_time(),
                    "Event set drained, waiting for control"
                );
                self.transition(SimulationState::Paused);
            }
        }
    }

    fn fault(&mut self, fault: SimulationFault, time: f64) -> EventOutcome {
        warn!(time, error = %fault, "Simulation fault");
        self.refresh(true);
        self.transition(SimulationState::Stopped(StopReason::Fault(fault)));
        EventOutcome::Halted
    }

    fn halt(&mut self, reason: StopReason) {
        self.refresh(true);
        self.transition(SimulationState::Stopped(reason));
    }

    fn refresh(&mut self, force: bool) {
        debug!(
            force,
            events = self.stats.events_processed,
            sim_time = self.clock.current_time(),
            handler_ms = self.stats.handler_time.as_millis() as u64,
            "Refresh"
        );
        self.stats.refreshes += 1;
        self.handler_time_since_refresh = Duration::ZERO;
        self.sink.refresh(force);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // State machine
    // ═══════════════════════════════════════════════════════════════════════

    fn apply_request(&mut self, request: ControlRequest) {
        let next = match (request, &self.state) {
            (ControlRequest::Stop, _) => SimulationState::Stopped(StopReason::Requested),
            (ControlRequest::Pause, SimulationState::Running | SimulationState::Step) => {
                SimulationState::Paused
            }
            (ControlRequest::Resume, SimulationState::Paused | SimulationState::Step) => {
                SimulationState::Running
            }
            (ControlRequest::Step, SimulationState::Paused | SimulationState::Running) => {
                SimulationState::Step
            }
            (request, state) => {
                debug!(?request, state = %state, "Control request has no effect");
                return;
            }
        };
        if next.is_stopped() {
            self.refresh(true);
        }
        self.transition(next);
    }

    fn transition(&mut self, next: SimulationState) {
        if self.state == next {
            return;
        }
        info!(from = %self.state, to = %next, "Simulation state changed");
        self.state = next;
        self.control.publish_state(&self.state);
        self.sink.simulation_state_changed(&self.state);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        times: Vec<f64>,
    }

    impl EventSink for Recorder {
        type Payload = u32;
        type Error = String;

        fn process_event(&mut self, event: TimedEvent<u32>) -> Result<Vec<TimedEvent<u32>>, String> {
            self.times.push(event.time());
            Ok(vec![])
        }
    }

    #[test]
    fn test_set_config_frozen_after_start() {
        let mut driver = SimulationDriver::new(DriverConfig::with_event_limit(1), Recorder::default())
            .unwrap();
        driver
            .set_config(DriverConfig::with_event_limit(2))
            .unwrap();
        driver.schedule(TimedEvent::at(1.0, 1)).unwrap();
        driver.run();
        assert_eq!(
            driver.set_config(DriverConfig::with_event_limit(3)),
            Err(ConfigurationError::Frozen)
        );
    }

    #[test]
    fn test_new_rejects_unbounded_batch() {
        assert!(matches!(
            SimulationDriver::new(DriverConfig::default(), Recorder::default()),
            Err(ConfigurationError::Unbounded)
        ));
    }

    #[test]
    fn test_reset_allows_second_run() {
        let mut driver = SimulationDriver::new(DriverConfig::with_event_limit(10), Recorder::default())
            .unwrap();
        driver.schedule(TimedEvent::at(2.0, 1)).unwrap();
        driver.run();
        assert!(driver.state().is_stopped());

        driver.reset();
        assert_eq!(driver.state(), &SimulationState::NotStarted);
        assert_eq!(driver.stats(), &SimulationStats::default());
        driver.schedule(TimedEvent::at(1.0, 1)).unwrap();
        assert_eq!(
            driver.run(),
            SimulationState::Stopped(StopReason::EndOfSimulation)
        );
        assert_eq!(driver.sink().times, vec![2.0, 1.0]);
    }

    struct Sleeper;

    impl EventSink for Sleeper {
        type Payload = u32;
        type Error = String;

        fn process_event(&mut self, _event: TimedEvent<u32>) -> Result<Vec<TimedEvent<u32>>, String> {
            std::thread::sleep(Duration::from_millis(2));
            Ok(vec![])
        }
    }

    #[test]
    fn test_handler_time_counts_elapsed_time_in_the_sink() {
        let mut driver = SimulationDriver::new(DriverConfig::with_event_limit(10), Sleeper).unwrap();
        driver.schedule(TimedEvent::at(1.0, 1)).unwrap();
        driver.schedule(TimedEvent::at(2.0, 2)).unwrap();
        driver.run();

        // A sleeping handler uses no CPU, yet its time is counted.
        let stats = driver.stats();
        assert!(stats.handler_time >= Duration::from_millis(4));
        assert!(stats.mean_handler_time() >= Duration::from_millis(2));
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
