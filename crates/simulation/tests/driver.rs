//! Tests for the simulation driver state machine.

use resilience_core::{EventSink, SimulationFault, SimulationState, StopReason, TimedEvent};
use resilience_simulation::{DriverConfig, RunMode, SimulationDriver};
use std::time::Duration;
use tracing_test::traced_test;

/// Sink that records everything the driver tells it.
#[derive(Default)]
struct RecordingSink {
    processed: Vec<(f64, u32)>,
    transitory_ends: Vec<f64>,
    refreshes: Vec<bool>,
    states: Vec<SimulationState>,
    /// Fail when this payload is processed.
    fail_on: Option<u32>,
    /// Panic when this payload is processed.
    panic_on: Option<u32>,
    /// Emit an event dated at this time after the first event.
    follow_up_at: Option<f64>,
}

impl EventSink for RecordingSink {
    type Payload = u32;
    type Error = String;

    fn process_event(&mut self, event: TimedEvent<u32>) -> Result<Vec<TimedEvent<u32>>, String> {
        let payload = *event.payload();
        self.processed.push((event.time(), payload));
        if self.fail_on == Some(payload) {
            return Err(format!("cannot handle {payload}"));
        }
        if self.panic_on == Some(payload) {
            panic!("handler exploded");
        }
        match self.follow_up_at.take() {
            Some(time) => Ok(vec![TimedEvent::at(time, 1000 + payload)]),
            None => Ok(vec![]),
        }
    }

    fn end_of_transitory(&mut self, time: f64) {
        self.transitory_ends.push(time);
    }

    fn refresh(&mut self, force: bool) {
        self.refreshes.push(force);
    }

    fn simulation_state_changed(&mut self, state: &SimulationState) {
        self.states.push(state.clone());
    }
}

fn driver_with_events(
    config: DriverConfig,
    sink: RecordingSink,
    times: &[f64],
) -> SimulationDriver<RecordingSink> {
    let mut driver = SimulationDriver::new(config, sink).unwrap();
    for (i, &time) in times.iter().enumerate() {
        driver.schedule(TimedEvent::at(time, i as u32)).unwrap();
    }
    driver
}

#[traced_test]
#[test]
fn test_event_limit_stops_after_exact_count() {
    let mut driver = driver_with_events(
        DriverConfig::with_event_limit(3),
        RecordingSink::default(),
        &[1.0, 2.0, 3.0, 4.0, 5.0],
    );

    let state = driver.run();

    assert_eq!(state, SimulationState::Stopped(StopReason::EndOfSimulation));
    assert_eq!(driver.sink().processed.len(), 3);
    assert_eq!(driver.clock().len(), 2);
    assert_eq!(driver.stats().events_processed, 3);
    assert_eq!(
        driver.sink().states,
        vec![
            SimulationState::Running,
            SimulationState::Stopped(StopReason::EndOfSimulation)
        ]
    );
    assert_eq!(driver.sink().refreshes.last(), Some(&true));
}

#[traced_test]
#[test]
fn test_time_limit_excludes_later_events() {
    let mut driver = driver_with_events(
        DriverConfig::default().with_total_sim_time(3.0),
        RecordingSink::default(),
        &[1.0, 3.0, 3.5, 8.0],
    );

    driver.run();

    let times: Vec<f64> = driver.sink().processed.iter().map(|(t, _)| *t).collect();
    assert_eq!(times, vec![1.0, 3.0]);
    assert_eq!(driver.clock().current_time(), 3.0);
}

#[test]
fn test_transitory_by_events_fires_once() {
    let mut driver = driver_with_events(
        DriverConfig::with_event_limit(10).with_transitory_events(2),
        RecordingSink::default(),
        &[1.0, 2.0, 3.0, 4.0],
    );

    driver.run();

    assert_eq!(driver.sink().transitory_ends, vec![2.0]);
    assert_eq!(driver.stats().transitory_end_time, Some(2.0));
    assert!(!driver.in_transitory());
    assert_eq!(driver.sink().processed.len(), 4);
}

#[test]
fn test_transitory_by_time_uses_next_event_time() {
    let mut driver = driver_with_events(
        DriverConfig::with_event_limit(10).with_transitory_time(2.5),
        RecordingSink::default(),
        &[1.0, 2.0, 3.0],
    );

    driver.run();

    // Ends before the first event at or after 2.5, reported at the current time.
    assert_eq!(driver.sink().transitory_ends, vec![2.0]);
}

#[test]
fn test_no_transitory_when_unconfigured() {
    let mut driver = driver_with_events(
        DriverConfig::with_event_limit(10),
        RecordingSink::default(),
        &[1.0, 2.0],
    );
    driver.run();
    assert!(driver.sink().transitory_ends.is_empty());
}

#[traced_test]
#[test]
fn test_handler_error_is_fatal() {
    let sink = RecordingSink {
        fail_on: Some(1),
        ..Default::default()
    };
    let mut driver = driver_with_events(
        DriverConfig::with_event_limit(10),
        sink,
        &[1.0, 2.0, 3.0],
    );

    let state = driver.run();

    assert_eq!(
        state.fault(),
        Some(&SimulationFault::Handler("cannot handle 1".to_string()))
    );
    assert_eq!(driver.sink().processed.len(), 2);
    assert_eq!(driver.sink().refreshes, vec![true]);
    assert_eq!(driver.sink().states.last(), Some(&state));
}

#[test]
fn test_handler_panic_is_contained() {
    let sink = RecordingSink {
        panic_on: Some(0),
        ..Default::default()
    };
    let mut driver = driver_with_events(DriverConfig::with_event_limit(10), sink, &[1.0, 2.0]);

    let state = driver.run();

    assert_eq!(
        state.fault(),
        Some(&SimulationFault::Panic("handler exploded".to_string()))
    );
    assert_eq!(driver.sink().processed.len(), 1);

    // A stopped driver does not run again.
    assert_eq!(driver.run(), state);
    assert_eq!(driver.sink().processed.len(), 1);
}

#[test]
fn test_follow_up_events_are_scheduled() {
    let sink = RecordingSink {
        follow_up_at: Some(1.5),
        ..Default::default()
    };
    let mut driver = driver_with_events(DriverConfig::with_event_limit(10), sink, &[1.0, 2.0]);

    driver.run();

    assert_eq!(
        driver.sink().processed,
        vec![(1.0, 0), (1.5, 1000), (2.0, 1)]
    );
    assert_eq!(driver.stats().events_scheduled, 3);
}

#[test]
fn test_past_dated_follow_up_is_a_fault() {
    let sink = RecordingSink {
        follow_up_at: Some(0.5),
        ..Default::default()
    };
    let mut driver = driver_with_events(DriverConfig::with_event_limit(10), sink, &[1.0, 2.0]);

    let state = driver.run();

    assert!(matches!(
        state.fault(),
        Some(SimulationFault::Scheduling(_))
    ));
    assert_eq!(driver.sink().processed.len(), 1);
}

#[test]
fn test_batch_exhaustion_ends_simulation() {
    let mut driver = driver_with_events(
        DriverConfig::with_event_limit(100),
        RecordingSink::default(),
        &[1.0, 2.0],
    );

    assert_eq!(
        driver.run(),
        SimulationState::Stopped(StopReason::EndOfSimulation)
    );
    assert_eq!(driver.sink().refreshes, vec![true]);
}

#[test]
fn test_zero_refresh_interval_ends_with_forced_refresh() {
    let mut driver = driver_with_events(
        DriverConfig::with_event_limit(100).with_refresh_interval(Duration::ZERO),
        RecordingSink::default(),
        &[1.0, 2.0, 3.0],
    );

    driver.run();

    // Three periodic refreshes can only be skipped if an event took no
    // measurable time, so only bound the forced one.
    let refreshes = &driver.sink().refreshes;
    assert_eq!(refreshes.last(), Some(&true));
    assert!(refreshes.iter().filter(|force| !**force).count() <= 3);
}

// ═══════════════════════════════════════════════════════════════════════════
// Interactive control
// ═══════════════════════════════════════════════════════════════════════════

const WAIT: Duration = Duration::from_secs(10);

#[traced_test]
#[test]
fn test_interactive_pauses_when_drained_then_stops() {
    let mut driver = driver_with_events(
        DriverConfig::default().with_mode(RunMode::Interactive),
        RecordingSink::default(),
        &[1.0, 2.0, 3.0],
    );
    let handle = driver.handle();

    let worker = std::thread::spawn(move || {
        let state = driver.run();
        (state, driver)
    });

    assert!(handle.wait_until(WAIT, |s| {
        s.state == SimulationState::Paused && s.events_processed == 3
    }));
    assert!(handle.stop());

    let (state, driver) = worker.join().unwrap();
    assert_eq!(state, SimulationState::Stopped(StopReason::Requested));
    assert_eq!(driver.sink().processed.len(), 3);
    assert!(!handle.resume());
}

#[test]
fn test_step_processes_exactly_one_event() {
    let mut driver = driver_with_events(
        DriverConfig::default().with_mode(RunMode::Interactive),
        RecordingSink::default(),
        &[1.0, 2.0, 3.0],
    );
    let handle = driver.handle();
    // Posted before the run starts, picked up before the first event.
    assert!(handle.pause());

    let worker = std::thread::spawn(move || {
        driver.run();
        driver
    });

    assert!(handle.wait_until(WAIT, |s| s.state == SimulationState::Paused));
    assert_eq!(handle.status().events_processed, 0);

    assert!(handle.step());
    assert!(handle.wait_until(WAIT, |s| {
        s.state == SimulationState::Paused && s.events_processed == 1
    }));

    assert!(handle.resume());
    assert!(handle.wait_until(WAIT, |s| s.events_processed == 3));
    handle.stop();

    let driver = worker.join().unwrap();
    assert_eq!(driver.sink().processed.len(), 3);
    assert!(driver.sink().states.contains(&SimulationState::Step));
}

#[test]
fn test_stop_before_run_processes_nothing() {
    let mut driver = driver_with_events(
        DriverConfig::with_event_limit(10),
        RecordingSink::default(),
        &[1.0],
    );
    driver.handle().stop();

    assert_eq!(
        driver.run(),
        SimulationState::Stopped(StopReason::Requested)
    );
    assert!(driver.sink().processed.is_empty());
}
