//! Core types for resilience simulation.
//!
//! This crate provides the foundational types for the simulation kernel:
//!
//! - [`TimedEvent`]: an event scheduled at a simulated time with a priority
//! - [`NetworkEvent`]: the failure / reparation payload of resilience runs
//! - [`EventSink`]: the trait the driver hands events to
//! - [`SimulationState`] / [`StopReason`]: the run state machine
//! - [`SchedulingError`], [`ConfigurationError`], [`SimulationFault`]: the error taxonomy
//!
//! # Architecture
//!
//! ```text
//! EventClock → SimulationDriver → EventSink::process_event() → new events → EventClock
//! ```
//!
//! The sink is:
//! - **Synchronous**: No async, no .await
//! - **Serialized**: one event in flight at a time
//! - **Fault-contained**: an error or panic stops the run, it is never retried

mod error;
mod event;
mod state;
mod traits;

pub use error::{ConfigurationError, SchedulingError, SimulationFault};
pub use event::{EventTargets, NetworkEvent, TimedEvent};
pub use state::{SimulationState, StopReason};
pub use traits::EventSink;
