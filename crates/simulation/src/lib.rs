//! Discrete-event simulation driver.
//!
//! This crate provides the event clock and the driver that feeds events to
//! an [`EventSink`](resilience_core::EventSink). Simulated time is abstract:
//! it only advances at event boundaries, never with the wall clock.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationDriver                       │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     EventClock (BTreeMap<EventKey, TimedEvent>)    │ │
//! │  │     Ordered by: time, priority, sequence           │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │  transitory / limit checks  │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     EventSink::process_event (one in flight)       │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     New events → EventClock                        │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └──────────────────────────▲──────────────────────────────┘
//!                            │ pause / resume / step / stop
//!                      DriverHandle (any thread)
//! ```

mod config;
mod control;
mod event_queue;
mod runner;

pub use config::{DriverConfig, RunMode};
pub use control::{ControlRequest, DriverHandle, DriverStatus};
pub use event_queue::{EventClock, EventKey};
pub use runner::{SimulationDriver, SimulationStats};
