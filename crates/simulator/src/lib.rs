//! Resilience Simulator
//!
//! Runs network resilience scenarios on top of the simulation driver and the
//! recovery engine.
//!
//! # Architecture
//!
//! - **Configuration**: a TOML [`ScenarioConfig`] with `[driver]`,
//!   `[topology]` and `[strategy]` sections
//! - **Topology generation**: rings and grids with one SRG per link and per
//!   node, full-mesh demands on shortest paths
//! - **Metering**: [`MeteredSink`] records per-event latency in an HDR
//!   histogram
//!
//! # Example
//!
//! ```ignore
//! use resilience_simulator::{Scenario, ScenarioConfig};
//!
//! let config = ScenarioConfig::from_toml_str(r#"
//!     [strategy]
//!     name = "local-repair"
//!     seed = 42
//! "#)?;
//! let outcome = Scenario::new(config)?.run()?;
//! println!("{}", outcome.render());
//! ```

pub mod config;
pub mod error;
pub mod metered;
pub mod runner;
pub mod topology;

pub use config::{DriverSection, ScenarioConfig, StrategySection, TopologyConfig, TopologyKind};
pub use error::SimulatorError;
pub use metered::{LatencySummary, MeteredSink};
pub use runner::{Scenario, ScenarioOutcome};
