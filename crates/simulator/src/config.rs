//! Scenario configuration.
//!
//! A scenario is read from a TOML file; every section and field is optional.
//!
//! ```toml
//! [driver]
//! total_sim_time = 87600.0
//! transitory_time = 8760.0
//!
//! [topology]
//! kind = "grid"
//! rows = 3
//! cols = 4
//! capacity = 100.0
//!
//! [strategy]
//! name = "local-repair"
//! seed = 42
//!
//! [strategy.params]
//! cost = "km"
//! allowPartial = true
//! ```

use resilience_core::ConfigurationError;
use resilience_recovery::{EngineConfig, StrategyParams, RESTORATION};
use resilience_simulation::{DriverConfig, RunMode};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Top-level scenario configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub driver: DriverSection,

    #[serde(default)]
    pub topology: TopologyConfig,

    #[serde(default)]
    pub strategy: StrategySection,
}

impl ScenarioConfig {
    /// Parse a scenario from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// The driver configuration; always batch mode.
    pub fn driver_config(&self) -> Result<DriverConfig, ConfigurationError> {
        self.driver.to_driver_config()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_failure_seed(self.strategy.seed.unwrap_or_default())
            .with_validity_after_event(self.driver.check_validity)
    }

    pub fn strategy_params(&self) -> StrategyParams {
        self.strategy.params()
    }
}

/// Run limits, using `-1` for "unlimited" and "no transitory period".
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverSection {
    #[serde(default = "unlimited_count")]
    pub total_events: i64,

    /// Simulated hours.
    #[serde(default = "default_total_sim_time")]
    pub total_sim_time: f64,

    #[serde(default = "unlimited_count")]
    pub transitory_events: i64,

    #[serde(default = "default_transitory_time")]
    pub transitory_time: f64,

    /// Seconds spent in the event handler between progress logs.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: f64,

    /// Check the network state after every event.
    #[serde(default = "default_check_validity")]
    pub check_validity: bool,
}

fn unlimited_count() -> i64 {
    -1
}

fn default_total_sim_time() -> f64 {
    // Ten years.
    87_600.0
}

fn default_transitory_time() -> f64 {
    8_760.0
}

fn default_refresh_secs() -> f64 {
    5.0
}

fn default_check_validity() -> bool {
    true
}

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            total_events: unlimited_count(),
            total_sim_time: default_total_sim_time(),
            transitory_events: unlimited_count(),
            transitory_time: default_transitory_time(),
            refresh_secs: default_refresh_secs(),
            check_validity: default_check_validity(),
        }
    }
}

impl DriverSection {
    pub fn to_driver_config(&self) -> Result<DriverConfig, ConfigurationError> {
        DriverConfig::from_parameters(
            self.total_events,
            self.total_sim_time,
            self.transitory_events,
            self.transitory_time,
            self.refresh_secs,
            RunMode::Batch,
        )
    }
}

/// Shape of the generated network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyKind {
    #[default]
    Ring,
    Grid,
}

/// Generated topology and traffic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyConfig {
    #[serde(default)]
    pub kind: TopologyKind,

    /// Ring size.
    #[serde(default = "default_ring_nodes")]
    pub nodes: usize,

    #[serde(default = "default_grid_side")]
    pub rows: usize,

    #[serde(default = "default_grid_side")]
    pub cols: usize,

    /// Capacity of every link.
    #[serde(default = "default_capacity")]
    pub capacity: f64,

    #[serde(default = "default_length_km")]
    pub length_km: f64,

    /// Offered traffic of every demand.
    #[serde(default = "default_volume")]
    pub volume: f64,

    /// Wavelengths per link, written as a link attribute when set.
    #[serde(default)]
    pub wavelengths: Option<u32>,

    /// Mean time to failure of a link, in hours.
    #[serde(default = "default_link_mttf")]
    pub link_mttf: f64,

    #[serde(default = "default_link_mttr")]
    pub link_mttr: f64,

    #[serde(default = "default_node_mttf")]
    pub node_mttf: f64,

    #[serde(default = "default_node_mttr")]
    pub node_mttr: f64,
}

fn default_ring_nodes() -> usize {
    8
}

fn default_grid_side() -> usize {
    3
}

fn default_capacity() -> f64 {
    100.0
}

fn default_length_km() -> f64 {
    400.0
}

fn default_volume() -> f64 {
    1.0
}

fn default_link_mttf() -> f64 {
    4_380.0
}

fn default_link_mttr() -> f64 {
    12.0
}

fn default_node_mttf() -> f64 {
    87_600.0
}

fn default_node_mttr() -> f64 {
    4.0
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            kind: TopologyKind::default(),
            nodes: default_ring_nodes(),
            rows: default_grid_side(),
            cols: default_grid_side(),
            capacity: default_capacity(),
            length_km: default_length_km(),
            volume: default_volume(),
            wavelengths: None,
            link_mttf: default_link_mttf(),
            link_mttr: default_link_mttr(),
            node_mttf: default_node_mttf(),
            node_mttr: default_node_mttr(),
        }
    }
}

/// Recovery strategy selection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategySection {
    /// Registry name of the strategy.
    #[serde(default = "default_strategy")]
    pub name: String,

    /// Seed of the failure model. A random seed is drawn when unset.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Strategy parameters, passed through by name.
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
}

fn default_strategy() -> String {
    RESTORATION.to_string()
}

impl Default for StrategySection {
    fn default() -> Self {
        Self {
            name: default_strategy(),
            seed: None,
            params: BTreeMap::new(),
        }
    }
}

impl StrategySection {
    /// Parameters as the name/value strings strategies parse.
    pub fn params(&self) -> StrategyParams {
        let mut params = StrategyParams::new();
        for (key, value) in &self.params {
            match value {
                toml::Value::String(s) => params.set(key.clone(), s),
                other => params.set(key.clone(), other),
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ScenarioConfig::from_toml_str("").unwrap();
        assert_eq!(config, ScenarioConfig::default());
        assert_eq!(config.strategy.name, RESTORATION);

        let driver = config.driver_config().unwrap();
        assert_eq!(driver.total_events, None);
        assert_eq!(driver.total_sim_time, Some(87_600.0));
        assert_eq!(driver.transitory_time, Some(8_760.0));
        assert_eq!(driver.mode, RunMode::Batch);
    }

    #[test]
    fn test_sections_and_params() {
        let config = ScenarioConfig::from_toml_str(
            r#"
            [driver]
            total_events = 500
            total_sim_time = -1.0
            transitory_time = -1.0

            [topology]
            kind = "grid"
            rows = 2
            cols = 5
            wavelengths = 16

            [strategy]
            name = "wdm-restoration"
            seed = 9

            [strategy.params]
            cost = "km"
            maxReachKm = 1500.0
            revert = false
            "#,
        )
        .unwrap();

        assert_eq!(config.topology.kind, TopologyKind::Grid);
        assert_eq!((config.topology.rows, config.topology.cols), (2, 5));
        assert_eq!(config.topology.wavelengths, Some(16));
        assert_eq!(config.topology.nodes, 8);

        let driver = config.driver_config().unwrap();
        assert_eq!(driver.total_events, Some(500));
        assert_eq!(driver.total_sim_time, None);
        assert!(!driver.has_transitory());

        assert_eq!(config.strategy.seed, Some(9));
        assert_eq!(config.engine_config().failure_seed, 9);
        let params = config.strategy_params();
        assert_eq!(params.get("cost"), Some("km"));
        assert_eq!(params.f64_or("maxReachKm", 0.0).unwrap(), 1500.0);
        assert!(!params.bool_or("revert", true).unwrap());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(ScenarioConfig::from_toml_str("[topology]\nsize = 4\n").is_err());
        assert!(ScenarioConfig::from_toml_str("[topology]\nkind = \"mesh\"\n").is_err());
    }

    #[test]
    fn test_unbounded_driver_is_rejected() {
        let mut config = ScenarioConfig::default();
        config.driver.total_sim_time = -1.0;
        assert_eq!(
            config.driver_config(),
            Err(ConfigurationError::Unbounded)
        );
    }
}
