//! Configuration for the simulation driver.

use resilience_core::ConfigurationError;
use std::time::Duration;

/// How the driver behaves when the event set drains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Unattended: stop with `EndOfSimulation`.
    #[default]
    Batch,

    /// Controlled from another thread: pause and wait to be resumed or stopped.
    Interactive,
}

/// Configuration for a simulation run. Frozen once the run starts.
#[derive(Clone, Debug, PartialEq)]
pub struct DriverConfig {
    /// Stop once this many events have been processed.
    pub total_events: Option<u64>,

    /// Stop before processing an event dated after this time.
    pub total_sim_time: Option<f64>,

    /// The transitory period ends once this many events have been processed.
    pub transitory_events: Option<u64>,

    /// The transitory period ends at the first event dated at or after this time.
    pub transitory_time: Option<f64>,

    /// Wall-clock time spent in the event handler between two progress
    /// notifications.
    pub refresh_interval: Duration,

    pub mode: RunMode,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            total_events: None,
            total_sim_time: None,
            transitory_events: None,
            transitory_time: None,
            refresh_interval: Duration::from_secs(10),
            mode: RunMode::Batch,
        }
    }
}

fn count_parameter(name: &str, value: i64) -> Result<Option<u64>, ConfigurationError> {
    match value {
        -1 => Ok(None),
        v if v >= 0 => Ok(Some(v as u64)),
        v => Err(ConfigurationError::invalid(
            name,
            format!("must be -1 or non-negative, got {v}"),
        )),
    }
}

fn time_parameter(name: &str, value: f64) -> Result<Option<f64>, ConfigurationError> {
    if value == -1.0 {
        Ok(None)
    } else if value.is_finite() && value >= 0.0 {
        Ok(Some(value))
    } else {
        Err(ConfigurationError::invalid(
            name,
            format!("must be -1 or a non-negative time, got {value}"),
        ))
    }
}

impl DriverConfig {
    /// Create an unattended configuration stopping after `total_events`.
    pub fn with_event_limit(total_events: u64) -> Self {
        Self {
            total_events: Some(total_events),
            ..Default::default()
        }
    }

    /// Build from raw parameters where `-1` means unlimited / no transitory.
    pub fn from_parameters(
        total_events: i64,
        total_sim_time: f64,
        transitory_events: i64,
        transitory_time: f64,
        refresh_interval_secs: f64,
        mode: RunMode,
    ) -> Result<Self, ConfigurationError> {
        if !(refresh_interval_secs.is_finite() && refresh_interval_secs >= 0.0) {
            return Err(ConfigurationError::invalid(
                "refreshInterval",
                format!("must be a non-negative number of seconds, got {refresh_interval_secs}"),
            ));
        }
        let config = Self {
            total_events: count_parameter("totalEvents", total_events)?,
            total_sim_time: time_parameter("totalSimTime", total_sim_time)?,
            transitory_events: count_parameter("transitoryEvents", transitory_events)?,
            transitory_time: time_parameter("transitoryTime", transitory_time)?,
            refresh_interval: Duration::from_secs_f64(refresh_interval_secs),
            mode,
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the event limit.
    pub fn with_total_events(mut self, total_events: u64) -> Self {
        self.total_events = Some(total_events);
        self
    }

    /// Set the simulated time limit.
    pub fn with_total_sim_time(mut self, total_sim_time: f64) -> Self {
        self.total_sim_time = Some(total_sim_time);
        self
    }

    /// End the transitory period after a number of events.
    pub fn with_transitory_events(mut self, events: u64) -> Self {
        self.transitory_events = Some(events);
        self
    }

    /// End the transitory period at a simulated time.
    pub fn with_transitory_time(mut self, time: f64) -> Self {
        self.transitory_time = Some(time);
        self
    }

    /// Set the handler time between progress notifications.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the run mode.
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whether a transitory period is configured.
    pub fn has_transitory(&self) -> bool {
        self.transitory_events.is_some() || self.transitory_time.is_some()
    }

    /// Whether the run is bounded by an event or time limit.
    pub fn is_bounded(&self) -> bool {
        self.total_events.is_some() || self.total_sim_time.is_some()
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (name, value) in [
            ("totalSimTime", self.total_sim_time),
            ("transitoryTime", self.transitory_time),
        ] {
            if let Some(v) = value {
                if !(v.is_finite() && v >= 0.0) {
                    return Err(ConfigurationError::invalid(
                        name,
                        format!("must be a non-negative time, got {v}"),
                    ));
                }
            }
        }
        if self.mode == RunMode::Batch && !self.is_bounded() {
            return Err(ConfigurationError::Unbounded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parameters_unlimited_encoding() {
        let config = DriverConfig::from_parameters(-1, 100.0, 10, -1.0, 5.0, RunMode::Batch)
            .unwrap();
        assert_eq!(config.total_events, None);
        assert_eq!(config.total_sim_time, Some(100.0));
        assert_eq!(config.transitory_events, Some(10));
        assert_eq!(config.transitory_time, None);
        assert_eq!(config.refresh_interval, Duration::from_secs(5));
        assert!(config.has_transitory());
    }

    #[test]
    fn test_rejects_out_of_range_parameters() {
        assert!(matches!(
            DriverConfig::from_parameters(-2, -1.0, -1, -1.0, 1.0, RunMode::Interactive),
            Err(ConfigurationError::InvalidParameter { .. })
        ));
        assert!(matches!(
            DriverConfig::from_parameters(10, -1.0, -1, -1.0, -3.0, RunMode::Batch),
            Err(ConfigurationError::InvalidParameter { .. })
        ));
        assert!(matches!(
            DriverConfig::from_parameters(10, -5.0, -1, -1.0, 1.0, RunMode::Batch),
            Err(ConfigurationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_batch_runs_must_be_bounded() {
        assert_eq!(
            DriverConfig::default().validate(),
            Err(ConfigurationError::Unbounded)
        );
        assert!(DriverConfig::default()
            .with_mode(RunMode::Interactive)
            .validate()
            .is_ok());
        assert!(DriverConfig::with_event_limit(3).validate().is_ok());
    }
}
