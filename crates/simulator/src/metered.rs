//! Per-event latency metering.

use hdrhistogram::{CreationError, Histogram};
use resilience_core::{EventSink, SimulationState, TimedEvent};
use std::fmt;
use std::time::Instant;

/// Wraps an [`EventSink`] and records the wall-clock time each event takes,
/// in microseconds.
pub struct MeteredSink<S> {
    inner: S,
    histogram: Histogram<u64>,
    errors: u64,
}

impl<S: EventSink> MeteredSink<S> {
    pub fn new(inner: S) -> Result<Self, CreationError> {
        Ok(Self {
            inner,
            histogram: Histogram::new(3)?,
            errors: 0,
        })
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Latency percentiles of the events processed so far.
    pub fn latency(&self) -> LatencySummary {
        let h = &self.histogram;
        if h.is_empty() {
            return LatencySummary::default();
        }
        LatencySummary {
            events: h.len(),
            errors: self.errors,
            mean_us: h.mean(),
            p50_us: h.value_at_quantile(0.50),
            p99_us: h.value_at_quantile(0.99),
            max_us: h.max(),
        }
    }

    /// Forget recorded latencies.
    pub fn reset(&mut self) {
        self.histogram.reset();
        self.errors = 0;
    }
}

impl<S: EventSink> EventSink for MeteredSink<S> {
    type Payload = S::Payload;
    type Error = S::Error;

    fn process_event(
        &mut self,
        event: TimedEvent<Self::Payload>,
    ) -> Result<Vec<TimedEvent<Self::Payload>>, Self::Error> {
        let started = Instant::now();
        let result = self.inner.process_event(event);
        let micros = started.elapsed().as_micros().min(u64::MAX as u128) as u64;
        self.histogram.saturating_record(micros);
        if result.is_err() {
            self.errors += 1;
        }
        result
    }

    fn end_of_transitory(&mut self, time: f64) {
        self.inner.end_of_transitory(time);
    }

    fn refresh(&mut self, force: bool) {
        self.inner.refresh(force);
    }

    fn simulation_state_changed(&mut self, state: &SimulationState) {
        self.inner.simulation_state_changed(state);
    }
}

impl<S: fmt::Debug> fmt::Debug for MeteredSink<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeteredSink")
            .field("inner", &self.inner)
            .field("recorded", &self.histogram.len())
            .finish()
    }
}

/// Snapshot of per-event latency.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencySummary {
    pub events: u64,
    /// Events whose handler returned an error.
    pub errors: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== event latency ==")?;
        writeln!(f, "events:                   {}", self.events)?;
        writeln!(f, "mean:                     {:.1} us", self.mean_us)?;
        writeln!(f, "p50:                      {} us", self.p50_us)?;
        writeln!(f, "p99:                      {} us", self.p99_us)?;
        writeln!(f, "max:                      {} us", self.max_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        seen: Vec<u32>,
        transitory_end: Option<f64>,
    }

    impl EventSink for Echo {
        type Payload = u32;
        type Error = String;

        fn process_event(&mut self, event: TimedEvent<u32>) -> Result<Vec<TimedEvent<u32>>, String> {
            let value = *event.payload();
            if value == 0 {
                return Err("zero".to_string());
            }
            self.seen.push(value);
            Ok(vec![TimedEvent::at(event.time() + 1.0, value - 1)])
        }

        fn end_of_transitory(&mut self, time: f64) {
            self.transitory_end = Some(time);
        }
    }

    #[test]
    fn test_delegates_and_records() {
        let mut sink = MeteredSink::new(Echo {
            seen: Vec::new(),
            transitory_end: None,
        })
        .unwrap();
        assert_eq!(sink.latency(), LatencySummary::default());

        let next = sink.process_event(TimedEvent::at(1.0, 2)).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].time(), 2.0);
        assert!(sink.process_event(TimedEvent::at(3.0, 0)).is_err());
        sink.end_of_transitory(3.0);

        assert_eq!(sink.inner().seen, vec![2]);
        assert_eq!(sink.inner().transitory_end, Some(3.0));

        let latency = sink.latency();
        assert_eq!(latency.events, 2);
        assert_eq!(latency.errors, 1);
        assert!(latency.p50_us <= latency.max_us);
        assert!(latency.to_string().contains("p99:"));

        sink.reset();
        assert_eq!(sink.latency().events, 0);
    }
}
