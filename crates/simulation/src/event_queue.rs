//! Event clock with deterministic ordering.

use resilience_core::{SchedulingError, TimedEvent};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Key for ordering events in the clock.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Priority (higher value first)
/// 3. Sequence number (FIFO for same time/priority)
#[derive(Debug, Clone, Copy)]
pub struct EventKey {
    /// When this event should be processed.
    pub time: f64,
    /// Priority for ordering at same time.
    pub priority: i32,
    /// Sequence number for deterministic FIFO ordering.
    pub sequence: u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Order by time first
        match self.time.total_cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Then by priority, highest first
        match other.priority.cmp(&self.priority) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Finally by sequence (FIFO)
        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventKey {}

/// The future-event set and the simulated clock.
///
/// Time only moves forward: it advances to the time of each event returned
/// by [`next`](EventClock::next) and nothing may be scheduled before it.
#[derive(Debug)]
pub struct EventClock<P> {
    /// Pending events, ordered deterministically.
    pending: BTreeMap<EventKey, TimedEvent<P>>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// Current simulation time.
    current_time: f64,

    /// Events returned by `next()` since the last reset.
    processed_count: u64,
}

impl<P> Default for EventClock<P> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
            sequence: 0,
            current_time: 0.0,
            processed_count: 0,
        }
    }
}

impl<P> EventClock<P> {
    /// Create an empty clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an event.
    ///
    /// Fails for negative or non-finite times, for times before the current
    /// time, and when an event with the same time and priority is already
    /// pending. Simultaneous events must differ in priority.
    pub fn schedule(&mut self, event: TimedEvent<P>) -> Result<EventKey, SchedulingError> {
        // Fold -0.0 into 0.0 so it sorts with zero.
        let time = event.time() + 0.0;
        let priority = event.priority();

        if time < 0.0 {
            return Err(SchedulingError::NegativeTime { time });
        }
        if !time.is_finite() {
            return Err(SchedulingError::NonFiniteTime { time });
        }
        if time < self.current_time {
            return Err(SchedulingError::PastScheduling {
                time,
                now: self.current_time,
            });
        }

        let lower = EventKey {
            time,
            priority,
            sequence: 0,
        };
        let upper = EventKey {
            time,
            priority,
            sequence: u64::MAX,
        };
        if self.pending.range(lower..=upper).next().is_some() {
            return Err(SchedulingError::DuplicateEvent { time, priority });
        }

        self.sequence += 1;
        let key = EventKey {
            time,
            priority,
            sequence: self.sequence,
        };
        self.pending.insert(key, event);
        Ok(key)
    }

    /// Schedule several events, stopping at the first failure.
    ///
    /// Returns the number of events scheduled.
    pub fn schedule_all<I>(&mut self, events: I) -> Result<u64, SchedulingError>
    where
        I: IntoIterator<Item = TimedEvent<P>>,
    {
        let mut scheduled = 0;
        for event in events {
            self.schedule(event)?;
            scheduled += 1;
        }
        Ok(scheduled)
    }

    /// Remove and return the next event, advancing the clock to its time.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<TimedEvent<P>> {
        let (key, event) = self.pending.pop_first()?;
        self.current_time = key.time;
        self.processed_count += 1;
        Some(event)
    }

    /// Time of the next event, if any.
    pub fn peek_time(&self) -> Option<f64> {
        self.pending.first_key_value().map(|(key, _)| key.time)
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn processed_count(&self) -> u64 {
        self.processed_count
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop all pending events and rewind to time zero.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.sequence = 0;
        self.current_time = 0.0;
        self.processed_count = 0;
    }
}
