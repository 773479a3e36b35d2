//! Sliding-window rate estimation.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{Result, ScenarioError};

/// Number of one-second buckets a [`RateMeasurer`] averages over by default.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Measures the rate of events over a sliding window of whole seconds.
///
/// Events are counted per second of the clock, and only the buckets needed for the current
/// window are retained, so memory use does not depend on the number of events.
///
/// The rate is unknown until samples have been recorded in more distinct seconds than the
/// window is wide. Until then [`rate`](Self::rate) returns `NaN`.
#[derive(Debug)]
pub struct RateMeasurer {
    clock: Arc<dyn Clock>,
    window_size: u64,
    /// Event counts keyed by whole seconds since the clock's epoch.
    buckets: BTreeMap<u64, u64>,
    /// Distinct seconds that have received a sample, saturating past the window.
    observed: u64,
}

impl RateMeasurer {
    /// Creates a measurer with the [default window](DEFAULT_WINDOW_SIZE).
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            window_size: DEFAULT_WINDOW_SIZE as u64,
            buckets: BTreeMap::new(),
            observed: 0,
        }
    }

    /// Creates a measurer averaging over `window_size` seconds.
    pub fn with_window_size(clock: Arc<dyn Clock>, window_size: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(ScenarioError::InvalidConfig(
                "rate window must span at least one second".into(),
            ));
        }

        Ok(Self {
            window_size: window_size as u64,
            ..Self::new(clock)
        })
    }

    /// The number of seconds the rate is averaged over.
    pub fn window_size(&self) -> usize {
        self.window_size as usize
    }

    /// Records one event at the current time.
    pub fn new_sample(&mut self) {
        let bucket = self.clock.now().as_secs();

        match self.buckets.entry(bucket) {
            Entry::Occupied(mut entry) => *entry.get_mut() += 1,
            Entry::Vacant(entry) => {
                entry.insert(1);
                if self.observed <= self.window_size {
                    self.observed += 1;
                }
                self.evict();
            }
        }
    }

    /// Returns the average number of events per second over the window.
    ///
    /// The window covers the `window_size` seconds ending with the most recent second that
    /// received a sample. Returns `NaN` while there is not enough history to fill a window.
    pub fn rate(&self) -> f64 {
        if self.observed <= self.window_size {
            return f64::NAN;
        }
        let Some((&newest, _)) = self.buckets.last_key_value() else {
            return f64::NAN;
        };

        let oldest = newest + 1 - self.window_size;
        let events: u64 = self.buckets.range(oldest..=newest).map(|(_, n)| n).sum();
        events as f64 / self.window_size as f64
    }

    /// Drops buckets that can no longer be part of a window.
    fn evict(&mut self) {
        let Some((&newest, _)) = self.buckets.last_key_value() else {
            return;
        };

        let keep_from = newest.saturating_sub(self.window_size);
        if self
            .buckets
            .first_key_value()
            .is_some_and(|(&oldest, _)| oldest < keep_from)
        {
            self.buckets = self.buckets.split_off(&keep_from);
        }
    }
}
