//! Moving-average filter with spike rejection
//!
//! Every channel owns a [`RingBuffer`] of its last accepted readings. The
//! filtered output is the mean of that buffer.
//!
//! ## Warm-up
//!
//! Until the buffer holds `window` readings there is not enough history to
//! tell a spike from a real step, so every reading is accepted. The node
//! reports a value from the very first sample rather than waiting.
//!
//! ## Rejection
//!
//! Once warm, a reading that moves more than the channel's `max_change`
//! away from the last *accepted* reading is dropped: it is counted, it does
//! not enter the buffer, and the previous filtered output is returned
//! unchanged.
//!
//! ```rust
//! use stromwater_core::filter::OutlierFilter;
//!
//! let mut filter = OutlierFilter::new(5, &[Some(50.0)]);
//! for v in [400.0, 401.0, 399.0, 400.0, 400.0] {
//!     assert!(!filter.accept(0, v).rejected);
//! }
//!
//! let spike = filter.accept(0, 520.0);
//! assert!(spike.rejected);
//! assert_eq!(spike.value, 400.0);
//! ```

use heapless::Vec;

use crate::buffer::RingBuffer;
use crate::config::DeviceConfig;
use crate::constants::buffers::{MAX_CHANNELS, MAX_FILTER_WINDOW};

/// Result of feeding one reading through the filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterOutcome {
    /// Filtered value to report
    pub value: f32,
    /// Reading was discarded as a spike
    pub rejected: bool,
}

/// Per-channel filter state
#[derive(Debug, Clone)]
pub struct FilterState {
    history: RingBuffer<MAX_FILTER_WINDOW>,
    max_change: Option<f32>,
    output: Option<f32>,
    rejections: u32,
}

impl FilterState {
    fn new(window: usize, max_change: Option<f32>) -> Self {
        Self {
            history: RingBuffer::with_window(window),
            max_change,
            output: None,
            rejections: 0,
        }
    }

    fn accept(&mut self, value: f32) -> FilterOutcome {
        if let (true, Some(max_change), Some(last), Some(previous)) = (
            self.history.is_full(),
            self.max_change,
            self.history.last(),
            self.output,
        ) {
            if libm::fabsf(value - last) > max_change {
                self.rejections = self.rejections.saturating_add(1);
                return FilterOutcome { value: previous, rejected: true };
            }
        }

        self.history.push(value);
        let mean = self.history.mean().unwrap_or(value);
        self.output = Some(mean);
        FilterOutcome { value: mean, rejected: false }
    }

    /// Spikes rejected since start
    pub fn rejections(&self) -> u32 {
        self.rejections
    }

    /// Warm-up complete
    pub fn is_warm(&self) -> bool {
        self.history.is_full()
    }

    /// Last reported output
    pub fn output(&self) -> Option<f32> {
        self.output
    }

    /// Most recent reading that entered the buffer
    pub fn last_accepted(&self) -> Option<f32> {
        self.history.last()
    }

    fn reset(&mut self) {
        self.history.clear();
        self.output = None;
        self.rejections = 0;
    }
}

/// Outlier filter over all configured channels, indexed like
/// `DeviceConfig::channels`
#[derive(Debug, Clone)]
pub struct OutlierFilter {
    states: Vec<FilterState, MAX_CHANNELS>,
    enabled: bool,
}

impl OutlierFilter {
    /// Filter with `window` and one optional `max_change` per channel
    ///
    /// Channels beyond `MAX_CHANNELS` are ignored.
    pub fn new(window: usize, max_changes: &[Option<f32>]) -> Self {
        let mut states = Vec::new();
        for max_change in max_changes.iter().take(MAX_CHANNELS) {
            // Capacity checked by take()
            let _ = states.push(FilterState::new(window, *max_change));
        }
        Self { states, enabled: true }
    }

    /// Filter matching a validated station config
    pub fn from_config(config: &DeviceConfig) -> Self {
        let mut max_changes: Vec<Option<f32>, MAX_CHANNELS> = Vec::new();
        for channel in config.channels.iter().take(MAX_CHANNELS) {
            let _ = max_changes.push(channel.max_change);
        }

        let mut filter = Self::new(config.filter.window, &max_changes);
        filter.enabled = config.features.data_filtering;
        filter
    }

    /// Feed a calibrated reading for channel `index`
    ///
    /// Unknown indices and a disabled filter pass the value through.
    pub fn accept(&mut self, index: usize, value: f32) -> FilterOutcome {
        if !self.enabled {
            return FilterOutcome { value, rejected: false };
        }

        match self.states.get_mut(index) {
            Some(state) => state.accept(value),
            None => FilterOutcome { value, rejected: false },
        }
    }

    /// State of one channel
    pub fn state(&self, index: usize) -> Option<&FilterState> {
        self.states.get(index)
    }

    /// Rejections summed over all channels
    pub fn total_rejections(&self) -> u32 {
        self.states.iter().fold(0u32, |acc, s| acc.saturating_add(s.rejections))
    }

    /// Forget all history, as after a restart
    pub fn reset(&mut self) {
        for state in self.states.iter_mut() {
            state.reset();
        }
    }

    /// Filtering is active
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_accepts_everything() {
        let mut filter = OutlierFilter::new(5, &[Some(10.0)]);

        for v in [0.0, 100.0, 0.0, 100.0, 0.0] {
            assert!(!filter.accept(0, v).rejected);
        }
        assert_eq!(filter.total_rejections(), 0);
        assert!(filter.state(0).unwrap().is_warm());
    }

    #[test]
    fn spike_after_warm_up_keeps_previous_output() {
        let mut filter = OutlierFilter::new(3, &[Some(10.0)]);
        filter.accept(0, 20.0);
        filter.accept(0, 21.0);
        let before = filter.accept(0, 22.0);

        let spike = filter.accept(0, 90.0);
        assert!(spike.rejected);
        assert_eq!(spike.value, before.value);
        assert_eq!(filter.state(0).unwrap().rejections(), 1);

        // Rejected value never entered the buffer
        let next = filter.accept(0, 23.0);
        assert!(!next.rejected);
        assert!((next.value - 22.0).abs() < 1e-6);
    }

    #[test]
    fn delta_measured_against_last_accepted() {
        let mut filter = OutlierFilter::new(2, &[Some(5.0)]);
        filter.accept(0, 0.0);
        filter.accept(0, 10.0);

        // 14 is within 5 of the last accepted 10, even though the mean is 5
        assert!(!filter.accept(0, 14.0).rejected);
    }

    #[test]
    fn channel_without_limit_never_rejects() {
        let mut filter = OutlierFilter::new(2, &[None]);
        filter.accept(0, 1.0);
        filter.accept(0, 1.0);
        assert!(!filter.accept(0, 1000.0).rejected);
    }

    #[test]
    fn disabled_filter_passes_through() {
        let mut config = DeviceConfig::default();
        config.features.data_filtering = false;
        let mut filter = OutlierFilter::from_config(&config);

        assert_eq!(filter.accept(1, 400.0).value, 400.0);
        assert_eq!(filter.accept(1, 100.0).value, 100.0);
        assert!(!filter.is_enabled());
    }

    #[test]
    fn reset_restarts_warm_up() {
        let mut filter = OutlierFilter::new(2, &[Some(1.0)]);
        filter.accept(0, 0.0);
        filter.accept(0, 0.0);
        filter.reset();

        assert!(filter.state(0).unwrap().output().is_none());
        assert!(!filter.accept(0, 50.0).rejected);
    }
}
