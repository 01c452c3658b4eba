//! Fixed-Capacity Ring Buffer for Moving Averages
//!
//! ## Overview
//!
//! Each filtered channel keeps its last N accepted readings in a ring
//! buffer. Capacity is a compile-time constant so the storage is a plain
//! array; the *window* actually used is chosen at runtime from the station
//! config and must not exceed the capacity.
//!
//! ```text
//! RingBuffer<8> with window = 5, after 6 pushes:
//! ┌─────┬─────┬─────┬─────┬─────┬─────┬─────┬─────┐
//! │  F  │  B  │  C  │  D  │  E  │  -  │  -  │  -  │
//! └─────┴─────┴─────┴─────┴─────┴─────┴─────┴─────┘
//!          ↑
//!          write_pos = 1 (next overwrite; B is the oldest)
//! ```
//!
//! All operations are O(1) except `mean` and `iter`, which walk at most
//! `window` slots. No allocation, no `unsafe`.
//!
//! ## Usage Example
//!
//! ```rust
//! use stromwater_core::buffer::RingBuffer;
//!
//! let mut history: RingBuffer<16> = RingBuffer::with_window(3);
//! history.push(400.0);
//! history.push(410.0);
//! history.push(420.0);
//! history.push(430.0); // overwrites 400.0
//!
//! assert!(history.is_full());
//! assert_eq!(history.last(), Some(430.0));
//! assert_eq!(history.mean(), Some(420.0));
//! ```

/// Ring buffer of `f32` readings with a runtime window
///
/// ## Internal Invariants
///
/// - `1 <= window <= N`
/// - `write_pos < window`
/// - `len <= window`
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    data: [f32; N],
    window: usize,
    write_pos: usize,
    len: usize,
}

impl<const N: usize> RingBuffer<N> {
    /// Buffer using the full capacity as its window
    pub const fn new() -> Self {
        Self::with_window(N)
    }

    /// Buffer averaging over `window` readings, clamped into `1..=N`
    pub const fn with_window(window: usize) -> Self {
        let window = if window == 0 {
            1
        } else if window > N {
            N
        } else {
            window
        };

        Self {
            data: [0.0; N],
            window,
            write_pos: 0,
            len: 0,
        }
    }

    /// Adds a reading, overwriting the oldest once the window is full
    pub fn push(&mut self, value: f32) {
        self.data[self.write_pos] = value;
        self.write_pos = (self.write_pos + 1) % self.window;

        if self.len < self.window {
            self.len += 1;
        }
    }

    /// Get number of stored readings
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the window is full (warm-up complete)
    pub fn is_full(&self) -> bool {
        self.len == self.window
    }

    /// Configured window
    pub fn window(&self) -> usize {
        self.window
    }

    /// Most recent reading
    pub fn last(&self) -> Option<f32> {
        if self.is_empty() {
            return None;
        }

        let idx = if self.write_pos == 0 { self.window - 1 } else { self.write_pos - 1 };
        Some(self.data[idx])
    }

    /// Arithmetic mean of the stored readings
    pub fn mean(&self) -> Option<f32> {
        if self.is_empty() {
            return None;
        }

        let sum: f32 = self.iter().sum();
        Some(sum / self.len as f32)
    }

    /// Iterate over readings from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        // Not full yet: data starts at 0. Full: oldest sits at write_pos.
        let start = if self.len < self.window { 0 } else { self.write_pos };
        (0..self.len).map(move |i| self.data[(start + i) % self.window])
    }

    /// Drop all readings, keeping the window
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer() {
        let buffer: RingBuffer<5> = RingBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert!(buffer.last().is_none());
        assert!(buffer.mean().is_none());
    }

    #[test]
    fn window_limits_capacity() {
        let mut buffer = RingBuffer::<16>::with_window(3);

        for i in 0..5 {
            buffer.push(i as f32);
        }

        assert_eq!(buffer.len(), 3);
        assert!(buffer.is_full());

        // 0 and 1 were overwritten
        let values: Vec<f32> = buffer.iter().collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(buffer.last(), Some(4.0));
        assert_eq!(buffer.mean(), Some(3.0));
    }

    #[test]
    fn iterator_order_before_wrap() {
        let mut buffer = RingBuffer::<4>::new();
        buffer.push(1.0);
        buffer.push(2.0);

        let values: Vec<f32> = buffer.iter().collect();
        assert_eq!(values, vec![1.0, 2.0]);
        assert!(!buffer.is_full());
    }

    #[test]
    fn window_is_clamped() {
        assert_eq!(RingBuffer::<4>::with_window(0).window(), 1);
        assert_eq!(RingBuffer::<4>::with_window(9).window(), 4);
    }

    #[test]
    fn clear_restarts_warm_up() {
        let mut buffer = RingBuffer::<4>::with_window(2);
        buffer.push(1.0);
        buffer.push(2.0);
        assert!(buffer.is_full());

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.window(), 2);
    }
}
