//! Running and moving averages
//!
//! A fixed-capacity running mean (used by the noise-floor smoothing stage
//! and by the cross-frame cents smoother) and the symmetric boxcar
//! [`MovingAverage`] stage built on top of it.

use crate::ring::RingBuffer;
use crate::stage::Stage;
use thiserror::Error;

/// Querying the mean of a buffer holding no samples.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("average of an empty buffer")]
pub struct EmptyAverage;

/// Running mean over the last `capacity` (or fewer) inserted values.
#[derive(Debug)]
pub struct RunningAverage {
    ring: RingBuffer<f32>,
    acc: f32,
}

impl RunningAverage {
    /// Create a running average over at most `capacity` values.
    pub fn new(capacity: usize) -> Self {
        RunningAverage {
            ring: RingBuffer::with_capacity(capacity),
            acc: 0.0,
        }
    }

    /// Insert a value, displacing the oldest one when at capacity.
    pub fn put(&mut self, value: f32) {
        if let Some(evicted) = self.ring.push(value) {
            self.acc -= evicted;
        }
        self.acc += value;
    }

    /// Drop the oldest value, shrinking the averaged set.
    pub fn remove_first(&mut self) {
        if let Some(el) = self.ring.pop_front() {
            self.acc -= el;
        }
    }

    /// Mean of the currently held values.
    pub fn average(&self) -> Result<f32, EmptyAverage> {
        if self.ring.is_empty() {
            return Err(EmptyAverage);
        }
        Ok(self.acc / self.ring.len() as f32)
    }

    /// Number of values currently averaged.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// True when no values are held.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Forget all values.
    pub fn reset(&mut self) {
        self.ring.clear();
        self.acc = 0.0;
    }
}

/// Symmetric boxcar average of half-width `spread`.
///
/// Interior samples are the mean of the `2*spread + 1` surrounding values;
/// the first and last `spread` samples average progressively fewer points
/// (no padding or reflection), matching the median stage's edge convention
/// so the composed noise floor stays lag-free at the boundaries.
pub struct MovingAverage {
    spread: usize,
    window: RunningAverage,
}

impl MovingAverage {
    /// Create a boxcar stage of half-width `spread`.
    pub fn new(spread: usize) -> Self {
        MovingAverage {
            spread,
            window: RunningAverage::new(2 * spread + 1),
        }
    }
}

impl Stage for MovingAverage {
    fn apply(&mut self, data: &mut [f32]) {
        let spread = self.spread;
        let len = data.len();
        debug_assert!(len > spread, "buffer shorter than the averaging spread");
        self.window.reset();

        for &v in data.iter().take(spread) {
            self.window.put(v);
        }
        for i in 0..len - spread {
            self.window.put(data[spread + i]);
            data[i] = self.window.average().expect("window holds samples");
        }
        for i in 0..spread {
            self.window.remove_first();
            data[len - spread + i] = self.window.average().expect("window holds samples");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_average_tracks_last_capacity_values() {
        let mut avg = RunningAverage::new(3);
        assert_eq!(avg.average(), Err(EmptyAverage));
        avg.put(1.0);
        avg.put(2.0);
        assert_eq!(avg.average(), Ok(1.5));
        avg.put(3.0);
        avg.put(4.0); // displaces 1.0
        assert_eq!(avg.average(), Ok(3.0));
        avg.remove_first();
        assert_eq!(avg.len(), 2);
        assert_eq!(avg.average(), Ok(3.5));
        avg.reset();
        assert!(avg.is_empty());
        assert_eq!(avg.average(), Err(EmptyAverage));
    }

    #[test]
    fn moving_average_matches_brute_force_with_edge_divisors() {
        let spread = 2;
        let input: Vec<f32> = vec![1.0, 4.0, 2.0, 8.0, 5.0, 7.0, 3.0, 6.0];
        let mut data = input.clone();
        MovingAverage::new(spread).apply(&mut data);

        for (i, &got) in data.iter().enumerate() {
            let lo = i.saturating_sub(spread);
            let hi = (i + spread + 1).min(input.len());
            let expected: f32 = input[lo..hi].iter().sum::<f32>() / (hi - lo) as f32;
            assert!(
                (got - expected).abs() < 1e-5,
                "position {i}: got {got}, expected {expected}"
            );
        }
    }

    #[test]
    fn moving_average_zero_spread_is_identity() {
        let mut data = vec![3.0, -1.0, 2.5];
        MovingAverage::new(0).apply(&mut data);
        assert_eq!(data, vec![3.0, -1.0, 2.5]);
    }
}
