//! Peak extraction
//!
//! Local-maximum scanning with plateau tolerance, parabolic sub-bin
//! interpolation, and frequency-domain deduplication of the resulting
//! candidates.

use crate::tree::OrderStatsTree;

/// Local-maximum scanner with plateau tolerance.
///
/// A bin qualifies as a peak once a strictly-increasing run of at least
/// `spread` samples is immediately followed by a strictly-decreasing run of
/// exactly `spread` samples. Equal neighbouring samples reset both run
/// counters, so flat tops never fire twice.
pub struct PeakFinder {
    spread: usize,
}

impl PeakFinder {
    /// Create a scanner requiring monotonic runs of `spread` samples.
    pub fn new(spread: usize) -> Self {
        PeakFinder { spread }
    }

    /// Invoke `handler(bin, value)` for every detected peak, in ascending
    /// bin order.
    pub fn for_each_peak(&self, data: &[f32], mut handler: impl FnMut(usize, f32)) {
        if data.len() < 2 {
            return;
        }
        let mut last = data[0];
        let mut increasing = false;
        let mut run_up = 0usize;
        let mut run_down = 0usize;
        for (i, &el) in data.iter().enumerate().skip(1) {
            if el > last {
                run_up = if increasing { run_up + 1 } else { 1 };
                increasing = true;
            } else if el < last {
                run_down = if increasing { 1 } else { run_down + 1 };
                increasing = false;
                if run_up >= self.spread && run_down == self.spread {
                    handler(i - self.spread, data[i - self.spread]);
                }
            } else {
                run_up = 0;
                run_down = 0;
            }
            last = el;
        }
    }
}

/// Parabolic interpolation of a peak's fractional bin offset from the
/// samples left of, at, and right of the peak.
///
/// Fits `0.5 * (l - r) / (l - 2c + r)`, clamped to `[-0.5, 0.5]`. A
/// degenerate (near-zero) denominator yields an offset of `0.0` so a single
/// flat or symmetric triple can never inject a NaN into the frequency path.
pub fn interpolate_peak(left: f32, center: f32, right: f32) -> f32 {
    let denominator = left - 2.0 * center + right;
    if denominator.abs() < f32::EPSILON {
        return 0.0;
    }
    (0.5 * (left - right) / denominator).clamp(-0.5, 0.5)
}

/// Frequency-domain peak deduplicator.
///
/// Keyed by frequency over an order-statistics tree, rebuilt empty each
/// frame. Within a tolerance window a stronger existing peak silences new
/// candidates, while a stronger candidate evicts every weaker neighbour, so
/// survivors end up pairwise separated by more than the tolerance.
pub struct PeakSet {
    tree: OrderStatsTree,
    tolerance: f32,
    evict: Vec<f32>,
}

impl PeakSet {
    /// Create a deduplicator with the given frequency tolerance in Hz.
    pub fn new(tolerance: f32) -> Self {
        PeakSet {
            tree: OrderStatsTree::new(),
            tolerance,
            evict: Vec::new(),
        }
    }

    /// Forget all peaks, ready for the next frame.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Offer a candidate peak. Returns whether it survived.
    pub fn add(&mut self, frequency: f32, magnitude: f32) -> bool {
        let mut shadowed = false;
        self.evict.clear();
        let evict = &mut self.evict;
        self.tree.for_each_in_range(
            frequency - self.tolerance,
            frequency + self.tolerance,
            |freq, mag| {
                if mag >= magnitude {
                    shadowed = true;
                } else {
                    evict.push(freq);
                }
            },
        );
        if shadowed {
            return false;
        }
        for &freq in &self.evict {
            self.tree.remove(freq);
        }
        self.tree.insert(frequency, magnitude);
        true
    }

    /// Number of surviving peaks.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// True when no peaks survived so far.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Append surviving frequencies to `out` in ascending order.
    pub fn collect_into(&self, out: &mut Vec<f32>) {
        self.tree.for_each(|freq, _| out.push(freq));
    }
}
