//! Rolling Median
//!
//! Sliding-window median stage, the first half of the noise-floor
//! estimator. An order-statistics tree holds the current window so each
//! step costs O(log window) instead of a sort per position; a parallel ring
//! buffer remembers insertion order so the oldest sample can be deleted as
//! the window slides.

use crate::ring::RingBuffer;
use crate::stage::Stage;
use crate::tree::OrderStatsTree;

/// Sliding-window median of width `2 * spread + 1`.
///
/// At the start of the buffer the window grows from one sample to full
/// width (position `i < spread` reports the `i/2`-th order statistic of the
/// first `i + 1` samples); at the end it shrinks symmetrically, selecting
/// the middle of the remaining tracked samples before each deletion.
pub struct RollingMedian {
    spread: usize,
    tree: OrderStatsTree,
    window: RingBuffer<f32>,
}

impl RollingMedian {
    /// Create a median filter of half-width `spread`.
    pub fn new(spread: usize) -> Self {
        RollingMedian {
            spread,
            tree: OrderStatsTree::new(),
            window: RingBuffer::with_capacity(2 * spread + 1),
        }
    }

    fn select(&self, rank: usize) -> f32 {
        self.tree.select_key(rank).expect("median rank within window")
    }
}

impl Stage for RollingMedian {
    fn apply(&mut self, data: &mut [f32]) {
        let spread = self.spread;
        let width = 2 * spread + 1;
        let len = data.len();
        debug_assert!(len >= width, "buffer shorter than the median window");
        self.tree.clear();
        self.window.clear();

        // Growing edge: the first `spread` outputs see only a partial window.
        for i in 0..width - 1 {
            let el = data[i];
            self.window.push(el);
            self.tree.insert_key(el);
            if i < spread {
                data[i] = self.select(i / 2);
            }
        }

        // Steady state: insert the newest, select the middle, drop the oldest.
        for i in spread..len - spread {
            let el = data[i + spread];
            self.window.push(el);
            self.tree.insert_key(el);
            data[i] = self.select(spread);
            let oldest = self.window.pop_front().expect("window is non-empty");
            self.tree.remove(oldest);
        }

        // Shrinking edge: delete without inserting.
        for value in data[len - spread..].iter_mut() {
            *value = self.select(self.tree.len() / 2);
            let oldest = self.window.pop_front().expect("window is non-empty");
            self.tree.remove(oldest);
        }
    }
}
