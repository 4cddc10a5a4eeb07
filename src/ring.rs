//! Ring Buffer
//!
//! Fixed-capacity circular buffer used to track insertion order in the
//! sliding-window stages and the cross-frame smoother.

/// Fixed-capacity circular buffer with oldest-first access.
///
/// Pushing into a full buffer evicts and returns the oldest element, so the
/// buffer always holds the most recent `capacity` values.
#[derive(Debug, Clone)]
pub struct RingBuffer<T: Copy> {
    buffer: Vec<T>,
    start: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create an empty buffer holding at most `capacity` elements.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        RingBuffer {
            buffer: vec![T::default(); capacity],
            start: 0,
            len: 0,
        }
    }
}

impl<T: Copy> RingBuffer<T> {
    /// Append an element, evicting and returning the oldest one when full.
    pub fn push(&mut self, el: T) -> Option<T> {
        let cap = self.buffer.len();
        if self.len == cap {
            let evicted = self.buffer[self.start];
            self.buffer[self.start] = el;
            self.start = (self.start + 1) % cap;
            return Some(evicted);
        }
        self.buffer[(self.start + self.len) % cap] = el;
        self.len += 1;
        None
    }

    /// Oldest element, if any.
    pub fn front(&self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        Some(self.buffer[self.start])
    }

    /// Remove and return the oldest element.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let el = self.buffer[self.start];
        self.start = (self.start + 1) % self.buffer.len();
        self.len -= 1;
        Some(el)
    }

    /// Number of elements currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no elements are held.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when the next `push` will evict.
    pub fn is_full(&self) -> bool {
        self.len == self.buffer.len()
    }

    /// Maximum number of elements.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all elements, keeping the allocation.
    pub fn clear(&mut self) {
        self.start = 0;
        self.len = 0;
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let cap = self.buffer.len();
        (0..self.len).map(move |i| self.buffer[(self.start + i) % cap])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop_preserve_order() {
        let mut ring = RingBuffer::with_capacity(3);
        assert!(ring.is_empty());
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.push(3), None);
        assert!(ring.is_full());
        assert_eq!(ring.front(), Some(1));
        assert_eq!(ring.pop_front(), Some(1));
        assert_eq!(ring.pop_front(), Some(2));
        assert_eq!(ring.pop_front(), Some(3));
        assert_eq!(ring.pop_front(), None);
    }

    #[test]
    fn push_when_full_evicts_oldest() {
        let mut ring = RingBuffer::with_capacity(2);
        ring.push(10);
        ring.push(20);
        assert_eq!(ring.push(30), Some(10));
        assert_eq!(ring.iter().collect::<Vec<_>>(), vec![20, 30]);
    }

    #[test]
    fn wraparound_keeps_len_consistent() {
        let mut ring = RingBuffer::with_capacity(3);
        for i in 0..10 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.iter().collect::<Vec<_>>(), vec![7, 8, 9]);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), 3);
    }
}
