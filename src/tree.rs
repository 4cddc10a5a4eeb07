//! Order-Statistics Tree
//!
//! Height-balanced (AVL) binary search tree augmented with per-node
//! occurrence counts and subtree weights, giving O(log n) rank queries
//! ("k-th smallest key") over a multiset of `f32` keys.
//!
//! One tree type serves two unrelated call sites: the sliding-window median
//! ([`crate::median::RollingMedian`]) selects ranks over magnitude values,
//! and the peak deduplicator ([`crate::peaks::PeakSet`]) keys by frequency
//! and walks ranges. Keys are ordered with [`f32::total_cmp`]; inserting an
//! exactly-equal key increments the existing node's occurrence count.

use std::cmp::Ordering;
use thiserror::Error;

/// Errors from rank queries on the tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// A rank was requested from a tree with no elements.
    #[error("select on an empty tree")]
    Empty,

    /// The requested rank is outside `[0, len)`.
    #[error("rank {rank} out of range for tree of {len} elements")]
    RankOutOfRange {
        /// The requested rank.
        rank: usize,
        /// Total number of elements (occurrences) in the tree.
        len: usize,
    },
}

type Link = Option<Box<Node>>;

#[derive(Debug)]
struct Node {
    key: f32,
    value: f32,
    count: usize,
    weight: usize,
    height: i32,
    left: Link,
    right: Link,
}

impl Node {
    fn new(key: f32, value: f32) -> Self {
        Node {
            key,
            value,
            count: 1,
            weight: 1,
            height: 0,
            left: None,
            right: None,
        }
    }

    fn update(&mut self) {
        self.height = height(&self.left).max(height(&self.right)) + 1;
        self.weight = self.count + weight(&self.left) + weight(&self.right);
    }

    fn balance(&self) -> i32 {
        height(&self.left) - height(&self.right)
    }
}

fn height(link: &Link) -> i32 {
    link.as_ref().map_or(-1, |n| n.height)
}

fn weight(link: &Link) -> usize {
    link.as_ref().map_or(0, |n| n.weight)
}

fn rotate_right(mut node: Box<Node>) -> Box<Node> {
    let mut other = node.left.take().expect("rotate_right needs a left child");
    node.left = other.right.take();
    node.update();
    other.right = Some(node);
    other.update();
    other
}

fn rotate_left(mut node: Box<Node>) -> Box<Node> {
    let mut other = node.right.take().expect("rotate_left needs a right child");
    node.right = other.left.take();
    node.update();
    other.left = Some(node);
    other.update();
    other
}

/// Restore the AVL height invariant at `node` after an insert or remove
/// one level below. Assumes child subtrees are already balanced.
fn rebalance(mut node: Box<Node>) -> Box<Node> {
    node.update();
    let balance = node.balance();
    if balance > 1 {
        // Left-right case first rotates the left child into a left-left case.
        if node.left.as_ref().map_or(0, |n| n.balance()) < 0 {
            node.left = Some(rotate_left(node.left.take().expect("unbalanced left")));
            node.update();
        }
        return rotate_right(node);
    }
    if balance < -1 {
        if node.right.as_ref().map_or(0, |n| n.balance()) > 0 {
            node.right = Some(rotate_right(node.right.take().expect("unbalanced right")));
            node.update();
        }
        return rotate_left(node);
    }
    node
}

fn insert_node(link: Link, key: f32, value: f32) -> Box<Node> {
    let mut node = match link {
        None => return Box::new(Node::new(key, value)),
        Some(node) => node,
    };
    match key.total_cmp(&node.key) {
        Ordering::Less => node.left = Some(insert_node(node.left.take(), key, value)),
        Ordering::Greater => node.right = Some(insert_node(node.right.take(), key, value)),
        Ordering::Equal => {
            node.count += 1;
            node.update();
            return node;
        }
    }
    rebalance(node)
}

/// Detach the minimum node of a subtree, rebalancing along the way back up.
fn take_min(mut node: Box<Node>) -> (Link, Box<Node>) {
    match node.left.take() {
        None => {
            let rest = node.right.take();
            (rest, node)
        }
        Some(left) => {
            let (rest, min) = take_min(left);
            node.left = rest;
            (Some(rebalance(node)), min)
        }
    }
}

fn remove_node(link: Link, key: f32) -> (Link, bool) {
    let mut node = match link {
        None => return (None, false),
        Some(node) => node,
    };
    let removed = match key.total_cmp(&node.key) {
        Ordering::Less => {
            let (rest, removed) = remove_node(node.left.take(), key);
            node.left = rest;
            removed
        }
        Ordering::Greater => {
            let (rest, removed) = remove_node(node.right.take(), key);
            node.right = rest;
            removed
        }
        Ordering::Equal => {
            if node.count > 1 {
                node.count -= 1;
                node.update();
                return (Some(node), true);
            }
            return match (node.left.take(), node.right.take()) {
                (None, None) => (None, true),
                (None, Some(right)) => (Some(right), true),
                (Some(left), None) => (Some(left), true),
                (Some(left), Some(right)) => {
                    // Replace with the in-order successor, moving its whole
                    // occurrence count so duplicate keys stay merged.
                    let (rest, successor) = take_min(right);
                    node.key = successor.key;
                    node.value = successor.value;
                    node.count = successor.count;
                    node.left = Some(left);
                    node.right = rest;
                    (Some(rebalance(node)), true)
                }
            };
        }
    };
    (Some(rebalance(node)), removed)
}

/// AVL multiset of `f32` keys with an `f32` payload per distinct key and
/// O(log n) rank selection.
#[derive(Debug, Default)]
pub struct OrderStatsTree {
    root: Link,
}

impl OrderStatsTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        OrderStatsTree { root: None }
    }

    /// Insert one occurrence of `key` carrying `value`.
    ///
    /// An exactly-equal existing key gains an occurrence and keeps its
    /// original payload.
    pub fn insert(&mut self, key: f32, value: f32) {
        self.root = Some(insert_node(self.root.take(), key, value));
    }

    /// Insert one occurrence of `key` with a unit payload.
    pub fn insert_key(&mut self, key: f32) {
        self.insert(key, 0.0);
    }

    /// Remove one occurrence of `key`. Returns whether the key was present.
    pub fn remove(&mut self, key: f32) -> bool {
        let (root, removed) = remove_node(self.root.take(), key);
        self.root = root;
        removed
    }

    /// The `rank`-th smallest key (0-indexed) across all occurrences.
    pub fn select_key(&self, rank: usize) -> Result<f32, TreeError> {
        let root = self.root.as_deref().ok_or(TreeError::Empty)?;
        if rank >= root.weight {
            return Err(TreeError::RankOutOfRange {
                rank,
                len: root.weight,
            });
        }
        let mut node = root;
        let mut rank = rank;
        loop {
            let left_weight = weight(&node.left);
            if rank < left_weight {
                node = node.left.as_deref().expect("subtree weight invariant");
                continue;
            }
            if rank < left_weight + node.count {
                return Ok(node.key);
            }
            rank -= left_weight + node.count;
            node = node.right.as_deref().expect("subtree weight invariant");
        }
    }

    /// Total number of elements, counting duplicate occurrences.
    pub fn len(&self) -> usize {
        weight(&self.root)
    }

    /// True when the tree holds no elements.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Drop all elements.
    pub fn clear(&mut self) {
        self.root = None;
    }

    /// Visit every distinct key in ascending order as `(key, value)`.
    pub fn for_each(&self, mut f: impl FnMut(f32, f32)) {
        fn walk(link: &Link, f: &mut impl FnMut(f32, f32)) {
            if let Some(node) = link {
                walk(&node.left, f);
                f(node.key, node.value);
                walk(&node.right, f);
            }
        }
        walk(&self.root, &mut f);
    }

    /// Visit distinct keys in `[lo, hi]` in ascending order as `(key, value)`.
    pub fn for_each_in_range(&self, lo: f32, hi: f32, mut f: impl FnMut(f32, f32)) {
        fn walk(link: &Link, lo: f32, hi: f32, f: &mut impl FnMut(f32, f32)) {
            if let Some(node) = link {
                if node.key > lo {
                    walk(&node.left, lo, hi, f);
                }
                if node.key >= lo && node.key <= hi {
                    f(node.key, node.value);
                }
                if node.key < hi {
                    walk(&node.right, lo, hi, f);
                }
            }
        }
        walk(&self.root, lo, hi, &mut f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn assert_invariants(link: &Link) -> (i32, usize) {
        match link {
            None => (-1, 0),
            Some(node) => {
                let (lh, lw) = assert_invariants(&node.left);
                let (rh, rw) = assert_invariants(&node.right);
                assert!((lh - rh).abs() <= 1, "AVL balance violated");
                assert_eq!(node.height, lh.max(rh) + 1);
                assert_eq!(node.weight, node.count + lw + rw);
                if let Some(left) = &node.left {
                    assert!(left.key < node.key);
                }
                if let Some(right) = &node.right {
                    assert!(right.key > node.key);
                }
                (node.height, node.weight)
            }
        }
    }

    #[test]
    fn select_matches_sorted_reference_under_random_churn() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut tree = OrderStatsTree::new();
        let mut reference: Vec<f32> = Vec::new();

        for _ in 0..2000 {
            // Small key space forces duplicate-key paths.
            let key = rng.gen_range(0..50) as f32;
            if !reference.is_empty() && rng.gen_bool(0.4) {
                let victim = reference[rng.gen_range(0..reference.len())];
                assert!(tree.remove(victim));
                let pos = reference
                    .iter()
                    .position(|&v| v == victim)
                    .expect("reference holds victim");
                reference.remove(pos);
            } else {
                tree.insert_key(key);
                let pos = reference.partition_point(|&v| v < key);
                reference.insert(pos, key);
            }

            assert_eq!(tree.len(), reference.len());
            for (rank, &expected) in reference.iter().enumerate() {
                assert_eq!(tree.select_key(rank), Ok(expected));
            }
            assert_invariants(&tree.root);
        }
    }

    #[test]
    fn select_out_of_range_fails() {
        let mut tree = OrderStatsTree::new();
        assert_eq!(tree.select_key(0), Err(TreeError::Empty));
        tree.insert_key(1.0);
        tree.insert_key(1.0);
        assert_eq!(tree.select_key(1), Ok(1.0));
        assert_eq!(
            tree.select_key(2),
            Err(TreeError::RankOutOfRange { rank: 2, len: 2 })
        );
    }

    #[test]
    fn remove_missing_key_is_a_no_op() {
        let mut tree = OrderStatsTree::new();
        tree.insert_key(3.0);
        assert!(!tree.remove(4.0));
        assert_eq!(tree.len(), 1);
        assert!(tree.remove(3.0));
        assert!(tree.is_empty());
    }

    #[test]
    fn duplicate_keys_merge_and_unmerge() {
        let mut tree = OrderStatsTree::new();
        tree.insert(440.0, 1.0);
        tree.insert(440.0, 2.0);
        assert_eq!(tree.len(), 2);
        let mut seen = Vec::new();
        tree.for_each(|k, v| seen.push((k, v)));
        // One node, the first payload, two occurrences.
        assert_eq!(seen, vec![(440.0, 1.0)]);
        assert!(tree.remove(440.0));
        assert_eq!(tree.len(), 1);
        assert!(tree.remove(440.0));
        assert!(tree.is_empty());
    }

    #[test]
    fn range_traversal_is_inclusive_and_ordered() {
        let mut tree = OrderStatsTree::new();
        for key in [5.0, 1.0, 9.0, 3.0, 7.0] {
            tree.insert(key, key * 10.0);
        }
        let mut keys = Vec::new();
        tree.for_each_in_range(3.0, 7.0, |k, _| keys.push(k));
        assert_eq!(keys, vec![3.0, 5.0, 7.0]);

        let mut all = Vec::new();
        tree.for_each(|k, _| all.push(k));
        assert_eq!(all, vec![1.0, 3.0, 5.0, 7.0, 9.0]);
    }
}
