//! cursor - incremental percentile tracking
//!
//! A cursor pins one registered percentile to a node of the tree and keeps
//! the prefix count of that node up to date as samples arrive and leave.
//! Reads are then a field access; the cost is a short chain walk on every
//! update, which is constant amortised for stationary streams because the
//! percentile rank only drifts past a node boundary occasionally.
//!
//! The resting position is the nearest-rank one: the cursor sits on the
//! largest node whose cumulative count stays within the target fraction of
//! the live total, give or take the discrete steps a tied block forces.

use super::tree::{NodeId, Tree};

/// Canonical textual key for a percentile target. Cursor registration and
/// every later lookup, including the cross-histogram reuse in the product
/// search, go through this same encoding.
pub(crate) fn percentile_key(p: f64) -> String {
    format!("{:E}", p)
}

/// One tracked percentile and its current resting place.
#[derive(Debug, Clone)]
pub(crate) struct PercentileCursor {
    /// Target fraction in (0, 1).
    pub percentile: f64,
    /// Node the cursor rests on; None exactly while the histogram is empty.
    pub item: Option<NodeId>,
    /// Live samples with value <= the resting node's value.
    pub count: u64,
    /// count over the live total as of the last commit.
    pub real_percentage: f64,
}

impl PercentileCursor {
    pub fn new(percentile: f64) -> PercentileCursor {
        PercentileCursor {
            percentile,
            item: None,
            count: 0,
            real_percentage: 0.0,
        }
    }

    /// Bind to the first node of a previously empty histogram.
    pub fn bind(&mut self, node: NodeId, multiplicity: u64) {
        self.item = Some(node);
        self.count = multiplicity;
        self.real_percentage = 1.0;
    }

    /// Reset to the unbound state when the histogram drains empty.
    pub fn reset(&mut self) {
        self.item = None;
        self.count = 0;
        self.real_percentage = 0.0;
    }

    /// A sample of value `v` was inserted; `total` is the new live count.
    pub fn on_insert(&mut self, tree: &Tree, v: f64, total: u64) {
        let item = match self.item {
            Some(i) => i,
            None => return,
        };
        if v <= tree.value_of(item) {
            // The new sample landed in our prefix.
            self.count += 1;
            self.walk_backward(tree, total);
        } else {
            self.walk_forward(tree, total);
        }
    }

    /// A sample was removed; `removed` may point at a freed slot when
    /// `node_removed` is set, so its value travels separately. `prev_chain`
    /// and `next_chain` are the removed node's neighbours captured before
    /// the deletion. `total` is the remaining live count and is non-zero.
    pub fn on_delete(
        &mut self,
        tree: &Tree,
        removed: NodeId,
        removed_value: f64,
        node_removed: bool,
        prev_chain: Option<NodeId>,
        next_chain: Option<NodeId>,
        total: u64,
    ) {
        let item = match self.item {
            Some(i) => i,
            None => return,
        };
        if item == removed || removed_value <= tree.value_of(item) {
            self.count -= 1;
            if node_removed && (item == removed || removed_value == tree.value_of(item)) {
                // Our node left the tree; reseat on the successor, whose
                // multiplicity joins the prefix, else fall back on the
                // predecessor (prefix already correct after the decrement).
                if let Some(nx) = next_chain {
                    self.item = Some(nx);
                    self.count += tree.multiplicity_of(nx);
                } else if let Some(pv) = prev_chain {
                    self.item = Some(pv);
                } else {
                    self.item = None;
                }
            }
            if self.item.is_some() {
                self.walk_forward(tree, total);
            } else {
                self.real_percentage = self.count as f64 / total as f64;
            }
        } else {
            // The removed sample was above us; only the total shrank, which
            // can push our fraction over target.
            self.walk_backward(tree, total);
        }
    }

    /// Advance while the next node still fits under the target fraction.
    fn walk_forward(&mut self, tree: &Tree, total: u64) {
        let n = total as f64;
        let mut pct = self.count as f64 / n;
        self.real_percentage = pct;
        let item = match self.item {
            Some(i) => i,
            None => return,
        };
        let mut x = tree.next_of(item);
        while let Some(xi) = x {
            if pct >= self.percentile {
                break;
            }
            let stepped = (self.count + tree.multiplicity_of(xi)) as f64 / n;
            if stepped <= self.percentile {
                self.item = Some(xi);
                self.count += tree.multiplicity_of(xi);
                self.real_percentage = stepped;
            }
            pct = stepped;
            x = tree.next_of(xi);
        }
    }

    /// Retreat while the fraction without the current node still overshoots.
    fn walk_backward(&mut self, tree: &Tree, total: u64) {
        let n = total as f64;
        let mut pct = self.count as f64 / n;
        self.real_percentage = pct;
        while pct > self.percentile {
            let cur = match self.item {
                Some(i) => i,
                None => break,
            };
            let x = match tree.prev_of(cur) {
                Some(x) => x,
                None => break,
            };
            self.count -= tree.multiplicity_of(cur);
            self.item = Some(x);
            self.real_percentage = self.count as f64 / n;
            pct = (self.count - tree.multiplicity_of(x)) as f64 / n;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn key_is_stable_and_distinct() {
        assert_eq!(percentile_key(0.95), percentile_key(0.95));
        assert_ne!(percentile_key(0.95), percentile_key(0.955));
        assert_ne!(percentile_key(0.5), percentile_key(0.05));
    }

    #[test]
    fn sequential_inserts_track_nearest_rank() {
        let mut tree = Tree::new();
        let mut cursors: Vec<PercentileCursor> = [0.25, 0.5, 0.75, 0.9]
            .iter()
            .map(|&p| PercentileCursor::new(p))
            .collect();
        let mut root = None;
        for i in 1..=10 {
            let v = f64::from(i);
            match root {
                None => {
                    let node = tree.alloc(v, 1);
                    root = Some(node);
                    for c in cursors.iter_mut() {
                        c.bind(node, 1);
                    }
                }
                Some(r) => {
                    let (_, nr) = tree.insert(r, v, 1);
                    if let Some(nr) = nr {
                        root = Some(nr);
                    }
                    let total = tree.subtree_count_of(root.unwrap());
                    for c in cursors.iter_mut() {
                        c.on_insert(&tree, v, total);
                    }
                }
            }
            for c in cursors.iter() {
                let item = c.item.unwrap();
                assert_eq!(c.count, tree.cumulative_count(item));
            }
        }
        let values: Vec<f64> = cursors
            .iter()
            .map(|c| tree.value_of(c.item.unwrap()))
            .collect();
        assert_eq!(values, vec![2.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn tied_block_keeps_cursor_on_the_block() {
        let mut tree = Tree::new();
        let mut cursor = PercentileCursor::new(0.5);
        let node = tree.alloc(42.0, 1);
        let root = node;
        cursor.bind(node, 1);
        for _ in 1..50 {
            let (_, nr) = tree.insert(root, 42.0, 1);
            assert!(nr.is_none());
            cursor.on_insert(&tree, 42.0, tree.subtree_count_of(root));
        }
        assert_eq!(tree.value_of(cursor.item.unwrap()), 42.0);
        assert_eq!(cursor.count, 50);
        assert_eq!(cursor.real_percentage, 1.0);
    }
}
