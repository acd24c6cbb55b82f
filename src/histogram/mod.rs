//! histogram - a sliding-window empirical distribution
//!
//! `Histogram` keeps the last `window_size` samples of a stream and answers
//! percentile queries over exactly those samples. Incoming values are
//! quantised onto a fixed grid, stored in a balanced ordered-node tree
//! (see the `tree` module) and threaded through a FIFO so the oldest sample
//! can be evicted in O(log n) when the window overflows. Registered
//! percentiles are tracked incrementally by cursors that ride the sorted
//! chain of distinct values, so `value_at_percentile` for a registered
//! target is a field read rather than a search.
//!
//! Running mean and variance are maintained by a stable two-term recurrence
//! on both insert and evict, so the moments always describe the current
//! window without a rescan.
//!
//! One mutex guards the whole structure. Every public operation, reads
//! included, takes it for its full duration; the contract is single-writer
//! with callers serialising access, and the lock is what enforces it here.

mod buckets;
mod cursor;
mod tree;

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub(crate) use self::cursor::percentile_key;
use self::cursor::PercentileCursor;
use self::tree::{NodeId, Tree};

/// Upper bound on the quantisation exponent; 10^accuracy must stay an
/// exactly representable integer.
const MAX_ACCURACY: u32 = 9;

/// Read-only view of one registered percentile cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileSnapshot {
    /// The registered target in (0, 1).
    pub percentile: f64,
    /// Value the cursor currently rests on; None while the histogram is
    /// empty.
    pub value: Option<f64>,
    /// Number of live samples at or below the resting value.
    pub count: u64,
    /// `count` over the live total as of the last update.
    pub real_percentage: f64,
}

#[derive(Debug)]
struct HistogramCore {
    tree: Tree,
    queue: VecDeque<NodeId>,
    root: Option<NodeId>,
    min_item: Option<NodeId>,
    max_item: Option<NodeId>,
    buckets: buckets::BucketIndex,
    percentiles: HashMap<String, PercentileCursor>,
    count: u64,
    mean: f64,
    variance: f64,
}

/// A bounded sliding-window histogram with tracked percentiles.
///
/// # Examples
/// ```
/// use windowed_quantiles::Histogram;
///
/// let hist = Histogram::new(10, 10.0, 1);
/// hist.add_percentile_point(0.5);
/// for i in 1..=10 {
///     hist.enqueue(f64::from(i), 1);
/// }
/// assert_eq!(hist.value_at_percentile(0.5), 5.0);
/// assert_eq!(hist.count(), 10);
/// ```
#[derive(Debug)]
pub struct Histogram {
    window_size: i64,
    accuracy_factor: f64,
    slab_size: f64,
    inner: Mutex<HistogramCore>,
}

impl Histogram {
    /// Create a histogram holding at most `window_size` samples.
    ///
    /// `window_size <= 0` disables eviction entirely. `slab_size <= 0`
    /// falls back to 10. `accuracy` is the number of decimal digits kept by
    /// quantisation and is capped at 9; every input value is snapped to
    /// `round(v * 10^accuracy) / 10^accuracy`.
    ///
    /// # Examples
    /// ```
    /// use windowed_quantiles::Histogram;
    ///
    /// let hist = Histogram::new(100, 10.0, 1);
    /// assert_eq!(hist.count(), 0);
    /// assert_eq!(hist.enqueue(3.14, 1), None);
    /// assert_eq!(hist.mean(), 3.1);
    /// ```
    pub fn new(window_size: i64, slab_size: f64, accuracy: u32) -> Histogram {
        let accuracy = accuracy.min(MAX_ACCURACY);
        let accuracy_factor = 10f64.powi(accuracy as i32);
        let slab_size = if slab_size <= 0.0 { 10.0 } else { slab_size };
        let unit_size = 1.0 / accuracy_factor;
        Histogram {
            window_size,
            accuracy_factor,
            slab_size,
            inner: Mutex::new(HistogramCore {
                tree: Tree::new(),
                queue: VecDeque::new(),
                root: None,
                min_item: None,
                max_item: None,
                buckets: buckets::BucketIndex::new(slab_size, unit_size),
                percentiles: HashMap::new(),
                count: 0,
                mean: 0.0,
                variance: 0.0,
            }),
        }
    }

    /// Snap a value onto the quantisation grid.
    pub fn unified_value(&self, v: f64) -> f64 {
        (v * self.accuracy_factor).round() / self.accuracy_factor
    }

    /// Register a percentile target for incremental tracking.
    ///
    /// Cursors should be registered before the first sample arrives; a
    /// cursor added to a non-empty histogram stays unbound until the
    /// histogram next drains empty and refills.
    pub fn add_percentile_point(&self, p: f64) {
        let mut core = self.inner.lock().unwrap();
        core.percentiles
            .insert(percentile_key(p), PercentileCursor::new(p));
    }

    /// Add `count` samples of `value`, evicting from the far end while the
    /// window overflows. Returns the value of the last evicted sample, if
    /// eviction ran.
    pub fn enqueue(&self, value: f64, count: u64) -> Option<f64> {
        if count == 0 {
            return None;
        }
        let v = self.unified_value(value);
        let mut guard = self.inner.lock().unwrap();
        let core = &mut *guard;

        match core.root {
            Some(root) => {
                let (item, new_root) = core.tree.insert(root, v, count);
                if let Some(nr) = new_root {
                    core.root = Some(nr);
                }
                // A fresh node is spliced in adjacent to the old extremes, so
                // one chain hop is enough to keep min and max current.
                if let Some(mi) = core.min_item {
                    if let Some(p) = core.tree.prev_of(mi) {
                        core.min_item = Some(p);
                    }
                }
                if let Some(mx) = core.max_item {
                    if let Some(nx) = core.tree.next_of(mx) {
                        core.max_item = Some(nx);
                    }
                }
                // Only a node created by this insert carries exactly `count`;
                // an existing node already held at least one sample.
                if core.tree.multiplicity_of(item) == count {
                    core.buckets.insert(v, item);
                }
                let total = core.root.map_or(0, |r| core.tree.subtree_count_of(r));
                let tree = &core.tree;
                for c in core.percentiles.values_mut() {
                    c.on_insert(tree, v, total);
                }
                for _ in 0..count {
                    core.queue.push_back(item);
                }
            }
            None => {
                let item = core.tree.alloc(v, count);
                core.root = Some(item);
                core.min_item = Some(item);
                core.max_item = Some(item);
                for c in core.percentiles.values_mut() {
                    c.bind(item, count);
                }
                core.buckets.insert(v, item);
                for _ in 0..count {
                    core.queue.push_back(item);
                }
            }
        }

        let count_pre = core.count;
        core.count += count;
        let n_new = core.count as f64;
        let mean_pre = core.mean;
        core.mean = (core.mean * count_pre as f64 + v * count as f64) / n_new;
        let a = count_pre as f64 / n_new * core.variance;
        let b = count_pre as f64 / n_new * (core.mean - mean_pre).powi(2);
        let c = count as f64 / n_new * (v - core.mean).powi(2);
        core.variance = a + b + c;

        let mut evicted = None;
        while self.window_size > 0 && core.count > self.window_size as u64 {
            evicted = Self::dequeue_core(core);
        }
        evicted
    }

    /// Evict the oldest sample. Returns its quantised value, or None when
    /// the histogram is empty.
    pub fn dequeue(&self) -> Option<f64> {
        let mut guard = self.inner.lock().unwrap();
        Self::dequeue_core(&mut guard)
    }

    fn dequeue_core(core: &mut HistogramCore) -> Option<f64> {
        let id = core.queue.pop_front()?;
        core.count -= 1;
        let value = core.tree.value_of(id);
        let prev_chain = core.tree.prev_of(id);
        let next_chain = core.tree.next_of(id);
        let (replacement, new_root) = core.tree.delete(id);
        let node_removed = new_root.is_some() || (new_root.is_none() && replacement.is_none());
        if node_removed {
            core.root = new_root;
            if core.max_item == Some(id) {
                core.max_item = prev_chain;
            }
            if core.min_item == Some(id) {
                core.min_item = next_chain;
            }
            core.buckets.delete(value);
        }

        let total = core.root.map_or(0, |r| core.tree.subtree_count_of(r));
        let tree = &core.tree;
        if total > 0 {
            for c in core.percentiles.values_mut() {
                c.on_delete(tree, id, value, node_removed, prev_chain, next_chain, total);
            }
        } else {
            for c in core.percentiles.values_mut() {
                c.reset();
            }
        }

        if core.count > 0 {
            let n_new = core.count as f64;
            let n_old = (core.count + 1) as f64;
            let mean_pre = core.mean;
            core.mean = (core.mean * n_old - value) / n_new;
            let a = n_old / n_new * core.variance;
            let b = (mean_pre - core.mean).powi(2);
            let c = (value - mean_pre).powi(2) / n_new;
            core.variance = a - b - c;
        } else {
            core.mean = 0.0;
            core.variance = 0.0;
        }
        Some(value)
    }

    /// Value at a percentile. A registered, bound cursor answers directly;
    /// anything else goes through the numeric search, which reports 0 for
    /// an empty histogram.
    ///
    /// # Examples
    /// ```
    /// use windowed_quantiles::Histogram;
    ///
    /// let hist = Histogram::new(1000, 10.0, 1);
    /// hist.add_percentile_point(0.99);
    /// for i in 0..1000 {
    ///     hist.enqueue(f64::from(i), 1);
    /// }
    /// assert_eq!(hist.value_at_percentile(0.99), 989.0);
    /// ```
    pub fn value_at_percentile(&self, p: f64) -> f64 {
        {
            let core = self.inner.lock().unwrap();
            if let Some(c) = core.percentiles.get(&percentile_key(p)) {
                if let Some(item) = c.item {
                    return core.tree.value_of(item);
                }
            }
        }
        crate::product::calc_percentile_of_product(p, &[self], false)
    }

    /// Fraction of live samples at or below `v`; 0 when empty or when `v`
    /// is below the smallest stored value.
    ///
    /// # Examples
    /// ```
    /// use windowed_quantiles::Histogram;
    ///
    /// let hist = Histogram::new(10, 10.0, 1);
    /// for i in 1..=10 {
    ///     hist.enqueue(f64::from(i), 1);
    /// }
    /// assert_eq!(hist.percentile_for_value(5.0), 0.5);
    /// assert_eq!(hist.percentile_for_value(0.5), 0.0);
    /// ```
    pub fn percentile_for_value(&self, v: f64) -> f64 {
        let core = self.inner.lock().unwrap();
        let root = match core.root {
            Some(r) => r,
            None => return 0.0,
        };
        let total = core.tree.subtree_count_of(root);
        if total == 0 {
            return 0.0;
        }
        match core.tree.find_no_larger_than(Some(root), v) {
            Some(node) => core.tree.cumulative_count(node) as f64 / total as f64,
            None => 0.0,
        }
    }

    /// Window fill fraction: count over window size, 0 when unwindowed.
    ///
    /// # Examples
    /// ```
    /// use windowed_quantiles::Histogram;
    ///
    /// let hist = Histogram::new(100, 10.0, 1);
    /// for i in 0..50 {
    ///     hist.enqueue(f64::from(i), 1);
    /// }
    /// assert_eq!(hist.water_mark(), 0.5);
    /// ```
    pub fn water_mark(&self) -> f64 {
        if self.window_size <= 0 {
            return 0.0;
        }
        self.count() as f64 / self.window_size as f64
    }

    /// Number of live samples in the window.
    pub fn count(&self) -> u64 {
        self.inner.lock().unwrap().count
    }

    /// Mean of the live samples.
    pub fn mean(&self) -> f64 {
        self.inner.lock().unwrap().mean
    }

    /// Variance of the live samples.
    pub fn variance(&self) -> f64 {
        self.inner.lock().unwrap().variance
    }

    /// Smallest live value, None when empty.
    pub fn min_value(&self) -> Option<f64> {
        let core = self.inner.lock().unwrap();
        core.min_item.map(|id| core.tree.value_of(id))
    }

    /// Largest live value, None when empty.
    pub fn max_value(&self) -> Option<f64> {
        let core = self.inner.lock().unwrap();
        core.max_item.map(|id| core.tree.value_of(id))
    }

    /// Height of the ordered-node tree, 0 when empty.
    pub fn root_height(&self) -> u32 {
        let core = self.inner.lock().unwrap();
        core.root.map_or(0, |r| core.tree.height_of(r))
    }

    /// Snapshot of a registered cursor, None when `p` was never registered.
    pub fn percentile_snapshot(&self, p: f64) -> Option<PercentileSnapshot> {
        let core = self.inner.lock().unwrap();
        core.percentiles.get(&percentile_key(p)).map(|c| {
            PercentileSnapshot {
                percentile: c.percentile,
                value: c.item.map(|id| core.tree.value_of(id)),
                count: c.count,
                real_percentage: c.real_percentage,
            }
        })
    }

    // --- surface used by the product percentile search ---

    pub(crate) fn tracks_percentile(&self, key: &str) -> bool {
        self.inner.lock().unwrap().percentiles.contains_key(key)
    }

    pub(crate) fn cursor_value(&self, p: f64) -> Option<f64> {
        let core = self.inner.lock().unwrap();
        core.percentiles
            .get(&percentile_key(p))
            .and_then(|c| c.item)
            .map(|id| core.tree.value_of(id))
    }

    /// One CDF factor at a probe value: the fraction of samples at or below
    /// it, or the saturation marker when the floor lands on the maximum.
    pub(crate) fn cdf_factor(&self, criteria: f64) -> CdfFactor {
        let core = self.inner.lock().unwrap();
        let node = core.tree.find_no_larger_than(core.root, criteria);
        match node {
            None => CdfFactor::Fraction(0.0),
            Some(n) => {
                if Some(n) == core.max_item {
                    CdfFactor::Saturated
                } else {
                    CdfFactor::Fraction(core.tree.cumulative_count(n) as f64 / core.count as f64)
                }
            }
        }
    }

    /// Outer slab index a value falls in.
    pub(crate) fn slab_index_of(&self, v: f64) -> i64 {
        buckets::outer_index(v, self.slab_size).unwrap_or(-1)
    }

    /// Number of outer slabs grown so far.
    pub(crate) fn slab_count(&self) -> usize {
        self.inner.lock().unwrap().buckets.outer_len()
    }

    /// Value boundaries of an outer slab.
    pub(crate) fn slab_boundaries(&self, idx: i64) -> (f64, f64) {
        (
            idx as f64 * self.slab_size,
            (idx + 1) as f64 * self.slab_size,
        )
    }

    /// Number of quantisation units per slab.
    pub(crate) fn units_per_slab(&self) -> i64 {
        (self.slab_size * self.accuracy_factor).round() as i64
    }

    /// Probe value for one unit inside one slab.
    pub(crate) fn value_of_unit(&self, slab: i64, unit: i64) -> f64 {
        slab as f64 * self.slab_size + unit as f64 / self.accuracy_factor
    }
}

/// Outcome of a single-histogram CDF probe in the product search.
pub(crate) enum CdfFactor {
    /// The floor of the probe is the histogram's maximum; the factor is 1
    /// and the histogram drops out of further evaluation.
    Saturated,
    /// Fraction of live samples at or below the probe.
    Fraction(f64),
}
