//! buckets - the O(1) value-to-node reverse map
//!
//! Two lazily grown levels: the outer level slices the value axis into
//! equally wide slabs, the inner level indexes one slot per quantisation
//! unit inside a slab. A live node is registered here when its distinct
//! value first appears and cleared when the last sample of that value is
//! evicted, so a slot either holds the node for exactly that value or
//! nothing. Neither level ever shrinks; the arrays are bounded by the
//! largest value the histogram has ever seen.

use log::warn;

use super::tree::NodeId;

/// Outer slab index for a value, or None when the slab width is zero (the
/// degenerate-configuration sentinel; callers skip the bucket step).
///
/// Widths below one get a rounding pass to absorb the floating point drift
/// that division introduces at unit boundaries.
pub(crate) fn outer_index(v: f64, slab_size: f64) -> Option<i64> {
    if slab_size == 0.0 {
        return None;
    }
    let mut idx = v / slab_size;
    if slab_size.abs() < 1.0 {
        idx = idx.round();
    }
    Some(idx as i64)
}

#[derive(Debug)]
struct Slab {
    slots: Vec<Option<NodeId>>,
    lower: f64,
}

impl Slab {
    fn position(&self, v: f64, unit_size: f64) -> Option<i64> {
        if unit_size == 0.0 {
            return None;
        }
        let mut idx = (v - self.lower) / unit_size;
        if unit_size.abs() < 1.0 {
            idx = idx.round();
        }
        Some(idx as i64)
    }

    fn insert(&mut self, v: f64, unit_size: f64, node: NodeId) {
        let idx = match self.position(v, unit_size) {
            Some(i) => i,
            None => return,
        };
        // A value below the slab's lower boundary would index negatively;
        // clamp to the first slot rather than corrupting the map.
        let idx = if idx < 0 {
            warn!(
                "bucket index for {} fell below slab lower boundary {}, clamping",
                v, self.lower
            );
            0
        } else {
            idx as usize
        };
        while self.slots.len() <= idx {
            self.slots.push(None);
        }
        if let Some(existing) = self.slots[idx] {
            warn!(
                "bucket for {} is already occupied by node {:?}, overwriting",
                v, existing
            );
        }
        self.slots[idx] = Some(node);
    }

    fn delete(&mut self, v: f64, unit_size: f64) {
        let idx = match self.position(v, unit_size) {
            Some(i) if i >= 0 => i as usize,
            _ => return,
        };
        if idx < self.slots.len() {
            self.slots[idx] = None;
        }
    }

    #[cfg(test)]
    fn get(&self, v: f64, unit_size: f64) -> Option<NodeId> {
        let idx = match self.position(v, unit_size) {
            Some(i) if i >= 0 => i as usize,
            _ => return None,
        };
        self.slots.get(idx).copied().flatten()
    }
}

/// The two-level map. Slabs are allocated on first touch and remember their
/// value boundaries.
#[derive(Debug)]
pub(crate) struct BucketIndex {
    slabs: Vec<Option<Slab>>,
    slab_size: f64,
    unit_size: f64,
}

impl BucketIndex {
    pub fn new(slab_size: f64, unit_size: f64) -> BucketIndex {
        BucketIndex {
            slabs: Vec::new(),
            slab_size,
            unit_size,
        }
    }

    /// Lower and upper value boundaries of a slab index.
    pub fn boundaries(&self, idx: i64) -> (f64, f64) {
        (idx as f64 * self.slab_size, (idx + 1) as f64 * self.slab_size)
    }

    /// Number of outer slots grown so far.
    pub fn outer_len(&self) -> usize {
        self.slabs.len()
    }

    pub fn insert(&mut self, v: f64, node: NodeId) {
        let idx = match outer_index(v, self.slab_size) {
            Some(i) => i,
            None => return,
        };
        let idx = if idx < 0 {
            warn!("outer bucket index for {} is negative, clamping", v);
            0
        } else {
            idx as usize
        };
        while self.slabs.len() <= idx {
            self.slabs.push(None);
        }
        if self.slabs[idx].is_none() {
            let (lower, _upper) = self.boundaries(idx as i64);
            self.slabs[idx] = Some(Slab {
                slots: Vec::new(),
                lower,
            });
        }
        if let Some(slab) = self.slabs[idx].as_mut() {
            slab.insert(v, self.unit_size, node);
        }
    }

    pub fn delete(&mut self, v: f64) {
        let idx = match outer_index(v, self.slab_size) {
            Some(i) if i >= 0 => i as usize,
            _ => return,
        };
        if let Some(Some(slab)) = self.slabs.get_mut(idx) {
            slab.delete(v, self.unit_size);
        }
    }

    #[cfg(test)]
    pub fn get(&self, v: f64) -> Option<NodeId> {
        let idx = match outer_index(v, self.slab_size) {
            Some(i) if i >= 0 => i as usize,
            _ => return None,
        };
        match self.slabs.get(idx) {
            Some(Some(slab)) => slab.get(v, self.unit_size),
            _ => None,
        }
    }
}
