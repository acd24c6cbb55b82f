//! cdf - building a histogram back out of a piecewise CDF
//!
//! Upstream systems often report a distribution as a handful of
//! (percentile, value) points rather than raw samples. To fold such a
//! report into the product-percentile machinery it has to become a
//! `Histogram` again: each point is enqueued once, and the mass below the
//! first tracked percentile is stood in for by a block of zero-valued
//! samples sized so the points land at roughly their stated percentiles.
//! The synthesised histogram is built once and memoised.

use crate::histogram::Histogram;
use crate::product::calc_percentile_of_product;

/// One point of a piecewise CDF.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(serde::Serialize, serde::Deserialize))]
pub struct CdfPoint {
    /// Percentile this point was reported at, in (0, 1).
    pub percentile: f64,
    /// Observed value at that percentile.
    pub value: f64,
}

/// A piecewise CDF and its memoised histogram rendition.
///
/// # Examples
/// ```
/// use windowed_quantiles::{Cdf, CdfPoint};
///
/// let mut cdf = Cdf::new(5);
/// cdf.start_point = 0.5;
/// for (i, v) in [10.0, 20.0, 30.0, 40.0, 50.0].iter().enumerate() {
///     cdf.points.push(CdfPoint {
///         percentile: 0.5 + 0.1 * i as f64,
///         value: *v,
///     });
/// }
/// // four zero samples stand in for the mass below the 50th percentile
/// assert_eq!(cdf.histogram().count(), 9);
/// ```
#[derive(Debug)]
#[cfg_attr(feature = "serde_support", derive(serde::Serialize, serde::Deserialize))]
pub struct Cdf {
    /// The CDF points, sorted by percentile.
    pub points: Vec<CdfPoint>,
    /// Percentile the first point was reported at.
    pub start_point: f64,
    /// Number of points this CDF was sized for.
    pub amount: usize,
    #[cfg_attr(feature = "serde_support", serde(skip))]
    histogram: Option<Histogram>,
}

impl Cdf {
    /// Create an empty CDF sized for `amount` points.
    pub fn new(amount: usize) -> Cdf {
        Cdf {
            points: Vec::with_capacity(amount),
            start_point: 0.0,
            amount,
            histogram: None,
        }
    }

    /// The histogram rendition of this CDF, synthesised on first use.
    pub fn histogram(&mut self) -> &Histogram {
        if self.histogram.is_none() {
            self.histogram = Some(synthesise(&self.points, self.start_point));
        }
        self.histogram.as_ref().unwrap()
    }
}

fn synthesise(points: &[CdfPoint], start_point: f64) -> Histogram {
    // Mass below the first tracked percentile: a start point of p0 means
    // the points cover only (1 - p0) of the distribution, so every point
    // is matched by floor(1/(1-p0) - 1) implicit zero samples.
    let per_point = (1.0 / (1.0 - start_point) - 1.0).floor();
    let count_zero = if per_point > 0.0 && points.len() > 1 {
        per_point as u64 * (points.len() as u64 - 1)
    } else {
        0
    };
    let total = count_zero + points.len() as u64;

    let hist = Histogram::new(total as i64, 0.1, 1);
    hist.add_percentile_point(0.99);
    hist.enqueue(0.0, count_zero);
    // points are assumed sorted by percentile
    for point in points {
        hist.enqueue(point.value, 1);
    }
    hist
}

/// Percentile of the product across a list of CDFs.
///
/// Each CDF is rendered to its histogram (memoising along the way) and the
/// list is handed to the product search. Returns 0 for an empty list.
pub fn search_cdf_product(cdfs: &mut [Cdf], percentile: f64) -> f64 {
    let histograms: Vec<&Histogram> = cdfs.iter_mut().map(|c| c.histogram()).collect();
    calc_percentile_of_product(percentile, &histograms, false)
}
