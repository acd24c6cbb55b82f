//! This crate provides exact quantiles over the most recent window of a
//! data stream in logarithmic time per sample.
//!
//! Streaming quantile work usually trades accuracy for space: sketches keep
//! a compressed summary of everything ever seen and answer with a bounded
//! error. This crate sits at the other end of the trade. It keeps every
//! sample of a bounded sliding window (quantised onto a configurable
//! decimal grid) in a balanced ordered structure, which makes the reported
//! percentiles exact for the window at the cost of memory proportional to
//! the number of distinct live values.
//!
//! Three pieces make up the surface:
//!
//!  * [`Histogram`] - the windowed distribution itself: O(log n) enqueue
//!    and evict, incrementally tracked percentile cursors, running mean and
//!    variance.
//!  * [`calc_percentile_of_product`] - the percentile of a product of
//!    several independent empirical distributions, found by a bounded
//!    numeric search. Useful for aggregate tail estimates of fan-out
//!    systems, where a request is slow when any leg is slow.
//!  * [`Cdf`] - an adapter that rebuilds a `Histogram` from a piecewise
//!    (percentile, value) summary so external reports can join the product
//!    search.
//!
//! # Examples
//! ```
//! use windowed_quantiles::Histogram;
//!
//! let hist = Histogram::new(1000, 10.0, 1);
//! hist.add_percentile_point(0.99);
//! for i in 0..1000 {
//!     hist.enqueue(f64::from(i), 1);
//! }
//! assert_eq!(hist.value_at_percentile(0.99), 989.0);
//! assert_eq!(hist.water_mark(), 1.0);
//! ```

#![deny(missing_docs)]

pub mod cdf;
pub mod histogram;
pub mod product;

pub use crate::cdf::{search_cdf_product, Cdf, CdfPoint};
pub use crate::histogram::{Histogram, PercentileSnapshot};
pub use crate::product::calc_percentile_of_product;
