//! product - percentile of a product of empirical CDFs
//!
//! Several independent measurements compose multiplicatively: the chance
//! that all of them land at or below `v` is the product of their individual
//! CDFs. The aggregate tail estimate therefore asks for the smallest `v`
//! with `prod F_i(v) >= p`.
//!
//! Evaluating the product is cheap (one floor lookup and rank query per
//! histogram), so the search is a bounded two-level bisection over the
//! bucket grid the histograms already maintain: first across outer slabs,
//! then at unit resolution inside the slab the answer fell into. Histograms
//! whose floor has reached their maximum contribute a factor of exactly one
//! and are opted out of every later probe. The probe budget is fixed; on
//! exhaustion the candidate whose product came closest to the target wins.

use log::debug;

use crate::histogram::{percentile_key, CdfFactor, Histogram};

/// Total probe budget across the outer and inner phases combined.
const MAX_PROBES: u32 = 30;

/// Evaluate the CDF product at one probe value.
///
/// Returns the product over the histograms still in play and the indices
/// that saturated at this probe (their factor is one and they are candidates
/// for opting out).
fn multiply(histograms: &[&Histogram], opt_out: &[bool], criteria: f64) -> (f64, Vec<usize>) {
    let mut burnt = Vec::new();
    let mut product = 1.0;
    for (i, h) in histograms.iter().enumerate() {
        if opt_out[i] {
            continue;
        }
        match h.cdf_factor(criteria) {
            CdfFactor::Saturated => burnt.push(i),
            CdfFactor::Fraction(f) => product *= f,
        }
    }
    (product, burnt)
}

/// The bisection itself. `start_value`, when non-negative, is probed once
/// before the grid takes over; it comes from the registered cursors and
/// bounds the answer from below.
fn search(
    p: f64,
    mut start_value: f64,
    histograms: &[&Histogram],
    opt_out: &mut [bool],
    mut lower: i64,
    mut upper: i64,
    mut going_up: bool,
    verbose: bool,
) -> f64 {
    let mut slab: Option<i64> = None;
    let mut last_prod = 0.0;
    let mut last_criteria = 0.0;
    let mut probes = 0u32;

    loop {
        if lower > upper || probes >= MAX_PROBES {
            return last_criteria;
        }
        probes += 1;
        let mid = (lower + upper) / 2;

        let (criteria, lower_boundary, upper_boundary) = if start_value >= 0.0 {
            (start_value, 0.0, 0.0)
        } else if let Some(s) = slab {
            (histograms[0].value_of_unit(s, mid), 0.0, 0.0)
        } else {
            let (lb, ub) = histograms[0].slab_boundaries(mid);
            (if going_up { ub } else { lb }, lb, ub)
        };

        let (mut prod, mut burnt) = multiply(histograms, opt_out, criteria);

        let mut new_lower = lower;
        let mut new_upper = upper;
        let mut go_up = true;
        let got_result = prod == p;
        let mut descend_into: Option<i64> = None;

        if !got_result {
            // Probe the slab boundary matching the travel direction first;
            // when the product lands on the wrong side, re-probe the other
            // boundary once. Straddling boundaries mean the answer is inside
            // this slab, so the search drops to unit resolution there.
            let phases = if slab.is_some() { 1 } else { 2 };
            let mut need_retry = false;
            for phase in 0..phases {
                if phase == 1 && !need_retry {
                    break;
                }
                if prod < p {
                    for &i in &burnt {
                        opt_out[i] = true;
                    }
                    if slab.is_none() && start_value < 0.0 {
                        if phase == 0 && !going_up {
                            let r = multiply(histograms, opt_out, upper_boundary);
                            prod = r.0;
                            burnt = r.1;
                            need_retry = true;
                            continue;
                        } else if phase == 1 && going_up {
                            descend_into = Some(mid);
                            break;
                        }
                    }
                    new_lower = mid + 1;
                } else if prod > p {
                    burnt.clear();
                    if slab.is_none() && start_value < 0.0 {
                        if phase == 0 && going_up {
                            let r = multiply(histograms, opt_out, lower_boundary);
                            prod = r.0;
                            burnt = r.1;
                            need_retry = true;
                            continue;
                        } else if phase == 1 && !going_up {
                            descend_into = Some(mid);
                            break;
                        }
                    }
                    new_upper = mid - 1;
                    go_up = false;
                }
            }
        }

        if verbose {
            let place = match slab {
                Some(s) => format!("slab {}", s),
                None => "outer".to_string(),
            };
            debug!(
                "probe {} ({}): criteria {:.4}, product {:.6}, {} saturated, idx {}, bounds [{}, {}]",
                probes,
                place,
                criteria,
                prod,
                burnt.len(),
                mid,
                lower,
                upper,
            );
        }

        if let Some(s) = descend_into {
            slab = Some(s);
            lower = 0;
            upper = histograms[0].units_per_slab() - 1;
            going_up = true;
            last_prod = prod;
            last_criteria = criteria;
            start_value = -1.0;
            continue;
        }
        if got_result {
            return criteria;
        }
        if new_lower >= new_upper {
            // Out of room: hand back whichever of the last two probes came
            // closer to the target product.
            if last_criteria >= 0.0 && last_prod >= 0.0 && (p - last_prod).abs() < (p - prod).abs()
            {
                if verbose {
                    debug!("final probe discarded at distance {:.6}", (p - prod).abs());
                }
                return last_criteria;
            }
            return criteria;
        }
        lower = new_lower;
        upper = new_upper;
        going_up = go_up;
        last_prod = prod;
        last_criteria = criteria;
        start_value = -1.0;
    }
}

/// Smallest value `v` with `prod F_i(v)` approximately `p` across the given
/// histograms.
///
/// A single histogram that already tracks `p` with a bound cursor answers
/// directly. When every histogram tracks `p`, the largest cursor value seeds
/// the search as a lower bound. Returns 0 for an empty histogram list, and
/// for histograms with no samples.
///
/// `verbose` traces each probe through the `log` crate at debug level.
///
/// # Examples
/// ```
/// use windowed_quantiles::{calc_percentile_of_product, Histogram};
///
/// let a = Histogram::new(100, 10.0, 1);
/// let b = Histogram::new(100, 10.0, 1);
/// for i in 0..100 {
///     a.enqueue(f64::from(i), 1);
///     b.enqueue(f64::from(i), 1);
/// }
/// let v = calc_percentile_of_product(0.9, &[&a, &b], false);
/// // each factor must reach roughly sqrt(0.9) ~ 0.95
/// assert!(a.percentile_for_value(v) > 0.9);
/// ```
pub fn calc_percentile_of_product(p: f64, histograms: &[&Histogram], verbose: bool) -> f64 {
    if histograms.is_empty() {
        return 0.0;
    }
    if histograms.len() == 1 {
        if let Some(v) = histograms[0].cursor_value(p) {
            return v;
        }
    }

    let key = percentile_key(p);
    let mut max_slabs = 0usize;
    let mut tracked_by_all = true;
    for h in histograms {
        if !h.tracks_percentile(&key) {
            tracked_by_all = false;
        }
        max_slabs = max_slabs.max(h.slab_count());
    }

    let mut opt_out = vec![false; histograms.len()];
    let mut start_value = -1.0;
    let mut start_index = 0i64;
    if tracked_by_all {
        for h in histograms {
            if let Some(v) = h.cursor_value(p) {
                if v > start_value {
                    start_value = v;
                    start_index = h.slab_index_of(v);
                }
            }
        }
    }

    let result = search(
        p,
        start_value,
        histograms,
        &mut opt_out,
        start_index,
        max_slabs as i64 - 1,
        true,
        verbose,
    );
    if verbose {
        debug!("value at product percentile {}: {}", p * 100.0, result);
    }
    result
}
