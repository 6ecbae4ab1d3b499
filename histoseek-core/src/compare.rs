//! Histogram intersection.

use crate::histogram::Histogram;

/// Intersection score of two histograms: `sum(min(a[i], b[i]))`.
///
/// The result lies in `[0, 1]`: 1.0 for identical distributions, 0.0 when
/// the two share no mass in any bucket.
///
/// # Panics
///
/// Both histograms must have been extracted at the same quantization depth.
/// A search run uses one depth for every histogram it builds, so a mismatch
/// here is a caller bug.
pub fn intersection(a: &Histogram, b: &Histogram) -> f64 {
    assert_eq!(
        a.depth(),
        b.depth(),
        "cannot compare histograms of different quantization depth"
    );

    a.buckets()
        .iter()
        .zip(b.buckets())
        .map(|(x, y)| x.min(*y))
        .sum()
}
