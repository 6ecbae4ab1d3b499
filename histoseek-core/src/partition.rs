//! Balanced contiguous partitioning of the dataset listing.

use std::num::NonZeroUsize;

/// Split `items` into `min(k, items.len())` contiguous, non-empty groups.
///
/// Group sizes differ by at most one: with `n` items and `g` groups the
/// first `n % g` groups hold `n / g + 1` items and the rest hold `n / g`.
/// Concatenating the groups in order yields `items` exactly. An empty input
/// produces no groups.
pub fn partition<T>(items: &[T], k: NonZeroUsize) -> Vec<&[T]> {
    let n = items.len();
    let groups = k.get().min(n);
    if groups == 0 {
        return Vec::new();
    }

    let base = n / groups;
    let remainder = n % groups;

    let mut out = Vec::with_capacity(groups);
    let mut rest = items;
    for i in 0..groups {
        let size = base + usize::from(i < remainder);
        let (head, tail) = rest.split_at(size);
        out.push(head);
        rest = tail;
    }
    debug_assert!(rest.is_empty());

    out
}
