//! Cumulative-weight selection.
//!
//! Two comparison rules are in use and they are deliberately not unified:
//! weighted grammar values pick the first entry whose running sum reaches
//! the threshold (`>=`), template collections pick the first candidate whose
//! running sum exceeds it (`>`). Seeds that land exactly on a boundary pick
//! different entries under the two rules.

/// Index of the first weight whose running sum is `>= threshold`.
///
/// Falls back to the last index when rounding leaves no match; `None` only
/// for an empty slice.
pub fn first_reaching(weights: &[f64], threshold: f64) -> Option<usize> {
    pick(weights, |running| running >= threshold)
}

/// Index of the first weight whose running sum is `> threshold`.
///
/// Same fallback as [`first_reaching`].
pub fn first_exceeding(weights: &[f64], threshold: f64) -> Option<usize> {
    pick(weights, |running| running > threshold)
}

fn pick(weights: &[f64], hit: impl Fn(f64) -> bool) -> Option<usize> {
    let mut running = 0.0;
    for (i, w) in weights.iter().enumerate() {
        running += w;
        if hit(running) {
            return Some(i);
        }
    }
    weights.len().checked_sub(1)
}
