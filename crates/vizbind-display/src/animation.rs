//! Merging of animation time sets.

/// Sorted union of several time sets. Equal times appear once and NaNs are
/// dropped.
#[must_use]
pub fn merge_times<I, T>(sets: I) -> Vec<f64>
where
    I: IntoIterator<Item = T>,
    T: IntoIterator<Item = f64>,
{
    let mut merged: Vec<f64> = sets
        .into_iter()
        .flatten()
        .filter(|t| !t.is_nan())
        .collect();
    merged.sort_by(f64::total_cmp);
    merged.dedup();
    merged
}
