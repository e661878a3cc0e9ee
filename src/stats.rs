/// Mean and standard deviation of `samples`.
///
/// The variance denominator is the sample count itself, not `n - 1`, so a
/// single sample has a deviation of zero. Empty input has no defined
/// statistics and yields `None`.
pub fn mean_and_stddev(samples: &[f64]) -> Option<(f64, f64)> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}
