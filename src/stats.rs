/// Arithmetic mean. Empty input → 0.0.
pub fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

/// Mean and population standard deviation. Empty input → (0.0, 0.0).
pub fn mean_std(v: &[f64]) -> (f64, f64) {
    if v.is_empty() {
        return (0.0, 0.0);
    }
    let m = mean(v);
    let var = v.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / v.len() as f64;
    (m, var.sqrt())
}

/// Largest value, or None for empty input. NaNs are ignored.
pub fn max_of(v: &[f64]) -> Option<f64> {
    v.iter().copied().filter(|x| !x.is_nan()).reduce(f64::max)
}

/// Smallest value, or None for empty input. NaNs are ignored.
pub fn min_of(v: &[f64]) -> Option<f64> {
    v.iter().copied().filter(|x| !x.is_nan()).reduce(f64::min)
}

/// The `q`-th percentile (0-100) with linear interpolation between order statistics.
///
/// Position `q/100 * (n-1)` in the sorted values; fractional positions blend the
/// two neighbours, so `q = 50` is the conventional median. `q` is clamped to 0-100.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let q = q.clamp(0.0, 100.0);
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}
