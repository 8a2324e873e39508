//! Missing-aware descriptive statistics.
//!
//! Missing values are `f64::NAN` throughout the crate; every helper here skips
//! them. Quantiles interpolate linearly between order statistics.

use crate::types::WindowMode;

#[inline]
pub fn is_missing(v: f64) -> bool {
    v.is_nan()
}

/// Mean and sample standard deviation (n - 1 denominator). `None` below two values.
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    let mut n = 0usize;
    let mut mean = 0.0;
    let mut m2 = 0.0;
    // Welford
    for &x in values.iter().filter(|v| !is_missing(**v)) {
        n += 1;
        let delta = x - mean;
        mean += delta / n as f64;
        m2 += delta * (x - mean);
    }
    if n < 2 {
        return None;
    }
    Some((mean, (m2.max(0.0) / (n - 1) as f64).sqrt()))
}

/// Sorts in place (missing values must already be removed).
fn sort(buf: &mut [f64]) {
    buf.sort_unstable_by(|a, b| a.total_cmp(b));
}

/// `q`-quantile of an ascending slice with linear interpolation.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Median; reorders `buf`.
pub fn median(buf: &mut [f64]) -> Option<f64> {
    sort(buf);
    quantile_sorted(buf, 0.5)
}

/// (Q1, Q3); reorders `buf`.
pub fn quartiles(buf: &mut [f64]) -> Option<(f64, f64)> {
    sort(buf);
    Some((quantile_sorted(buf, 0.25)?, quantile_sorted(buf, 0.75)?))
}

/// (median, median absolute deviation); reorders `buf`.
pub fn median_mad(buf: &mut [f64]) -> Option<(f64, f64)> {
    let med = median(buf)?;
    for v in buf.iter_mut() {
        *v = (*v - med).abs();
    }
    let mad = median(buf)?;
    Some((med, mad))
}

/// Collects the non-missing reference neighbours of position `i` into `out`.
///
/// The point itself is never included.
pub fn neighbours(values: &[f64], i: usize, window: usize, mode: WindowMode, out: &mut Vec<f64>) {
    out.clear();
    let n = values.len();
    let (before, after) = match mode {
        WindowMode::Trailing => (window, 0),
        WindowMode::Centered => (window / 2, window - window / 2),
    };
    let lo = i.saturating_sub(before);
    let hi = i.saturating_add(after).min(n.saturating_sub(1));
    out.extend(values[lo..i].iter().copied().filter(|v| !is_missing(*v)));
    if hi > i {
        out.extend(values[i + 1..=hi].iter().copied().filter(|v| !is_missing(*v)));
    }
}

/// Linear interpolation in `x` over missing values; leading and trailing gaps
/// take the nearest valid value. Returns `None` when nothing is valid.
pub fn fill_linear(values: &[f64], x: &[f64]) -> Option<Vec<f64>> {
    debug_assert_eq!(values.len(), x.len());
    let valid: Vec<usize> = (0..values.len()).filter(|&i| !is_missing(values[i])).collect();
    let (&first, &last) = (valid.first()?, valid.last()?);
    let mut out = values.to_vec();
    for v in out.iter_mut().take(first) {
        *v = values[first];
    }
    for v in out.iter_mut().skip(last + 1) {
        *v = values[last];
    }
    for pair in valid.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a < 2 {
            continue;
        }
        let span = x[b] - x[a];
        for j in a + 1..b {
            let w = if span > 0.0 { (x[j] - x[a]) / span } else { 0.0 };
            out[j] = values[a] + (values[b] - values[a]) * w;
        }
    }
    Some(out)
}
