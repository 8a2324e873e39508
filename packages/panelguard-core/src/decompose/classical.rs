use super::{accepts, Decomposer, Decomposition};

/// Classical decomposition: centred moving-average trend, phase-mean seasonal.
///
/// Even periods use the 2 x m average (half weight at both ends). The half
/// cycle at each end of the series, where no centred average exists, takes
/// the trend line fitted through the nearest cycle of averages.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classical;

/// Least-squares line through `(x, y)` evaluated at `at`.
fn line_at(points: &[(f64, f64)], at: f64) -> f64 {
    let n = points.len() as f64;
    let xbar = points.iter().map(|p| p.0).sum::<f64>() / n;
    let ybar = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - xbar).powi(2)).sum();
    let sxy: f64 = points.iter().map(|p| (p.0 - xbar) * (p.1 - ybar)).sum();
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    ybar + slope * (at - xbar)
}

fn centred_average(series: &[f64], period: usize) -> Vec<f64> {
    let n = series.len();
    let half = period / 2;
    let even = period % 2 == 0;
    let mut trend = vec![f64::NAN; n];
    for i in half..n - half {
        let mut sum = 0.0;
        for (j, &y) in series.iter().enumerate().take(i + half + 1).skip(i - half) {
            let w = if even && j.abs_diff(i) == half { 0.5 } else { 1.0 };
            sum += w * y;
        }
        trend[i] = sum / period as f64;
    }

    let k = period.min(n - 2 * half);
    let head: Vec<(f64, f64)> = (half..half + k).map(|i| (i as f64, trend[i])).collect();
    let tail: Vec<(f64, f64)> = (n - half - k..n - half).map(|i| (i as f64, trend[i])).collect();
    for i in 0..half {
        trend[i] = line_at(&head, i as f64);
        trend[n - 1 - i] = line_at(&tail, (n - 1 - i) as f64);
    }
    trend
}

impl Decomposer for Classical {
    fn decompose(&self, series: &[f64], period: usize) -> Option<Decomposition> {
        if !accepts(series, period) {
            return None;
        }
        let trend = centred_average(series, period);

        let mut phase_sum = vec![0.0; period];
        let mut phase_n = vec![0usize; period];
        for (i, (y, t)) in series.iter().zip(&trend).enumerate() {
            phase_sum[i % period] += y - t;
            phase_n[i % period] += 1;
        }
        let mut phase: Vec<f64> = phase_sum
            .iter()
            .zip(&phase_n)
            .map(|(s, n)| s / (*n).max(1) as f64)
            .collect();
        let centre = phase.iter().sum::<f64>() / period as f64;
        for s in phase.iter_mut() {
            *s -= centre;
        }

        let seasonal = (0..series.len()).map(|i| phase[i % period]).collect();
        Some(Decomposition::from_parts(series, trend, seasonal))
    }
}
