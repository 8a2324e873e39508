use super::{accepts, Decomposer, Decomposition};
use crate::stats::median;

/// Seasonal-trend decomposition by LOESS with optional robustness weights.
///
/// Inner loop: cycle-subseries smoothing, low-pass filter of the smoothed
/// cycles, trend smoothing of the deseasonalised series. Outer loop:
/// bisquare weights on the residuals so outliers stop pulling the fit.
#[derive(Debug, Clone, PartialEq)]
pub struct Stl {
    /// LOESS span of each cycle-subseries (odd, >= 3).
    pub seasonal_span: usize,
    pub robust: bool,
    pub inner_iterations: usize,
    /// Robustness passes; ignored unless `robust`.
    pub outer_iterations: usize,
}

impl Default for Stl {
    fn default() -> Self {
        Self {
            seasonal_span: 7,
            robust: true,
            inner_iterations: 2,
            outer_iterations: 15,
        }
    }
}

fn odd_at_least(x: f64) -> usize {
    let n = x.ceil().max(3.0) as usize;
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Local linear fit of `y` (observed at x = 0, 1, ..) evaluated at `at`, using
/// the `span` nearest points with tricube weights times `rw`.
/// `None` when every weight is zero.
fn loess_at(y: &[f64], rw: Option<&[f64]>, span: usize, at: f64) -> Option<f64> {
    let n = y.len();
    if n == 0 {
        return None;
    }
    let q = span.clamp(1, n);
    let centre = at.round().clamp(0.0, (n - 1) as f64) as usize;
    let lo = centre.saturating_sub(q / 2).min(n - q);
    let hi = lo + q - 1;
    let mut h = (at - lo as f64).max(hi as f64 - at);
    if span > n {
        h += ((span - n) / 2) as f64;
    }
    if h <= 0.0 {
        return Some(y[centre]);
    }

    let mut w = Vec::with_capacity(q);
    for j in lo..=hi {
        let d = (j as f64 - at).abs() / h;
        let tricube = if d <= 0.001 {
            1.0
        } else if d >= 0.999 {
            0.0
        } else {
            (1.0 - d * d * d).powi(3)
        };
        w.push(tricube * rw.map_or(1.0, |r| r[j]));
    }
    let sw: f64 = w.iter().sum();
    if sw <= 0.0 {
        return None;
    }
    let xs = (lo..=hi).map(|j| j as f64);
    let xbar = xs.clone().zip(&w).map(|(x, w)| w * x).sum::<f64>() / sw;
    let ybar = y[lo..=hi].iter().zip(&w).map(|(y, w)| w * y).sum::<f64>() / sw;
    let (mut sxx, mut sxy) = (0.0, 0.0);
    for ((x, yv), wv) in xs.zip(&y[lo..=hi]).zip(&w) {
        sxx += wv * (x - xbar) * (x - xbar);
        sxy += wv * (x - xbar) * (yv - ybar);
    }
    let slope = if sxx > 1e-9 { sxy / sxx } else { 0.0 };
    Some(ybar + slope * (at - xbar))
}

/// Robust LOESS with a plain-LOESS fallback when the weights vanish locally.
fn smooth_at(y: &[f64], rw: Option<&[f64]>, span: usize, at: f64, fallback: f64) -> f64 {
    loess_at(y, rw, span, at)
        .or_else(|| loess_at(y, None, span, at))
        .unwrap_or(fallback)
}

fn moving_average(x: &[f64], w: usize) -> Vec<f64> {
    x.windows(w).map(|s| s.iter().sum::<f64>() / w as f64).collect()
}

fn bisquare_weights(residual: &[f64]) -> Vec<f64> {
    let mut abs: Vec<f64> = residual.iter().map(|r| r.abs()).collect();
    let h = 6.0 * median(&mut abs).unwrap_or(0.0);
    if h <= 1e-12 {
        return vec![1.0; residual.len()];
    }
    residual
        .iter()
        .map(|r| {
            let u = r.abs() / h;
            if u < 1.0 {
                (1.0 - u * u).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}

impl Stl {
    /// One inner pass: updates `seasonal` and `trend` in place.
    fn inner_pass(
        &self,
        y: &[f64],
        period: usize,
        rw: &[f64],
        seasonal: &mut [f64],
        trend: &mut [f64],
    ) {
        let n = y.len();
        let detrended: Vec<f64> = y.iter().zip(trend.iter()).map(|(y, t)| y - t).collect();

        // smoothed cycles, extended one period on each side
        let mut cycles = vec![0.0; n + 2 * period];
        for phase in 0..period {
            let idx: Vec<usize> = (phase..n).step_by(period).collect();
            let sub: Vec<f64> = idx.iter().map(|&i| detrended[i]).collect();
            let sub_w: Vec<f64> = idx.iter().map(|&i| rw[i]).collect();
            for j in 0..sub.len() + 2 {
                let at = j as f64 - 1.0;
                let nearest = sub[(j.saturating_sub(1)).min(sub.len() - 1)];
                cycles[phase + j * period] =
                    smooth_at(&sub, Some(&sub_w), self.seasonal_span, at, nearest);
            }
        }

        let low = moving_average(&moving_average(&moving_average(&cycles, period), period), 3);
        let low_pass_span = odd_at_least(period as f64);
        for i in 0..n {
            let l = smooth_at(&low, None, low_pass_span, i as f64, low[i]);
            seasonal[i] = cycles[i + period] - l;
        }

        let deseasonal: Vec<f64> = y.iter().zip(seasonal.iter()).map(|(y, s)| y - s).collect();
        let trend_span = odd_at_least(
            1.5 * period as f64 / (1.0 - 1.5 / self.seasonal_span as f64),
        );
        for i in 0..n {
            trend[i] = smooth_at(&deseasonal, Some(rw), trend_span, i as f64, deseasonal[i]);
        }
    }
}

impl Decomposer for Stl {
    fn decompose(&self, series: &[f64], period: usize) -> Option<Decomposition> {
        if !accepts(series, period) || self.seasonal_span < 3 {
            return None;
        }
        let n = series.len();
        let mut trend = vec![0.0; n];
        let mut seasonal = vec![0.0; n];
        let mut rw = vec![1.0; n];
        let outer = if self.robust { self.outer_iterations } else { 0 };
        for pass in 0..=outer {
            for _ in 0..self.inner_iterations.max(1) {
                self.inner_pass(series, period, &rw, &mut seasonal, &mut trend);
            }
            if pass < outer {
                let residual: Vec<f64> = (0..n).map(|i| series[i] - trend[i] - seasonal[i]).collect();
                rw = bisquare_weights(&residual);
            }
        }
        Some(Decomposition::from_parts(series, trend, seasonal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CYCLE: [f64; 7] = [2.0, 1.0, 0.0, -1.0, -2.0, 0.5, -0.5];

    fn noise(i: usize) -> f64 {
        0.1 * ((i as f64) * 1.7).sin()
    }

    #[test]
    fn spans() {
        assert_eq!(odd_at_least(7.0), 7);
        assert_eq!(odd_at_least(13.36), 15);
        assert_eq!(odd_at_least(1.0), 3);
    }

    #[test]
    fn loess_is_exact_on_lines() {
        let y: Vec<f64> = (0..10).map(|i| 3.0 + 0.5 * i as f64).collect();
        let v = loess_at(&y, None, 5, 4.0).unwrap();
        assert!((v - 5.0).abs() < 1e-9);
        let ext = loess_at(&y, None, 5, -1.0).unwrap();
        assert!((ext - 2.5).abs() < 1e-9);
        assert!(loess_at(&y, Some(&[0.0; 10]), 5, 4.0).is_none());
    }

    #[test]
    fn recovers_trend_and_cycle() {
        let series: Vec<f64> = (0..70).map(|i| 0.05 * i as f64 + CYCLE[i % 7]).collect();
        let stl = Stl {
            robust: false,
            ..Default::default()
        };
        let d = stl.decompose(&series, 7).unwrap();
        assert!(d.residual.iter().all(|r| r.abs() < 1e-6));
        assert!((d.seasonal[14] - CYCLE[0]).abs() < 1e-6);
    }

    #[test]
    fn robust_fit_isolates_spike() {
        let mut series: Vec<f64> = (0..70)
            .map(|i| 0.05 * i as f64 + CYCLE[i % 7] + noise(i))
            .collect();
        series[35] += 20.0;
        let d = Stl::default().decompose(&series, 7).unwrap();
        assert!(d.residual[35] > 15.0);
        for (i, r) in d.residual.iter().enumerate().filter(|(i, _)| *i != 35) {
            assert!(r.abs() < 1.0, "residual {r} at {i}");
        }
    }
}
