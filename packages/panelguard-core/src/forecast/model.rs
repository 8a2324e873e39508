//! Piecewise-linear trend with Fourier seasonalities, fitted by ridge regression.
//!
//! y(t) = a + b*t + sum_j d_j * max(0, t - c_j) + sum_s sum_k [u_sk sin(2 pi k t / P_s) + v_sk cos(..)]
//!
//! Time is scaled to [0, 1] over the history and y is centred and scaled by its
//! largest absolute deviation before fitting.

use statrs::distribution::{ContinuousCDF, Normal};

use super::linalg::solve_symmetric;
use super::{Forecast, Forecaster};
use crate::frequency::Frequency;
use crate::stats::is_missing;

const DAY: f64 = 86_400.0;
const WEEK: f64 = 7.0 * DAY;
const YEAR: f64 = 365.25 * DAY;

// unpenalised terms still get a jitter so the normal equations stay solvable
const JITTER: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct TrendModel {
    /// Probability mass inside the prediction interval.
    pub interval_width: f64,
    /// Potential trend changepoints.
    pub changepoints: usize,
    /// Share of history (from the start) where changepoints may sit.
    pub changepoint_range: f64,
    /// Changepoint coefficients are ridge-penalised by `1 / changepoint_prior`.
    pub changepoint_prior: f64,
    /// Fourier coefficients are ridge-penalised by `1 / seasonality_prior`.
    pub seasonality_prior: f64,
    /// Refits with points outside the interval given zero weight.
    pub robust_iterations: usize,
}

impl Default for TrendModel {
    fn default() -> Self {
        Self {
            interval_width: 0.99,
            changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior: 0.05,
            seasonality_prior: 10.0,
            robust_iterations: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Seasonality {
    period: f64,
    order: usize,
}

/// Seasonalities the history can support: daily for intraday data spanning
/// two days, weekly for data at daily frequency or finer spanning two weeks,
/// yearly for two years of history.
fn seasonalities(times: &[i64]) -> Vec<Seasonality> {
    let (Some(first), Some(last)) = (times.first(), times.last()) else {
        return Vec::new();
    };
    let span = (last - first) as f64;
    let spacing = Frequency::infer(times).map_or(f64::INFINITY, |f| f.as_secs() as f64);
    let mut out = Vec::new();
    if spacing < DAY && span >= 2.0 * DAY {
        out.push(Seasonality { period: DAY, order: 4 });
    }
    if spacing <= DAY && span >= 2.0 * WEEK {
        out.push(Seasonality { period: WEEK, order: 3 });
    }
    if span >= 2.0 * YEAR {
        out.push(Seasonality {
            period: YEAR,
            order: 10,
        });
    }
    out
}

#[derive(Debug)]
struct Design {
    t0: i64,
    span: f64,
    changepoints: Vec<f64>,
    seasons: Vec<Seasonality>,
}

impl Design {
    fn width(&self) -> usize {
        2 + self.changepoints.len() + self.seasons.iter().map(|s| 2 * s.order).sum::<usize>()
    }

    fn row(&self, ts: i64) -> Vec<f64> {
        let t = (ts - self.t0) as f64 / self.span;
        let mut row = Vec::with_capacity(self.width());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|c| (t - c).max(0.0)));
        for s in &self.seasons {
            for k in 1..=s.order {
                let angle = 2.0 * std::f64::consts::PI * k as f64 * ts as f64 / s.period;
                row.push(angle.sin());
                row.push(angle.cos());
            }
        }
        row
    }

    fn penalties(&self, model: &TrendModel) -> Vec<f64> {
        let mut p = vec![JITTER; 2];
        p.extend(std::iter::repeat(1.0 / model.changepoint_prior).take(self.changepoints.len()));
        let fourier: usize = self.seasons.iter().map(|s| 2 * s.order).sum();
        p.extend(std::iter::repeat(1.0 / model.seasonality_prior).take(fourier));
        p
    }
}

/// Weighted ridge fit; `rows[i]` is used only where `weights[i] > 0`.
fn fit(rows: &[Vec<f64>], y: &[f64], weights: &[f64], penalties: &[f64]) -> Option<Vec<f64>> {
    let p = penalties.len();
    let mut a = vec![0.0; p * p];
    let mut b = vec![0.0; p];
    for ((row, &yv), &w) in rows.iter().zip(y).zip(weights) {
        if w <= 0.0 || is_missing(yv) {
            continue;
        }
        for j in 0..p {
            b[j] += w * row[j] * yv;
            for k in j..p {
                a[j * p + k] += w * row[j] * row[k];
            }
        }
    }
    for j in 0..p {
        for k in 0..j {
            a[j * p + k] = a[k * p + j];
        }
        a[j * p + j] += penalties[j];
    }
    solve_symmetric(&a, &b, p)
}

fn predict(row: &[f64], beta: &[f64]) -> f64 {
    row.iter().zip(beta).map(|(x, b)| x * b).sum()
}

/// Weighted residual standard deviation over the included observations.
fn residual_sigma(y: &[f64], fitted: &[f64], weights: &[f64]) -> Option<f64> {
    let (mut ss, mut sw) = (0.0, 0.0);
    for ((yv, f), w) in y.iter().zip(fitted).zip(weights) {
        if *w > 0.0 && !is_missing(*yv) {
            ss += w * (yv - f) * (yv - f);
            sw += w;
        }
    }
    (sw > 1.0).then(|| (ss / (sw - 1.0)).sqrt())
}

impl TrendModel {
    /// z multiplier of the two-sided interval.
    pub fn z(&self) -> Option<f64> {
        let normal = Normal::new(0.0, 1.0).ok()?;
        let z = normal.inverse_cdf((1.0 + self.interval_width) / 2.0);
        (z.is_finite() && z > 0.0).then_some(z)
    }

    fn design(&self, times: &[i64], observed: &[usize]) -> Option<Design> {
        let (t0, t1) = (*times.first()?, *times.last()?);
        let span = (t1 - t0) as f64;
        if span <= 0.0 {
            return None;
        }
        let hist = (observed.len() as f64 * self.changepoint_range).floor() as usize;
        let k = self.changepoints.min(hist.saturating_sub(1));
        let changepoints = (1..=k)
            .map(|j| {
                let idx = (j as f64 * (hist - 1) as f64 / k as f64).round() as usize;
                (times[observed[idx]] - t0) as f64 / span
            })
            .collect();
        let observed_times: Vec<i64> = observed.iter().map(|&i| times[i]).collect();
        Some(Design {
            t0,
            span,
            changepoints,
            seasons: seasonalities(&observed_times),
        })
    }
}

impl Forecaster for TrendModel {
    fn forecast(&self, times: &[i64], values: &[f64]) -> Option<Forecast> {
        let n = values.len();
        let observed: Vec<usize> = (0..n).filter(|&i| !is_missing(values[i])).collect();
        if observed.len() < 3 || times.len() != n {
            return None;
        }
        let z = self.z()?;
        let mean = observed.iter().map(|&i| values[i]).sum::<f64>() / observed.len() as f64;
        let scale = observed
            .iter()
            .map(|&i| (values[i] - mean).abs())
            .fold(0.0, f64::max);
        if scale <= 0.0 {
            return Some(Forecast {
                yhat: vec![mean; n],
                lower: vec![mean; n],
                upper: vec![mean; n],
            });
        }

        let design = self.design(times, &observed)?;
        let penalties = design.penalties(self);
        let rows: Vec<Vec<f64>> = times.iter().map(|&ts| design.row(ts)).collect();
        let y: Vec<f64> = values.iter().map(|v| (v - mean) / scale).collect();
        let mut weights: Vec<f64> = values
            .iter()
            .map(|v| if is_missing(*v) { 0.0 } else { 1.0 })
            .collect();

        let mut beta = fit(&rows, &y, &weights, &penalties)?;
        let mut fitted: Vec<f64> = rows.iter().map(|r| predict(r, &beta)).collect();
        let mut sigma = residual_sigma(&y, &fitted, &weights)?;
        for _ in 0..self.robust_iterations {
            if sigma <= 0.0 {
                break;
            }
            let inliers: Vec<f64> = (0..n)
                .map(|i| {
                    let keep = weights[i] > 0.0 && (y[i] - fitted[i]).abs() <= z * sigma;
                    if keep { 1.0 } else { 0.0 }
                })
                .collect();
            if inliers.iter().sum::<f64>() < 3.0 {
                break;
            }
            weights = inliers;
            beta = fit(&rows, &y, &weights, &penalties)?;
            fitted = rows.iter().map(|r| predict(r, &beta)).collect();
            sigma = residual_sigma(&y, &fitted, &weights)?;
        }

        let half = z * sigma * scale;
        let yhat: Vec<f64> = fitted.iter().map(|f| mean + scale * f).collect();
        Some(Forecast {
            lower: yhat.iter().map(|v| v - half).collect(),
            upper: yhat.iter().map(|v| v + half).collect(),
            yhat,
        })
    }
}
