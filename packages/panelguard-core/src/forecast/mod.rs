//! Univariate trend + seasonality forecasting with prediction intervals.

mod linalg;
mod model;

pub use model::TrendModel;

/// In-sample prediction and interval, one value per input position.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub yhat: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Forecast {
    /// `true` when `y` is observed and falls outside a non-degenerate interval.
    pub fn is_outside(&self, i: usize, y: f64) -> bool {
        let (lo, hi) = (self.lower[i], self.upper[i]);
        !y.is_nan() && hi > lo && (y < lo || y > hi)
    }
}

pub trait Forecaster: Send + Sync {
    /// Fits on the observed cells of `values` (`NaN` = missing) taken at
    /// `times` (epoch seconds, ascending) and predicts every position.
    /// `None` when the model cannot be fitted.
    fn forecast(&self, times: &[i64], values: &[f64]) -> Option<Forecast>;
}
