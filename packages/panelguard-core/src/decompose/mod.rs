//! Additive seasonal decomposition: `y = trend + seasonal + residual`.

mod classical;
mod stl;

pub use classical::Classical;
pub use stl::Stl;

/// Components of an additive decomposition, each as long as the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
}

impl Decomposition {
    pub(crate) fn from_parts(series: &[f64], trend: Vec<f64>, seasonal: Vec<f64>) -> Self {
        let residual = series
            .iter()
            .zip(trend.iter().zip(&seasonal))
            .map(|(y, (t, s))| y - t - s)
            .collect();
        Self {
            trend,
            seasonal,
            residual,
        }
    }

    /// trend + seasonal
    pub fn fitted(&self) -> Vec<f64> {
        self.trend.iter().zip(&self.seasonal).map(|(t, s)| t + s).collect()
    }
}

pub trait Decomposer: Send + Sync {
    /// Decomposes a gap-free series with a seasonal cycle of `period`
    /// observations. `None` when the series is shorter than two cycles,
    /// `period < 2`, or it contains missing values.
    fn decompose(&self, series: &[f64], period: usize) -> Option<Decomposition>;
}

pub(crate) fn accepts(series: &[f64], period: usize) -> bool {
    period >= 2
        && series.len() >= period.saturating_mul(2)
        && series.iter().all(|v| v.is_finite())
}
