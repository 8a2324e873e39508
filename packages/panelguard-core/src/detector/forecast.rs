use serde::{Deserialize, Serialize};

use super::{
    check_positive, per_field, DetectContext, Detector, EntityDetection, MethodKind,
    SeriesDetection,
};
use crate::error::{invalid, Result};
use crate::forecast::{Forecaster, TrendModel};
use crate::panel::EntityFrame;

const MIN_OBSERVATIONS: usize = 10;

/// Forecast residual: fit a trend + seasonality model per field and flag
/// observations outside its prediction interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastParams {
    /// Probability mass of the prediction interval, in (0, 1).
    pub interval_width: f64,
    pub changepoints: usize,
    pub changepoint_range: f64,
    pub changepoint_prior: f64,
    pub seasonality_prior: f64,
    pub robust_iterations: usize,
}

impl Default for ForecastParams {
    fn default() -> Self {
        let m = TrendModel::default();
        Self {
            interval_width: m.interval_width,
            changepoints: m.changepoints,
            changepoint_range: m.changepoint_range,
            changepoint_prior: m.changepoint_prior,
            seasonality_prior: m.seasonality_prior,
            robust_iterations: m.robust_iterations,
        }
    }
}

impl ForecastParams {
    fn model(&self) -> TrendModel {
        TrendModel {
            interval_width: self.interval_width,
            changepoints: self.changepoints,
            changepoint_range: self.changepoint_range,
            changepoint_prior: self.changepoint_prior,
            seasonality_prior: self.seasonality_prior,
            robust_iterations: self.robust_iterations,
        }
    }
}

impl Detector for ForecastParams {
    fn kind(&self) -> MethodKind {
        MethodKind::ForecastResidual
    }

    fn validate(&self) -> Result<()> {
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(invalid(format!(
                "interval_width must be in (0, 1), got {}",
                self.interval_width
            )));
        }
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(invalid(format!(
                "changepoint_range must be in (0, 1], got {}",
                self.changepoint_range
            )));
        }
        check_positive("changepoint_prior", self.changepoint_prior)?;
        check_positive("seasonality_prior", self.seasonality_prior)
    }

    fn min_observations(&self, _frame: &EntityFrame<'_>) -> usize {
        MIN_OBSERVATIONS
    }

    fn detect(&self, frame: &EntityFrame<'_>, ctx: &DetectContext<'_>) -> EntityDetection {
        let model = self.model();
        per_field(self.kind(), frame, ctx, MIN_OBSERVATIONS, |values| {
            let Some(fc) = model.forecast(frame.timestamps(), values) else {
                return SeriesDetection::unflagged(values.len());
            };
            let flags = (0..values.len()).map(|i| fc.is_outside(i, values[i])).collect();
            SeriesDetection {
                flags,
                fitted: fc.yhat,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::{flagged_positions, flags_of, run_all, series_panel};
    use crate::types::{Warning, WindowMode};

    fn series(n: usize) -> Vec<f64> {
        let week = [0.0, 1.0, 0.5, -0.5, -1.0, 0.2, -0.2];
        (0..n)
            .map(|i| 10.0 + 0.05 * i as f64 + week[i % 7] + 0.1 * (i as f64 * 1.7).sin())
            .collect()
    }

    #[test]
    fn flags_points_outside_interval() {
        let mut v = series(60);
        v[40] += 5.0;
        let flags = flags_of(&ForecastParams::default(), v, WindowMode::Trailing);
        assert_eq!(flagged_positions(&flags), vec![40]);
    }

    #[test]
    fn fitted_values_cover_missing_cells() {
        let mut v = series(60);
        v[12] = f64::NAN;
        let panel = series_panel("x", &[("A", v)]);
        let runs = run_all(&ForecastParams::default(), &panel, WindowMode::Centered);
        let s = runs[0].fields[0].as_ref().unwrap();
        assert!(!s.flags[12]);
        assert!(s.fitted[12].is_finite());
    }

    #[test]
    fn short_series_warns() {
        let panel = series_panel("x", &[("A", series(6))]);
        let runs = run_all(&ForecastParams::default(), &panel, WindowMode::Trailing);
        assert!(matches!(
            runs[0].warnings[0],
            Warning::InsufficientHistory { required: 10, available: 6, .. }
        ));
    }

    #[test]
    fn interval_width_bounds() {
        let mut p = ForecastParams::default();
        p.interval_width = 1.0;
        assert!(p.validate().is_err());
        p.interval_width = 0.8;
        assert!(p.validate().is_ok());
    }
}
