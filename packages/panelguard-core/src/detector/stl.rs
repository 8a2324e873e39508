use serde::{Deserialize, Serialize};

use super::seasonal::{check_period, detect_residuals, resolve_period};
use super::{check_positive, DetectContext, Detector, EntityDetection, MethodKind};
use crate::decompose::Stl;
use crate::error::{invalid, Result};
use crate::panel::EntityFrame;

/// STL residual: like [`super::DecompositionParams`] but with a LOESS
/// decomposition whose robustness passes keep outliers out of the trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StlParams {
    pub period: Option<usize>,
    pub threshold: f64,
    /// LOESS span of the cycle-subseries smoother (odd, >= 3).
    pub seasonal_span: usize,
    pub robust: bool,
    pub outer_iterations: usize,
    pub inner_iterations: usize,
}

impl Default for StlParams {
    fn default() -> Self {
        let stl = Stl::default();
        Self {
            period: None,
            threshold: 3.0,
            seasonal_span: stl.seasonal_span,
            robust: stl.robust,
            outer_iterations: stl.outer_iterations,
            inner_iterations: stl.inner_iterations,
        }
    }
}

impl StlParams {
    fn decomposer(&self) -> Stl {
        Stl {
            seasonal_span: self.seasonal_span,
            robust: self.robust,
            inner_iterations: self.inner_iterations,
            outer_iterations: self.outer_iterations,
        }
    }
}

impl Detector for StlParams {
    fn kind(&self) -> MethodKind {
        MethodKind::RobustSeasonalTrend
    }

    fn validate(&self) -> Result<()> {
        check_period(self.period)?;
        if self.seasonal_span < 3 || self.seasonal_span % 2 == 0 {
            return Err(invalid(format!(
                "seasonal_span must be odd and >= 3, got {}",
                self.seasonal_span
            )));
        }
        if self.inner_iterations == 0 {
            return Err(invalid("inner_iterations must be >= 1"));
        }
        check_positive("threshold", self.threshold)
    }

    fn min_observations(&self, frame: &EntityFrame<'_>) -> usize {
        resolve_period(self.period, frame).map_or(0, |p| p.saturating_mul(2))
    }

    fn detect(&self, frame: &EntityFrame<'_>, ctx: &DetectContext<'_>) -> EntityDetection {
        let stl = self.decomposer();
        detect_residuals(&stl, self.kind(), self.period, self.threshold, frame, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::{flagged_positions, flags_of, run_all, series_panel};
    use crate::types::{Warning, WindowMode};

    const CYCLE: [f64; 7] = [2.0, 1.0, 0.0, -1.0, -2.0, 0.5, -0.5];

    fn series(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 0.05 * i as f64 + CYCLE[i % 7] + 0.1 * (i as f64 * 1.7).sin())
            .collect()
    }

    #[test]
    fn flags_spike() {
        let mut v = series(70);
        v[35] += 20.0;
        let flags = flags_of(&StlParams::default(), v, WindowMode::Trailing);
        assert_eq!(flagged_positions(&flags), vec![35]);
    }

    #[test]
    fn explicit_period_overrides_inference() {
        let p = StlParams {
            period: Some(10),
            ..Default::default()
        };
        // daily data would infer a weekly cycle and accept 16 observations
        let panel = series_panel("x", &[("A", series(16))]);
        let runs = run_all(&p, &panel, WindowMode::Trailing);
        assert!(matches!(
            runs[0].warnings[0],
            Warning::InsufficientHistory { required: 20, available: 16, .. }
        ));
        let inferred = run_all(&StlParams::default(), &panel, WindowMode::Trailing);
        assert!(inferred[0].warnings.is_empty());
    }

    #[test]
    fn rejects_even_span() {
        let p = StlParams {
            seasonal_span: 8,
            ..Default::default()
        };
        assert!(p.validate().is_err());
        assert!(StlParams::default().validate().is_ok());
    }
}
