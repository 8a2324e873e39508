use serde::{Deserialize, Serialize};

use super::{
    check_min_periods, check_positive, check_window, per_field, rolling, DetectContext, Detector,
    EntityDetection, MethodKind,
};
use crate::error::Result;
use crate::panel::EntityFrame;
use crate::stats::{quantile_sorted, quartiles};

/// Tukey fences over a rolling window: flag outside `[Q1 - k*IQR, Q3 + k*IQR]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IqrParams {
    pub window: usize,
    pub k: f64,
    /// Valid neighbours needed to judge a point; defaults to `window`.
    pub min_periods: Option<usize>,
}

impl Default for IqrParams {
    fn default() -> Self {
        Self {
            window: 30,
            k: 1.5,
            min_periods: None,
        }
    }
}

impl Detector for IqrParams {
    fn kind(&self) -> MethodKind {
        MethodKind::InterquartileRange
    }

    fn validate(&self) -> Result<()> {
        check_window("window", self.window, 2)?;
        check_min_periods(self.min_periods, self.window)?;
        check_positive("k", self.k)
    }

    fn min_observations(&self, _frame: &EntityFrame<'_>) -> usize {
        self.min_periods.unwrap_or(self.window).saturating_add(1)
    }

    fn detect(&self, frame: &EntityFrame<'_>, ctx: &DetectContext<'_>) -> EntityDetection {
        let min_periods = self.min_periods.unwrap_or(self.window);
        per_field(self.kind(), frame, ctx, self.min_observations(frame), |values| {
            rolling(values, self.window, min_periods, ctx.window_mode, |x, window| {
                let (q1, q3) = quartiles(window)?;
                let median = quantile_sorted(window, 0.5)?;
                let iqr = q3 - q1;
                if iqr <= 0.0 {
                    return Some((false, median));
                }
                let flagged = x < q1 - self.k * iqr || x > q3 + self.k * iqr;
                Some((flagged, median))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::{flagged_positions, flags_of, run_all, series_panel};
    use crate::types::{Warning, WindowMode};

    fn wobble(n: usize) -> Vec<f64> {
        (0..n).map(|i| 10.0 + ((i * 7) % 5) as f64 * 0.1).collect()
    }

    #[test]
    fn flags_far_point() {
        let mut v = wobble(60);
        v[45] = 20.0;
        v[50] = 0.0;
        let flags = flags_of(&IqrParams::default(), v, WindowMode::Trailing);
        assert_eq!(flagged_positions(&flags), vec![45, 50]);
    }

    #[test]
    fn centered_window_judges_early_points() {
        let mut v = wobble(60);
        v[2] = 20.0;
        let p = IqrParams {
            min_periods: Some(10),
            ..Default::default()
        };
        assert!(!flags_of(&p, v.clone(), WindowMode::Trailing)[2]);
        assert!(flags_of(&p, v, WindowMode::Centered)[2]);
    }

    #[test]
    fn constant_series_flags_nothing() {
        let flags = flags_of(&IqrParams::default(), vec![3.0; 50], WindowMode::Centered);
        assert!(flags.iter().all(|f| !f));
    }

    #[test]
    fn short_series_warns() {
        let panel = series_panel("x", &[("A", wobble(12))]);
        let runs = run_all(&IqrParams::default(), &panel, WindowMode::Trailing);
        assert_eq!(runs[0].flag_count(), 0);
        assert!(matches!(
            runs[0].warnings[0],
            Warning::InsufficientHistory { required: 31, available: 12, .. }
        ));
    }

    #[test]
    fn rejects_bad_params() {
        let bad = IqrParams {
            min_periods: Some(40),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(IqrParams { k: 0.0, ..Default::default() }.validate().is_err());
    }
}
