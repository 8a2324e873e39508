use serde::{Deserialize, Serialize};

use super::{
    check_min_periods, check_positive, check_window, per_field, rolling, DetectContext, Detector,
    EntityDetection, MethodKind,
};
use crate::error::Result;
use crate::panel::EntityFrame;
use crate::stats::median_mad;

/// Robust z-score: flag `|x - median| / (MAD * scale) > threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MadParams {
    pub window: usize,
    pub threshold: f64,
    /// 1.4826 makes MAD consistent with the standard deviation of a normal.
    pub scale: f64,
    pub min_periods: Option<usize>,
}

impl Default for MadParams {
    fn default() -> Self {
        Self {
            window: 30,
            threshold: 3.5,
            scale: 1.4826,
            min_periods: None,
        }
    }
}

impl Detector for MadParams {
    fn kind(&self) -> MethodKind {
        MethodKind::MedianAbsoluteDeviation
    }

    fn validate(&self) -> Result<()> {
        check_window("window", self.window, 2)?;
        check_min_periods(self.min_periods, self.window)?;
        check_positive("threshold", self.threshold)?;
        check_positive("scale", self.scale)
    }

    fn min_observations(&self, _frame: &EntityFrame<'_>) -> usize {
        self.min_periods.unwrap_or(self.window).saturating_add(1)
    }

    fn detect(&self, frame: &EntityFrame<'_>, ctx: &DetectContext<'_>) -> EntityDetection {
        let min_periods = self.min_periods.unwrap_or(self.window);
        per_field(self.kind(), frame, ctx, self.min_observations(frame), |values| {
            rolling(values, self.window, min_periods, ctx.window_mode, |x, window| {
                let (median, mad) = median_mad(window)?;
                let spread = mad * self.scale;
                if spread <= 0.0 {
                    return Some((false, median));
                }
                Some(((x - median).abs() / spread > self.threshold, median))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::{flagged_positions, flags_of};
    use crate::types::WindowMode;

    #[test]
    fn flags_relative_to_robust_spread() {
        let mut v: Vec<f64> = (0..80).map(|i| 50.0 + (i % 4) as f64).collect();
        v[60] = 70.0;
        let flags = flags_of(&MadParams::default(), v, WindowMode::Trailing);
        assert_eq!(flagged_positions(&flags), vec![60]);
    }

    #[test]
    fn zero_mad_flags_nothing() {
        // more than half the window identical: MAD is zero
        let v: Vec<f64> = (0..60).map(|i| if i % 5 == 0 { 9.0 } else { 1.0 }).collect();
        let flags = flags_of(&MadParams::default(), v, WindowMode::Centered);
        assert!(flags.iter().all(|f| !f));
    }

    #[test]
    fn missing_values_are_never_flagged() {
        let mut v: Vec<f64> = (0..60).map(|i| 5.0 + (i % 3) as f64).collect();
        v[40] = f64::NAN;
        let flags = flags_of(&MadParams::default(), v, WindowMode::Trailing);
        assert!(!flags[40]);
    }
}
