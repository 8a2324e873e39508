use serde::{Deserialize, Serialize};

use super::{
    check_min_periods, check_positive, check_window, per_field, rolling, DetectContext, Detector,
    EntityDetection, MethodKind,
};
use crate::error::Result;
use crate::panel::EntityFrame;
use crate::stats::mean_std;

/// Rolling z-score: flag `|x - mean| / std > threshold` (sample std).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZScoreParams {
    pub window: usize,
    pub threshold: f64,
    pub min_periods: Option<usize>,
}

impl Default for ZScoreParams {
    fn default() -> Self {
        Self {
            window: 30,
            threshold: 2.0,
            min_periods: None,
        }
    }
}

impl Detector for ZScoreParams {
    fn kind(&self) -> MethodKind {
        MethodKind::ZScore
    }

    fn validate(&self) -> Result<()> {
        check_window("window", self.window, 2)?;
        check_min_periods(self.min_periods, self.window)?;
        check_positive("threshold", self.threshold)
    }

    fn min_observations(&self, _frame: &EntityFrame<'_>) -> usize {
        self.min_periods.unwrap_or(self.window).saturating_add(1)
    }

    fn detect(&self, frame: &EntityFrame<'_>, ctx: &DetectContext<'_>) -> EntityDetection {
        let min_periods = self.min_periods.unwrap_or(self.window);
        per_field(self.kind(), frame, ctx, self.min_observations(frame), |values| {
            rolling(values, self.window, min_periods, ctx.window_mode, |x, window| {
                let (mean, std) = mean_std(window)?;
                if std <= 0.0 {
                    return Some((false, mean));
                }
                Some(((x - mean).abs() / std > self.threshold, mean))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::{flagged_positions, flags_of, run_all, series_panel};
    use crate::types::WindowMode;

    #[test]
    fn flags_beyond_threshold() {
        let mut v: Vec<f64> = (0..50).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        v[40] = 4.0;
        let flags = flags_of(&ZScoreParams::default(), v, WindowMode::Trailing);
        assert_eq!(flagged_positions(&flags), vec![40]);
    }

    #[test]
    fn constant_entity_is_clean_next_to_noisy_one() {
        let noisy: Vec<f64> = (0..50).map(|i| ((i * 37) % 11) as f64).collect();
        let panel = series_panel("x", &[("FLAT", vec![7.0; 50]), ("NOISY", noisy)]);
        let runs = run_all(&ZScoreParams::default(), &panel, WindowMode::Trailing);
        assert_eq!(runs[0].flag_count(), 0);
        let fitted = &runs[0].fields[0].as_ref().unwrap().fitted;
        assert_eq!(fitted[45], 7.0);
    }

    #[test]
    fn fitted_is_window_mean() {
        let v: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let panel = series_panel("x", &[("A", v)]);
        let p = ZScoreParams {
            window: 4,
            threshold: 10.0,
            min_periods: None,
        };
        let runs = run_all(&p, &panel, WindowMode::Centered);
        let fitted = &runs[0].fields[0].as_ref().unwrap().fitted;
        // neighbours 8, 9, 11, 12
        assert!((fitted[10] - 10.0).abs() < 1e-9);
    }
}
