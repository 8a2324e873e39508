use serde::{Deserialize, Serialize};

use super::{
    check_positive, check_window, per_field, DetectContext, Detector, EntityDetection, MethodKind,
    SeriesDetection,
};
use crate::error::Result;
use crate::panel::EntityFrame;
use crate::stats::is_missing;

/// Exponentially weighted residual.
///
/// Each value is judged against the EW mean/std of the values before it, then
/// folded into the state. A flagged value is folded in clipped to the band
/// edge. Sequential by nature: the window mode does not apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EwmaParams {
    /// alpha = 2 / (span + 1)
    pub span: usize,
    pub threshold: f64,
    /// Observations folded in before anything is judged.
    pub warmup: usize,
}

impl Default for EwmaParams {
    fn default() -> Self {
        Self {
            span: 30,
            threshold: 3.0,
            warmup: 30,
        }
    }
}

impl EwmaParams {
    fn alpha(&self) -> f64 {
        2.0 / (self.span as f64 + 1.0)
    }

    fn judge(&self, values: &[f64]) -> SeriesDetection {
        let alpha = self.alpha();
        let mut out = SeriesDetection::unflagged(values.len());
        let mut state: Option<(f64, f64)> = None;
        let mut seen = 0usize;
        for (i, &x) in values.iter().enumerate() {
            if is_missing(x) {
                continue;
            }
            let Some((mean, var)) = state else {
                state = Some((x, 0.0));
                seen = 1;
                continue;
            };
            out.fitted[i] = mean;
            let sd = var.max(0.0).sqrt();
            let mut folded = x;
            if seen >= self.warmup && sd > 0.0 {
                let band = self.threshold * sd;
                if (x - mean).abs() > band {
                    out.flags[i] = true;
                    folded = x.clamp(mean - band, mean + band);
                }
            }
            let diff = folded - mean;
            let incr = alpha * diff;
            state = Some((mean + incr, (1.0 - alpha) * (var + diff * incr)));
            seen += 1;
        }
        out
    }
}

impl Detector for EwmaParams {
    fn kind(&self) -> MethodKind {
        MethodKind::ExponentiallyWeighted
    }

    fn validate(&self) -> Result<()> {
        check_window("span", self.span, 1)?;
        check_window("warmup", self.warmup, 2)?;
        check_positive("threshold", self.threshold)
    }

    fn min_observations(&self, _frame: &EntityFrame<'_>) -> usize {
        self.warmup.saturating_add(1)
    }

    fn detect(&self, frame: &EntityFrame<'_>, ctx: &DetectContext<'_>) -> EntityDetection {
        per_field(self.kind(), frame, ctx, self.min_observations(frame), |values| {
            self.judge(values)
        })
    }
}
