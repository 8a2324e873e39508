use serde::{Deserialize, Serialize};

use super::{
    check_positive, flag_residuals, per_field, DetectContext, Detector, EntityDetection,
    MethodKind, SeriesDetection,
};
use crate::decompose::{Classical, Decomposer};
use crate::error::{invalid, Result};
use crate::frequency::Frequency;
use crate::panel::EntityFrame;
use crate::stats::fill_linear;
use crate::types::Warning;

/// Classical decomposition residual: flag `|residual| > threshold * std(residual)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionParams {
    /// Observations per seasonal cycle; inferred from the sampling frequency when unset.
    pub period: Option<usize>,
    pub threshold: f64,
}

impl Default for DecompositionParams {
    fn default() -> Self {
        Self {
            period: None,
            threshold: 3.0,
        }
    }
}

pub(super) fn check_period(period: Option<usize>) -> Result<()> {
    match period {
        Some(p) if p < 2 => Err(invalid(format!("period must be >= 2, got {p}"))),
        _ => Ok(()),
    }
}

/// The explicit period, or the default one for the frame's inferred frequency.
pub(super) fn resolve_period(period: Option<usize>, frame: &EntityFrame<'_>) -> Option<usize> {
    period.or_else(|| Frequency::infer(frame.timestamps())?.seasonal_period())
}

/// Decomposes each selected field (gaps interpolated in time) and flags
/// observed positions with outsized residuals.
pub(super) fn detect_residuals(
    decomposer: &dyn Decomposer,
    kind: MethodKind,
    period: Option<usize>,
    threshold: f64,
    frame: &EntityFrame<'_>,
    ctx: &DetectContext<'_>,
) -> EntityDetection {
    let Some(period) = resolve_period(period, frame) else {
        let mut out = EntityDetection::empty(frame.fields().len());
        for (f, slot) in out.fields.iter_mut().enumerate() {
            if ctx.is_selected(f) {
                *slot = Some(SeriesDetection::unflagged(frame.len()));
                out.warnings.push(Warning::NoSeasonality {
                    entity: frame.entity().to_string(),
                    method: kind,
                    field: frame.fields()[f].clone(),
                });
            }
        }
        return out;
    };
    let x: Vec<f64> = frame.timestamps().iter().map(|t| *t as f64).collect();
    per_field(kind, frame, ctx, period.saturating_mul(2), |values| {
        let decomposition =
            fill_linear(values, &x).and_then(|filled| decomposer.decompose(&filled, period));
        match decomposition {
            Some(d) => flag_residuals(values, d.fitted(), &d.residual, threshold),
            None => SeriesDetection::unflagged(values.len()),
        }
    })
}

impl Detector for DecompositionParams {
    fn kind(&self) -> MethodKind {
        MethodKind::SeasonalDecomposition
    }

    fn validate(&self) -> Result<()> {
        check_period(self.period)?;
        check_positive("threshold", self.threshold)
    }

    /// Two full cycles; 0 when no period can be resolved (reported as
    /// missing seasonality instead).
    fn min_observations(&self, frame: &EntityFrame<'_>) -> usize {
        resolve_period(self.period, frame).map_or(0, |p| p.saturating_mul(2))
    }

    fn detect(&self, frame: &EntityFrame<'_>, ctx: &DetectContext<'_>) -> EntityDetection {
        detect_residuals(&Classical, self.kind(), self.period, self.threshold, frame, ctx)
    }
}
