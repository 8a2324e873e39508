//! Chained cleaning: outlier filtering, repair and panel filters, with a
//! per-step record of how many cells each step blanked or filled.

use core::fmt;

use serde::Serialize;
use tracing::info;

use crate::detector::MethodKind;
use crate::error::{invalid, Result};
use crate::filter;
use crate::impute;
use crate::panel::Panel;
use crate::runner::{detect, DetectionRequest};
use crate::types::{Repair, Warning};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum CleanStep {
    FilterOutliers { method: MethodKind },
    Repair { repair: Repair },
    AverageTradingValue { threshold: f64, window: usize },
    MissingValueGaps { gap_window: usize },
    MinObservations { min_obs: usize },
    DropEntities { entities: Vec<String> },
}

impl fmt::Display for CleanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanStep::FilterOutliers { method } => write!(f, "filter_outliers({method})"),
            CleanStep::Repair { repair } => write!(f, "repair({repair:?})"),
            CleanStep::AverageTradingValue { threshold, window } => {
                write!(f, "average_trading_value({threshold}, {window})")
            }
            CleanStep::MissingValueGaps { gap_window } => {
                write!(f, "missing_value_gaps({gap_window})")
            }
            CleanStep::MinObservations { min_obs } => write!(f, "min_observations({min_obs})"),
            CleanStep::DropEntities { entities } => write!(f, "drop_entities({})", entities.join(",")),
        }
    }
}

/// Panel size before and after one step; missing counts are per field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    pub step: CleanStep,
    pub rows_before: usize,
    pub rows_after: usize,
    pub missing_before: Vec<usize>,
    pub missing_after: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanSummary {
    pub fields: Vec<String>,
    pub steps: Vec<StepSummary>,
    /// Warnings of every detection step, in step order.
    pub warnings: Vec<Warning>,
}

/// ```ignore
/// let (panel, summary) = CleanPipeline::new(raw)
///     .filter_outliers(&DetectionRequest::new(Method::new(MethodKind::RangeBand)))?
///     .repair(Repair::Interpolate)?
///     .filter_min_observations(100)
///     .finish();
/// ```
#[derive(Debug, Clone)]
pub struct CleanPipeline {
    panel: Panel,
    // fitted values of the latest detection, same shape as `panel` at that time
    fitted: Option<Panel>,
    summary: CleanSummary,
}

fn missing_counts(panel: &Panel) -> Vec<usize> {
    (0..panel.fields().len()).map(|f| panel.missing_count(f)).collect()
}

impl CleanPipeline {
    pub fn new(panel: Panel) -> Self {
        let summary = CleanSummary {
            fields: panel.fields().to_vec(),
            ..Default::default()
        };
        Self {
            panel,
            fitted: None,
            summary,
        }
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn summary(&self) -> &CleanSummary {
        &self.summary
    }

    fn record(&mut self, step: CleanStep, next: Panel) {
        let entry = StepSummary {
            rows_before: self.panel.len(),
            rows_after: next.len(),
            missing_before: missing_counts(&self.panel),
            missing_after: missing_counts(&next),
            step,
        };
        let before: usize = entry.missing_before.iter().sum();
        let after: usize = entry.missing_after.iter().sum();
        info!(
            step = %entry.step,
            rows_before = entry.rows_before,
            rows_after = entry.rows_after,
            missing_before = before,
            missing_after = after,
            "clean step"
        );
        self.summary.steps.push(entry);
        self.panel = next;
    }

    /// Blanks cells flagged by `request`.
    pub fn filter_outliers(mut self, request: &DetectionRequest) -> Result<Self> {
        let report = detect(&self.panel, request)?;
        self.summary.warnings.extend(report.warnings().iter().cloned());
        self.fitted = Some(report.fitted().clone());
        let next = filter::outliers(&report);
        self.record(CleanStep::FilterOutliers { method: request.method.kind() }, next);
        Ok(self)
    }

    /// Fills every missing cell according to `repair`. `Repair::Fitted` uses
    /// the fitted values of the latest `filter_outliers` step.
    pub fn repair(mut self, repair: Repair) -> Result<Self> {
        let next = match repair {
            Repair::Missing => self.panel.clone(),
            Repair::ForwardFill => impute::forward_fill(&self.panel),
            Repair::Interpolate => impute::interpolate(&self.panel),
            Repair::Fitted => {
                let fitted = self
                    .fitted
                    .as_ref()
                    .ok_or_else(|| invalid("fitted repair needs a preceding outlier filter"))?;
                impute::fill_from(&self.panel, fitted)?
            }
        };
        self.record(CleanStep::Repair { repair }, next);
        Ok(self)
    }

    /// `filter_outliers` followed by `repair`.
    pub fn repair_outliers(self, request: &DetectionRequest, repair: Repair) -> Result<Self> {
        self.filter_outliers(request)?.repair(repair)
    }

    pub fn filter_average_trading_value(mut self, threshold: f64, window: usize) -> Result<Self> {
        let next = filter::average_trading_value(&self.panel, threshold, window)?;
        self.record(CleanStep::AverageTradingValue { threshold, window }, next);
        Ok(self)
    }

    pub fn filter_missing_value_gaps(mut self, gap_window: usize) -> Result<Self> {
        let next = filter::missing_value_gaps(&self.panel, gap_window)?;
        self.record(CleanStep::MissingValueGaps { gap_window }, next);
        Ok(self)
    }

    pub fn filter_min_observations(mut self, min_obs: usize) -> Self {
        let next = filter::min_observations(&self.panel, min_obs);
        self.record(CleanStep::MinObservations { min_obs }, next);
        self
    }

    pub fn drop_entities<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        let next = filter::drop_entities(&self.panel, names);
        let entities = names.iter().map(|n| n.as_ref().to_string()).collect();
        self.record(CleanStep::DropEntities { entities }, next);
        self
    }

    pub fn finish(self) -> (Panel, CleanSummary) {
        (self.panel, self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{Method, ZScoreParams};
    use crate::panel::PanelBuilder;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
    }

    fn panel() -> Panel {
        builder().build()
    }

    fn builder() -> PanelBuilder {
        let t0 = t0();
        let mut b = Panel::builder(&["close", "volume"]).unwrap();
        for i in 0..60i64 {
            let wiggle = if i % 2 == 0 { 1.0 } else { -1.0 };
            let spike = if i == 45 { 50.0 } else { 0.0 };
            b.push_row("BTC", t0 + Duration::days(i), &[Some(100.0 + wiggle + spike), Some(10.0)])
                .unwrap();
            b.push_row("ETH", t0 + Duration::days(i), &[Some(10.0 + wiggle), Some(1.0)])
                .unwrap();
        }
        b
    }

    fn zscore() -> DetectionRequest {
        DetectionRequest::new(Method::ZScore(ZScoreParams {
            window: 10,
            threshold: 3.0,
            min_periods: None,
        }))
    }

    #[test]
    fn filter_then_repair_keeps_shape() {
        let mut b = builder();
        for i in 0..5 {
            b.push_row("SHORT", t0() + Duration::days(i), &[Some(5.0), Some(1.0)])
                .unwrap();
        }
        let raw = b.build();
        let (cleaned, summary) = CleanPipeline::new(raw.clone())
            .repair_outliers(&zscore(), Repair::Interpolate)
            .unwrap()
            .finish();
        assert!(cleaned.same_shape(&raw));
        assert_eq!(summary.steps.len(), 2);
        assert_eq!(summary.steps[0].missing_after[0], 1);
        assert_eq!(summary.steps[1].missing_after, vec![0, 0]);
        // BTC day 45 is row 90; its neighbours are both 101
        assert_eq!(cleaned.value(90, 0), Some(101.0));
        // both fields of the five-row entity are too short to judge
        assert_eq!(summary.warnings.len(), 2);
        assert!(summary.warnings.iter().all(|w| w.entity() == "SHORT"));
    }

    #[test]
    fn fitted_repair_needs_detection() {
        let err = CleanPipeline::new(panel()).repair(Repair::Fitted);
        assert!(err.is_err());
        let ok = CleanPipeline::new(panel())
            .filter_outliers(&zscore())
            .unwrap()
            .repair(Repair::Fitted)
            .unwrap();
        assert_eq!(ok.panel().missing_count(0), 0);
    }

    #[test]
    fn entity_filters_change_rows() {
        let (p, summary) = CleanPipeline::new(panel())
            .filter_average_trading_value(100.0, 5)
            .unwrap()
            .filter_min_observations(10)
            .drop_entities(&["NOPE"])
            .finish();
        // ETH trades ~10 per day and is blanked after its first four rows
        assert_eq!(p.entities(), &["BTC".to_string()]);
        assert_eq!(summary.steps[1].rows_before, 120);
        assert_eq!(summary.steps[1].rows_after, 60);
        assert_eq!(summary.steps.len(), 3);
    }
}
