//! Outlier detectors.
//!
//! Each method is a params struct implementing [`Detector`]; [`Method`] is the
//! closed set of them and [`Method::detector`] the single dispatch point.

mod ewma;
mod forecast;
mod iqr;
mod mad;
mod range_band;
mod seasonal;
mod stl;
mod zscore;

pub use ewma::EwmaParams;
pub use forecast::ForecastParams;
pub use iqr::IqrParams;
pub use mad::MadParams;
pub use range_band::RangeBandParams;
pub use seasonal::DecompositionParams;
pub use stl::StlParams;
pub use zscore::ZScoreParams;

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{invalid, PanelError, Result};
use crate::panel::EntityFrame;
use crate::stats::{is_missing, neighbours};
use crate::types::{Warning, WindowMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    RangeBand,
    InterquartileRange,
    MedianAbsoluteDeviation,
    ZScore,
    ExponentiallyWeighted,
    SeasonalDecomposition,
    RobustSeasonalTrend,
    ForecastResidual,
}

impl MethodKind {
    pub const ALL: [MethodKind; 8] = [
        MethodKind::RangeBand,
        MethodKind::InterquartileRange,
        MethodKind::MedianAbsoluteDeviation,
        MethodKind::ZScore,
        MethodKind::ExponentiallyWeighted,
        MethodKind::SeasonalDecomposition,
        MethodKind::RobustSeasonalTrend,
        MethodKind::ForecastResidual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::RangeBand => "range_band",
            MethodKind::InterquartileRange => "interquartile_range",
            MethodKind::MedianAbsoluteDeviation => "median_absolute_deviation",
            MethodKind::ZScore => "z_score",
            MethodKind::ExponentiallyWeighted => "exponentially_weighted",
            MethodKind::SeasonalDecomposition => "seasonal_decomposition",
            MethodKind::RobustSeasonalTrend => "robust_seasonal_trend",
            MethodKind::ForecastResidual => "forecast_residual",
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MethodKind {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let kind = match name.as_str() {
            "range_band" | "atr" => MethodKind::RangeBand,
            "interquartile_range" | "iqr" => MethodKind::InterquartileRange,
            "median_absolute_deviation" | "mad" => MethodKind::MedianAbsoluteDeviation,
            "z_score" | "zscore" => MethodKind::ZScore,
            "exponentially_weighted" | "ewma" => MethodKind::ExponentiallyWeighted,
            "seasonal_decomposition" | "seasonal_decomp" => MethodKind::SeasonalDecomposition,
            "robust_seasonal_trend" | "stl" => MethodKind::RobustSeasonalTrend,
            "forecast_residual" | "forecast" | "prophet" => MethodKind::ForecastResidual,
            _ => return Err(PanelError::UnknownMethod(s.to_string())),
        };
        Ok(kind)
    }
}

/// Detection method together with its parameters.
///
/// Serialized with an inline tag: `{"method": "z_score", "window": 30, "threshold": 2.0}`.
/// Omitted parameters take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Method {
    #[serde(alias = "atr")]
    RangeBand(RangeBandParams),
    #[serde(alias = "iqr")]
    InterquartileRange(IqrParams),
    #[serde(alias = "mad")]
    MedianAbsoluteDeviation(MadParams),
    #[serde(alias = "zscore")]
    ZScore(ZScoreParams),
    #[serde(alias = "ewma")]
    ExponentiallyWeighted(EwmaParams),
    #[serde(alias = "seasonal_decomp")]
    SeasonalDecomposition(DecompositionParams),
    #[serde(alias = "stl")]
    RobustSeasonalTrend(StlParams),
    #[serde(alias = "forecast", alias = "prophet")]
    ForecastResidual(ForecastParams),
}

impl Method {
    /// Method with default parameters.
    pub fn new(kind: MethodKind) -> Self {
        match kind {
            MethodKind::RangeBand => Method::RangeBand(Default::default()),
            MethodKind::InterquartileRange => Method::InterquartileRange(Default::default()),
            MethodKind::MedianAbsoluteDeviation => {
                Method::MedianAbsoluteDeviation(Default::default())
            }
            MethodKind::ZScore => Method::ZScore(Default::default()),
            MethodKind::ExponentiallyWeighted => Method::ExponentiallyWeighted(Default::default()),
            MethodKind::SeasonalDecomposition => Method::SeasonalDecomposition(Default::default()),
            MethodKind::RobustSeasonalTrend => Method::RobustSeasonalTrend(Default::default()),
            MethodKind::ForecastResidual => Method::ForecastResidual(Default::default()),
        }
    }

    pub fn kind(&self) -> MethodKind {
        self.detector().kind()
    }

    pub fn detector(&self) -> &dyn Detector {
        match self {
            Method::RangeBand(p) => p,
            Method::InterquartileRange(p) => p,
            Method::MedianAbsoluteDeviation(p) => p,
            Method::ZScore(p) => p,
            Method::ExponentiallyWeighted(p) => p,
            Method::SeasonalDecomposition(p) => p,
            Method::RobustSeasonalTrend(p) => p,
            Method::ForecastResidual(p) => p,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.detector().validate()
    }

    /// Overrides the method's window length: the rolling window, the EW span,
    /// or the seasonal period. The forecast model has no window and is unchanged.
    pub fn with_window(mut self, window: usize) -> Self {
        match &mut self {
            Method::RangeBand(p) => p.window = window,
            Method::InterquartileRange(p) => p.window = window,
            Method::MedianAbsoluteDeviation(p) => p.window = window,
            Method::ZScore(p) => p.window = window,
            Method::ExponentiallyWeighted(p) => {
                p.span = window;
                p.warmup = window;
            }
            Method::SeasonalDecomposition(p) => p.period = Some(window),
            Method::RobustSeasonalTrend(p) => p.period = Some(window),
            Method::ForecastResidual(_) => {}
        }
        self
    }

    /// Overrides the method's threshold multiplier. For the forecast model
    /// the threshold is the prediction interval width.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        match &mut self {
            Method::RangeBand(p) => p.multiplier = threshold,
            Method::InterquartileRange(p) => p.k = threshold,
            Method::MedianAbsoluteDeviation(p) => p.threshold = threshold,
            Method::ZScore(p) => p.threshold = threshold,
            Method::ExponentiallyWeighted(p) => p.threshold = threshold,
            Method::SeasonalDecomposition(p) => p.threshold = threshold,
            Method::RobustSeasonalTrend(p) => p.threshold = threshold,
            Method::ForecastResidual(p) => p.interval_width = threshold,
        }
        self
    }
}

impl FromStr for Method {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Method::new(s.parse()?))
    }
}

/// Per-call options shared by all detectors.
#[derive(Debug, Clone, Copy)]
pub struct DetectContext<'a> {
    pub window_mode: WindowMode,
    /// One flag per panel field; unselected fields are never judged.
    pub selected: &'a [bool],
}

impl DetectContext<'_> {
    pub fn is_selected(&self, field: usize) -> bool {
        self.selected.get(field).copied().unwrap_or(false)
    }
}

/// Flags and fitted values for one field of one entity, in frame order.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesDetection {
    pub flags: Vec<bool>,
    /// Model value per position, `NaN` where the model has none.
    pub fitted: Vec<f64>,
}

impl SeriesDetection {
    pub fn unflagged(len: usize) -> Self {
        Self {
            flags: vec![false; len],
            fitted: vec![f64::NAN; len],
        }
    }

    pub fn flag_count(&self) -> usize {
        self.flags.iter().filter(|f| **f).count()
    }
}

/// Result of one detector over one entity.
#[derive(Debug, Clone, Default)]
pub struct EntityDetection {
    /// Indexed like the panel fields; `None` for fields the detector did not judge.
    pub fields: Vec<Option<SeriesDetection>>,
    pub warnings: Vec<Warning>,
}

impl EntityDetection {
    pub fn empty(width: usize) -> Self {
        Self {
            fields: vec![None; width],
            warnings: Vec::new(),
        }
    }

    pub fn flag_count(&self) -> usize {
        self.fields.iter().flatten().map(SeriesDetection::flag_count).sum()
    }
}

pub trait Detector: Send + Sync {
    fn kind(&self) -> MethodKind;

    /// Rejects parameter values no series could satisfy.
    fn validate(&self) -> Result<()>;

    /// Valid observations a field of `frame` needs before anything can be flagged.
    fn min_observations(&self, frame: &EntityFrame<'_>) -> usize;

    /// Judges every selected field of one entity. Never fails: conditions that
    /// stop a field from being judged become warnings.
    fn detect(&self, frame: &EntityFrame<'_>, ctx: &DetectContext<'_>) -> EntityDetection;
}

// ===== Shared helpers =====

pub(crate) fn check_window(name: &str, window: usize, min: usize) -> Result<()> {
    if window < min {
        return Err(invalid(format!("{name} must be >= {min}, got {window}")));
    }
    Ok(())
}

pub(crate) fn check_positive(name: &str, v: f64) -> Result<()> {
    if !(v.is_finite() && v > 0.0) {
        return Err(invalid(format!("{name} must be finite and > 0, got {v}")));
    }
    Ok(())
}

pub(crate) fn check_min_periods(min_periods: Option<usize>, window: usize) -> Result<()> {
    match min_periods {
        Some(m) if m < 2 || m > window => Err(invalid(format!(
            "min_periods must be in [2, window={window}], got {m}"
        ))),
        _ => Ok(()),
    }
}

/// Runs `judge` on every selected field with at least `required` valid
/// observations; shorter fields stay unflagged with a warning.
pub(crate) fn per_field(
    kind: MethodKind,
    frame: &EntityFrame<'_>,
    ctx: &DetectContext<'_>,
    required: usize,
    mut judge: impl FnMut(&[f64]) -> SeriesDetection,
) -> EntityDetection {
    let mut out = EntityDetection::empty(frame.fields().len());
    for (f, slot) in out.fields.iter_mut().enumerate() {
        if !ctx.is_selected(f) {
            continue;
        }
        let available = frame.valid_count(f);
        if available < required {
            out.warnings.push(Warning::InsufficientHistory {
                entity: frame.entity().to_string(),
                method: kind,
                field: frame.fields()[f].clone(),
                required,
                available,
            });
            *slot = Some(SeriesDetection::unflagged(frame.len()));
            continue;
        }
        *slot = Some(judge(frame.column(f)));
    }
    out
}

/// Judges each valid position against the valid values of its reference
/// window. `judge(x, window)` returns `(flagged, fitted)`, or `None` when the
/// window is degenerate; it may reorder `window`.
pub(crate) fn rolling(
    values: &[f64],
    window: usize,
    min_periods: usize,
    mode: WindowMode,
    mut judge: impl FnMut(f64, &mut Vec<f64>) -> Option<(bool, f64)>,
) -> SeriesDetection {
    let mut out = SeriesDetection::unflagged(values.len());
    let mut buf = Vec::with_capacity(window.min(values.len()));
    for (i, &x) in values.iter().enumerate() {
        if is_missing(x) {
            continue;
        }
        neighbours(values, i, window, mode, &mut buf);
        if buf.len() < min_periods {
            continue;
        }
        if let Some((flag, fitted)) = judge(x, &mut buf) {
            out.flags[i] = flag;
            out.fitted[i] = fitted;
        }
    }
    out
}

/// Flags valid positions whose residual exceeds `threshold` residual standard
/// deviations. Zero spread flags nothing.
pub(crate) fn flag_residuals(
    values: &[f64],
    fitted: Vec<f64>,
    residual: &[f64],
    threshold: f64,
) -> SeriesDetection {
    let observed: Vec<f64> = residual
        .iter()
        .zip(values)
        .filter(|(_, v)| !is_missing(**v))
        .map(|(r, _)| *r)
        .collect();
    let mut flags = vec![false; values.len()];
    if let Some((_, sd)) = crate::stats::mean_std(&observed) {
        if sd > 0.0 {
            for (i, flag) in flags.iter_mut().enumerate() {
                *flag = !is_missing(values[i]) && residual[i].abs() > threshold * sd;
            }
        }
    }
    SeriesDetection { flags, fitted }
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{Duration, TimeZone, Utc};

    use super::{DetectContext, Detector, EntityDetection};
    use crate::panel::Panel;
    use crate::types::WindowMode;

    /// Daily single-field panel, one entity per `(name, values)`; `NaN` is missing.
    pub(crate) fn series_panel(field: &str, series: &[(&str, Vec<f64>)]) -> Panel {
        let t0 = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let mut b = Panel::builder(&[field]).unwrap();
        for (entity, values) in series {
            for (i, v) in values.iter().enumerate() {
                let cell = (!v.is_nan()).then_some(*v);
                b.push_row(entity, t0 + Duration::days(i as i64), &[cell]).unwrap();
            }
        }
        b.build()
    }

    pub(crate) fn run_all(det: &dyn Detector, panel: &Panel, mode: WindowMode) -> Vec<EntityDetection> {
        let selected = vec![true; panel.fields().len()];
        let ctx = DetectContext {
            window_mode: mode,
            selected: &selected,
        };
        panel
            .entity_frames()
            .iter()
            .map(|f| det.detect(f, &ctx))
            .collect()
    }

    /// Flags of field 0 for the first entity.
    pub(crate) fn flags_of(det: &dyn Detector, values: Vec<f64>, mode: WindowMode) -> Vec<bool> {
        let panel = series_panel("x", &[("A", values)]);
        let mut runs = run_all(det, &panel, mode);
        runs.remove(0).fields.remove(0).map(|s| s.flags).unwrap_or_default()
    }

    pub(crate) fn flagged_positions(flags: &[bool]) -> Vec<usize> {
        (0..flags.len()).filter(|i| flags[*i]).collect()
    }
}
