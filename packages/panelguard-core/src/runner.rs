//! Per-entity execution of one detection request.

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detector::{DetectContext, Detector, EntityDetection, Method};
use crate::error::{PanelError, Result};
use crate::panel::{EntityFrame, Panel};
use crate::report::OutlierReport;
use crate::types::{FieldSelection, Warning, WindowMode};

fn default_parallel() -> bool {
    true
}

/// One detection call: method and parameters plus which fields to judge.
///
/// ```json
/// {"method": "mad", "window": 20, "fields": {"only": ["close"]}, "window_mode": "centered"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRequest {
    #[serde(flatten)]
    pub method: Method,
    #[serde(default)]
    pub fields: FieldSelection,
    #[serde(default)]
    pub window_mode: WindowMode,
    /// Judge the natural log of strictly positive values.
    #[serde(default)]
    pub log: bool,
    /// Fan entities out over the rayon pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl DetectionRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            fields: FieldSelection::All,
            window_mode: WindowMode::Trailing,
            log: false,
            parallel: true,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_fields(mut self, fields: FieldSelection) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_window_mode(mut self, mode: WindowMode) -> Self {
        self.window_mode = mode;
        self
    }

    pub fn with_log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// One flag per panel field. Names in the selection must exist.
    fn selected(&self, panel: &Panel) -> Result<Vec<bool>> {
        if let Some(unknown) = self
            .fields
            .names()
            .iter()
            .find(|n| panel.field_index(n).is_none())
        {
            return Err(PanelError::UnknownField(unknown.clone()));
        }
        Ok(panel.fields().iter().map(|f| self.fields.includes(f)).collect())
    }
}

fn log_positive(v: f64) -> f64 {
    if v > 0.0 {
        v.ln()
    } else {
        f64::NAN
    }
}

fn judge_entity<'a>(
    frame: EntityFrame<'a>,
    detector: &dyn Detector,
    ctx: &DetectContext<'_>,
    log: bool,
) -> (&'a [usize], EntityDetection) {
    let started = Instant::now();
    let frame = if log {
        frame.map_columns(log_positive)
    } else {
        frame
    };
    let out = detector.detect(&frame, ctx);
    debug!(
        entity = frame.entity(),
        method = %detector.kind(),
        rows = frame.len(),
        flagged = out.flag_count(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "entity judged"
    );
    (frame.rows(), out)
}

/// Runs `request` over every entity of `panel` independently and assembles
/// a report with the panel's keys and fields.
///
/// Fails only on structural problems (unknown field, invalid parameters).
/// Entities that cannot be judged are left unflagged and reported as warnings.
pub fn detect(panel: &Panel, request: &DetectionRequest) -> Result<OutlierReport> {
    request.method.validate()?;
    let selected = request.selected(panel)?;
    let detector = request.method.detector();
    let kind = detector.kind();
    let ctx = DetectContext {
        window_mode: request.window_mode,
        selected: &selected,
    };

    let frames = panel.entity_frames();
    let results: Vec<(&[usize], EntityDetection)> = if request.parallel {
        frames
            .into_par_iter()
            .map(|frame| judge_entity(frame, detector, &ctx, request.log))
            .collect()
    } else {
        frames
            .into_iter()
            .map(|frame| judge_entity(frame, detector, &ctx, request.log))
            .collect()
    };

    let width = panel.fields().len();
    let mut flags = vec![vec![false; panel.len()]; width];
    let mut fitted = vec![vec![f64::NAN; panel.len()]; width];
    let mut warnings: Vec<Warning> = Vec::new();
    for (rows, detection) in results {
        for (f, series) in detection.fields.iter().enumerate() {
            let Some(series) = series.as_ref().filter(|_| selected[f]) else {
                continue;
            };
            let raw = panel.column(f);
            for (k, &row) in rows.iter().enumerate() {
                flags[f][row] = series.flags[k] && !raw[row].is_nan();
                let y = series.fitted[k];
                fitted[f][row] = if request.log { y.exp() } else { y };
            }
        }
        warnings.extend(detection.warnings);
    }

    for w in &warnings {
        warn!(entity = w.entity(), field = w.field(), method = %w.method(), "{w}");
    }
    let flagged: usize = flags.iter().map(|f| f.iter().filter(|x| **x).count()).sum();
    info!(
        method = %kind,
        entities = panel.entities().len(),
        rows = panel.len(),
        flagged,
        warnings = warnings.len(),
        "detection finished"
    );

    let fitted = panel.with_columns(fitted);
    Ok(OutlierReport::new(
        request.method.clone(),
        panel.clone(),
        fitted,
        flags,
        warnings,
    ))
}
