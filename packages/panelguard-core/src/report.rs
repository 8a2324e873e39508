//! Result of one detection run: the flag mask plus panel-shaped views of it.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::detector::{Method, MethodKind};
use crate::error::{invalid, PanelError, Result};
use crate::impute;
use crate::panel::Panel;
use crate::types::{Repair, Warning};

/// Named report views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKey {
    /// Input values, untouched.
    #[serde(alias = "original")]
    Raw,
    /// Model value per cell.
    #[serde(alias = "yhat")]
    Fitted,
    /// Input value where flagged, missing elsewhere.
    Outliers,
    /// Missing where flagged, input value elsewhere.
    #[serde(alias = "filt_vals")]
    Filtered,
}

impl ReportKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKey::Raw => "raw",
            ReportKey::Fitted => "yhat",
            ReportKey::Outliers => "outliers",
            ReportKey::Filtered => "filt_vals",
        }
    }
}

impl fmt::Display for ReportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKey {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "original" => Ok(ReportKey::Raw),
            "yhat" | "fitted" => Ok(ReportKey::Fitted),
            "outliers" => Ok(ReportKey::Outliers),
            "filt_vals" | "filtered" => Ok(ReportKey::Filtered),
            other => Err(invalid(format!("unknown report key: {other}"))),
        }
    }
}

/// Flag mask over a panel, with the panel and the detector's fitted values.
///
/// Every view has exactly the input's keys and fields.
#[derive(Debug, Clone)]
pub struct OutlierReport {
    method: Method,
    raw: Panel,
    fitted: Panel,
    // [field][row]
    flags: Vec<Vec<bool>>,
    warnings: Vec<Warning>,
}

impl OutlierReport {
    pub(crate) fn new(
        method: Method,
        raw: Panel,
        fitted: Panel,
        flags: Vec<Vec<bool>>,
        warnings: Vec<Warning>,
    ) -> Self {
        debug_assert!(raw.same_shape(&fitted));
        debug_assert_eq!(flags.len(), raw.fields().len());
        Self {
            method,
            raw,
            fitted,
            flags,
            warnings,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn raw(&self) -> &Panel {
        &self.raw
    }

    pub fn fitted(&self) -> &Panel {
        &self.fitted
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Flag per row of `field`.
    pub fn flags(&self, field: usize) -> &[bool] {
        &self.flags[field]
    }

    pub fn is_flagged(&self, row: usize, field: usize) -> bool {
        self.flags
            .get(field)
            .and_then(|f| f.get(row))
            .copied()
            .unwrap_or(false)
    }

    pub fn flag_count(&self, field: usize) -> usize {
        self.flags.get(field).map_or(0, |f| f.iter().filter(|x| **x).count())
    }

    pub fn total_flags(&self) -> usize {
        (0..self.flags.len()).map(|f| self.flag_count(f)).sum()
    }

    /// Flagged cells over non-missing input cells; `None` when the field has no data.
    pub fn flagged_fraction(&self, field: usize) -> Option<f64> {
        let observed = self.raw.non_missing_count(field);
        (observed > 0).then(|| self.flag_count(field) as f64 / observed as f64)
    }

    fn masked(&self, keep_flagged: bool) -> Panel {
        let columns = self
            .raw
            .columns()
            .iter()
            .zip(&self.flags)
            .map(|(col, flags)| {
                col.iter()
                    .zip(flags)
                    .map(|(v, &flagged)| if flagged == keep_flagged { *v } else { f64::NAN })
                    .collect()
            })
            .collect();
        self.raw.with_columns(columns)
    }

    pub fn outliers(&self) -> Panel {
        self.masked(true)
    }

    pub fn filtered(&self) -> Panel {
        self.masked(false)
    }

    /// Input with flagged cells replaced according to `repair`. Cells that
    /// were missing in the input stay missing.
    pub fn cleaned(&self, repair: Repair) -> Panel {
        let filtered = self.filtered();
        let replacement = match repair {
            Repair::Missing => return filtered,
            Repair::ForwardFill => impute::forward_fill(&filtered),
            Repair::Interpolate => impute::interpolate(&filtered),
            Repair::Fitted => self.fitted.clone(),
        };
        let columns = filtered
            .columns()
            .iter()
            .zip(replacement.columns())
            .zip(&self.flags)
            .map(|((kept, repl), flags)| {
                kept.iter()
                    .zip(repl)
                    .zip(flags)
                    .map(|((k, r), &flagged)| if flagged { *r } else { *k })
                    .collect()
            })
            .collect();
        self.raw.with_columns(columns)
    }

    pub fn get(&self, key: ReportKey) -> Panel {
        match key {
            ReportKey::Raw => self.raw.clone(),
            ReportKey::Fitted => self.fitted.clone(),
            ReportKey::Outliers => self.outliers(),
            ReportKey::Filtered => self.filtered(),
        }
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            method: self.method.kind(),
            rows: self.raw.len(),
            entities: self.raw.entities().len(),
            fields: self
                .raw
                .fields()
                .iter()
                .enumerate()
                .map(|(f, name)| FieldSummary {
                    field: name.clone(),
                    observed: self.raw.non_missing_count(f),
                    flagged: self.flag_count(f),
                    flagged_fraction: self.flagged_fraction(f),
                })
                .collect(),
            warnings: self.warnings.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub method: MethodKind,
    pub rows: usize,
    pub entities: usize,
    pub fields: Vec<FieldSummary>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub field: String,
    pub observed: usize,
    pub flagged: usize,
    pub flagged_fraction: Option<f64>,
}
