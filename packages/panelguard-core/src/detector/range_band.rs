//! Range band (ATR-style).
//!
//! True Range = max(high - low, |high - ref_close|, |low - ref_close|)
//! band = ref_close ± multiplier * mean(TR over the last `window` accepted bars)

use serde::{Deserialize, Serialize};

use super::{
    check_positive, check_window, DetectContext, Detector, EntityDetection, MethodKind,
    SeriesDetection,
};
use crate::circular::RunningWindow;
use crate::error::Result;
use crate::panel::EntityFrame;
use crate::stats::is_missing;
use crate::types::{Warning, CLOSE, HIGH, LOW, OPEN, PRICE_FIELDS};

/// Flags price fields outside a band around the last accepted close.
///
/// The fitted value of each price field is its own value on the last
/// accepted bar, so repairing a whole flagged bar with its fitted values
/// yields a consistent bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeBandParams {
    /// Bars in the trailing range average.
    pub window: usize,
    /// Band half-width in average ranges.
    pub multiplier: f64,
}

impl Default for RangeBandParams {
    fn default() -> Self {
        Self {
            window: 14,
            multiplier: 5.0,
        }
    }
}

/// Bar-level view over the price columns of one frame.
struct Bars<'f> {
    open: Option<&'f [f64]>,
    high: Option<&'f [f64]>,
    low: Option<&'f [f64]>,
    close: &'f [f64],
}

fn valid(col: Option<&[f64]>, i: usize) -> Option<f64> {
    col.map(|c| c[i]).filter(|v| !is_missing(*v))
}

impl Bars<'_> {
    /// (high, low) of bar `i`, falling back to max/min(open, close) when the
    /// bar carries no usable high/low.
    fn extremes(&self, i: usize) -> Option<(f64, f64)> {
        let body = [valid(self.open, i), valid(Some(self.close), i)];
        let body_hi = body.iter().flatten().copied().reduce(f64::max);
        let body_lo = body.iter().flatten().copied().reduce(f64::min);
        let hi = valid(self.high, i).or(body_hi)?;
        let lo = valid(self.low, i).or(body_lo)?;
        Some((hi.max(lo), hi.min(lo)))
    }

    fn true_range(&self, i: usize, ref_close: Option<f64>) -> Option<f64> {
        let (hi, lo) = self.extremes(i)?;
        let hl = hi - lo;
        let tr = match ref_close {
            None => hl,
            Some(pc) => hl.max((hi - pc).abs()).max((lo - pc).abs()),
        };
        tr.is_finite().then_some(tr)
    }
}

impl Detector for RangeBandParams {
    fn kind(&self) -> MethodKind {
        MethodKind::RangeBand
    }

    fn validate(&self) -> Result<()> {
        check_window("window", self.window, 1)?;
        check_positive("multiplier", self.multiplier)
    }

    fn min_observations(&self, _frame: &EntityFrame<'_>) -> usize {
        self.window.saturating_add(1)
    }

    /// Walks the bars in order. Only accepted bars move the reference close and
    /// feed the range average, so a spike cannot widen the band for the bars
    /// after it. Always trailing; the window mode does not apply.
    fn detect(&self, frame: &EntityFrame<'_>, ctx: &DetectContext<'_>) -> EntityDetection {
        let mut out = EntityDetection::empty(frame.fields().len());
        let Some(close_idx) = frame.field_index(CLOSE) else {
            out.warnings.push(Warning::MissingField {
                entity: frame.entity().to_string(),
                method: self.kind(),
                field: CLOSE.to_string(),
            });
            return out;
        };
        let available = frame.valid_count(close_idx);
        let required = self.min_observations(frame);
        let judged: Vec<usize> = PRICE_FIELDS
            .iter()
            .filter_map(|name| frame.field_index(name))
            .filter(|f| ctx.is_selected(*f))
            .collect();
        for &f in &judged {
            out.fields[f] = Some(SeriesDetection::unflagged(frame.len()));
        }
        if available < required {
            out.warnings.push(Warning::InsufficientHistory {
                entity: frame.entity().to_string(),
                method: self.kind(),
                field: CLOSE.to_string(),
                required,
                available,
            });
            return out;
        }

        let col = move |name: &str| frame.field_index(name).map(|f| frame.column(f));
        let bars = Bars {
            open: col(OPEN),
            high: col(HIGH),
            low: col(LOW),
            close: frame.column(close_idx),
        };

        let mut ranges = RunningWindow::new(self.window);
        let mut ref_close: Option<f64> = None;
        // each judged field's value on the last accepted bar
        let mut reference: Vec<Option<f64>> = vec![None; frame.fields().len()];
        let mut rejected_run = 0usize;
        for i in 0..frame.len() {
            let band = match (ref_close, ranges.is_full().then(|| ranges.mean()).flatten()) {
                (Some(pc), Some(atr)) if atr > 0.0 => {
                    Some((pc - self.multiplier * atr, pc + self.multiplier * atr))
                }
                _ => None,
            };

            let mut bar_flagged = false;
            for &f in &judged {
                let x = frame.column(f)[i];
                let Some(det) = out.fields[f].as_mut() else {
                    continue;
                };
                if let Some(r) = reference[f] {
                    det.fitted[i] = r;
                }
                if let Some((lo, hi)) = band {
                    if !is_missing(x) && (x < lo || x > hi) {
                        det.flags[i] = true;
                        bar_flagged = true;
                    }
                }
            }

            if bar_flagged {
                rejected_run += 1;
                // a level shift rather than a spike: re-anchor on it
                if rejected_run >= self.window {
                    if let Some(c) = valid(Some(bars.close), i) {
                        ref_close = Some(c);
                        accept(&mut reference, &judged, frame, i);
                        ranges = RunningWindow::new(self.window);
                        rejected_run = 0;
                    }
                }
                continue;
            }
            rejected_run = 0;
            if let Some(tr) = bars.true_range(i, ref_close) {
                ranges.push(tr);
            }
            if let Some(c) = valid(Some(bars.close), i) {
                ref_close = Some(c);
            }
            accept(&mut reference, &judged, frame, i);
        }
        out
    }
}

fn accept(reference: &mut [Option<f64>], judged: &[usize], frame: &EntityFrame<'_>, i: usize) {
    for &f in judged {
        if let Some(x) = valid(Some(frame.column(f)), i) {
            reference[f] = Some(x);
        }
    }
}
