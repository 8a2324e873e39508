//! Panel filters applied after (or instead of) outlier detection.
//!
//! `outliers`, `average_trading_value` and `missing_value_gaps` only blank
//! cells and keep the panel's keys. `min_observations` and `drop_entities`
//! remove whole entities.

use tracing::debug;

use crate::error::{invalid, PanelError, Result};
use crate::panel::Panel;
use crate::report::OutlierReport;
use crate::stats::is_missing;
use crate::types::{CLOSE, VOLUME};

/// Input with flagged cells set to missing.
pub fn outliers(report: &OutlierReport) -> Panel {
    report.filtered()
}

/// Blanks every field of rows whose trailing mean traded value
/// (`close * volume` over the last `window` rows of the entity, current row
/// included) is below `threshold`. Rows without a full window of valid
/// traded values are kept.
pub fn average_trading_value(panel: &Panel, threshold: f64, window: usize) -> Result<Panel> {
    if window == 0 {
        return Err(invalid("window must be >= 1"));
    }
    let close = panel
        .field_index(CLOSE)
        .ok_or_else(|| PanelError::UnknownField(CLOSE.to_string()))?;
    let volume = panel
        .field_index(VOLUME)
        .ok_or_else(|| PanelError::UnknownField(VOLUME.to_string()))?;

    let mut columns = panel.columns().to_vec();
    let mut blanked = 0usize;
    for entity in panel.entities() {
        let Some(rows) = panel.entity_rows(entity) else {
            continue;
        };
        let traded: Vec<f64> = rows
            .iter()
            .map(|&r| panel.column(close)[r] * panel.column(volume)[r])
            .collect();
        for (k, &row) in rows.iter().enumerate() {
            if k + 1 < window {
                continue;
            }
            let slice = &traded[k + 1 - window..=k];
            if slice.iter().any(|v| is_missing(*v)) {
                continue;
            }
            let mean = slice.iter().sum::<f64>() / window as f64;
            if mean < threshold {
                for col in columns.iter_mut() {
                    col[row] = f64::NAN;
                }
                blanked += 1;
            }
        }
    }
    debug!(threshold, window, rows = blanked, "average trading value filter");
    Ok(panel.with_columns(columns))
}

/// For each entity and field, blanks everything up to the end of the last
/// run of at least `gap_window` consecutive missing cells, so the series
/// starts after its last long gap.
pub fn missing_value_gaps(panel: &Panel, gap_window: usize) -> Result<Panel> {
    if gap_window == 0 {
        return Err(invalid("gap_window must be >= 1"));
    }
    let mut columns = panel.columns().to_vec();
    for entity in panel.entities() {
        let Some(rows) = panel.entity_rows(entity) else {
            continue;
        };
        for col in columns.iter_mut() {
            let mut run = 0usize;
            let mut cut = None;
            for (k, &row) in rows.iter().enumerate() {
                if is_missing(col[row]) {
                    run += 1;
                    if run >= gap_window {
                        cut = Some(k);
                    }
                } else {
                    run = 0;
                }
            }
            if let Some(end) = cut {
                for &row in &rows[..=end] {
                    col[row] = f64::NAN;
                }
            }
        }
    }
    Ok(panel.with_columns(columns))
}

/// Drops entities with fewer than `min_obs` rows holding any valid value.
pub fn min_observations(panel: &Panel, min_obs: usize) -> Panel {
    let width = panel.fields().len();
    let short: Vec<&str> = panel
        .entities()
        .iter()
        .filter(|e| {
            let rows = panel.entity_rows(e).unwrap_or(&[]);
            let observed = rows
                .iter()
                .filter(|&&r| (0..width).any(|f| panel.value(r, f).is_some()))
                .count();
            observed < min_obs
        })
        .map(String::as_str)
        .collect();
    if !short.is_empty() {
        debug!(min_obs, dropped = ?short, "minimum observations filter");
    }
    panel.select_entities(|e| !short.contains(&e))
}

/// Drops the listed entities; unknown names are ignored.
pub fn drop_entities<S: AsRef<str>>(panel: &Panel, names: &[S]) -> Panel {
    panel.select_entities(|e| !names.iter().any(|n| n.as_ref() == e))
}
