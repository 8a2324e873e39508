//! Fill missing cells per entity. Every function keeps the panel's keys and fields.

use crate::error::{PanelError, Result};
use crate::panel::Panel;
use crate::stats::{fill_linear, is_missing};

fn per_entity(panel: &Panel, mut fill: impl FnMut(&[usize], &mut [f64])) -> Panel {
    let mut columns = panel.columns().to_vec();
    for entity in panel.entities() {
        let Some(rows) = panel.entity_rows(entity) else {
            continue;
        };
        let mut buf = vec![0.0; rows.len()];
        for col in columns.iter_mut() {
            for (slot, &r) in buf.iter_mut().zip(rows) {
                *slot = col[r];
            }
            fill(rows, &mut buf);
            for (v, &r) in buf.iter().zip(rows) {
                col[r] = *v;
            }
        }
    }
    panel.with_columns(columns)
}

/// Missing cells take the latest prior valid value of the same entity.
/// Leading gaps stay missing.
pub fn forward_fill(panel: &Panel) -> Panel {
    per_entity(panel, |_, values| {
        let mut last = f64::NAN;
        for v in values.iter_mut() {
            if is_missing(*v) {
                *v = last;
            } else {
                last = *v;
            }
        }
    })
}

/// Linear interpolation in time between valid neighbours of the same entity;
/// leading and trailing gaps take the nearest valid value.
pub fn interpolate(panel: &Panel) -> Panel {
    per_entity(panel, |rows, values| {
        let x: Vec<f64> = rows
            .iter()
            .map(|&r| panel.index().key(r).map_or(f64::NAN, |(_, ts)| ts.timestamp() as f64))
            .collect();
        if let Some(filled) = fill_linear(values, &x) {
            values.copy_from_slice(&filled);
        }
    })
}

/// Missing cells take the finite value of `fitted` at the same cell.
pub fn fill_from(panel: &Panel, fitted: &Panel) -> Result<Panel> {
    if !panel.same_shape(fitted) {
        return Err(PanelError::ShapeMismatch);
    }
    let columns = panel
        .columns()
        .iter()
        .zip(fitted.columns())
        .map(|(col, fit)| {
            col.iter()
                .zip(fit)
                .map(|(v, f)| if is_missing(*v) { *f } else { *v })
                .collect()
        })
        .collect();
    Ok(panel.with_columns(columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    // two entities interleaved by date; BTC has hours 0, 1, 3 (hour 2 missing)
    fn panel() -> Panel {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut b = Panel::builder(&["close"]).unwrap();
        let btc = [None, Some(1.0), None, Some(4.0), None];
        let eth = [Some(10.0), None, Some(30.0), Some(40.0), Some(50.0)];
        for i in 0..5 {
            let ts = t0 + Duration::hours(i as i64);
            b.push_row("BTC", ts, &[btc[i]]).unwrap();
            b.push_row("ETH", ts, &[eth[i]]).unwrap();
        }
        b.build()
    }

    fn btc(p: &Panel) -> Vec<Option<f64>> {
        p.entity_rows("BTC").unwrap().iter().map(|&r| p.value(r, 0)).collect()
    }

    #[test]
    fn forward_fill_stays_within_entity() {
        let p = forward_fill(&panel());
        assert_eq!(btc(&p), vec![None, Some(1.0), Some(1.0), Some(4.0), Some(4.0)]);
        let eth_row = p.entity_rows("ETH").unwrap()[1];
        assert_eq!(p.value(eth_row, 0), Some(10.0));
    }

    #[test]
    fn interpolate_is_linear_in_time() {
        let p = interpolate(&panel());
        assert_eq!(
            btc(&p),
            vec![Some(1.0), Some(1.0), Some(2.5), Some(4.0), Some(4.0)]
        );
        assert!(p.same_shape(&panel()));
    }

    #[test]
    fn fill_from_requires_same_shape() {
        let p = panel();
        let fitted = p.with_columns(vec![vec![7.0; p.len()]]);
        let filled = fill_from(&p, &fitted).unwrap();
        assert_eq!(btc(&filled)[0], Some(7.0));
        assert_eq!(btc(&filled)[1], Some(1.0));

        let other = p.select_entities(|e| e == "BTC");
        assert!(matches!(fill_from(&p, &other), Err(PanelError::ShapeMismatch)));
    }
}
