#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use panelguard_core::Panel;

pub const OHLCV: [&str; 5] = ["open", "high", "low", "close", "volume"];

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()
}

/// Deterministic noise in [-1, 1).
pub fn noise(i: usize, seed: u64) -> f64 {
    let x = ((i as f64 + seed as f64 * 1_000.0) * 12.9898).sin() * 43_758.5453;
    2.0 * (x - x.floor()) - 1.0
}

/// One entity's daily OHLCV bars: slow drift plus bounded noise, with every
/// price of the bars at `spikes` lifted by 15.
pub fn bars(n: usize, seed: u64, level: f64, spikes: &[usize]) -> Vec<[f64; 5]> {
    (0..n)
        .map(|i| {
            let spike = if spikes.contains(&i) { 15.0 } else { 0.0 };
            let close = level + 0.002 * i as f64 + noise(i, seed) + spike;
            let open = close + 0.3 * noise(i, seed + 5);
            let high = close + 0.5 + 0.25 * noise(i, seed + 7).abs();
            let low = close - 0.5 - 0.25 * noise(i, seed + 13).abs();
            let volume = 1_000.0 + 100.0 * noise(i, seed + 29);
            [open, high, low, close, volume]
        })
        .collect()
}

/// Date-major (interleaved) OHLCV panel; `None` cells come from `missing`
/// as (entity, position, field) triples.
pub fn ohlcv_panel(entities: &[(&str, Vec<[f64; 5]>)], missing: &[(&str, usize, usize)]) -> Panel {
    let mut b = Panel::builder(&OHLCV).unwrap();
    let longest = entities.iter().map(|(_, rows)| rows.len()).max().unwrap_or(0);
    for i in 0..longest {
        for (name, rows) in entities {
            let Some(row) = rows.get(i) else { continue };
            let vals: Vec<Option<f64>> = row
                .iter()
                .enumerate()
                .map(|(f, v)| {
                    let blank = missing.iter().any(|(e, p, mf)| e == name && *p == i && *mf == f);
                    (!blank).then_some(*v)
                })
                .collect();
            b.push_row(name, t0() + Duration::days(i as i64), &vals).unwrap();
        }
    }
    b.build()
}

/// Reference panel: three realistic entities (with sparse spikes and a few
/// missing cells), a constant entity and a short one.
pub fn reference_panel() -> Panel {
    let entities = vec![
        ("AAA", bars(300, 1, 100.0, &[60, 150, 240])),
        ("BBB", bars(300, 2, 50.0, &[100, 200])),
        ("CCC", bars(300, 3, 20.0, &[])),
        ("FLAT", vec![[7.0, 7.0, 7.0, 7.0, 7.0]; 300]),
        ("SHORT", bars(8, 4, 10.0, &[])),
    ];
    let missing = [("BBB", 30, 3), ("BBB", 31, 3), ("CCC", 120, 0), ("AAA", 10, 4)];
    ohlcv_panel(&entities, &missing)
}
