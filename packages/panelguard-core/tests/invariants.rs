use std::collections::HashMap;

use panelguard_core::{detect, DetectionRequest, Method, MethodKind, OutlierReport, Panel, Repair};

mod common;
use common::{bars, ohlcv_panel, reference_panel, OHLCV};

/// Regression bounds on the reference panel.
fn ceiling(kind: MethodKind) -> f64 {
    match kind {
        MethodKind::RangeBand => 0.05,
        MethodKind::InterquartileRange => 0.05,
        MethodKind::MedianAbsoluteDeviation => 0.20,
        MethodKind::ZScore => 0.05,
        MethodKind::ExponentiallyWeighted => 0.05,
        MethodKind::SeasonalDecomposition => 0.20,
        MethodKind::RobustSeasonalTrend => 0.25,
        MethodKind::ForecastResidual => 0.10,
    }
}

fn run(panel: &Panel, kind: MethodKind) -> OutlierReport {
    detect(panel, &DetectionRequest::new(Method::new(kind))).unwrap()
}

fn assert_finite_same_shape(view: &Panel, raw: &Panel, what: &str) {
    assert!(view.same_shape(raw), "{what}: shape changed");
    for f in 0..view.fields().len() {
        assert!(
            view.column(f).iter().all(|v| !v.is_infinite()),
            "{what}: infinite value in field {f}"
        );
    }
}

#[test]
fn every_view_keeps_shape_and_stays_finite() {
    let panel = reference_panel();
    for kind in MethodKind::ALL {
        let report = run(&panel, kind);
        assert_finite_same_shape(report.fitted(), &panel, &format!("{kind} fitted"));
        assert_finite_same_shape(&report.outliers(), &panel, &format!("{kind} outliers"));
        assert_finite_same_shape(&report.filtered(), &panel, &format!("{kind} filtered"));
        for repair in [Repair::Missing, Repair::ForwardFill, Repair::Interpolate, Repair::Fitted] {
            let cleaned = report.cleaned(repair);
            assert_finite_same_shape(&cleaned, &panel, &format!("{kind} cleaned {repair:?}"));
        }
    }
}

#[test]
fn outliers_and_filtered_partition_observed_cells() {
    let panel = reference_panel();
    for kind in MethodKind::ALL {
        let report = run(&panel, kind);
        let (out, filt) = (report.outliers(), report.filtered());
        for f in 0..panel.fields().len() {
            for row in 0..panel.len() {
                let raw = panel.value(row, f);
                match (out.value(row, f), filt.value(row, f)) {
                    (Some(v), None) | (None, Some(v)) => assert_eq!(Some(v), raw),
                    (None, None) => assert_eq!(raw, None, "{kind}: observed cell lost"),
                    (Some(_), Some(_)) => panic!("{kind}: cell in both views"),
                }
            }
        }
    }
}

#[test]
fn flagged_fraction_stays_below_method_ceiling() {
    let panel = reference_panel();
    for kind in MethodKind::ALL {
        let report = run(&panel, kind);
        for (f, name) in panel.fields().iter().enumerate() {
            let fraction = report.flagged_fraction(f).unwrap();
            assert!(
                fraction < ceiling(kind),
                "{kind}/{name}: {fraction:.3} flagged"
            );
        }
    }
}

#[test]
fn every_method_flags_injected_spikes() {
    let panel = reference_panel();
    let close = panel.field_index("close").unwrap();
    let spikes = [("AAA", [60, 150, 240].as_slice()), ("BBB", [100, 200].as_slice())];
    for kind in MethodKind::ALL {
        let report = run(&panel, kind);
        for (entity, days) in spikes {
            let rows = panel.entity_rows(entity).unwrap();
            for &d in days {
                assert!(report.is_flagged(rows[d], close), "{kind}: {entity} day {d}");
            }
        }
    }
}

#[test]
fn detection_is_idempotent() {
    let panel = reference_panel();
    for kind in MethodKind::ALL {
        let (a, b) = (run(&panel, kind), run(&panel, kind));
        for f in 0..panel.fields().len() {
            assert_eq!(a.flags(f), b.flags(f), "{kind}");
        }
        assert_eq!(a.warnings(), b.warnings());
    }
}

#[test]
fn parallel_and_sequential_runs_agree() {
    let panel = reference_panel();
    for kind in MethodKind::ALL {
        let req = DetectionRequest::new(Method::new(kind));
        let par = detect(&panel, &req).unwrap();
        let seq = detect(&panel, &req.clone().with_parallel(false)).unwrap();
        for f in 0..panel.fields().len() {
            assert_eq!(par.flags(f), seq.flags(f), "{kind}");
        }
        assert_eq!(par.warnings(), seq.warnings(), "{kind}");
    }
}

#[test]
fn constant_entity_has_no_dispersion_flags() {
    let panel = reference_panel();
    let rows = panel.entity_rows("FLAT").unwrap();
    for kind in [
        MethodKind::InterquartileRange,
        MethodKind::MedianAbsoluteDeviation,
        MethodKind::ZScore,
    ] {
        let report = run(&panel, kind);
        for f in 0..panel.fields().len() {
            assert!(rows.iter().all(|&r| !report.is_flagged(r, f)), "{kind}");
        }
    }
}

#[test]
fn short_entity_is_left_unflagged_with_a_warning() {
    let panel = reference_panel();
    let rows = panel.entity_rows("SHORT").unwrap();
    for kind in MethodKind::ALL {
        let report = run(&panel, kind);
        for f in 0..panel.fields().len() {
            assert!(rows.iter().all(|&r| !report.is_flagged(r, f)), "{kind}");
        }
        assert!(
            report.warnings().iter().any(|w| w.entity() == "SHORT"),
            "{kind}: no warning for the short entity"
        );
    }
}

#[test]
fn row_order_does_not_change_flags() {
    let interleaved = reference_panel();

    // same cells, entity-major
    let mut entity_major = Panel::builder(&OHLCV).unwrap();
    for entity in interleaved.entities() {
        for &row in interleaved.entity_rows(entity).unwrap() {
            let (_, ts) = interleaved.index().key(row).unwrap();
            let vals: Vec<Option<f64>> = (0..OHLCV.len()).map(|f| interleaved.value(row, f)).collect();
            entity_major.push_row(entity, ts, &vals).unwrap();
        }
    }
    let entity_major = entity_major.build();

    for kind in MethodKind::ALL {
        let flags_by_key = |panel: &Panel| {
            let report = run(panel, kind);
            let mut out = HashMap::new();
            for row in 0..panel.len() {
                let (e, ts) = panel.index().key(row).unwrap();
                let flags: Vec<bool> = (0..OHLCV.len()).map(|f| report.is_flagged(row, f)).collect();
                out.insert((e.to_string(), ts), flags);
            }
            out
        };
        assert_eq!(flags_by_key(&interleaved), flags_by_key(&entity_major), "{kind}");
    }
}

#[test]
fn entities_do_not_leak_into_each_other() {
    // the same entity alone and next to a much noisier one
    let calm = bars(200, 11, 100.0, &[120]);
    let wild: Vec<[f64; 5]> = bars(200, 12, 5_000.0, &[])
        .into_iter()
        .map(|b| b.map(|v| v * 3.0))
        .collect();
    let alone = ohlcv_panel(&[("CALM", calm.clone())], &[]);
    let mixed = ohlcv_panel(&[("CALM", calm), ("WILD", wild)], &[]);
    for kind in MethodKind::ALL {
        let (a, m) = (run(&alone, kind), run(&mixed, kind));
        let rows = mixed.entity_rows("CALM").unwrap();
        for f in 0..OHLCV.len() {
            let in_mixed: Vec<bool> = rows.iter().map(|&r| m.is_flagged(r, f)).collect();
            assert_eq!(a.flags(f), in_mixed.as_slice(), "{kind}");
        }
    }
}
