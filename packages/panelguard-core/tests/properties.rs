use chrono::Duration;
use panelguard_core::{detect, DetectionRequest, Method, MethodKind, Panel, Repair};
use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;

mod common;
use common::t0;

fn single_series(values: &[Option<f64>]) -> Panel {
    let mut b = Panel::builder(&["value"]).unwrap();
    for (i, v) in values.iter().enumerate() {
        b.push_row("X", t0() + Duration::days(i as i64), &[*v]).unwrap();
    }
    b.build()
}

fn arb_method() -> impl Strategy<Value = MethodKind> {
    proptest::sample::select(MethodKind::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn views_are_finite_and_keep_shape(
        values in vec(option::of(-1e6..1e6f64), 0..120),
        kind in arb_method(),
    ) {
        let panel = single_series(&values);
        let report = detect(&panel, &DetectionRequest::new(Method::new(kind))).unwrap();
        for view in [
            report.fitted().clone(),
            report.filtered(),
            report.outliers(),
            report.cleaned(Repair::Interpolate),
            report.cleaned(Repair::Fitted),
        ] {
            prop_assert!(view.same_shape(&panel));
            prop_assert!(view.column(0).iter().all(|v| !v.is_infinite()));
        }
    }

    #[test]
    fn missing_cells_are_never_flagged(
        values in vec(option::of(-1e6..1e6f64), 0..120),
        kind in arb_method(),
    ) {
        let panel = single_series(&values);
        let report = detect(&panel, &DetectionRequest::new(Method::new(kind))).unwrap();
        for (row, v) in values.iter().enumerate() {
            if v.is_none() {
                prop_assert!(!report.is_flagged(row, 0));
            }
        }
        prop_assert_eq!(report.flags(0).len(), values.len());
    }

    #[test]
    fn constant_series_has_no_dispersion_flags(
        level in -1e6..1e6f64,
        len in 0usize..120,
        kind in proptest::sample::select(vec![
            MethodKind::InterquartileRange,
            MethodKind::MedianAbsoluteDeviation,
            MethodKind::ZScore,
        ]),
    ) {
        let panel = single_series(&vec![Some(level); len]);
        let report = detect(&panel, &DetectionRequest::new(Method::new(kind))).unwrap();
        prop_assert_eq!(report.total_flags(), 0);
    }
}
