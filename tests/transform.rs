use polars::prelude::*;
use proptest::prelude::*;

use metareg::transform::{
    DEFAULT_EPSILON, FeatureConfig, clip_probability, log_odds, mean_present, transform_features,
};

fn col(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name)
        .expect(name)
        .cast(&DataType::Float64)
        .expect("cast")
        .f64()
        .expect("f64")
        .into_iter()
        .collect()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

proptest! {
    #[test]
    fn clipped_scores_stay_in_bounds(p in 0.0f64..=1.0) {
        let c = clip_probability(p, DEFAULT_EPSILON);
        prop_assert!((0.01..=0.99).contains(&c));
        prop_assert!(log_odds(c).is_finite());
    }

    #[test]
    fn transform_is_monotone(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let t_lo = log_odds(clip_probability(lo, DEFAULT_EPSILON));
        let t_hi = log_odds(clip_probability(hi, DEFAULT_EPSILON));
        prop_assert!(t_lo <= t_hi);
    }
}

#[test]
fn log_odds_matches_negative_log_complement() {
    assert!(close(log_odds(0.5), std::f64::consts::LN_2));
    assert!(close(log_odds(0.99), -(0.01f64).ln()));
    assert!(log_odds(0.011) < log_odds(0.012));
}

#[test]
fn mean_ignores_missing() {
    assert_eq!(mean_present(&[Some(1.0), None, Some(3.0)]), Some(2.0));
    assert_eq!(mean_present(&[None, None]), None);
}

#[test]
fn scenario_a_imputes_from_the_only_present_score() {
    let df = df!(
        "gene" => ["G1", "G1"],
        "prob_0" => [Some(0.5), None],
        "am_pathogenicity" => [0.5, 0.5],
        "pLoF_indicator" => [0i64, 1],
        "missense_indicator" => [1i64, 0],
        "AF" => [0.01, 0.02],
        "BETA" => [0.1, -0.1],
        "SE" => [0.05, 0.05],
    )
    .expect("df");

    let (out, report) = transform_features(df, &FeatureConfig::default()).expect("transform");
    assert_eq!(out.height(), 2);
    assert_eq!(report.imputed_constraint, 1);
    assert_eq!(report.imputed_pathogenicity, 0);

    let lc = col(&out, "log_constraint");
    assert!(close(lc[0].expect("present"), std::f64::consts::LN_2));
    assert!(close(lc[1].expect("imputed"), std::f64::consts::LN_2));
    // the source score stays missing; only the transformed column is filled
    assert_eq!(col(&out, "prob_0")[1], None);
    assert_eq!(col(&out, "pLoF_indicator"), vec![Some(0.0), Some(1.0)]);
    assert_eq!(col(&out, "missense_indicator"), vec![Some(1.0), Some(0.0)]);
}

#[test]
fn scores_are_clipped_before_transform() {
    let df = df!(
        "prob_0" => [0.0, 1.0],
        "am_pathogenicity" => [0.999, 0.001],
        "pLoF_indicator" => [0i64, 0],
        "missense_indicator" => [0i64, 0],
        "BETA" => [0.1, 0.2],
        "SE" => [0.1, 0.1],
    )
    .expect("df");
    let (out, _) = transform_features(df, &FeatureConfig::default()).expect("transform");
    let prob = col(&out, "prob_0");
    assert!(close(prob[0].expect("p"), 0.01) && close(prob[1].expect("p"), 0.99));
    let am = col(&out, "am_pathogenicity");
    assert!(close(am[0].expect("am"), 0.99) && close(am[1].expect("am"), 0.01));
    let lc = col(&out, "log_constraint");
    assert!(close(lc[0].expect("lc"), log_odds(0.01)));
    assert!(close(lc[1].expect("lc"), log_odds(0.99)));
}

#[test]
fn missing_effects_and_zero_se_are_dropped_after_imputation() {
    let df = df!(
        "prob_0" => [Some(0.2), Some(0.9), None, Some(0.4), Some(0.5)],
        "am_pathogenicity" => [Some(0.3), None, Some(0.6), Some(0.6), Some(0.6)],
        "pLoF_indicator" => [Some(1i64), None, Some(0), Some(0), Some(1)],
        "missense_indicator" => [Some(0i64), Some(1), None, Some(1), Some(0)],
        "BETA" => [Some(0.1), None, Some(0.3), Some(-0.2), Some(0.05)],
        "SE" => [Some(0.05), Some(0.05), Some(0.0), None, Some(0.02)],
    )
    .expect("df");

    let (out, report) = transform_features(df, &FeatureConfig::default()).expect("transform");
    assert_eq!(report.rows_in, 5);
    assert_eq!(report.dropped_missing_effect, 2);
    assert_eq!(report.dropped_zero_se, 1);
    assert_eq!(report.rows_out(), 2);
    assert_eq!(out.height(), 2);
    assert_eq!(report.imputed_indicators, 2);

    assert_eq!(col(&out, "BETA"), vec![Some(0.1), Some(0.05)]);
    assert!(col(&out, "SE").iter().all(|s| s.is_some_and(|v| v != 0.0)));
    assert!(col(&out, "BETA").iter().all(Option::is_some));
}

#[test]
fn imputation_mean_includes_rows_dropped_later() {
    let (out, _) = transform_features(
        df!(
            "prob_0" => [Some(0.2), Some(0.9), None],
            "am_pathogenicity" => [0.5, 0.5, 0.5],
            "pLoF_indicator" => [0i64, 0, 0],
            "missense_indicator" => [0i64, 0, 0],
            "BETA" => [Some(0.1), None, Some(0.2)],
            "SE" => [0.1, 0.1, 0.1],
        )
        .expect("df"),
        &FeatureConfig::default(),
    )
    .expect("transform");
    let lc = col(&out, "log_constraint");
    assert_eq!(lc.len(), 2);
    assert!(close(lc[1].expect("imputed"), (log_odds(0.2) + log_odds(0.9)) / 2.0));
}

#[test]
fn transform_is_idempotent_on_its_own_output() {
    let df = df!(
        "prob_0" => [Some(0.2), Some(0.95), None, Some(0.6)],
        "am_pathogenicity" => [Some(0.3), None, Some(0.6), Some(0.001)],
        "pLoF_indicator" => [Some(1i64), None, Some(0), Some(0)],
        "missense_indicator" => [Some(0i64), Some(1), None, Some(1)],
        "BETA" => [Some(0.1), None, Some(0.3), Some(-0.2)],
        "SE" => [0.05, 0.05, 0.04, 0.02],
    )
    .expect("df");

    let config = FeatureConfig::default();
    let (first, _) = transform_features(df, &config).expect("first pass");
    let (second, report) = transform_features(first.clone(), &config).expect("second pass");

    assert_eq!(first.height(), second.height());
    assert_eq!(report.dropped_missing_effect, 0);
    assert_eq!(report.dropped_zero_se, 0);
    assert_eq!(report.imputed_constraint, 0);
    assert_eq!(report.imputed_pathogenicity, 0);
    assert_eq!(report.imputed_indicators, 0);
    for name in [
        "prob_0",
        "am_pathogenicity",
        "log_constraint",
        "log_pathogenicity",
        "pLoF_indicator",
        "missense_indicator",
        "BETA",
        "SE",
    ] {
        assert_eq!(col(&first, name), col(&second, name), "column {name}");
    }
}

#[test]
fn epsilon_is_validated() {
    let df = df!(
        "prob_0" => [0.5],
        "am_pathogenicity" => [0.5],
        "pLoF_indicator" => [0i64],
        "missense_indicator" => [0i64],
        "BETA" => [0.1],
        "SE" => [0.1],
    )
    .expect("df");
    assert!(transform_features(df.clone(), &FeatureConfig { epsilon: 0.0 }).is_err());
    assert!(transform_features(df.clone(), &FeatureConfig { epsilon: 0.5 }).is_err());
    assert!(FeatureConfig { epsilon: 0.49 }.validate().is_ok());
    assert!(transform_features(df, &FeatureConfig { epsilon: 0.25 }).is_ok());
}
