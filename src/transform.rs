//! Feature transformation shared by the regression pipeline and the
//! gene-phenotype extractor.
//!
//! Steps run in a fixed order: clip the probability-like scores to
//! `[epsilon, 1 - epsilon]`, map them through `-ln(1 - p)`, fill missing
//! transformed values with the column mean, fill missing class indicators
//! with 0, then drop rows without a usable effect estimate. The mean is taken
//! over every row present at the time of the call, before any row is
//! dropped.

use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

use crate::df_utils::{ensure_f64, f64_values, filter_rows};
use crate::error::MetaRegError;
use crate::qc::check_range_f64;
use crate::schema::{
    AM_PATHOGENICITY, BETA, FEATURES, LOG_CONSTRAINT, LOG_PATHOGENICITY, MISSENSE_INDICATOR,
    PLOF_INDICATOR, PROB_0, SE,
};

pub const DEFAULT_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy)]
pub struct FeatureConfig {
    pub epsilon: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl FeatureConfig {
    /// `epsilon` must lie in the open interval (0, 0.5).
    pub fn validate(&self) -> crate::error::Result<()> {
        check_range_f64(self.epsilon, 0.0, 0.5, true, "epsilon")?;
        if self.epsilon >= 0.5 {
            return Err(MetaRegError::InvalidArgument(
                "Value of epsilon should be below 0.5".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub rows_in: usize,
    pub imputed_constraint: usize,
    pub imputed_pathogenicity: usize,
    pub imputed_indicators: usize,
    pub dropped_missing_effect: usize,
    pub dropped_zero_se: usize,
}

impl TransformReport {
    pub fn rows_out(&self) -> usize {
        self.rows_in - self.dropped_missing_effect - self.dropped_zero_se
    }
}

pub fn clip_probability(p: f64, epsilon: f64) -> f64 {
    p.clamp(epsilon, 1.0 - epsilon)
}

/// `-ln(1 - p)`; large for scores near 1.
pub fn log_odds(p: f64) -> f64 {
    -(-p).ln_1p()
}

pub fn mean_present(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Clips `source`, transforms it into `target` and mean-imputes the gaps.
/// A row whose score is missing keeps a transformed value it already carries,
/// so feeding the output back in is a no-op.
fn transform_score(
    df: &mut DataFrame,
    source: &str,
    target: &str,
    epsilon: f64,
) -> Result<usize> {
    let clipped: Vec<Option<f64>> = f64_values(df, source)?
        .into_iter()
        .map(|v| v.map(|p| clip_probability(p, epsilon)))
        .collect();
    let existing = if df.column(target).is_ok() {
        f64_values(df, target)?
    } else {
        vec![None; clipped.len()]
    };

    let transformed: Vec<Option<f64>> = clipped
        .iter()
        .zip(&existing)
        .map(|(p, prior)| p.map(log_odds).or(*prior))
        .collect();

    let mean = mean_present(&transformed);
    let mut imputed = 0;
    let filled: Vec<Option<f64>> = transformed
        .into_iter()
        .map(|v| match (v, mean) {
            (None, Some(m)) => {
                imputed += 1;
                Some(m)
            }
            (v, _) => v,
        })
        .collect();

    df.with_column(Series::new(source.into(), clipped))?;
    df.with_column(Series::new(target.into(), filled))?;
    Ok(imputed)
}

fn fill_indicator(df: &mut DataFrame, col: &str) -> Result<usize> {
    let values = f64_values(df, col)?;
    let missing = values.iter().filter(|v| v.is_none()).count();
    let filled: Vec<i64> = values
        .into_iter()
        .map(|v| v.map(|x| x as i64).unwrap_or(0))
        .collect();
    df.with_column(Series::new(col.into(), filled))?;
    Ok(missing)
}

/// Runs the full clip, transform, impute and drop sequence.
pub fn transform_features(
    df: DataFrame,
    config: &FeatureConfig,
) -> Result<(DataFrame, TransformReport)> {
    config.validate()?;
    FEATURES.check(&df)?;

    let mut df = ensure_f64(df, &[BETA, SE])?;
    let mut report = TransformReport {
        rows_in: df.height(),
        ..Default::default()
    };

    report.imputed_constraint = transform_score(&mut df, PROB_0, LOG_CONSTRAINT, config.epsilon)?;
    report.imputed_pathogenicity =
        transform_score(&mut df, AM_PATHOGENICITY, LOG_PATHOGENICITY, config.epsilon)?;
    report.imputed_indicators =
        fill_indicator(&mut df, PLOF_INDICATOR)? + fill_indicator(&mut df, MISSENSE_INDICATOR)?;

    let beta = f64_values(&df, BETA)?;
    let se = f64_values(&df, SE)?;
    let has_effect: Vec<bool> = beta
        .iter()
        .zip(&se)
        .map(|(b, s)| b.is_some() && s.is_some())
        .collect();
    let (df, dropped) = filter_rows(&df, &has_effect)?;
    report.dropped_missing_effect = dropped;

    let nonzero_se: Vec<bool> = f64_values(&df, SE)?
        .iter()
        .map(|s| s.is_some_and(|v| v != 0.0))
        .collect();
    let (df, dropped) = filter_rows(&df, &nonzero_se)?;
    report.dropped_zero_se = dropped;

    debug!(?report, "feature transform");
    Ok((df, report))
}
