use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use tracing::info;

use crate::df_utils::str_values;
use crate::io::{read_table, write_vector};
use crate::qc::check_file_exists;
use crate::schema::PHENO_RESULTS;

const CONTINUOUS: &str = "continuous";

#[derive(Debug, Clone)]
pub struct ContinuousPhenosConfig {
    pub pheno_results: PathBuf,
    pub output: PathBuf,
}

/// Distinct phenotype codes whose trait type is continuous, sorted.
pub fn continuous_phenocodes(df: &DataFrame) -> Result<Vec<String>> {
    PHENO_RESULTS.check(df)?;
    let trait_types = str_values(df, "trait_type")?;
    let codes = str_values(df, "phenocode")?;
    let selected: BTreeSet<String> = trait_types
        .into_iter()
        .zip(codes)
        .filter_map(|(kind, code)| match (kind.as_deref(), code) {
            (Some(CONTINUOUS), Some(code)) => Some(code),
            _ => None,
        })
        .collect();
    Ok(selected.into_iter().collect())
}

pub fn continuous_phenos(config: &ContinuousPhenosConfig) -> Result<Vec<String>> {
    check_file_exists(&config.pheno_results, "pheno_results")?;
    let df = read_table(&config.pheno_results)
        .with_context(|| format!("load {}", config.pheno_results.display()))?;
    let codes = continuous_phenocodes(&df)?;
    write_vector(&codes, &config.output)?;
    info!(
        "{} continuous phenotype codes written to {}",
        codes.len(),
        config.output.display()
    );
    Ok(codes)
}
