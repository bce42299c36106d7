use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::info;

use crate::df_utils::{filter_rows, str_values};
use crate::io::{read_table, write_dataframe};
use crate::qc::{check_dir_exists, check_file_exists, check_non_empty};
use crate::schema::{
    AM_PATHOGENICITY, BETA, GENE, GENE_PHENO_INPUT, LOG_CONSTRAINT, LOG_PATHOGENICITY,
    MARKER_ID, MISSENSE_INDICATOR, PLOF_INDICATOR, POS, PROB_0, SE,
};
use crate::transform::{FeatureConfig, TransformReport, transform_features};

/// Columns of an extracted gene-phenotype table, in output order.
pub const GENE_PHENO_COLUMNS: [&str; 11] = [
    GENE,
    POS,
    MARKER_ID,
    BETA,
    SE,
    PROB_0,
    AM_PATHOGENICITY,
    PLOF_INDICATOR,
    MISSENSE_INDICATOR,
    LOG_CONSTRAINT,
    LOG_PATHOGENICITY,
];

#[derive(Debug, Clone)]
pub struct GenePhenoConfig {
    pub gene: String,
    /// Only used to name the output file.
    pub phenotype: String,
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub features: FeatureConfig,
}

pub fn gene_pheno_file_name(gene: &str, phenotype: &str) -> String {
    format!("{gene}_{phenotype}.tsv")
}

/// Restricts the annotated table to one gene and runs the feature transform
/// on that subset alone, so imputation means are per gene. An unknown gene
/// yields an empty table.
pub fn extract_gene_pheno(
    df: &DataFrame,
    gene: &str,
    config: &FeatureConfig,
) -> Result<(DataFrame, TransformReport)> {
    GENE_PHENO_INPUT.check(df)?;
    let keep: Vec<bool> = str_values(df, GENE)?
        .iter()
        .map(|g| g.as_deref() == Some(gene))
        .collect();
    let (subset, _) = filter_rows(df, &keep)?;
    let subset = subset.select(GENE_PHENO_COLUMNS[..9].iter().copied())?;
    let (transformed, report) = transform_features(subset, config)?;
    let out = transformed.select(GENE_PHENO_COLUMNS)?;
    Ok((out, report))
}

/// Writes `<gene>_<phenotype>.tsv` into the output directory and returns its
/// path.
pub fn gene_pheno(config: &GenePhenoConfig) -> Result<(PathBuf, DataFrame)> {
    check_non_empty(&config.gene, "gene")?;
    check_non_empty(&config.phenotype, "phenotype")?;
    check_file_exists(&config.input, "input_file")?;
    check_dir_exists(&config.output_dir, "output_dir")?;

    let df = read_table(&config.input)
        .with_context(|| format!("load {}", config.input.display()))?;
    let df = GENE_PHENO_INPUT.conform(df)?;

    let (out, report) = extract_gene_pheno(&df, &config.gene, &config.features)?;
    if report.rows_in == 0 {
        info!(
            "No data found for gene: {} and phenotype: {}",
            config.gene, config.phenotype
        );
    }

    let path = output_path(&config.output_dir, &config.gene, &config.phenotype);
    write_dataframe(&out, &path)?;
    info!(
        "{} variants for gene {} exported to {}",
        out.height(),
        config.gene,
        path.display()
    );
    Ok((path, out))
}

fn output_path(dir: &Path, gene: &str, phenotype: &str) -> PathBuf {
    dir.join(gene_pheno_file_name(gene, phenotype))
}
