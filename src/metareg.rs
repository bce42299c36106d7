//! Per-gene meta-regression of variant effect sizes on annotation scores.
//!
//! Each gene's variants are regressed as
//! `BETA ~ 1 + log_constraint + log_pathogenicity + pLoF_indicator + missense_indicator`
//! with weights `1 / SE²`. Genes are processed in lexicographic order of their
//! identifier. A gene with any missing regression value is skipped; a gene
//! whose fit fails is logged and left out. Neither stops the batch.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;

use crate::df_utils::{f64_values, filter_rows, str_values};
use crate::io::{read_table, write_dataframe_gz};
use crate::logging::{GeneOutcome, RunLog, phenotype_code};
use crate::parallel::map_ordered;
use crate::qc::{check_file_exists, check_range_f64};
use crate::schema::{AF, BETA, GENE, REGRESSION_INPUT, SE};
use crate::transform::{FeatureConfig, TransformReport, transform_features};
use crate::types::{Covariate, N_PARAMS, Observation, RegressionResult, TERM_NAMES};
use crate::wls::{FitError, WlsFit, fit_wls};

pub const DEFAULT_MAX_AF: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct RegressConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Variants with `AF` above this are excluded before transformation.
    pub max_af: f64,
    pub features: FeatureConfig,
    /// Defaults to the output file's directory.
    pub log_dir: Option<PathBuf>,
    /// Worker threads for the per-gene loop; `None` runs sequentially.
    pub cores: Option<usize>,
}

impl RegressConfig {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self {
            input,
            output,
            max_af: DEFAULT_MAX_AF,
            features: FeatureConfig::default(),
            log_dir: None,
            cores: None,
        }
    }

    fn resolved_log_dir(&self) -> PathBuf {
        if let Some(dir) = &self.log_dir {
            return dir.clone();
        }
        match self.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneGroup {
    pub gene: String,
    pub observations: Vec<Observation>,
    /// Rows with a missing value in any regression column.
    pub incomplete_rows: usize,
}

impl GeneGroup {
    pub fn len(&self) -> usize {
        self.observations.len() + self.incomplete_rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub enum GeneFit {
    Fitted {
        result: RegressionResult,
        fit: Box<WlsFit>,
    },
    Skipped {
        incomplete_rows: usize,
    },
    Failed(FitError),
}

#[derive(Debug, Clone)]
pub struct GeneReport {
    pub gene: String,
    pub n_rows: usize,
    pub fit: GeneFit,
}

#[derive(Debug, Clone, Default)]
pub struct MetaRegressionRun {
    pub results: Vec<RegressionResult>,
    pub rows_read: usize,
    pub dropped_af: usize,
    pub transform: TransformReport,
    pub genes_fitted: usize,
    pub genes_skipped: usize,
    pub genes_failed: usize,
}

/// Groups transformed rows by gene, in sorted gene order. Rows without a gene
/// identifier are ignored.
pub fn group_by_gene(df: &DataFrame) -> Result<Vec<GeneGroup>> {
    let genes = str_values(df, GENE)?;
    let beta = f64_values(df, BETA)?;
    let se = f64_values(df, SE)?;
    let covariates = Covariate::ALL
        .iter()
        .map(|c| f64_values(df, c.column()))
        .collect::<Result<Vec<_>>>()?;

    let mut groups: BTreeMap<String, GeneGroup> = BTreeMap::new();
    for (row, gene) in genes.into_iter().enumerate() {
        let Some(gene) = gene else {
            continue;
        };
        let group = groups.entry(gene.clone()).or_insert_with(|| GeneGroup {
            gene,
            observations: Vec::new(),
            incomplete_rows: 0,
        });

        let mut values = [0.0; 4];
        let mut complete = true;
        for (slot, column) in values.iter_mut().zip(&covariates) {
            match column[row] {
                Some(v) => *slot = v,
                None => complete = false,
            }
        }
        match (beta[row], se[row]) {
            (Some(b), Some(s)) if complete => group.observations.push(Observation {
                beta: b,
                se: s,
                covariates: values,
            }),
            _ => group.incomplete_rows += 1,
        }
    }
    Ok(groups.into_values().collect())
}

/// Fits one gene's weighted model.
pub fn fit_gene(group: &GeneGroup) -> Result<(RegressionResult, WlsFit), FitError> {
    let n = group.observations.len();
    let mut x = Array2::<f64>::zeros((n, N_PARAMS));
    let mut y = Array1::<f64>::zeros(n);
    let mut w = Array1::<f64>::zeros(n);
    for (i, obs) in group.observations.iter().enumerate() {
        x[[i, 0]] = 1.0;
        for (j, value) in obs.covariates.iter().enumerate() {
            x[[i, j + 1]] = *value;
        }
        y[i] = obs.beta;
        w[i] = 1.0 / (obs.se * obs.se);
    }

    let fit = fit_wls(x.view(), y.view(), w.view())?;
    let result = RegressionResult {
        gene: group.gene.clone(),
        n_variants: n,
        p_model: fit.f_pvalue,
        constant: fit.estimate(0),
        covariates: [
            fit.estimate(1),
            fit.estimate(2),
            fit.estimate(3),
            fit.estimate(4),
        ],
    };
    Ok((result, fit))
}

pub fn evaluate_gene(group: &GeneGroup) -> GeneReport {
    let fit = if group.incomplete_rows > 0 {
        GeneFit::Skipped {
            incomplete_rows: group.incomplete_rows,
        }
    } else {
        match fit_gene(group) {
            Ok((result, fit)) => GeneFit::Fitted {
                result,
                fit: Box::new(fit),
            },
            Err(err) => GeneFit::Failed(err),
        }
    };
    GeneReport {
        gene: group.gene.clone(),
        n_rows: group.len(),
        fit,
    }
}

/// Keeps rows with a present `AF` no larger than `max_af`.
pub fn filter_by_af(df: &DataFrame, max_af: f64) -> Result<(DataFrame, usize)> {
    let keep: Vec<bool> = f64_values(df, AF)?
        .iter()
        .map(|af| af.is_some_and(|v| v <= max_af))
        .collect();
    filter_rows(df, &keep)
}

/// Runs every gene group and records each outcome in `log`, in gene order.
pub fn fit_groups(
    groups: &[GeneGroup],
    cores: Option<usize>,
    log: &mut RunLog,
) -> Result<(Vec<RegressionResult>, [usize; 3])> {
    let reports = map_ordered(groups, cores, evaluate_gene)?;
    let mut results = Vec::new();
    let mut counts = [0usize; 3];
    for report in reports {
        match report.fit {
            GeneFit::Fitted { result, fit } => {
                counts[0] += 1;
                log.gene(&report.gene, GeneOutcome::Fitted, &fit.summary(&TERM_NAMES))?;
                results.push(result);
            }
            GeneFit::Skipped { incomplete_rows } => {
                counts[1] += 1;
                log.gene(
                    &report.gene,
                    GeneOutcome::Skipped,
                    &format!(
                        "{incomplete_rows} of {} rows have missing regression values",
                        report.n_rows
                    ),
                )?;
            }
            GeneFit::Failed(err) => {
                counts[2] += 1;
                log.gene(
                    &report.gene,
                    GeneOutcome::Failed,
                    &format!("An error occurred with gene {}: {err}", report.gene),
                )?;
            }
        }
    }
    Ok((results, counts))
}

/// Filters, transforms and regresses an already-loaded annotated table.
pub fn meta_regress(
    df: DataFrame,
    config: &RegressConfig,
    log: &mut RunLog,
) -> Result<MetaRegressionRun> {
    check_range_f64(config.max_af, 0.0, 1.0, true, "max_af")?;
    REGRESSION_INPUT.check(&df)?;

    let mut run = MetaRegressionRun {
        rows_read: df.height(),
        ..Default::default()
    };

    let (df, dropped_af) = filter_by_af(&df, config.max_af)?;
    run.dropped_af = dropped_af;
    log.line(&format!(
        "{dropped_af} of {} rows removed with AF above {} or missing",
        run.rows_read, config.max_af
    ))?;

    let (df, transform) = transform_features(df, &config.features)?;
    log.line(&format!(
        "Imputed {} log_constraint, {} log_pathogenicity and {} indicator values; \
         removed {} rows with missing BETA/SE and {} rows with SE = 0",
        transform.imputed_constraint,
        transform.imputed_pathogenicity,
        transform.imputed_indicators,
        transform.dropped_missing_effect,
        transform.dropped_zero_se
    ))?;
    run.transform = transform;

    let groups = group_by_gene(&df)?;
    log.line(&format!(
        "Fitting {} genes over {} variants",
        groups.len(),
        df.height()
    ))?;

    let (results, [fitted, skipped, failed]) = fit_groups(&groups, config.cores, log)?;
    run.results = results;
    run.genes_fitted = fitted;
    run.genes_skipped = skipped;
    run.genes_failed = failed;
    log.line(&format!(
        "{fitted} genes fitted, {skipped} skipped for missing values, {failed} failed"
    ))?;
    Ok(run)
}

pub fn results_to_dataframe(results: &[RegressionResult]) -> Result<DataFrame> {
    let genes: Vec<&str> = results.iter().map(|r| r.gene.as_str()).collect();
    let p_model: Vec<f64> = results.iter().map(|r| r.p_model).collect();
    let coef = |c: Covariate| -> Vec<f64> { results.iter().map(|r| r.estimate(c).coef).collect() };
    let pval =
        |c: Covariate| -> Vec<f64> { results.iter().map(|r| r.estimate(c).p_value).collect() };
    let coef_constant: Vec<f64> = results.iter().map(|r| r.constant.coef).collect();
    let p_constant: Vec<f64> = results.iter().map(|r| r.constant.p_value).collect();

    let df = df!(
        "gene" => genes,
        "p_model" => p_model,
        "coef_log_constraint" => coef(Covariate::LogConstraint),
        "p_log_constraint" => pval(Covariate::LogConstraint),
        "coef_log_pathogenicity" => coef(Covariate::LogPathogenicity),
        "p_log_pathogenicity" => pval(Covariate::LogPathogenicity),
        "coef_pLoF_indicator" => coef(Covariate::PlofIndicator),
        "p_pLoF_indicator" => pval(Covariate::PlofIndicator),
        "coef_missense_indicator" => coef(Covariate::MissenseIndicator),
        "p_missense_indicator" => pval(Covariate::MissenseIndicator),
        "coef_constant" => coef_constant,
        "p_constant" => p_constant,
    )?;
    Ok(df)
}

/// Reads an annotated table, runs the per-gene meta-regression and writes
/// the gzip-compressed results table.
pub fn regress(config: &RegressConfig) -> Result<MetaRegressionRun> {
    check_file_exists(&config.input, "results_path")?;
    config.features.validate()?;

    let pheno = phenotype_code(&config.input);
    let mut log = RunLog::create(&config.resolved_log_dir(), &pheno)?;
    log.line(&format!(
        "Meta-regression for phenotype {pheno} from {}",
        config.input.display()
    ))?;

    let df = read_table(&config.input)
        .with_context(|| format!("load {}", config.input.display()))?;
    let df = REGRESSION_INPUT.conform(df)?;

    let run = meta_regress(df, config, &mut log)?;
    let out = results_to_dataframe(&run.results)?;
    write_dataframe_gz(&out, &config.output)?;
    log.line(&format!(
        "Wrote {} gene results to {}",
        out.height(),
        config.output.display()
    ))?;
    Ok(run)
}
