use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::{info, warn};

use crate::df_utils::{drop_cols_if_present, ensure_f64, ensure_i64, ensure_utf8, str_values};
use crate::error::MetaRegError;
use crate::io::{TableFormat, read_table_with, write_dataframe};
use crate::qc::check_file_exists;
use crate::schema::{
    ALLELES, ALT, AM_PATHOGENICITY, ANNOTATION, ASSOCIATION, CHR, CONSTRAINT, LOCUS,
    MISSENSE_INDICATOR, PATHOGENICITY, PLOF_INDICATOR, POS, PROB_0, REF,
};

const PLOF_CLASSES: [&str; 2] = ["pLoF", "LC"];
const MISSENSE_CLASSES: [&str; 1] = ["missense"];
const PATHOGENICITY_BANNER_LINES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locus {
    pub chr: String,
    pub pos: i64,
}

impl Locus {
    /// Parses `CHR:POS`, splitting on the first colon.
    pub fn parse(value: &str) -> Option<Self> {
        let (chr, pos) = value.trim().split_once(':')?;
        if chr.is_empty() {
            return None;
        }
        let pos = pos.parse::<i64>().ok()?;
        Some(Self {
            chr: chr.to_string(),
            pos,
        })
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chr, self.pos)
    }
}

/// Parses a JSON-encoded allele list such as `["A","G"]` into (ref, alt).
pub fn parse_alleles(value: &str) -> Option<(String, String)> {
    let alleles: Vec<String> = serde_json::from_str(value.trim()).ok()?;
    match <[String; 2]>::try_from(alleles) {
        Ok([reference, alternate]) => Some((reference, alternate)),
        Err(_) => None,
    }
}

/// (pLoF, missense) indicators of a functional annotation class.
pub fn class_indicators(annotation: Option<&str>) -> (i64, i64) {
    match annotation {
        Some(a) => (
            i64::from(PLOF_CLASSES.contains(&a)),
            i64::from(MISSENSE_CLASSES.contains(&a)),
        ),
        None => (0, 0),
    }
}

const ROW_INDEX: &str = "__row";
const CONSTRAINT_HIT: &str = "__constraint_hit";
const PATHOGENICITY_HIT: &str = "__pathogenicity_hit";
const SITE_KEY: [&str; 2] = [CHR, POS];
const ALLELE_KEY: [&str; 4] = [CHR, POS, REF, ALT];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub rows: usize,
    pub constraint_matched: usize,
    pub pathogenicity_matched: usize,
    pub duplicate_constraint_keys: usize,
    pub duplicate_pathogenicity_keys: usize,
}

/// Reference scores restricted to the keys of one variant table, one row per
/// key.
#[derive(Debug, Clone)]
pub struct ScoreLookup {
    frame: DataFrame,
    /// Rows dropped because an earlier row carried the same key.
    pub duplicate_keys: usize,
}

impl ScoreLookup {
    pub fn height(&self) -> usize {
        self.frame.height()
    }
}

/// Splits `locus` and `alleles` into chr, pos, ref and alt columns. Score
/// columns already present are dropped so the joins can add them fresh.
pub fn key_variants(variants: DataFrame) -> Result<DataFrame> {
    ASSOCIATION.check(&variants)?;
    let loci = str_values(&variants, LOCUS)?;
    let alleles = str_values(&variants, ALLELES)?;
    let n = variants.height();
    let mut chr = Vec::with_capacity(n);
    let mut pos = Vec::with_capacity(n);
    let mut reference = Vec::with_capacity(n);
    let mut alternate = Vec::with_capacity(n);
    for (idx, (locus, allele)) in loci.iter().zip(&alleles).enumerate() {
        let row = idx + 1;
        let locus_str = locus.as_deref().unwrap_or("");
        let locus = Locus::parse(locus_str).ok_or_else(|| MetaRegError::MalformedLocus {
            row,
            value: locus_str.to_string(),
        })?;
        let allele_str = allele.as_deref().unwrap_or("");
        let (ref_allele, alt_allele) =
            parse_alleles(allele_str).ok_or_else(|| MetaRegError::MalformedAlleles {
                row,
                value: allele_str.to_string(),
            })?;
        chr.push(locus.chr);
        pos.push(locus.pos);
        reference.push(ref_allele);
        alternate.push(alt_allele);
    }

    let mut out = variants;
    drop_cols_if_present(&mut out, &[PROB_0, AM_PATHOGENICITY])?;
    out.with_column(Series::new(CHR.into(), chr))?;
    out.with_column(Series::new(POS.into(), pos))?;
    out.with_column(Series::new(REF.into(), reference))?;
    out.with_column(Series::new(ALT.into(), alternate))?;
    Ok(out)
}

/// Keeps the reference rows whose key occurs in `keyed`, then the first row
/// of each key in file order. Only the key and score columns survive, plus a
/// non-null `hit` marker that tells matched rows apart after the left join.
fn score_lookup(
    reference: &DataFrame,
    keyed: &DataFrame,
    key: &[&str],
    score: &str,
    hit: &str,
) -> Result<ScoreLookup> {
    let mut columns = key.to_vec();
    columns.push(score);
    let slim = reference.select(columns)?;
    let slim = ensure_utf8(slim, &[CHR, REF, ALT])?;
    let slim = ensure_i64(slim, &[POS])?;
    let slim = ensure_f64(slim, &[score])?;

    let wanted = keyed
        .select(key.iter().copied())?
        .unique_stable(None, UniqueKeepStrategy::Any, None)?;
    let matched = slim
        .with_row_index(ROW_INDEX.into(), None)?
        .join(
            &wanted,
            key.iter().copied(),
            key.iter().copied(),
            JoinType::Inner.into(),
            None,
        )?
        .sort([ROW_INDEX], Default::default())?;

    let before = matched.height();
    let subset: Vec<String> = key.iter().map(|k| k.to_string()).collect();
    let mut frame = matched
        .unique_stable(Some(subset.as_slice()), UniqueKeepStrategy::First, None)
        .context("deduplicating reference keys")?;
    let duplicate_keys = before - frame.height();
    frame.drop_in_place(ROW_INDEX)?;
    frame.with_column(Series::new(hit.into(), vec![true; frame.height()]))?;
    Ok(ScoreLookup {
        frame,
        duplicate_keys,
    })
}

/// Constraint probabilities for the (chr, pos) sites of `keyed`.
pub fn constraint_lookup(constraint: &DataFrame, keyed: &DataFrame) -> Result<ScoreLookup> {
    CONSTRAINT.check(constraint)?;
    score_lookup(constraint, keyed, &SITE_KEY, PROB_0, CONSTRAINT_HIT)
}

/// Pathogenicity scores for the (chr, pos, ref, alt) alleles of `keyed`.
pub fn pathogenicity_lookup(pathogenicity: &DataFrame, keyed: &DataFrame) -> Result<ScoreLookup> {
    PATHOGENICITY.check(pathogenicity)?;
    score_lookup(
        pathogenicity,
        keyed,
        &ALLELE_KEY,
        AM_PATHOGENICITY,
        PATHOGENICITY_HIT,
    )
}

fn matched_rows(df: &DataFrame, marker: &str) -> Result<usize> {
    let column = df.column(marker)?;
    Ok(column.len() - column.null_count())
}

/// Left-joins both lookups onto the keyed variants in their original row
/// order and derives the variant-class indicators.
pub fn join_scores(
    keyed: DataFrame,
    constraint: &ScoreLookup,
    pathogenicity: &ScoreLookup,
) -> Result<(DataFrame, JoinReport)> {
    let rows = keyed.height();
    let mut out = keyed
        .with_row_index(ROW_INDEX.into(), None)?
        .join(
            &constraint.frame,
            SITE_KEY,
            SITE_KEY,
            JoinType::Left.into(),
            None,
        )?
        .join(
            &pathogenicity.frame,
            ALLELE_KEY,
            ALLELE_KEY,
            JoinType::Left.into(),
            None,
        )?
        .sort([ROW_INDEX], Default::default())?;

    let report = JoinReport {
        rows,
        constraint_matched: matched_rows(&out, CONSTRAINT_HIT)?,
        pathogenicity_matched: matched_rows(&out, PATHOGENICITY_HIT)?,
        duplicate_constraint_keys: constraint.duplicate_keys,
        duplicate_pathogenicity_keys: pathogenicity.duplicate_keys,
    };
    drop_cols_if_present(&mut out, &[ROW_INDEX, CONSTRAINT_HIT, PATHOGENICITY_HIT])?;

    let annotations = str_values(&out, ANNOTATION)?;
    let (plof, missense): (Vec<i64>, Vec<i64>) = annotations
        .iter()
        .map(|a| class_indicators(a.as_deref()))
        .unzip();
    out.with_column(Series::new(PLOF_INDICATOR.into(), plof))?;
    out.with_column(Series::new(MISSENSE_INDICATOR.into(), missense))?;
    Ok((out, report))
}

/// Left-joins constraint and pathogenicity scores onto the association table
/// and derives the variant-class indicators. Every input row is kept exactly
/// once; unmatched scores are null. A malformed locus or allele field aborts.
pub fn annotate_variants(
    variants: DataFrame,
    constraint: &DataFrame,
    pathogenicity: &DataFrame,
) -> Result<(DataFrame, JoinReport)> {
    CONSTRAINT.check(constraint)?;
    PATHOGENICITY.check(pathogenicity)?;
    let keyed = key_variants(variants)?;
    let constraint = constraint_lookup(constraint, &keyed)?;
    let pathogenicity = pathogenicity_lookup(pathogenicity, &keyed)?;
    join_scores(keyed, &constraint, &pathogenicity)
}

#[derive(Debug, Clone)]
pub struct PrepConfig {
    pub dataset: PathBuf,
    pub constraint: PathBuf,
    pub pathogenicity: PathBuf,
    pub output: PathBuf,
}

pub fn read_constraint_table(path: &Path) -> Result<DataFrame> {
    let df = read_table_with(path, TableFormat::commented())?;
    Ok(CONSTRAINT.conform(df)?)
}

pub fn read_pathogenicity_table(path: &Path) -> Result<DataFrame> {
    let df = read_table_with(path, TableFormat::banner(PATHOGENICITY_BANNER_LINES))?;
    Ok(PATHOGENICITY.conform(df)?)
}

pub fn read_association_table(path: &Path) -> Result<DataFrame> {
    let df = read_table_with(path, TableFormat::commented())?;
    Ok(ASSOCIATION.conform(df)?)
}

/// Joins one phenotype's association results with both score tables and
/// writes the annotated table. Nothing is written when joining fails.
pub fn prep(config: &PrepConfig) -> Result<JoinReport> {
    check_file_exists(&config.dataset, "dataset")?;
    check_file_exists(&config.constraint, "constraint table")?;
    check_file_exists(&config.pathogenicity, "pathogenicity table")?;

    let variants = read_association_table(&config.dataset)
        .with_context(|| format!("load {}", config.dataset.display()))?;
    info!(
        "Association results: {} rows from {}",
        variants.height(),
        config.dataset.display()
    );
    let keyed = key_variants(variants)
        .with_context(|| format!("annotate {}", config.dataset.display()))?;

    // full reference tables are dropped as soon as their lookup is built
    let constraint = {
        let table = read_constraint_table(&config.constraint)
            .with_context(|| format!("load {}", config.constraint.display()))?;
        let lookup = constraint_lookup(&table, &keyed)?;
        info!(
            "Constraint probabilities: kept {} of {} rows from {}",
            lookup.height(),
            table.height(),
            config.constraint.display()
        );
        lookup
    };
    let pathogenicity = {
        let table = read_pathogenicity_table(&config.pathogenicity)
            .with_context(|| format!("load {}", config.pathogenicity.display()))?;
        let lookup = pathogenicity_lookup(&table, &keyed)?;
        info!(
            "Pathogenicity scores: kept {} of {} rows from {}",
            lookup.height(),
            table.height(),
            config.pathogenicity.display()
        );
        lookup
    };

    let (annotated, report) = join_scores(keyed, &constraint, &pathogenicity)?;

    if report.duplicate_constraint_keys > 0 {
        warn!(
            "{} duplicate chr/pos keys in the constraint table; kept the first of each",
            report.duplicate_constraint_keys
        );
    }
    if report.duplicate_pathogenicity_keys > 0 {
        warn!(
            "{} duplicate chr/pos/ref/alt keys in the pathogenicity table; kept the first of each",
            report.duplicate_pathogenicity_keys
        );
    }
    info!(
        "{} of {} variants matched a constraint probability, {} matched a pathogenicity score",
        report.constraint_matched, report.rows, report.pathogenicity_matched
    );

    write_dataframe(&annotated, &config.output)?;
    info!("Annotated table written to {}", config.output.display());
    Ok(report)
}
