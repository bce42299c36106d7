//! Column contracts for every table the pipelines consume. Each table is
//! checked once, right after loading, so a missing column fails with its name
//! instead of surfacing later as a failed lookup.

use polars::prelude::DataFrame;

use crate::error::{MetaRegError, Result};

pub const GENE: &str = "gene";
pub const LOCUS: &str = "locus";
pub const ALLELES: &str = "alleles";
pub const ANNOTATION: &str = "annotation";
pub const MARKER_ID: &str = "markerID";
pub const BETA: &str = "BETA";
pub const SE: &str = "SE";
pub const AF: &str = "AF";
pub const CHR: &str = "chr";
pub const POS: &str = "pos";
pub const REF: &str = "ref";
pub const ALT: &str = "alt";
pub const PROB_0: &str = "prob_0";
pub const AM_PATHOGENICITY: &str = "am_pathogenicity";
pub const PLOF_INDICATOR: &str = "pLoF_indicator";
pub const MISSENSE_INDICATOR: &str = "missense_indicator";
pub const LOG_CONSTRAINT: &str = "log_constraint";
pub const LOG_PATHOGENICITY: &str = "log_pathogenicity";

#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub name: &'static str,
    pub required: &'static [&'static str],
    /// Source header -> canonical name, applied before the required check.
    pub renames: &'static [(&'static str, &'static str)],
}

/// Raw per-variant association results.
pub const ASSOCIATION: TableSchema = TableSchema {
    name: "association",
    required: &[LOCUS, ALLELES, ANNOTATION],
    renames: &[],
};

pub const CONSTRAINT: TableSchema = TableSchema {
    name: "constraint",
    required: &[CHR, POS, PROB_0],
    renames: &[],
};

pub const PATHOGENICITY: TableSchema = TableSchema {
    name: "pathogenicity",
    required: &[CHR, POS, REF, ALT, AM_PATHOGENICITY],
    renames: &[("#CHROM", CHR), ("POS", POS), ("REF", REF), ("ALT", ALT)],
};

/// Columns the Feature Transformer reads.
pub const FEATURES: TableSchema = TableSchema {
    name: "annotated",
    required: &[
        PROB_0,
        AM_PATHOGENICITY,
        PLOF_INDICATOR,
        MISSENSE_INDICATOR,
        BETA,
        SE,
    ],
    renames: &[],
};

/// Annotated table consumed by the regression pipeline.
pub const REGRESSION_INPUT: TableSchema = TableSchema {
    name: "annotated",
    required: &[
        GENE,
        AF,
        PROB_0,
        AM_PATHOGENICITY,
        PLOF_INDICATOR,
        MISSENSE_INDICATOR,
        BETA,
        SE,
    ],
    renames: &[],
};

/// Annotated table consumed by the gene-phenotype extractor.
pub const GENE_PHENO_INPUT: TableSchema = TableSchema {
    name: "annotated",
    required: &[
        GENE,
        POS,
        MARKER_ID,
        BETA,
        SE,
        PROB_0,
        AM_PATHOGENICITY,
        PLOF_INDICATOR,
        MISSENSE_INDICATOR,
    ],
    renames: &[],
};

pub const PHENO_RESULTS: TableSchema = TableSchema {
    name: "phenotype results",
    required: &["trait_type", "phenocode"],
    renames: &[],
};

impl TableSchema {
    /// Renames source headers and checks that every required column exists.
    pub fn conform(&self, mut df: DataFrame) -> Result<DataFrame> {
        for (from, to) in self.renames {
            let present = df.get_column_names().iter().any(|c| c.as_str() == *from);
            if present && from != to {
                df.rename(from, (*to).into())
                    .map_err(|e| MetaRegError::InvalidArgument(e.to_string()))?;
            }
        }
        self.check(&df)?;
        Ok(df)
    }

    pub fn check(&self, df: &DataFrame) -> Result<()> {
        let names = df.get_column_names();
        for col in self.required {
            if !names.iter().any(|c| c.as_str() == *col) {
                return Err(MetaRegError::MissingColumn {
                    table: self.name.to_string(),
                    column: col.to_string(),
                });
            }
        }
        Ok(())
    }
}
