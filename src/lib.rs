//! Per-gene weighted meta-regression of rare-variant association results on
//! constraint and pathogenicity annotations.
//!
//! The pipeline runs in three stages: [`annotate`] joins association results
//! with score tables, [`transform`] prepares regression covariates, and
//! [`metareg`] fits one weighted model per gene. [`gene_pheno`] exports the
//! transformed variants of a single gene.

pub mod error;
pub mod logging;
pub mod types;

pub mod df_utils;
pub mod io;
pub mod parallel;
pub mod qc;
pub mod schema;

pub mod annotate;
pub mod gene_pheno;
pub mod metareg;
pub mod phenos;
pub mod transform;
pub mod wls;
