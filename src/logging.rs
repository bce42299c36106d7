use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const PHENO_SUFFIXES: [&str; 5] = [".genebass.tsv.gz", ".tsv.gz", ".tsv.bgz", ".tsv", ".gz"];

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Phenotype code of an input table, taken from its file name.
pub fn phenotype_code(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("metareg");
    for suffix in PHENO_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix)
            && !stripped.is_empty()
        {
            return stripped.to_string();
        }
    }
    name.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneOutcome {
    Fitted,
    Skipped,
    Failed,
}

impl fmt::Display for GeneOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GeneOutcome::Fitted => "fitted",
            GeneOutcome::Skipped => "skipped",
            GeneOutcome::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Per-run diagnostic sink. Opened once per invocation; every line also goes
/// through `tracing`.
pub struct RunLog {
    file: File,
    path: PathBuf,
}

impl RunLog {
    pub fn create(dir: &Path, pheno_code: &str) -> Result<Self> {
        let path = dir.join(format!("{pheno_code}.log"));
        let file =
            File::create(&path).with_context(|| format!("create log {}", path.display()))?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&mut self, message: &str) -> Result<()> {
        info!("{message}");
        writeln!(self.file, "{}{message}", record_prefix("INFO"))?;
        Ok(())
    }

    pub fn gene(&mut self, gene: &str, outcome: GeneOutcome, message: &str) -> Result<()> {
        match outcome {
            GeneOutcome::Fitted => debug!(gene, %outcome, "{message}"),
            GeneOutcome::Skipped => debug!(gene, %outcome, "{message}"),
            GeneOutcome::Failed => warn!(gene, %outcome, "{message}"),
        }
        let level = match outcome {
            GeneOutcome::Failed => "ERROR",
            _ => "INFO",
        };
        writeln!(
            self.file,
            "{}gene={gene}\toutcome={outcome}",
            record_prefix(level)
        )?;
        for line in message.lines() {
            writeln!(self.file, "  {line}")?;
        }
        Ok(())
    }
}

/// `2024-05-01 09:30:12,345 - INFO - ` style record prefix.
fn record_prefix(level: &str) -> String {
    format!(
        "{} - {level} - ",
        Local::now().format("%Y-%m-%d %H:%M:%S,%3f")
    )
}
