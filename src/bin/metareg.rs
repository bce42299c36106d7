use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};

use metareg::annotate::{PrepConfig, prep};
use metareg::gene_pheno::{GenePhenoConfig, gene_pheno};
use metareg::logging::init_tracing;
use metareg::metareg::{RegressConfig, regress};
use metareg::phenos::{ContinuousPhenosConfig, continuous_phenos};
use metareg::transform::FeatureConfig;

const LOG_DIR_ENV: &str = "METAREG_LOG_DIR";
const THREADS_ENV: &str = "METAREG_THREADS";

#[derive(Parser)]
#[command(name = "metareg", version)]
#[command(about = "Per-gene meta-regression of variant effects on annotation scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Join association results with constraint and pathogenicity scores.
    Prep {
        dataset_path: PathBuf,
        constraint_path: PathBuf,
        pathogenicity_path: PathBuf,
        output_path: PathBuf,
    },
    /// Fit the per-gene weighted meta-regression on an annotated table.
    Regress {
        results_path: PathBuf,
        output_path: PathBuf,
    },
    /// Export the transformed variants of one gene for one phenotype.
    GenePheno {
        gene: String,
        phenotype: String,
        input_file: PathBuf,
        output_dir: PathBuf,
    },
    /// List the continuous phenotype codes of a phenotype results table.
    ContinuousPhenos {
        pheno_results: PathBuf,
        output_path: PathBuf,
    },
}

fn threads_from_env() -> anyhow::Result<Option<usize>> {
    match std::env::var(THREADS_ENV) {
        Ok(value) => {
            let threads = value
                .trim()
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("{THREADS_ENV}={value:?}: {e}"))?;
            Ok(Some(threads).filter(|t| *t > 0))
        }
        Err(_) => Ok(None),
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Prep {
            dataset_path,
            constraint_path,
            pathogenicity_path,
            output_path,
        } => {
            let config = PrepConfig {
                dataset: dataset_path,
                constraint: constraint_path,
                pathogenicity: pathogenicity_path,
                output: output_path,
            };
            prep(&config)?;
        }
        Command::Regress {
            results_path,
            output_path,
        } => {
            let mut config = RegressConfig::new(results_path, output_path);
            config.log_dir = std::env::var_os(LOG_DIR_ENV).map(PathBuf::from);
            config.cores = threads_from_env()?;
            regress(&config)?;
        }
        Command::GenePheno {
            gene,
            phenotype,
            input_file,
            output_dir,
        } => {
            let config = GenePhenoConfig {
                gene,
                phenotype,
                input: input_file,
                output_dir,
                features: FeatureConfig::default(),
            };
            gene_pheno(&config)?;
        }
        Command::ContinuousPhenos {
            pheno_results,
            output_path,
        } => {
            let config = ContinuousPhenosConfig {
                pheno_results,
                output: output_path,
            };
            continuous_phenos(&config)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                err.exit();
            }
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}
