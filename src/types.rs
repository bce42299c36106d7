use crate::schema::{LOG_CONSTRAINT, LOG_PATHOGENICITY, MISSENSE_INDICATOR, PLOF_INDICATOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Covariate {
    LogConstraint,
    LogPathogenicity,
    PlofIndicator,
    MissenseIndicator,
}

impl Covariate {
    /// Design-matrix order after the intercept column.
    pub const ALL: [Covariate; 4] = [
        Covariate::LogConstraint,
        Covariate::LogPathogenicity,
        Covariate::PlofIndicator,
        Covariate::MissenseIndicator,
    ];

    pub fn index(self) -> usize {
        match self {
            Covariate::LogConstraint => 0,
            Covariate::LogPathogenicity => 1,
            Covariate::PlofIndicator => 2,
            Covariate::MissenseIndicator => 3,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Covariate::LogConstraint => LOG_CONSTRAINT,
            Covariate::LogPathogenicity => LOG_PATHOGENICITY,
            Covariate::PlofIndicator => PLOF_INDICATOR,
            Covariate::MissenseIndicator => MISSENSE_INDICATOR,
        }
    }
}

/// Intercept plus the four covariates.
pub const N_PARAMS: usize = Covariate::ALL.len() + 1;

pub const TERM_NAMES: [&str; N_PARAMS] = [
    "const",
    LOG_CONSTRAINT,
    LOG_PATHOGENICITY,
    PLOF_INDICATOR,
    MISSENSE_INDICATOR,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub coef: f64,
    pub std_err: f64,
    pub t_value: f64,
    pub p_value: f64,
}

/// One regression-ready variant of a gene group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub beta: f64,
    pub se: f64,
    pub covariates: [f64; 4],
}

/// Fitted per-gene model, one output row.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionResult {
    pub gene: String,
    pub n_variants: usize,
    pub p_model: f64,
    pub constant: Estimate,
    /// Indexed like [`Covariate::ALL`].
    pub covariates: [Estimate; 4],
}

impl RegressionResult {
    pub fn estimate(&self, covariate: Covariate) -> &Estimate {
        &self.covariates[covariate.index()]
    }
}
