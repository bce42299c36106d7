//! Weighted least squares with classical inference.
//!
//! The normal equations `XᵀWX β = XᵀWy` are solved through the symmetric
//! eigendecomposition of `XᵀWX`, which also gives the rank: eigenvalues at or
//! below `λ_max · 1e-12` count as zero. The first design column
//! is taken to be the intercept when computing the overall F-test.

use std::fmt::Write as _;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use ndarray_linalg::{Eigh, UPLO};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use thiserror::Error;

use crate::types::Estimate;

/// Relative eigenvalue cutoff for the rank of `XᵀWX`.
pub const RANK_RTOL: f64 = 1e-12;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("{n} observations cannot support {p} parameters and a residual degree of freedom")]
    InsufficientObservations { n: usize, p: usize },

    #[error("design matrix is singular (rank {rank} < {p})")]
    Singular { rank: usize, p: usize },

    #[error("non-finite values in {0}")]
    NonFinite(&'static str),

    #[error("dimension mismatch: {0}")]
    Shape(String),

    #[error("residual variance is zero; standard errors are undefined")]
    ZeroResidualVariance,

    #[error("eigendecomposition failed: {0}")]
    Linalg(String),

    #[error("reference distribution: {0}")]
    Distribution(String),
}

#[derive(Debug, Clone)]
pub struct WlsFit {
    pub n_obs: usize,
    pub df_model: f64,
    pub df_resid: f64,
    pub params: Array1<f64>,
    pub std_errors: Array1<f64>,
    pub t_values: Array1<f64>,
    pub p_values: Array1<f64>,
    pub r_squared: f64,
    pub f_value: f64,
    pub f_pvalue: f64,
    pub scale: f64,
}

impl WlsFit {
    pub fn estimate(&self, idx: usize) -> Estimate {
        Estimate {
            coef: self.params[idx],
            std_err: self.std_errors[idx],
            t_value: self.t_values[idx],
            p_value: self.p_values[idx],
        }
    }

    /// Plain-text fit report for run logs.
    pub fn summary(&self, names: &[&str]) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "WLS  n = {}  df_model = {}  df_resid = {}",
            self.n_obs, self.df_model, self.df_resid
        );
        let _ = writeln!(
            out,
            "R-squared = {:.6}  F = {:.6}  Prob(F) = {:.6e}  scale = {:.6e}",
            self.r_squared, self.f_value, self.f_pvalue, self.scale
        );
        let _ = writeln!(
            out,
            "{:<20} {:>14} {:>14} {:>10} {:>12}",
            "term", "coef", "std err", "t", "P>|t|"
        );
        for (idx, name) in names.iter().enumerate().take(self.params.len()) {
            let _ = writeln!(
                out,
                "{:<20} {:>14.6e} {:>14.6e} {:>10.4} {:>12.4e}",
                name,
                self.params[idx],
                self.std_errors[idx],
                self.t_values[idx],
                self.p_values[idx]
            );
        }
        out
    }
}

fn all_finite<'a>(values: impl IntoIterator<Item = &'a f64>) -> bool {
    values.into_iter().all(|v| v.is_finite())
}

fn inverse_from_eigh(eigvals: &Array1<f64>, eigvecs: &Array2<f64>) -> Array2<f64> {
    let inv_diag = Array2::from_diag(&eigvals.mapv(|v| 1.0 / v));
    eigvecs.dot(&inv_diag).dot(&eigvecs.t())
}

/// Fits `y ~ X` with observation weights `w`, minimising `Σ wᵢ (yᵢ − Xᵢβ)²`.
pub fn fit_wls(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    w: ArrayView1<'_, f64>,
) -> Result<WlsFit, FitError> {
    let (n, p) = x.dim();
    if y.len() != n || w.len() != n {
        return Err(FitError::Shape(format!(
            "design has {n} rows, response {}, weights {}",
            y.len(),
            w.len()
        )));
    }
    if p == 0 {
        return Err(FitError::Shape("design has no columns".to_string()));
    }
    if n < p + 1 {
        return Err(FitError::InsufficientObservations { n, p });
    }
    if !all_finite(x.iter()) {
        return Err(FitError::NonFinite("design matrix"));
    }
    if !all_finite(y.iter()) {
        return Err(FitError::NonFinite("response"));
    }
    if !all_finite(w.iter()) || w.iter().any(|v| *v <= 0.0) {
        return Err(FitError::NonFinite("weights"));
    }

    let xw = &x * &w.insert_axis(ndarray::Axis(1));
    let xtwx = xw.t().dot(&x);
    let xtwy = xw.t().dot(&y);

    let (eigvals, eigvecs) = xtwx
        .eigh(UPLO::Lower)
        .map_err(|e| FitError::Linalg(e.to_string()))?;
    let eig_max = eigvals.fold(0.0_f64, |acc, v| acc.max(*v));
    let tol = eig_max * RANK_RTOL;
    let rank = eigvals.iter().filter(|v| **v > tol).count();
    if rank < p {
        return Err(FitError::Singular { rank, p });
    }

    let xtwx_inv = inverse_from_eigh(&eigvals, &eigvecs);
    let params = xtwx_inv.dot(&xtwy);

    let fitted = x.dot(&params);
    let resid = &y - &fitted;
    let ssr: f64 = resid
        .iter()
        .zip(w.iter())
        .map(|(r, wi)| wi * r * r)
        .sum();
    let df_resid = (n - p) as f64;
    let df_model = (p - 1) as f64;
    let scale = ssr / df_resid;
    if !scale.is_finite() {
        return Err(FitError::NonFinite("residual variance"));
    }
    if scale <= 0.0 {
        return Err(FitError::ZeroResidualVariance);
    }

    let std_errors = xtwx_inv.diag().mapv(|v| (v * scale).sqrt());
    let t_values = &params / &std_errors;

    let t_dist =
        StudentsT::new(0.0, 1.0, df_resid).map_err(|e| FitError::Distribution(e.to_string()))?;
    let p_values = t_values.mapv(|t| 2.0 * t_dist.sf(t.abs()));

    let w_sum = w.sum();
    let y_bar = w.dot(&y) / w_sum;
    let centered_tss: f64 = y
        .iter()
        .zip(w.iter())
        .map(|(yi, wi)| wi * (yi - y_bar) * (yi - y_bar))
        .sum();
    let r_squared = 1.0 - ssr / centered_tss;

    let (f_value, f_pvalue) = if p > 1 {
        let f_value = ((centered_tss - ssr) / df_model) / scale;
        let f_dist = FisherSnedecor::new(df_model, df_resid)
            .map_err(|e| FitError::Distribution(e.to_string()))?;
        (f_value, f_dist.sf(f_value.max(0.0)))
    } else {
        (f64::NAN, f64::NAN)
    };

    Ok(WlsFit {
        n_obs: n,
        df_model,
        df_resid,
        params,
        std_errors,
        t_values,
        p_values,
        r_squared,
        f_value,
        f_pvalue,
        scale,
    })
}
