//! Validation helpers shared by the density variants, the pool, and
//! mixtures.
//!
//! Each helper inspects shapes or scalar values and returns a structured
//! [`DensityError`]; none of them allocate or panic.
use crate::densities::errors::{DensityError, DensityResult};
use ndarray::{ArrayView1, ArrayView2};

/// Require `actual == expected`.
pub fn validate_dim(expected: usize, actual: usize) -> DensityResult<()> {
    if expected != actual {
        return Err(DensityError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Require a feature vector of length `dim`.
pub fn validate_feature(dim: usize, f: ArrayView1<f64>) -> DensityResult<()> {
    validate_dim(dim, f.len())
}

/// Require a finite feature vector of length `dim`, as accumulated
/// statistics are.
pub fn validate_observation(dim: usize, f: ArrayView1<f64>) -> DensityResult<()> {
    validate_feature(dim, f)?;
    validate_finite(f, "Features must be finite.")
}

/// Require a `dim × dim` matrix.
pub fn validate_square(dim: usize, m: ArrayView2<f64>) -> DensityResult<()> {
    let (rows, cols) = m.dim();
    validate_dim(dim, rows)?;
    validate_dim(dim, cols)
}

/// Require a finite, non-negative weight (accumulation prior or mixture
/// weight). `index` locates the offending entry for the error message.
pub fn validate_weight(index: usize, value: f64) -> DensityResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DensityError::InvalidWeight { index, value });
    }
    Ok(())
}

/// Require finite, strictly positive variances.
pub fn validate_variances(var: ArrayView1<f64>) -> DensityResult<()> {
    if var.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(DensityError::Numerical {
            reason: "Variances must be finite and strictly positive.",
        });
    }
    Ok(())
}

/// Require every entry to be finite.
pub fn validate_finite(values: ArrayView1<f64>, reason: &'static str) -> DensityResult<()> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DensityError::Numerical { reason });
    }
    Ok(())
}

/// Validate the parallel arguments of `accumulate_mmi_denominator`.
///
/// Checks lengths first, then every prior and every feature dimension, so
/// that a rejected batch leaves the accumulator untouched.
pub fn validate_batch(dim: usize, priors: &[f64], features: &[ArrayView1<f64>]) -> DensityResult<()> {
    if priors.len() != features.len() {
        return Err(DensityError::LengthMismatch {
            what: "priors vs. features",
            left: priors.len(),
            right: features.len(),
        });
    }
    for (i, (&p, f)) in priors.iter().zip(features.iter()).enumerate() {
        validate_weight(i, p)?;
        validate_observation(dim, f.view())?;
    }
    Ok(())
}
