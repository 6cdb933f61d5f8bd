//! ebw — moment estimates from accumulated statistics (ML and Extended
//! Baum–Welch).
//!
//! Purpose
//! -------
//! Turn the two accumulator tracks into a new mean and covariance. In ML
//! mode only the numerator track is read. In MMI mode the numerator and
//! denominator are combined with the Extended Baum–Welch (EBW) update
//!
//! ```text
//! μ̂  = (x_num − x_den + D μ) / (γ_num − γ_den + D)
//! Σ̂  = (S_num − S_den + D (Σ + μ μᵀ)) / (γ_num − γ_den + D) − μ̂ μ̂ᵀ
//! ```
//!
//! where `(μ, Σ)` are the current parameters and `D` the smoothing constant.
//!
//! Key behaviors
//! -------------
//! - `D = max(E · γ_den, 2 · D_min)`, where `D_min` is the smallest constant
//!   (found by doubling from `max(γ_den, MIN_SMOOTHING)`) for which the
//!   normalizer is positive and the updated covariance is positive definite
//!   (all variances positive for the diagonal layout). `D_min = 0` when the
//!   unsmoothed update is already valid.
//! - Results are returned *before* the variance floor; callers floor and
//!   commit them.
//!
//! Invariants & assumptions
//! ------------------------
//! - Current parameters `(μ, Σ)` are valid (Σ positive definite), so the
//!   update tends to them as `D → ∞` and the doubling search terminates for
//!   any finite statistics.
//! - An update that would need more than [`MAX_DOUBLINGS`] doublings is
//!   reported as [`DensityError::Numerical`].
use crate::densities::{
    core::{
        accumulators::{DiagonalStats, FullStats, Statistics},
        linalg::{is_positive_definite, outer, symmetrize},
        options::EbwOptions,
    },
    errors::{DensityError, DensityResult},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Starting point of the `D_min` search when the denominator is empty.
pub const MIN_SMOOTHING: f64 = 1e-6;

/// Upper bound on the number of doublings in the smoothing search.
pub const MAX_DOUBLINGS: usize = 200;

/// ML mean and (unfloored) variances from diagonal statistics.
///
/// # Errors
/// [`DensityError::NoStatistics`] when the track is empty.
pub fn ml_diagonal(stats: &DiagonalStats) -> DensityResult<(Array1<f64>, Array1<f64>)> {
    if stats.is_empty() {
        return Err(DensityError::NoStatistics);
    }
    let mean = &stats.sum / stats.gamma;
    let var = &stats.sum_sq / stats.gamma - &mean * &mean;
    Ok((mean, var))
}

/// ML mean and (unfloored, symmetrized) covariance from full statistics.
///
/// # Errors
/// [`DensityError::NoStatistics`] when the track is empty.
pub fn ml_full(stats: &FullStats) -> DensityResult<(Array1<f64>, Array2<f64>)> {
    if stats.is_empty() {
        return Err(DensityError::NoStatistics);
    }
    let mean = &stats.sum / stats.gamma;
    let mut cov = &stats.outer / stats.gamma - outer(mean.view(), mean.view());
    symmetrize(&mut cov);
    Ok((mean, cov))
}

/// EBW mean and (unfloored) variances for the diagonal layout.
///
/// # Errors
/// - [`DensityError::NoStatistics`] when both tracks are empty.
/// - [`DensityError::Numerical`] when no smoothing constant yields positive
///   variances.
pub fn ebw_diagonal(
    num: &DiagonalStats, den: &DiagonalStats, mean: ArrayView1<f64>, var: ArrayView1<f64>,
    opts: &EbwOptions,
) -> DensityResult<(Array1<f64>, Array1<f64>)> {
    if num.is_empty() && den.is_empty() {
        return Err(DensityError::NoStatistics);
    }
    let old_second = &var + &(&mean * &mean);
    let update = |d: f64| -> Option<(Array1<f64>, Array1<f64>)> {
        let norm = num.gamma - den.gamma + d;
        if !(norm > 0.0) {
            return None;
        }
        let new_mean = (&num.sum - &den.sum + &(&mean * d)) / norm;
        let new_var = (&num.sum_sq - &den.sum_sq + &(&old_second * d)) / norm
            - &new_mean * &new_mean;
        if new_var.iter().all(|v| v.is_finite() && *v > 0.0) {
            Some((new_mean, new_var))
        } else {
            None
        }
    };
    smoothed_update(den.gamma, opts, update)
}

/// EBW mean and (unfloored, symmetrized) covariance for the full layout.
///
/// # Errors
/// - [`DensityError::NoStatistics`] when both tracks are empty.
/// - [`DensityError::Numerical`] when no smoothing constant yields a
///   positive-definite covariance.
pub fn ebw_full(
    num: &FullStats, den: &FullStats, mean: ArrayView1<f64>, cov: ArrayView2<f64>,
    opts: &EbwOptions,
) -> DensityResult<(Array1<f64>, Array2<f64>)> {
    if num.is_empty() && den.is_empty() {
        return Err(DensityError::NoStatistics);
    }
    let old_second = &cov + &outer(mean, mean);
    let update = |d: f64| -> Option<(Array1<f64>, Array2<f64>)> {
        let norm = num.gamma - den.gamma + d;
        if !(norm > 0.0) {
            return None;
        }
        let new_mean = (&num.sum - &den.sum + &(&mean * d)) / norm;
        let mut new_cov = (&num.outer - &den.outer + &(&old_second * d)) / norm
            - outer(new_mean.view(), new_mean.view());
        symmetrize(&mut new_cov);
        if is_positive_definite(new_cov.view()) {
            Some((new_mean, new_cov))
        } else {
            None
        }
    };
    smoothed_update(den.gamma, opts, update)
}

/// Find `D_min`, pick `D = max(E·γ_den, 2·D_min)` and return the update at
/// `D`. If the update at `D` is invalid the constant keeps doubling.
fn smoothed_update<T>(
    gamma_den: f64, opts: &EbwOptions, update: impl Fn(f64) -> Option<T>,
) -> DensityResult<T> {
    let d_min = if update(0.0).is_some() {
        0.0
    } else {
        let mut trial = gamma_den.max(MIN_SMOOTHING);
        let mut found = None;
        for _ in 0..MAX_DOUBLINGS {
            if update(trial).is_some() {
                found = Some(trial);
                break;
            }
            trial *= 2.0;
        }
        found.ok_or(DensityError::Numerical {
            reason: "No smoothing constant keeps the MMI update positive definite.",
        })?
    };

    let mut d = (opts.e * gamma_den).max(2.0 * d_min);
    for _ in 0..MAX_DOUBLINGS {
        if let Some(result) = update(d) {
            return Ok(result);
        }
        d = if d > 0.0 { 2.0 * d } else { MIN_SMOOTHING };
    }
    Err(DensityError::Numerical {
        reason: "No smoothing constant keeps the MMI update positive definite.",
    })
}
