//! Density and Gaussian contracts plus the variant-independent algorithms.
//!
//! Purpose
//! -------
//! Define the capability set every density variant implements:
//! - [`Pdf`]: evaluation and payload serialization.
//! - [`Gaussian`]: parameters, accumulation, estimation, and the default
//!   split / merge / Kullback–Leibler algorithms built on the parameter
//!   accessors.
//!
//! Key behaviors
//! -------------
//! - `compute_likelihood` is derived from `compute_log_likelihood`, so the
//!   two always agree to floating precision.
//! - The default algorithms work purely through `get_mean`,
//!   `get_covariance`, `set_mean` and `set_covariance`. They are also
//!   exposed as free functions ([`moment_split`], [`moment_merge`],
//!   [`gaussian_kl`]) so overriding implementations can fall back to them.
//!
//! Invariants & assumptions
//! ------------------------
//! - Parameters are committed atomically: a failing setter or estimation
//!   leaves the density unchanged.
//! - `write` emits the payload only (dimension first); the pool file layer
//!   writes the type tag and any subspace reference in front of it.
use crate::densities::{
    core::{
        accumulators::Accumulator,
        linalg::{outer, quadratic_form, spd_factor_or, trace_product},
        mode::EstimationMode,
        options::EstimationOptions,
        tokens::TokenReader,
        validation::{validate_dim, validate_weight},
    },
    errors::{DensityError, DensityResult},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::io::{BufRead, Write};

/// Relative offset applied to each daughter mean by [`Gaussian::split`],
/// in units of the per-dimension standard deviation.
pub const SPLIT_PERTURBATION: f64 = 0.2;

/// A probability density over fixed-dimensional feature vectors.
pub trait Pdf {
    fn dim(&self) -> usize;

    /// `log p(f)`.
    ///
    /// # Errors
    /// [`DensityError::DimensionMismatch`] if `f.len() != self.dim()`.
    fn compute_log_likelihood(&self, f: ArrayView1<f64>) -> DensityResult<f64>;

    /// `p(f) = exp(log p(f))`.
    fn compute_likelihood(&self, f: ArrayView1<f64>) -> DensityResult<f64> {
        Ok(self.compute_log_likelihood(f)?.exp())
    }

    /// Write the variant payload (starting with the dimension).
    fn write<W: Write>(&self, w: &mut W) -> DensityResult<()>;

    /// Replace this density's parameters with a payload read from `tokens`.
    ///
    /// The payload is fully parsed and validated before anything is
    /// committed; any accumulator in flight is dropped on success.
    fn read<R: BufRead>(&mut self, tokens: &mut TokenReader<R>) -> DensityResult<()>;
}

/// Two daughters produced by [`Gaussian::split`], each carrying `weight`.
#[derive(Debug, Clone, PartialEq)]
pub struct Daughters<G> {
    pub weight: f64,
    pub first: G,
    pub second: G,
}

/// A Gaussian density with trainable parameters.
pub trait Gaussian: Pdf + Clone {
    /// Reinitialize to dimension `dim` with zero mean and identity
    /// covariance, dropping any accumulator.
    ///
    /// # Errors
    /// Subspace-constrained variants fail when `dim` differs from their
    /// subspace or the subspace cannot represent the identity.
    fn reset(&mut self, dim: usize) -> DensityResult<()>;

    fn get_mean(&self) -> Array1<f64>;
    fn get_covariance(&self) -> Array2<f64>;
    fn set_mean(&mut self, mean: ArrayView1<f64>) -> DensityResult<()>;
    fn set_covariance(&mut self, covariance: ArrayView2<f64>) -> DensityResult<()>;

    /// Allocate a zeroed accumulator, replacing any existing one.
    fn start_accumulating(&mut self);
    fn is_accumulating(&self) -> bool;

    /// Add `prior * f` and its second moment to the ML track.
    ///
    /// # Errors
    /// - [`DensityError::NotAccumulating`] without a prior `start_accumulating`.
    /// - [`DensityError::InvalidWeight`] / [`DensityError::DimensionMismatch`].
    fn accumulate_ml(&mut self, prior: f64, f: ArrayView1<f64>) -> DensityResult<()>;

    /// Add one weighted contribution per feature to the MMI denominator
    /// track.
    ///
    /// # Errors
    /// - [`DensityError::NotAccumulating`] without a prior `start_accumulating`.
    /// - [`DensityError::LengthMismatch`] when the slices differ in length.
    fn accumulate_mmi_denominator(
        &mut self, priors: &[f64], features: &[ArrayView1<f64>],
    ) -> DensityResult<()>;

    /// Convert the accumulated statistics into new parameters and release
    /// the accumulator.
    ///
    /// # Errors
    /// - [`DensityError::NotAccumulating`] without an accumulator.
    /// - [`DensityError::NoStatistics`] when the tracks read by `mode` hold
    ///   zero weight.
    /// - [`DensityError::Numerical`] / [`DensityError::OptimizationFailed`]
    ///   when no valid parameters result. The accumulator is kept on error.
    fn estimate_parameters(
        &mut self, mode: EstimationMode, options: &EstimationOptions,
    ) -> DensityResult<()>;

    /// Detach the accumulator, e.g. to merge statistics from parallel
    /// workers.
    fn take_accumulator(&mut self) -> Option<Accumulator>;

    /// Merge `acc` into this density's accumulator (starting one if none is
    /// active).
    ///
    /// # Errors
    /// [`DensityError::AccumulatorMismatch`] for the wrong accumulator kind,
    /// [`DensityError::DimensionMismatch`] for the wrong dimension.
    fn absorb_accumulator(&mut self, acc: Accumulator) -> DensityResult<()>;

    /// Split into two daughters of half the weight, with means moved by
    /// `±SPLIT_PERTURBATION · σ_d` and the covariance copied.
    fn split(&self, weight: f64) -> DensityResult<Daughters<Self>> {
        moment_split(self, weight)
    }

    /// Set `self` to the moment-matched merge of `(w1, g1)` and `(w2, g2)`.
    fn merge(&mut self, w1: f64, g1: &Self, w2: f64, g2: &Self) -> DensityResult<()> {
        moment_merge(self, w1, g1, w2, g2)
    }

    /// Closed-form `KL(self || other)`.
    fn kullback_leibler(&self, other: &Self) -> DensityResult<f64> {
        gaussian_kl(self, other)
    }
}

/// Default split: perturb the mean by `±ε σ` along each dimension.
pub fn moment_split<G: Gaussian>(g: &G, weight: f64) -> DensityResult<Daughters<G>> {
    validate_weight(0, weight)?;
    let mean = g.get_mean();
    let cov = g.get_covariance();
    let offset = cov.diag().mapv(|v| SPLIT_PERTURBATION * v.max(0.0).sqrt());

    let mut first = g.clone();
    let mut second = g.clone();
    first.take_accumulator();
    second.take_accumulator();
    first.set_mean((&mean + &offset).view())?;
    second.set_mean((&mean - &offset).view())?;
    Ok(Daughters { weight: 0.5 * weight, first, second })
}

/// Moment-matched mean and covariance of a two-component mixture.
///
/// # Errors
/// - [`DensityError::InvalidWeight`] for a negative or non-finite weight.
/// - [`DensityError::Numerical`] when `w1 + w2 <= 0`.
pub fn merged_moments(
    w1: f64, m1: ArrayView1<f64>, c1: ArrayView2<f64>, w2: f64, m2: ArrayView1<f64>,
    c2: ArrayView2<f64>,
) -> DensityResult<(Array1<f64>, Array2<f64>)> {
    validate_weight(0, w1)?;
    validate_weight(1, w2)?;
    let total = w1 + w2;
    if !(total > 0.0) {
        return Err(DensityError::Numerical { reason: "Merge weights must sum to a positive value." });
    }
    let (a1, a2) = (w1 / total, w2 / total);
    let mean = &m1 * a1 + &m2 * a2;
    let d1 = &m1 - &mean;
    let d2 = &m2 - &mean;
    let cov = (&c1 + &outer(d1.view(), d1.view())) * a1 + (&c2 + &outer(d2.view(), d2.view())) * a2;
    Ok((mean, cov))
}

/// Default merge via [`merged_moments`], committed atomically.
pub fn moment_merge<G: Gaussian>(
    target: &mut G, w1: f64, g1: &G, w2: f64, g2: &G,
) -> DensityResult<()> {
    validate_dim(g1.dim(), g2.dim())?;
    let (mean, cov) = merged_moments(
        w1,
        g1.get_mean().view(),
        g1.get_covariance().view(),
        w2,
        g2.get_mean().view(),
        g2.get_covariance().view(),
    )?;
    let mut candidate = target.clone();
    if candidate.dim() != mean.len() {
        candidate.reset(mean.len())?;
    }
    candidate.set_mean(mean.view())?;
    candidate.set_covariance(cov.view())?;
    *target = candidate;
    Ok(())
}

/// Closed-form KL divergence between Gaussians given by their moments:
///
/// `½ [tr(Σ₂⁻¹Σ₁) + (μ₂−μ₁)ᵀΣ₂⁻¹(μ₂−μ₁) − d + ln|Σ₂| − ln|Σ₁|]`.
///
/// # Errors
/// - [`DensityError::DimensionMismatch`] for different dimensionalities.
/// - [`DensityError::Numerical`] when either covariance is not positive
///   definite.
pub fn kl_from_moments(
    m1: ArrayView1<f64>, c1: ArrayView2<f64>, m2: ArrayView1<f64>, c2: ArrayView2<f64>,
) -> DensityResult<f64> {
    validate_dim(m1.len(), m2.len())?;
    let f1 = spd_factor_or(c1, "Covariance of the first Gaussian is not positive definite.")?;
    let f2 = spd_factor_or(c2, "Covariance of the second Gaussian is not positive definite.")?;
    let diff = &m2 - &m1;
    let d = m1.len() as f64;
    let kl = 0.5
        * (trace_product(f2.inverse.view(), c1)
            + quadratic_form(f2.inverse.view(), diff.view())
            - d
            + f2.log_det
            - f1.log_det);
    Ok(kl.max(0.0))
}

/// Default KL divergence through the moment accessors.
pub fn gaussian_kl<A: Gaussian, B: Gaussian>(a: &A, b: &B) -> DensityResult<f64> {
    kl_from_moments(
        a.get_mean().view(),
        a.get_covariance().view(),
        b.get_mean().view(),
        b.get_covariance().view(),
    )
}
