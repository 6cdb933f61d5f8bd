//! FullCovarianceGaussian — Gaussian with an unconstrained covariance.
//!
//! Purpose
//! -------
//! Model correlated features with a dense symmetric positive-definite
//! covariance. The precision matrix and `log|Σ|` are cached from a
//! Cholesky factorization after every parameter change, so evaluation is a
//! single quadratic form.
//!
//! Key behaviors
//! -------------
//! - `log p(f) = −½ [(f−μ)ᵀ Σ⁻¹ (f−μ) + d·ln 2π + ln|Σ|]`.
//! - ML estimation `Σ = E[f fᵀ] − μ μᵀ`; MMI through Extended Baum–Welch.
//! - Estimated covariances get `max(Σ_dd, floor)` on the diagonal and must
//!   be positive definite after flooring.
//!
//! Conventions
//! -----------
//! - Payload layout: `<dim> <mean…> <covariance row-major…>`.
use crate::densities::{
    core::{
        accumulators::{absorb_into, active_tracks, Accumulator, FullCovarianceAccumulator},
        ebw::{ebw_full, ml_full},
        linalg::{is_well_conditioned, quadratic_form, spd_factor_or, symmetrize, LN_2PI},
        mode::EstimationMode,
        options::EstimationOptions,
        tokens::{write_matrix, write_vector, TokenReader},
        validation::{validate_dim, validate_feature, validate_finite, validate_square},
    },
    errors::{DensityError, DensityResult},
    gaussians::traits::{Gaussian, Pdf},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::io::{BufRead, Write};

#[derive(Debug, Clone, PartialEq)]
pub struct FullCovarianceGaussian {
    mean: Array1<f64>,
    cov: Array2<f64>,
    precision: Array2<f64>,
    log_det: f64,
    accumulator: Option<Box<FullCovarianceAccumulator>>,
}

impl FullCovarianceGaussian {
    /// Standard normal of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self {
            mean: Array1::zeros(dim),
            cov: Array2::eye(dim),
            precision: Array2::eye(dim),
            log_det: 0.0,
            accumulator: None,
        }
    }

    /// Build from a mean and a covariance.
    ///
    /// # Errors
    /// - [`DensityError::DimensionMismatch`] for inconsistent shapes.
    /// - [`DensityError::Numerical`] when the mean is not finite or the
    ///   covariance is not symmetric positive definite.
    pub fn from_parameters(mean: Array1<f64>, cov: Array2<f64>) -> DensityResult<Self> {
        let mut g = Self::new(mean.len());
        g.set_mean(mean.view())?;
        g.set_covariance(cov.view())?;
        Ok(g)
    }

    /// Parse a payload written by [`Pdf::write`]. Nothing is sized from
    /// the declared dimension until its values have been read.
    ///
    /// # Errors
    /// [`DensityError::Format`] for a malformed or invalid payload.
    pub fn from_tokens<R: BufRead>(tokens: &mut TokenReader<R>) -> DensityResult<Self> {
        let dim = tokens.read_usize("dimension")?;
        let mean = tokens.read_vector(dim, "mean")?;
        let cov = tokens.read_matrix(dim, dim, "covariance")?;
        FullCovarianceGaussian::from_parameters(mean, cov)
            .map_err(|e| tokens.format_error(e.to_string()))
    }

    /// Cached `Σ⁻¹`.
    pub fn get_precision(&self) -> Array2<f64> {
        self.precision.clone()
    }
}

impl Pdf for FullCovarianceGaussian {
    fn dim(&self) -> usize {
        self.mean.len()
    }

    fn compute_log_likelihood(&self, f: ArrayView1<f64>) -> DensityResult<f64> {
        validate_feature(self.dim(), f)?;
        let diff = &f - &self.mean;
        let m = quadratic_form(self.precision.view(), diff.view());
        Ok(-0.5 * (m + self.dim() as f64 * LN_2PI + self.log_det))
    }

    fn write<W: Write>(&self, w: &mut W) -> DensityResult<()> {
        write!(w, "{}", self.dim())?;
        write_vector(w, self.mean.view())?;
        write_matrix(w, self.cov.view())
    }

    fn read<R: BufRead>(&mut self, tokens: &mut TokenReader<R>) -> DensityResult<()> {
        *self = Self::from_tokens(tokens)?;
        Ok(())
    }
}

impl Gaussian for FullCovarianceGaussian {
    fn reset(&mut self, dim: usize) -> DensityResult<()> {
        *self = FullCovarianceGaussian::new(dim);
        Ok(())
    }

    fn get_mean(&self) -> Array1<f64> {
        self.mean.clone()
    }

    fn get_covariance(&self) -> Array2<f64> {
        self.cov.clone()
    }

    fn set_mean(&mut self, mean: ArrayView1<f64>) -> DensityResult<()> {
        validate_dim(self.dim(), mean.len())?;
        validate_finite(mean, "Mean entries must be finite.")?;
        self.mean.assign(&mean);
        Ok(())
    }

    /// The covariance is symmetrized before factorization.
    fn set_covariance(&mut self, covariance: ArrayView2<f64>) -> DensityResult<()> {
        validate_square(self.dim(), covariance)?;
        let mut cov = covariance.to_owned();
        symmetrize(&mut cov);
        let factor = spd_factor_or(cov.view(), "Covariance is not positive definite.")?;
        self.cov = cov;
        self.precision = factor.inverse;
        self.log_det = factor.log_det;
        Ok(())
    }

    fn start_accumulating(&mut self) {
        self.accumulator = Some(Box::new(FullCovarianceAccumulator::new(self.dim())));
    }

    fn is_accumulating(&self) -> bool {
        self.accumulator.is_some()
    }

    fn accumulate_ml(&mut self, prior: f64, f: ArrayView1<f64>) -> DensityResult<()> {
        active_tracks(&mut self.accumulator)?.accumulate_ml(prior, f)
    }

    fn accumulate_mmi_denominator(
        &mut self, priors: &[f64], features: &[ArrayView1<f64>],
    ) -> DensityResult<()> {
        active_tracks(&mut self.accumulator)?.accumulate_mmi_denominator(priors, features)
    }

    fn estimate_parameters(
        &mut self, mode: EstimationMode, options: &EstimationOptions,
    ) -> DensityResult<()> {
        let acc = self.accumulator.as_deref().ok_or(DensityError::NotAccumulating)?;
        let (mean, mut cov) = match mode {
            EstimationMode::Ml => ml_full(&acc.ml)?,
            EstimationMode::Mmi => {
                ebw_full(&acc.ml, &acc.mmi, self.mean.view(), self.cov.view(), &options.ebw)?
            }
        };
        condition_covariance(&mut cov, options.variance_floor)?;
        let updated = FullCovarianceGaussian::from_parameters(mean, cov)?;
        *self = updated;
        Ok(())
    }

    fn take_accumulator(&mut self) -> Option<Accumulator> {
        self.accumulator.take().map(Accumulator::Full)
    }

    fn absorb_accumulator(&mut self, acc: Accumulator) -> DensityResult<()> {
        match acc {
            Accumulator::Full(incoming) => {
                let dim = self.dim();
                absorb_into(&mut self.accumulator, dim, incoming)
            }
            other => Err(DensityError::AccumulatorMismatch { expected: "full", found: other.kind() }),
        }
    }
}

/// Make an estimated covariance usable: `Σ_dd ← max(Σ_dd, floor)`, then
/// `Σ ← Σ + floor · I` if the floored matrix is still not positive definite
/// (a rank-deficient estimate from collinear data).
///
/// # Errors
/// [`DensityError::Numerical`] when the estimate holds NaN or infinite
/// entries.
pub(crate) fn condition_covariance(cov: &mut Array2<f64>, floor: f64) -> DensityResult<()> {
    if cov.iter().any(|v| !v.is_finite()) {
        return Err(DensityError::Numerical { reason: "Estimated covariance is not finite." });
    }
    cov.diag_mut().mapv_inplace(|v| v.max(floor));
    if !is_well_conditioned(cov.view()) {
        cov.diag_mut().mapv_inplace(|v| v + floor);
    }
    Ok(())
}
