//! PrecisionConstrainedGaussian — precision tied to a shared matrix basis.
//!
//! Purpose
//! -------
//! Represent the precision as `P(λ) = Σ_k λ_k B_k` over a
//! [`PrecisionSubspace`] shared by many Gaussians, so each density stores
//! only its mean and the coefficient vector λ.
//!
//! Key behaviors
//! -------------
//! - Evaluation uses the reconstructed `P(λ)` and `ln|P(λ)|`, both cached
//!   whenever λ changes.
//! - Estimation first forms target moments (ML or Extended Baum–Welch over
//!   a full-covariance accumulator, then the diagonal floor), then fits λ
//!   by maximizing `½ ln|P| − ½ tr(P S)` with L-BFGS. The fit starts from
//!   the better of the current λ and the projection of `S⁻¹` onto the
//!   basis.
//! - `set_covariance` runs the same fit against the given covariance.
//!
//! Invariants & assumptions
//! ------------------------
//! - `P(λ)` is positive definite for every committed λ.
//! - `dim()` always equals the subspace dimension.
//!
//! Conventions
//! -----------
//! - Payload layout: `<dim> <mean…> <ncoeff> <λ…>`. The subspace itself is
//!   written once per pool file and referenced by id.
use crate::{
    densities::{
        core::{
            accumulators::{absorb_into, active_tracks, Accumulator, FullCovarianceAccumulator},
            ebw::{ebw_full, ml_full},
            linalg::{quadratic_form, spd_factor, spd_factor_or, symmetrize, LN_2PI},
            mode::EstimationMode,
            options::EstimationOptions,
            subspace::PrecisionSubspace,
            tokens::{write_vector, TokenReader},
            validation::{validate_dim, validate_feature, validate_finite, validate_square},
        },
        errors::{DensityError, DensityResult},
        gaussians::{
            full::condition_covariance,
            objectives::{fit_coefficients, PrecisionObjective},
            traits::{Gaussian, Pdf},
        },
    },
    optimization::loglik_optimizer::MLEOptions,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::{
    io::{BufRead, Write},
    sync::Arc,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PrecisionConstrainedGaussian {
    subspace: Arc<PrecisionSubspace>,
    mean: Array1<f64>,
    coeffs: Array1<f64>,
    precision: Array2<f64>,
    covariance: Array2<f64>,
    log_det_precision: f64,
    accumulator: Option<Box<FullCovarianceAccumulator>>,
}

impl PrecisionConstrainedGaussian {
    /// Zero mean and the basis projection of the identity precision.
    ///
    /// # Errors
    /// [`DensityError::Numerical`] if the projected identity is not
    /// positive definite.
    pub fn new(subspace: Arc<PrecisionSubspace>) -> DensityResult<Self> {
        let dim = subspace.dim();
        let coeffs = subspace.project(Array2::<f64>::eye(dim).view())?;
        Self::from_parameters(subspace, Array1::zeros(dim), coeffs)
    }

    /// Build from a mean and explicit coefficients.
    ///
    /// # Errors
    /// - [`DensityError::DimensionMismatch`] for a wrongly sized mean or
    ///   coefficient vector.
    /// - [`DensityError::Numerical`] when `P(λ)` is not positive definite.
    pub fn from_parameters(
        subspace: Arc<PrecisionSubspace>, mean: Array1<f64>, coeffs: Array1<f64>,
    ) -> DensityResult<Self> {
        validate_dim(subspace.dim(), mean.len())?;
        validate_finite(mean.view(), "Mean entries must be finite.")?;
        let dim = subspace.dim();
        let mut g = Self {
            subspace,
            mean,
            coeffs: Array1::zeros(0),
            precision: Array2::zeros((dim, dim)),
            covariance: Array2::zeros((dim, dim)),
            log_det_precision: 0.0,
            accumulator: None,
        };
        g.commit_coeffs(coeffs)?;
        Ok(g)
    }

    /// Parse a payload written by [`Pdf::write`] against `subspace`.
    ///
    /// # Errors
    /// [`DensityError::Format`] for a malformed payload,
    /// [`DensityError::DimensionMismatch`] for a foreign dimension.
    pub fn from_tokens<R: BufRead>(
        subspace: Arc<PrecisionSubspace>, tokens: &mut TokenReader<R>,
    ) -> DensityResult<Self> {
        tokens.expect_dim(subspace.dim())?;
        let mean = tokens.read_vector(subspace.dim(), "mean")?;
        let n = tokens.read_usize("coefficient count")?;
        if n != subspace.len() {
            return Err(tokens.format_error(format!(
                "coefficient count {n} does not match subspace size {}",
                subspace.len()
            )));
        }
        let coeffs = tokens.read_vector(n, "coefficient")?;
        Self::from_parameters(subspace, mean, coeffs).map_err(|e| tokens.format_error(e.to_string()))
    }

    pub fn subspace(&self) -> &Arc<PrecisionSubspace> {
        &self.subspace
    }

    pub fn get_precision_coeffs(&self) -> Array1<f64> {
        self.coeffs.clone()
    }

    /// Replace λ directly.
    ///
    /// # Errors
    /// [`DensityError::DimensionMismatch`] / [`DensityError::Numerical`];
    /// the Gaussian is unchanged on error.
    pub fn set_precision_coeffs(&mut self, coeffs: ArrayView1<f64>) -> DensityResult<()> {
        self.commit_coeffs(coeffs.to_owned())
    }

    pub fn get_precision(&self) -> Array2<f64> {
        self.precision.clone()
    }

    fn commit_coeffs(&mut self, coeffs: Array1<f64>) -> DensityResult<()> {
        validate_finite(coeffs.view(), "Subspace coefficients must be finite.")?;
        let mut precision = self.subspace.precision(coeffs.view())?;
        symmetrize(&mut precision);
        let factor = spd_factor_or(precision.view(), "Constrained precision is not positive definite.")?;
        self.coeffs = coeffs;
        self.precision = precision;
        self.covariance = factor.inverse;
        self.log_det_precision = factor.log_det;
        Ok(())
    }

    /// Coefficients that best explain covariance `target`.
    fn fit(&self, target: Array2<f64>, mle: &MLEOptions) -> DensityResult<Array1<f64>> {
        let mut starts = vec![self.coeffs.clone()];
        if let Some(f) = spd_factor(target.view()) {
            starts.push(self.subspace.project(f.inverse.view())?);
        }
        let objective = PrecisionObjective::new(&self.subspace, target);
        fit_coefficients(&objective, starts, mle)
    }
}

impl Pdf for PrecisionConstrainedGaussian {
    fn dim(&self) -> usize {
        self.mean.len()
    }

    fn compute_log_likelihood(&self, f: ArrayView1<f64>) -> DensityResult<f64> {
        validate_feature(self.dim(), f)?;
        let diff = &f - &self.mean;
        let m = quadratic_form(self.precision.view(), diff.view());
        Ok(-0.5 * (m + self.dim() as f64 * LN_2PI - self.log_det_precision))
    }

    fn write<W: Write>(&self, w: &mut W) -> DensityResult<()> {
        write!(w, "{}", self.dim())?;
        write_vector(w, self.mean.view())?;
        write!(w, " {}", self.coeffs.len())?;
        write_vector(w, self.coeffs.view())
    }

    fn read<R: BufRead>(&mut self, tokens: &mut TokenReader<R>) -> DensityResult<()> {
        *self = PrecisionConstrainedGaussian::from_tokens(self.subspace.clone(), tokens)?;
        Ok(())
    }
}

impl Gaussian for PrecisionConstrainedGaussian {
    /// Only the subspace dimension is accepted.
    fn reset(&mut self, dim: usize) -> DensityResult<()> {
        validate_dim(self.subspace.dim(), dim)?;
        *self = PrecisionConstrainedGaussian::new(self.subspace.clone())?;
        Ok(())
    }

    fn get_mean(&self) -> Array1<f64> {
        self.mean.clone()
    }

    fn get_covariance(&self) -> Array2<f64> {
        self.covariance.clone()
    }

    fn set_mean(&mut self, mean: ArrayView1<f64>) -> DensityResult<()> {
        validate_dim(self.dim(), mean.len())?;
        validate_finite(mean, "Mean entries must be finite.")?;
        self.mean.assign(&mean);
        Ok(())
    }

    /// Fit λ to `covariance` with the default optimizer options.
    fn set_covariance(&mut self, covariance: ArrayView2<f64>) -> DensityResult<()> {
        validate_square(self.dim(), covariance)?;
        let coeffs = self.fit(covariance.to_owned(), &MLEOptions::default())?;
        self.commit_coeffs(coeffs)
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
            EstimationMode::Mmi => ebw_full(
                &acc.ml,
                &acc.mmi,
                self.mean.view(),
                self.covariance.view(),
                &options.ebw,
            )?,
        };
        condition_covariance(&mut cov, options.variance_floor)?;
        let coeffs = self.fit(cov, &options.mle)?;
        let updated =
            PrecisionConstrainedGaussian::from_parameters(self.subspace.clone(), mean, coeffs)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::densities::gaussians::full::FullCovarianceGaussian;
    use ndarray::array;

    fn full_subspace() -> Arc<PrecisionSubspace> {
        Arc::new(PrecisionSubspace::full_symmetric(2).expect("valid basis"))
    }

    #[test]
    // Purpose
    // -------
    // With a basis spanning all symmetric matrices the constrained Gaussian
    // reproduces any full-covariance Gaussian.
    //
    // Given
    // -----
    // - Σ = [[2, 0.6], [0.6, 1]] set through `set_covariance`, μ = [1, -0.5].
    //
    // Expect
    // ------
    // - Recovered covariance within 1e-8 of Σ and log-likelihood equal to
    //   the full-covariance Gaussian's within 1e-8.
    fn full_basis_matches_full_covariance() {
        // Arrange
        let cov = array![[2.0, 0.6], [0.6, 1.0]];
        let mean = array![1.0, -0.5];
        let full = FullCovarianceGaussian::from_parameters(mean.clone(), cov.clone())
            .expect("valid parameters");
        let mut g = PrecisionConstrainedGaussian::new(full_subspace()).expect("identity fits");

        // Act
        g.set_mean(mean.view()).expect("valid mean");
        g.set_covariance(cov.view()).expect("fit");

        // Assert
        for (a, b) in g.get_covariance().iter().zip(cov.iter()) {
            assert!((a - b).abs() < 1e-8);
        }
        let f = array![0.3, 0.4];
        let ll = g.compute_log_likelihood(f.view()).expect("dim");
        let reference = full.compute_log_likelihood(f.view()).expect("dim");
        assert!((ll - reference).abs() < 1e-8);
    }

    #[test]
    // Purpose
    // -------
    // ML estimation with a diagonal basis lands on the inverse sample
    // variances even when the sample covariance has correlations.
    //
    // Given
    // -----
    // - Observations [1, 1], [-1, -1], [1, -1], [-1, 1], [2, 2], [-2, -2].
    //   Sample variances are 2 per dimension with positive correlation.
    //
    // Expect
    // ------
    // - λ ≈ [0.5, 0.5] within 1e-5 and mean ≈ 0.
    fn diagonal_basis_ml_estimate() {
        // Arrange
        let sub = Arc::new(PrecisionSubspace::diagonal(2).expect("valid basis"));
        let mut g = PrecisionConstrainedGaussian::new(sub).expect("identity fits");
        g.start_accumulating();
        for f in [[1.0, 1.0], [-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [2.0, 2.0], [-2.0, -2.0]] {
            g.accumulate_ml(1.0, array![f[0], f[1]].view()).expect("accumulating");
        }

        // Act
        g.estimate_parameters(EstimationMode::Ml, &EstimationOptions::default()).expect("fit");

        // Assert
        let lambda = g.get_precision_coeffs();
        assert!((lambda[0] - 0.5).abs() < 1e-5, "{lambda}");
        assert!((lambda[1] - 0.5).abs() < 1e-5, "{lambda}");
        assert!(g.get_mean().iter().all(|m| m.abs() < 1e-12));
        assert!(!g.is_accumulating());
    }

    #[test]
    // Purpose
    // -------
    // Infeasible coefficients are rejected without touching the Gaussian,
    // and reset only accepts the subspace dimension.
    //
    // Given
    // -----
    // - λ = [1, -1, 0] on the full 2-D basis; reset to dimension 3.
    //
    // Expect
    // ------
    // - `Numerical` and `DimensionMismatch` errors; state unchanged.
    fn rejects_infeasible_coefficients_and_foreign_dims() {
        // Arrange
        let mut g = PrecisionConstrainedGaussian::new(full_subspace()).expect("identity fits");
        let before = g.clone();

        // Act
        let coeff_res = g.set_precision_coeffs(array![1.0, -1.0, 0.0].view());
        let reset_res = g.reset(3);

        // Assert
        assert!(matches!(coeff_res, Err(DensityError::Numerical { .. })));
        assert_eq!(reset_res, Err(DensityError::DimensionMismatch { expected: 2, actual: 3 }));
        assert_eq!(g, before);
    }
}
