//! SubspaceConstrainedGaussian — natural parameters tied to a shared basis.
//!
//! Purpose
//! -------
//! Write the Gaussian in exponential-family form with natural parameters
//! `ψ = Pμ` and precision `P`, and constrain both jointly:
//! `(ψ, P)(λ) = Σ_k λ_k (v_k, S_k)` over an [`ExponentialSubspace`]. The
//! density stores λ only; mean and covariance are derived.
//!
//! Key behaviors
//! -------------
//! - `log p(x) = ψᵀx − ½ xᵀPx − ½ ψᵀP⁻¹ψ + ½ ln|P| − ½ d ln 2π`, evaluated
//!   as `−½ (x−μ)ᵀP(x−μ) + ½ ln|P| − ½ d ln 2π` from cached `μ`, `P` and
//!   the constant.
//! - Estimation forms target moments (ML or EBW, then the diagonal floor)
//!   and maximizes the expected log-likelihood over λ.
//! - `set_mean` / `set_covariance` refit λ to the requested moments, keeping
//!   the other moment at its current value. With a basis that does not span
//!   every natural-parameter pair the result is the closest representable
//!   Gaussian, so the other moment may move as well.
//!
//! Conventions
//! -----------
//! - Payload layout: `<dim> <ncoeff> <λ…>`.
use crate::{
    densities::{
        core::{
            accumulators::{absorb_into, active_tracks, Accumulator, FullCovarianceAccumulator},
            ebw::{ebw_full, ml_full},
            linalg::{quadratic_form, spd_factor, spd_factor_or, symmetrize, LN_2PI},
            mode::EstimationMode,
            options::EstimationOptions,
            subspace::ExponentialSubspace,
            tokens::{write_vector, TokenReader},
            validation::{validate_dim, validate_feature, validate_finite, validate_square},
        },
        errors::{DensityError, DensityResult},
        gaussians::{
            full::condition_covariance,
            objectives::{fit_coefficients, ExponentialObjective},
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
pub struct SubspaceConstrainedGaussian {
    subspace: Arc<ExponentialSubspace>,
    coeffs: Array1<f64>,
    psi: Array1<f64>,
    precision: Array2<f64>,
    covariance: Array2<f64>,
    mean: Array1<f64>,
    constant: f64,
    accumulator: Option<Box<FullCovarianceAccumulator>>,
}

impl SubspaceConstrainedGaussian {
    /// Basis projection of the standard normal `(ψ, P) = (0, I)`.
    ///
    /// # Errors
    /// [`DensityError::Numerical`] if the projected precision is not
    /// positive definite.
    pub fn new(subspace: Arc<ExponentialSubspace>) -> DensityResult<Self> {
        let dim = subspace.dim();
        let coeffs =
            subspace.project(Array1::<f64>::zeros(dim).view(), Array2::<f64>::eye(dim).view())?;
        Self::from_coeffs(subspace, coeffs)
    }

    /// # Errors
    /// - [`DensityError::DimensionMismatch`] for a wrongly sized λ.
    /// - [`DensityError::Numerical`] when `P(λ)` is not positive definite.
    pub fn from_coeffs(subspace: Arc<ExponentialSubspace>, coeffs: Array1<f64>) -> DensityResult<Self> {
        let dim = subspace.dim();
        let mut g = Self {
            subspace,
            coeffs: Array1::zeros(0),
            psi: Array1::zeros(dim),
            precision: Array2::zeros((dim, dim)),
            covariance: Array2::zeros((dim, dim)),
            mean: Array1::zeros(dim),
            constant: 0.0,
            accumulator: None,
        };
        g.commit_coeffs(coeffs)?;
        Ok(g)
    }

    /// Parse a payload written by [`Pdf::write`] against `subspace`.
    pub fn from_tokens<R: BufRead>(
        subspace: Arc<ExponentialSubspace>, tokens: &mut TokenReader<R>,
    ) -> DensityResult<Self> {
        tokens.expect_dim(subspace.dim())?;
        let n = tokens.read_usize("coefficient count")?;
        if n != subspace.len() {
            return Err(tokens.format_error(format!(
                "coefficient count {n} does not match subspace size {}",
                subspace.len()
            )));
        }
        let coeffs = tokens.read_vector(n, "coefficient")?;
        Self::from_coeffs(subspace, coeffs).map_err(|e| tokens.format_error(e.to_string()))
    }

    pub fn subspace(&self) -> &Arc<ExponentialSubspace> {
        &self.subspace
    }

    pub fn get_subspace_coeffs(&self) -> Array1<f64> {
        self.coeffs.clone()
    }

    /// # Errors
    /// [`DensityError::DimensionMismatch`] / [`DensityError::Numerical`];
    /// the Gaussian is unchanged on error.
    pub fn set_subspace_coeffs(&mut self, coeffs: ArrayView1<f64>) -> DensityResult<()> {
        self.commit_coeffs(coeffs.to_owned())
    }

    /// Natural parameters `(ψ, P)`.
    pub fn get_natural_parameters(&self) -> (Array1<f64>, Array2<f64>) {
        (self.psi.clone(), self.precision.clone())
    }

    fn commit_coeffs(&mut self, coeffs: Array1<f64>) -> DensityResult<()> {
        validate_finite(coeffs.view(), "Subspace coefficients must be finite.")?;
        let (psi, mut precision) = self.subspace.natural(coeffs.view())?;
        symmetrize(&mut precision);
        let factor = spd_factor_or(precision.view(), "Constrained precision is not positive definite.")?;
        let mean = factor.inverse.dot(&psi);
        validate_finite(mean.view(), "Derived mean is not finite.")?;
        self.constant = 0.5 * factor.log_det - 0.5 * self.subspace.dim() as f64 * LN_2PI;
        self.coeffs = coeffs;
        self.psi = psi;
        self.precision = precision;
        self.covariance = factor.inverse;
        self.mean = mean;
        Ok(())
    }

    /// Coefficients that best explain the moments `(mean, cov)`.
    fn fit(&self, mean: Array1<f64>, cov: Array2<f64>, mle: &MLEOptions) -> DensityResult<Array1<f64>> {
        let mut starts = vec![self.coeffs.clone()];
        if let Some(f) = spd_factor(cov.view()) {
            let psi = f.inverse.dot(&mean);
            starts.push(self.subspace.project(psi.view(), f.inverse.view())?);
        }
        let objective = ExponentialObjective::new(&self.subspace, mean, cov);
        fit_coefficients(&objective, starts, mle)
    }
}

impl Pdf for SubspaceConstrainedGaussian {
    fn dim(&self) -> usize {
        self.subspace.dim()
    }

    fn compute_log_likelihood(&self, f: ArrayView1<f64>) -> DensityResult<f64> {
        validate_feature(self.dim(), f)?;
        let diff = &f - &self.mean;
        Ok(self.constant - 0.5 * quadratic_form(self.precision.view(), diff.view()))
    }

    fn write<W: Write>(&self, w: &mut W) -> DensityResult<()> {
        write!(w, "{} {}", self.dim(), self.coeffs.len())?;
        write_vector(w, self.coeffs.view())
    }

    fn read<R: BufRead>(&mut self, tokens: &mut TokenReader<R>) -> DensityResult<()> {
        *self = SubspaceConstrainedGaussian::from_tokens(self.subspace.clone(), tokens)?;
        Ok(())
    }
}

impl Gaussian for SubspaceConstrainedGaussian {
    /// Only the subspace dimension is accepted.
    fn reset(&mut self, dim: usize) -> DensityResult<()> {
        validate_dim(self.subspace.dim(), dim)?;
        *self = SubspaceConstrainedGaussian::new(self.subspace.clone())?;
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
        let coeffs = self.fit(mean.to_owned(), self.covariance.clone(), &MLEOptions::default())?;
        self.commit_coeffs(coeffs)
    }

    fn set_covariance(&mut self, covariance: ArrayView2<f64>) -> DensityResult<()> {
        validate_square(self.dim(), covariance)?;
        let coeffs = self.fit(self.mean.clone(), covariance.to_owned(), &MLEOptions::default())?;
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
        let coeffs = self.fit(mean, cov, &options.mle)?;
        let updated = SubspaceConstrainedGaussian::from_coeffs(self.subspace.clone(), coeffs)?;
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
    use ndarray::array;
    use statrs::distribution::{Continuous, MultivariateNormal};

    fn full_subspace() -> Arc<ExponentialSubspace> {
        Arc::new(ExponentialSubspace::full(2).expect("valid basis"))
    }

    #[test]
    // Purpose
    // -------
    // A fresh Gaussian over the full basis is the standard normal.
    //
    // Given
    // -----
    // - `new(full_subspace())`, f = [0.5, -1].
    //
    // Expect
    // ------
    // - Zero mean, identity covariance, and the log-likelihood of N(0, I).
    fn new_is_standard_normal() {
        // Arrange
        let g = SubspaceConstrainedGaussian::new(full_subspace()).expect("identity fits");
        let f = array![0.5, -1.0];

        // Act
        let ll = g.compute_log_likelihood(f.view()).expect("dim");

        // Assert
        let expected = -LN_2PI - 0.5 * (0.25 + 1.0);
        assert!((ll - expected).abs() < 1e-12);
        assert!(g.get_mean().iter().all(|m| m.abs() < 1e-12));
    }

    #[test]
    // Purpose
    // -------
    // ML estimation over the full basis recovers the sample mean and
    // covariance, and evaluation matches the reference density.
    //
    // Given
    // -----
    // - Observations [3, 1], [1, 1], [2, 3], [2, -1]: mean [2, 1],
    //   covariance [[0.5, 0], [0, 2]].
    //
    // Expect
    // ------
    // - Moments within 1e-6 and log-likelihood within 1e-6 of
    //   `statrs::MultivariateNormal`.
    fn full_basis_ml_recovers_moments() {
        // Arrange
        let mut g = SubspaceConstrainedGaussian::new(full_subspace()).expect("identity fits");
        g.start_accumulating();
        for f in [[3.0, 1.0], [1.0, 1.0], [2.0, 3.0], [2.0, -1.0]] {
            g.accumulate_ml(1.0, array![f[0], f[1]].view()).expect("accumulating");
        }
        let mvn = MultivariateNormal::new(vec![2.0, 1.0], vec![0.5, 0.0, 0.0, 2.0])
            .expect("valid mvn");

        // Act
        g.estimate_parameters(EstimationMode::Ml, &EstimationOptions::default()).expect("fit");

        // Assert
        let mean = g.get_mean();
        let cov = g.get_covariance();
        assert!((mean[0] - 2.0).abs() < 1e-6 && (mean[1] - 1.0).abs() < 1e-6);
        assert!((cov[[0, 0]] - 0.5).abs() < 1e-6 && (cov[[1, 1]] - 2.0).abs() < 1e-6);
        assert!(cov[[0, 1]].abs() < 1e-6);
        let ll = g.compute_log_likelihood(array![1.5, 0.0].view()).expect("dim");
        let reference = mvn.ln_pdf(&nalgebra::DVector::from_vec(vec![1.5, 0.0]));
        assert!((ll - reference).abs() < 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // `set_mean` refits λ so the derived mean moves while the covariance
    // stays put on a spanning basis.
    //
    // Given
    // -----
    // - The standard normal; set_mean([1, 2]).
    //
    // Expect
    // ------
    // - Mean [1, 2] and identity covariance within 1e-8.
    fn set_mean_refits_natural_parameters() {
        // Arrange
        let mut g = SubspaceConstrainedGaussian::new(full_subspace()).expect("identity fits");

        // Act
        g.set_mean(array![1.0, 2.0].view()).expect("fit");

        // Assert
        let mean = g.get_mean();
        assert!((mean[0] - 1.0).abs() < 1e-8 && (mean[1] - 2.0).abs() < 1e-8);
        for (a, b) in g.get_covariance().iter().zip(Array2::<f64>::eye(2).iter()) {
            assert!((a - b).abs() < 1e-8);
        }
        let (psi, _) = g.get_natural_parameters();
        assert!((psi[0] - 1.0).abs() < 1e-8 && (psi[1] - 2.0).abs() < 1e-8);
    }
}
