//! DiagonalGaussian — Gaussian with a per-dimension variance vector.
//!
//! Purpose
//! -------
//! The cheapest Gaussian variant: dimensions are independent, so the
//! covariance is a variance vector and every operation is O(dim).
//!
//! Key behaviors
//! -------------
//! - Log-likelihood `c − ½ Σ_d (f_d − μ_d)² / σ²_d` with the normalizing
//!   constant `c = −½ Σ_d log(2π σ²_d)` and the precisions `1/σ²_d` cached
//!   after every parameter change.
//! - ML and MMI estimation from a [`DiagonalAccumulator`], followed by the
//!   variance floor `σ²_d ← max(σ²_d, floor)`.
//! - Vector-form overrides of merge and Kullback–Leibler divergence.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every variance is finite and strictly positive.
//! - `precision` and `constant` always match `var`.
//!
//! Conventions
//! -----------
//! - Payload layout: `<dim> <mean…> <var…>`.
use crate::densities::{
    core::{
        accumulators::{absorb_into, active_tracks, Accumulator, DiagonalAccumulator},
        ebw::{ebw_diagonal, ml_diagonal},
        linalg::LN_2PI,
        mode::EstimationMode,
        options::EstimationOptions,
        tokens::{write_vector, TokenReader},
        validation::{
            validate_dim, validate_feature, validate_finite, validate_square, validate_variances,
            validate_weight,
        },
    },
    errors::{DensityError, DensityResult},
    gaussians::traits::{Gaussian, Pdf},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::io::{BufRead, Write};

#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalGaussian {
    mean: Array1<f64>,
    var: Array1<f64>,
    precision: Array1<f64>,
    constant: f64,
    accumulator: Option<Box<DiagonalAccumulator>>,
}

impl DiagonalGaussian {
    /// Standard normal of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        let mut g = Self {
            mean: Array1::zeros(dim),
            var: Array1::ones(dim),
            precision: Array1::ones(dim),
            constant: 0.0,
            accumulator: None,
        };
        g.refresh();
        g
    }

    /// Build from a mean and a variance vector.
    ///
    /// # Errors
    /// - [`DensityError::DimensionMismatch`] when the lengths differ.
    /// - [`DensityError::Numerical`] for non-finite means or non-positive
    ///   variances.
    pub fn from_parameters(mean: Array1<f64>, var: Array1<f64>) -> DensityResult<Self> {
        validate_dim(mean.len(), var.len())?;
        validate_finite(mean.view(), "Mean entries must be finite.")?;
        validate_variances(var.view())?;
        let mut g = Self {
            precision: Array1::zeros(var.len()),
            mean,
            var,
            constant: 0.0,
            accumulator: None,
        };
        g.refresh();
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
        let var = tokens.read_vector(dim, "variance")?;
        DiagonalGaussian::from_parameters(mean, var).map_err(|e| tokens.format_error(e.to_string()))
    }

    pub fn get_covariance_diagonal(&self) -> Array1<f64> {
        self.var.clone()
    }

    /// Replace the variance vector.
    ///
    /// # Errors
    /// [`DensityError::DimensionMismatch`] or [`DensityError::Numerical`].
    pub fn set_covariance_diagonal(&mut self, var: ArrayView1<f64>) -> DensityResult<()> {
        validate_dim(self.dim(), var.len())?;
        validate_variances(var)?;
        self.var.assign(&var);
        self.refresh();
        Ok(())
    }

    fn refresh(&mut self) {
        self.precision = self.var.mapv(|v| 1.0 / v);
        self.constant = -0.5 * self.var.iter().map(|v| LN_2PI + v.ln()).sum::<f64>();
    }
}

impl Pdf for DiagonalGaussian {
    fn dim(&self) -> usize {
        self.mean.len()
    }

    fn compute_log_likelihood(&self, f: ArrayView1<f64>) -> DensityResult<f64> {
        validate_feature(self.dim(), f)?;
        let mut mahalanobis = 0.0;
        for ((x, m), p) in f.iter().zip(self.mean.iter()).zip(self.precision.iter()) {
            let d = x - m;
            mahalanobis += d * d * p;
        }
        Ok(self.constant - 0.5 * mahalanobis)
    }

    fn write<W: Write>(&self, w: &mut W) -> DensityResult<()> {
        write!(w, "{}", self.dim())?;
        write_vector(w, self.mean.view())?;
        write_vector(w, self.var.view())
    }

    fn read<R: BufRead>(&mut self, tokens: &mut TokenReader<R>) -> DensityResult<()> {
        *self = Self::from_tokens(tokens)?;
        Ok(())
    }
}

impl Gaussian for DiagonalGaussian {
    fn reset(&mut self, dim: usize) -> DensityResult<()> {
        *self = DiagonalGaussian::new(dim);
        Ok(())
    }

    fn get_mean(&self) -> Array1<f64> {
        self.mean.clone()
    }

    fn get_covariance(&self) -> Array2<f64> {
        Array2::from_diag(&self.var)
    }

    fn set_mean(&mut self, mean: ArrayView1<f64>) -> DensityResult<()> {
        validate_dim(self.dim(), mean.len())?;
        validate_finite(mean, "Mean entries must be finite.")?;
        self.mean.assign(&mean);
        Ok(())
    }

    /// Keeps only the diagonal of `covariance`.
    fn set_covariance(&mut self, covariance: ArrayView2<f64>) -> DensityResult<()> {
        validate_square(self.dim(), covariance)?;
        self.set_covariance_diagonal(covariance.diag())
    }

    fn start_accumulating(&mut self) {
        self.accumulator = Some(Box::new(DiagonalAccumulator::new(self.dim())));
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
        let (mean, raw_var) = match mode {
            EstimationMode::Ml => ml_diagonal(&acc.ml)?,
            EstimationMode::Mmi => {
                ebw_diagonal(&acc.ml, &acc.mmi, self.mean.view(), self.var.view(), &options.ebw)?
            }
        };
        if raw_var.iter().any(|v| !v.is_finite()) {
            return Err(DensityError::Numerical { reason: "Estimated variances are not finite." });
        }
        let floor = options.variance_floor;
        let var = raw_var.mapv(|v| v.max(floor));
        let updated = DiagonalGaussian::from_parameters(mean, var)?;
        *self = updated;
        Ok(())
    }

    fn take_accumulator(&mut self) -> Option<Accumulator> {
        self.accumulator.take().map(Accumulator::Diagonal)
    }

    fn absorb_accumulator(&mut self, acc: Accumulator) -> DensityResult<()> {
        match acc {
            Accumulator::Diagonal(incoming) => {
                let dim = self.dim();
                absorb_into(&mut self.accumulator, dim, incoming)
            }
            other => Err(DensityError::AccumulatorMismatch {
                expected: "diagonal",
                found: other.kind(),
            }),
        }
    }

    fn merge(&mut self, w1: f64, g1: &Self, w2: f64, g2: &Self) -> DensityResult<()> {
        validate_weight(0, w1)?;
        validate_weight(1, w2)?;
        validate_dim(g1.dim(), g2.dim())?;
        let total = w1 + w2;
        if !(total > 0.0) {
            return Err(DensityError::Numerical {
                reason: "Merge weights must sum to a positive value.",
            });
        }
        let (a1, a2) = (w1 / total, w2 / total);
        let mean = &g1.mean * a1 + &g2.mean * a2;
        let d1 = &g1.mean - &mean;
        let d2 = &g2.mean - &mean;
        let var = (&g1.var + &(&d1 * &d1)) * a1 + (&g2.var + &(&d2 * &d2)) * a2;
        *self = DiagonalGaussian::from_parameters(mean, var)?;
        Ok(())
    }

    fn kullback_leibler(&self, other: &Self) -> DensityResult<f64> {
        validate_dim(self.dim(), other.dim())?;
        let mut kl = 0.0;
        for d in 0..self.dim() {
            let (v1, v2) = (self.var[d], other.var[d]);
            let diff = other.mean[d] - self.mean[d];
            kl += v1 / v2 + diff * diff / v2 - 1.0 + v2.ln() - v1.ln();
        }
        Ok((0.5 * kl).max(0.0))
    }
}
