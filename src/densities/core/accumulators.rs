//! Accumulators — per-density sufficient statistics for ML and MMI training.
//!
//! Purpose
//! -------
//! Hold the weighted occupancy, first-moment sum, and second-moment sum a
//! Gaussian needs to re-estimate its parameters. Each accumulator carries
//! two strictly separate tracks: the ML (numerator) track and the MMI
//! denominator track. Nothing ever adds to both.
//!
//! Key behaviors
//! -------------
//! - [`DiagonalStats`] keeps per-dimension squared sums; [`FullStats`] keeps
//!   a full outer-product sum. Both implement [`Statistics`].
//! - [`Tracks<S>`] pairs an ML and a denominator track and performs the
//!   validated accumulate operations. [`DiagonalAccumulator`] and
//!   [`FullCovarianceAccumulator`] are its two instantiations.
//! - [`Accumulator`] is the type-erased form handed out by
//!   `Gaussian::take_accumulator` so parallel workers can sum their private
//!   statistics with [`Accumulator::merge`] before a single estimation.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every track of one accumulator has the same dimensionality.
//! - Occupancies are sums of finite, non-negative priors, so they are
//!   finite and non-negative. A track with zero occupancy holds zero sums.
//! - A rejected accumulate call (bad prior, wrong dimension, mismatched
//!   lengths) leaves both tracks unchanged.
use crate::densities::{
    core::validation::{validate_batch, validate_dim, validate_observation, validate_weight},
    errors::{DensityError, DensityResult},
};
use ndarray::{Array1, Array2, ArrayView1};

/// Operations shared by the two statistics layouts.
pub trait Statistics: Clone + std::fmt::Debug + PartialEq {
    /// Zeroed statistics of dimensionality `dim`.
    fn zeros(dim: usize) -> Self;
    fn dim(&self) -> usize;
    /// Total accumulated weight.
    fn gamma(&self) -> f64;
    /// Add one observation with weight `w`. The caller has validated `w`
    /// and the dimension of `f`.
    fn add(&mut self, w: f64, f: ArrayView1<f64>);
    /// Sum `other` into `self`. The caller has validated the dimensions.
    fn absorb(&mut self, other: &Self);

    fn is_empty(&self) -> bool {
        self.gamma() == 0.0
    }
}

/// Diagonal-covariance statistics: `γ`, `Σ w f`, `Σ w f∘f`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalStats {
    pub gamma: f64,
    pub sum: Array1<f64>,
    pub sum_sq: Array1<f64>,
}

impl Statistics for DiagonalStats {
    fn zeros(dim: usize) -> Self {
        Self { gamma: 0.0, sum: Array1::zeros(dim), sum_sq: Array1::zeros(dim) }
    }

    fn dim(&self) -> usize {
        self.sum.len()
    }

    fn gamma(&self) -> f64 {
        self.gamma
    }

    fn add(&mut self, w: f64, f: ArrayView1<f64>) {
        self.gamma += w;
        self.sum.scaled_add(w, &f);
        self.sum_sq.zip_mut_with(&f, |s, &x| *s += w * x * x);
    }

    fn absorb(&mut self, other: &Self) {
        self.gamma += other.gamma;
        self.sum += &other.sum;
        self.sum_sq += &other.sum_sq;
    }
}

/// Full-covariance statistics: `γ`, `Σ w f`, `Σ w f fᵀ`.
#[derive(Debug, Clone, PartialEq)]
pub struct FullStats {
    pub gamma: f64,
    pub sum: Array1<f64>,
    pub outer: Array2<f64>,
}

impl Statistics for FullStats {
    fn zeros(dim: usize) -> Self {
        Self { gamma: 0.0, sum: Array1::zeros(dim), outer: Array2::zeros((dim, dim)) }
    }

    fn dim(&self) -> usize {
        self.sum.len()
    }

    fn gamma(&self) -> f64 {
        self.gamma
    }

    fn add(&mut self, w: f64, f: ArrayView1<f64>) {
        self.gamma += w;
        self.sum.scaled_add(w, &f);
        let n = f.len();
        for i in 0..n {
            let wi = w * f[i];
            for j in 0..n {
                self.outer[[i, j]] += wi * f[j];
            }
        }
    }

    fn absorb(&mut self, other: &Self) {
        self.gamma += other.gamma;
        self.sum += &other.sum;
        self.outer += &other.outer;
    }
}

/// An ML track and an MMI denominator track of the same layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracks<S: Statistics> {
    pub ml: S,
    pub mmi: S,
}

/// Accumulator used by diagonal-covariance Gaussians.
pub type DiagonalAccumulator = Tracks<DiagonalStats>;

/// Accumulator used by full-covariance and subspace-constrained Gaussians.
pub type FullCovarianceAccumulator = Tracks<FullStats>;

impl<S: Statistics> Tracks<S> {
    pub fn new(dim: usize) -> Self {
        Self { ml: S::zeros(dim), mmi: S::zeros(dim) }
    }

    pub fn dim(&self) -> usize {
        self.ml.dim()
    }

    /// Add `prior * f` (and its second moment) to the ML track.
    ///
    /// # Errors
    /// - [`DensityError::InvalidWeight`] for a negative or non-finite prior.
    /// - [`DensityError::DimensionMismatch`] for a feature of the wrong length.
    /// - [`DensityError::Numerical`] for a feature with NaN or infinite entries.
    pub fn accumulate_ml(&mut self, prior: f64, f: ArrayView1<f64>) -> DensityResult<()> {
        validate_weight(0, prior)?;
        validate_observation(self.dim(), f)?;
        self.ml.add(prior, f);
        Ok(())
    }

    /// Add one weighted contribution per feature to the denominator track.
    ///
    /// The whole batch is validated before anything is added.
    ///
    /// # Errors
    /// - [`DensityError::LengthMismatch`] when `priors.len() != features.len()`.
    /// - [`DensityError::InvalidWeight`] / [`DensityError::DimensionMismatch`]
    ///   / [`DensityError::Numerical`] for the first bad entry.
    pub fn accumulate_mmi_denominator(
        &mut self, priors: &[f64], features: &[ArrayView1<f64>],
    ) -> DensityResult<()> {
        validate_batch(self.dim(), priors, features)?;
        for (&p, f) in priors.iter().zip(features.iter()) {
            self.mmi.add(p, f.view());
        }
        Ok(())
    }

    /// Sum another accumulator's tracks into this one, track by track.
    ///
    /// # Errors
    /// [`DensityError::DimensionMismatch`] if the dimensionalities differ.
    pub fn merge(&mut self, other: &Self) -> DensityResult<()> {
        validate_dim(self.dim(), other.dim())?;
        self.ml.absorb(&other.ml);
        self.mmi.absorb(&other.mmi);
        Ok(())
    }
}

/// Type-erased accumulator, used to move statistics between densities.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Diagonal(Box<DiagonalAccumulator>),
    Full(Box<FullCovarianceAccumulator>),
}

impl Accumulator {
    /// `"diagonal"` or `"full"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Accumulator::Diagonal(_) => "diagonal",
            Accumulator::Full(_) => "full",
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            Accumulator::Diagonal(a) => a.dim(),
            Accumulator::Full(a) => a.dim(),
        }
    }

    /// Sum `other` into `self`.
    ///
    /// # Errors
    /// - [`DensityError::AccumulatorMismatch`] when the kinds differ.
    /// - [`DensityError::DimensionMismatch`] when the dimensionalities differ.
    pub fn merge(&mut self, other: &Accumulator) -> DensityResult<()> {
        match (self, other) {
            (Accumulator::Diagonal(a), Accumulator::Diagonal(b)) => a.merge(b),
            (Accumulator::Full(a), Accumulator::Full(b)) => a.merge(b),
            (me, other) => Err(DensityError::AccumulatorMismatch {
                expected: me.kind(),
                found: other.kind(),
            }),
        }
    }
}

/// Borrow the accumulator in `slot`, or fail with
/// [`DensityError::NotAccumulating`].
pub fn active_tracks<S: Statistics>(
    slot: &mut Option<Box<Tracks<S>>>,
) -> DensityResult<&mut Tracks<S>> {
    slot.as_deref_mut().ok_or(DensityError::NotAccumulating)
}

/// Merge an incoming accumulator into `slot`, starting one if the slot is
/// empty.
pub fn absorb_into<S: Statistics>(
    slot: &mut Option<Box<Tracks<S>>>, dim: usize, incoming: Box<Tracks<S>>,
) -> DensityResult<()> {
    validate_dim(dim, incoming.dim())?;
    match slot {
        Some(existing) => existing.merge(&incoming),
        None => {
            *slot = Some(incoming);
            Ok(())
        }
    }
}
