//! Mixture — weighted combination of pool-indexed densities.
//!
//! Purpose
//! -------
//! Combine densities owned by a [`PdfPool`] into `p(f) = Σ_i w_i p_{k_i}(f)`
//! without owning any of them. Components are `(pool index, weight)` pairs;
//! the pool is borrowed for each evaluation.
//!
//! Key behaviors
//! -------------
//! - Cached evaluation reads the pool's likelihood cache; the log form uses
//!   a log-sum-exp reduction so very small component likelihoods never
//!   underflow to `log 0`.
//! - `*_of(f, pool)` variants recompute every component in place and never
//!   touch the cache.
//! - Zero-weight components contribute nothing and are skipped, so their
//!   cache slots need not be filled.
//!
//! Invariants & assumptions
//! ------------------------
//! - Weights are finite and non-negative. They sum to one only after
//!   [`Mixture::normalize_weights`].
//!
//! Conventions
//! -----------
//! - Text layout: `mixture <n>` followed by `n` pairs `<index> <weight>`.
use crate::{
    densities::{
        core::{
            tokens::{TokenReader, MAX_PREALLOC},
            validation::validate_weight,
        },
        errors::{DensityError, DensityResult},
        gaussians::Gaussian,
    },
    pool::pdf_pool::PdfPool,
};
use ndarray::ArrayView1;
use std::io::{BufRead, Write};

pub const MIXTURE_KEYWORD: &str = "mixture";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixtureComponent {
    pub index: usize,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mixture {
    components: Vec<MixtureComponent>,
}

/// `log Σ_i exp(x_i)` over the finite-weight terms; `−∞` when empty.
fn log_sum_exp(terms: &[f64]) -> f64 {
    let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + terms.iter().map(|t| (t - max).exp()).sum::<f64>().ln()
}

impl Mixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `(index, weight)` without renormalizing.
    ///
    /// # Errors
    /// [`DensityError::InvalidWeight`] for a negative or non-finite weight.
    pub fn add_component(&mut self, index: usize, weight: f64) -> DensityResult<()> {
        validate_weight(self.components.len(), weight)?;
        self.components.push(MixtureComponent { index, weight });
        Ok(())
    }

    /// Replace all components; nothing changes if any weight is invalid.
    pub fn set_components(&mut self, components: Vec<MixtureComponent>) -> DensityResult<()> {
        for (i, c) in components.iter().enumerate() {
            validate_weight(i, c.weight)?;
        }
        self.components = components;
        Ok(())
    }

    pub fn get_components(&self) -> &[MixtureComponent] {
        &self.components
    }

    pub fn reset(&mut self) {
        self.components.clear();
    }

    pub fn size(&self) -> usize {
        self.components.len()
    }

    /// Rescale the weights to sum to one.
    ///
    /// # Errors
    /// [`DensityError::Numerical`] when the weights sum to zero.
    pub fn normalize_weights(&mut self) -> DensityResult<()> {
        let total: f64 = self.components.iter().map(|c| c.weight).sum();
        if !(total > 0.0) {
            return Err(DensityError::Numerical { reason: "Mixture weights sum to zero." });
        }
        for c in &mut self.components {
            c.weight /= total;
        }
        Ok(())
    }

    fn active(&self) -> impl Iterator<Item = &MixtureComponent> {
        self.components.iter().filter(|c| c.weight > 0.0)
    }

    /// `Σ w_i · pool.get_likelihood(k_i)` from the pool cache.
    pub fn compute_likelihood(&self, pool: &PdfPool) -> DensityResult<f64> {
        self.active().try_fold(0.0, |acc, c| -> DensityResult<f64> {
            Ok(acc + c.weight * pool.get_likelihood(c.index)?)
        })
    }

    /// `log Σ exp(log w_i + log p_{k_i})` from the pool cache.
    pub fn compute_log_likelihood(&self, pool: &PdfPool) -> DensityResult<f64> {
        let terms = self
            .active()
            .map(|c| -> DensityResult<f64> { Ok(c.weight.ln() + pool.get_log_likelihood(c.index)?) })
            .collect::<DensityResult<Vec<f64>>>()?;
        Ok(log_sum_exp(&terms))
    }

    /// In-place variant of [`Mixture::compute_likelihood`].
    pub fn compute_likelihood_of(&self, f: ArrayView1<f64>, pool: &PdfPool) -> DensityResult<f64> {
        self.active().try_fold(0.0, |acc, c| -> DensityResult<f64> {
            Ok(acc + c.weight * pool.compute_likelihood(f, c.index)?)
        })
    }

    /// In-place variant of [`Mixture::compute_log_likelihood`].
    pub fn compute_log_likelihood_of(
        &self, f: ArrayView1<f64>, pool: &PdfPool,
    ) -> DensityResult<f64> {
        let terms = self
            .active()
            .map(|c| -> DensityResult<f64> {
                Ok(c.weight.ln() + pool.compute_log_likelihood(f, c.index)?)
            })
            .collect::<DensityResult<Vec<f64>>>()?;
        Ok(log_sum_exp(&terms))
    }

    /// Split the density behind component `k` into two daughters.
    ///
    /// The first daughter replaces the pool density in place, the second is
    /// appended to the pool, and component `k` is replaced by the two
    /// daughters at half its weight each. Returns the new pool index.
    ///
    /// Other mixtures referring to the same pool index see the first
    /// daughter afterwards.
    ///
    /// # Errors
    /// [`DensityError::IndexOutOfRange`] for a bad component or pool index.
    pub fn split_component(&mut self, pool: &mut PdfPool, k: usize) -> DensityResult<usize> {
        let component = *self
            .components
            .get(k)
            .ok_or(DensityError::IndexOutOfRange { index: k, size: self.components.len() })?;
        let daughters = pool.get_pdf(component.index)?.split(component.weight)?;
        let new_index = pool.add_pdf(daughters.second)?;
        pool.set_pdf(component.index, daughters.first)?;
        self.components[k].weight = daughters.weight;
        self.components.push(MixtureComponent { index: new_index, weight: daughters.weight });
        Ok(new_index)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> DensityResult<()> {
        write!(w, "{MIXTURE_KEYWORD} {}", self.components.len())?;
        for c in &self.components {
            write!(w, " {} {}", c.index, c.weight)?;
        }
        Ok(())
    }

    /// Parse a mixture written by [`Mixture::write`].
    pub fn read<R: BufRead>(tokens: &mut TokenReader<R>) -> DensityResult<Self> {
        tokens.expect_keyword(MIXTURE_KEYWORD)?;
        let n = tokens.read_usize("component count")?;
        let mut components = Vec::with_capacity(n.min(MAX_PREALLOC));
        for i in 0..n {
            let index = tokens.read_usize("component index")?;
            let weight = tokens.read_f64("component weight")?;
            validate_weight(i, weight)?;
            components.push(MixtureComponent { index, weight });
        }
        Ok(Self { components })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::densities::gaussians::DiagonalGaussian;
    use ndarray::array;
    use std::io::Cursor;

    fn pool_with_two() -> PdfPool {
        let mut pool = PdfPool::new(1);
        pool.add_pdf(DiagonalGaussian::new(1)).expect("dim 1");
        let shifted =
            DiagonalGaussian::from_parameters(array![3.0], array![0.5]).expect("valid params");
        pool.add_pdf(shifted).expect("dim 1");
        pool
    }

    #[test]
    // Purpose
    // -------
    // Normalization sums to one and fails on all-zero weights.
    //
    // Given
    // -----
    // - Weights [0.2, 0.7, 1.1]; then a mixture of two zero weights.
    //
    // Expect
    // ------
    // - Sum within 1e-9 of 1; `Numerical` for the all-zero mixture.
    fn normalize_weights_sums_to_one() {
        // Arrange
        let mut m = Mixture::new();
        for (i, w) in [0.2, 0.7, 1.1].into_iter().enumerate() {
            m.add_component(i, w).expect("valid weight");
        }
        let mut zero = Mixture::new();
        zero.add_component(0, 0.0).expect("valid weight");
        zero.add_component(1, 0.0).expect("valid weight");

        // Act
        m.normalize_weights().expect("positive sum");
        let res = zero.normalize_weights();

        // Assert
        let total: f64 = m.get_components().iter().map(|c| c.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(matches!(res, Err(DensityError::Numerical { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Cached and in-place evaluation agree, and the log form matches the
    // linear form where no underflow occurs.
    //
    // Given
    // -----
    // - Two 1-D components with weights 0.3 and 0.7, f = [1].
    //
    // Expect
    // ------
    // - Cached = in-place within 1e-12 in both domains; log = ln(linear)
    //   within 1e-12.
    fn cached_and_in_place_agree() {
        // Arrange
        let mut pool = pool_with_two();
        let mut m = Mixture::new();
        m.add_component(0, 0.3).expect("valid");
        m.add_component(1, 0.7).expect("valid");
        let f = array![1.0];
        pool.cache_likelihood(f.view()).expect("valid feature");

        // Act
        let lin = m.compute_likelihood(&pool).expect("cached");
        let log = m.compute_log_likelihood(&pool).expect("cached");
        let lin_of = m.compute_likelihood_of(f.view(), &pool).expect("valid");
        let log_of = m.compute_log_likelihood_of(f.view(), &pool).expect("valid");

        // Assert
        assert!((lin - lin_of).abs() < 1e-12);
        assert!((log - log_of).abs() < 1e-12);
        assert!((log - lin.ln()).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Log-domain evaluation survives where the linear form underflows.
    //
    // Given
    // -----
    // - A feature 60 units from both means (component densities ≈ e^-1800).
    //
    // Expect
    // ------
    // - Linear result is 0, log result is finite and close to the larger
    //   component's log term.
    fn log_form_does_not_underflow() {
        // Arrange
        let mut pool = pool_with_two();
        let mut m = Mixture::new();
        m.add_component(0, 0.5).expect("valid");
        m.add_component(1, 0.5).expect("valid");
        let f = array![63.0];
        pool.cache_likelihood(f.view()).expect("valid feature");

        // Act
        let lin = m.compute_likelihood(&pool).expect("cached");
        let log = m.compute_log_likelihood(&pool).expect("cached");

        // Assert
        let best = [0usize, 1]
            .iter()
            .map(|&i| 0.5_f64.ln() + pool.get_log_likelihood(i).expect("cached"))
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(lin, 0.0);
        assert!(log.is_finite());
        assert!((log - best).abs() < 1e-9);
    }

    #[test]
    // Purpose
    // -------
    // Zero-weight components are skipped, so their slots may stay unfilled;
    // an empty mixture has log-likelihood −∞.
    //
    // Given
    // -----
    // - Components (0, 1.0) and (1, 0.0); only slot 0 cached.
    //
    // Expect
    // ------
    // - Log-likelihood equals the slot-0 value; empty mixture → −∞.
    fn zero_weights_are_skipped() {
        // Arrange
        let mut pool = pool_with_two();
        let mut m = Mixture::new();
        m.add_component(0, 1.0).expect("valid");
        m.add_component(1, 0.0).expect("valid");
        let f = array![0.2];
        pool.cache_likelihood_index(f.view(), 0).expect("valid index");

        // Act
        let log = m.compute_log_likelihood(&pool).expect("slot 0 cached");
        let empty = Mixture::new().compute_log_likelihood(&pool).expect("no reads");

        // Assert
        assert_eq!(log, pool.get_log_likelihood(0).expect("cached"));
        assert_eq!(empty, f64::NEG_INFINITY);
    }

    #[test]
    // Purpose
    // -------
    // Splitting a component grows the pool and keeps the total weight.
    //
    // Given
    // -----
    // - One component (0, 0.8) over a one-density pool.
    //
    // Expect
    // ------
    // - Pool size 2, components [(0, 0.4), (1, 0.4)], daughter means on
    //   either side of the parent mean.
    fn split_component_appends_daughter() {
        // Arrange
        let mut pool = PdfPool::new(1);
        pool.add_pdf(DiagonalGaussian::new(1)).expect("dim 1");
        let mut m = Mixture::new();
        m.add_component(0, 0.8).expect("valid");

        // Act
        let new_index = m.split_component(&mut pool, 0).expect("valid component");

        // Assert
        assert_eq!(new_index, 1);
        assert_eq!(pool.size(), 2);
        assert_eq!(
            m.get_components(),
            &[MixtureComponent { index: 0, weight: 0.4 }, MixtureComponent { index: 1, weight: 0.4 }]
        );
        let m0 = pool.get_pdf(0).expect("valid").get_mean()[0];
        let m1 = pool.get_pdf(1).expect("valid").get_mean()[0];
        assert!(m0 > 0.0 && m1 < 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Text serialization reproduces the component list; negative weights
    // are rejected on read and on add.
    //
    // Given
    // -----
    // - Components (2, 0.25) and (0, 0.75); the text "mixture 1 0 -1".
    //
    // Expect
    // ------
    // - Equal mixture after write/read; `InvalidWeight` for the bad text and
    //   for `add_component(0, -1)`.
    fn write_read_and_weight_validation() {
        // Arrange
        let mut m = Mixture::new();
        m.add_component(2, 0.25).expect("valid");
        m.add_component(0, 0.75).expect("valid");
        let mut buf = Vec::new();

        // Act
        m.write(&mut buf).expect("write to Vec");
        let back = Mixture::read(&mut TokenReader::new(Cursor::new(buf))).expect("parse");
        let bad = Mixture::read(&mut TokenReader::new(Cursor::new("mixture 1 0 -1")));

        // Assert
        assert_eq!(back, m);
        assert!(matches!(bad, Err(DensityError::InvalidWeight { .. })));
        assert!(matches!(m.add_component(0, -1.0), Err(DensityError::InvalidWeight { .. })));
    }

    #[test]
    // Purpose
    // -------
    // A declared component count far beyond the input fails on truncation.
    //
    // Given
    // -----
    // - "mixture 1000000000000000 0 0.5".
    //
    // Expect
    // ------
    // - `Format` error.
    fn oversized_component_count_is_a_format_error() {
        // Arrange
        let text = "mixture 1000000000000000 0 0.5";

        // Act
        let res = Mixture::read(&mut TokenReader::new(Cursor::new(text)));

        // Assert
        assert!(matches!(res, Err(DensityError::Format { .. })));
    }
}
