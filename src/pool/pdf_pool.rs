//! PdfPool — indexed arena of densities with a per-frame likelihood cache.
//!
//! Purpose
//! -------
//! Own every density of an acoustic model in one place so mixtures can
//! refer to them by index, and score each density at most once per feature
//! frame.
//!
//! Key behaviors
//! -------------
//! - The cache holds one `Option<f64>` log-likelihood per slot; `None` marks
//!   a slot not filled since the last [`PdfPool::reset_cache`] or since its
//!   density changed.
//! - Cache reads never recompute. Reading an unfilled slot is an explicit
//!   [`DensityError::UncachedLikelihood`], never a stale value.
//! - Fills are atomic: the feature and all indices are validated and every
//!   value computed before any slot is written.
//! - [`PdfPool::read_gk_from`] parses the whole stream before replacing the
//!   pool, so a failed load leaves it unchanged.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every stored density has dimension `dim()`.
//! - `cache.len() == densities.len()` at all times.
//! - Single writer: all cache fills take `&mut self`. Threads wanting
//!   private caches clone the pool.
use crate::{
    densities::{
        core::validation::{validate_dim, validate_feature},
        errors::{DensityError, DensityResult},
        gaussians::{Density, Pdf},
    },
    pool::gk::{read_pool, write_pool},
};
use ndarray::ArrayView1;
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PdfPool {
    dim: usize,
    densities: Vec<Density>,
    cache: Vec<Option<f64>>,
}

impl PdfPool {
    /// Empty pool for densities of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self { dim, densities: Vec::new(), cache: Vec::new() }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn size(&self) -> usize {
        self.densities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.densities.is_empty()
    }

    /// Remove every density; the dimensionality is kept.
    pub fn reset(&mut self) {
        self.densities.clear();
        self.cache.clear();
    }

    pub fn densities(&self) -> &[Density] {
        &self.densities
    }

    fn check_index(&self, index: usize) -> DensityResult<()> {
        if index >= self.densities.len() {
            return Err(DensityError::IndexOutOfRange { index, size: self.densities.len() });
        }
        Ok(())
    }

    pub fn get_pdf(&self, index: usize) -> DensityResult<&Density> {
        self.check_index(index)?;
        Ok(&self.densities[index])
    }

    /// Mutable access to one density. Its cache slot is invalidated since
    /// the caller may change its parameters.
    pub fn get_pdf_mut(&mut self, index: usize) -> DensityResult<&mut Density> {
        self.check_index(index)?;
        self.cache[index] = None;
        Ok(&mut self.densities[index])
    }

    /// Replace the density at `index`, or append when `index == size()`.
    ///
    /// # Errors
    /// - [`DensityError::DimensionMismatch`] for a foreign dimension.
    /// - [`DensityError::IndexOutOfRange`] for `index > size()`.
    pub fn set_pdf(&mut self, index: usize, pdf: impl Into<Density>) -> DensityResult<()> {
        let pdf = pdf.into();
        validate_dim(self.dim, pdf.dim())?;
        if index == self.densities.len() {
            self.densities.push(pdf);
            self.cache.push(None);
            return Ok(());
        }
        self.check_index(index)?;
        self.densities[index] = pdf;
        self.cache[index] = None;
        Ok(())
    }

    /// Append a density and return its index.
    pub fn add_pdf(&mut self, pdf: impl Into<Density>) -> DensityResult<usize> {
        let index = self.densities.len();
        self.set_pdf(index, pdf)?;
        Ok(index)
    }

    // ---- Cache ----

    /// Mark every slot as not yet computed.
    pub fn reset_cache(&mut self) {
        self.cache.iter_mut().for_each(|slot| *slot = None);
    }

    /// Fill every slot with `log p_i(f)`.
    pub fn cache_likelihood(&mut self, f: ArrayView1<f64>) -> DensityResult<()> {
        validate_feature(self.dim, f)?;
        let values = self
            .densities
            .iter()
            .map(|d| d.compute_log_likelihood(f))
            .collect::<DensityResult<Vec<_>>>()?;
        for (slot, v) in self.cache.iter_mut().zip(values) {
            *slot = Some(v);
        }
        Ok(())
    }

    /// Fill slot `index` only.
    pub fn cache_likelihood_index(&mut self, f: ArrayView1<f64>, index: usize) -> DensityResult<()> {
        self.check_index(index)?;
        let v = self.densities[index].compute_log_likelihood(f)?;
        self.cache[index] = Some(v);
        Ok(())
    }

    /// Fill the listed slots; nothing is written unless every index is valid
    /// and every density evaluates.
    pub fn cache_likelihood_indices(
        &mut self, f: ArrayView1<f64>, indices: &[usize],
    ) -> DensityResult<()> {
        validate_feature(self.dim, f)?;
        for &i in indices {
            self.check_index(i)?;
        }
        let values = indices
            .iter()
            .map(|&i| self.densities[i].compute_log_likelihood(f))
            .collect::<DensityResult<Vec<_>>>()?;
        for (&i, v) in indices.iter().zip(values) {
            self.cache[i] = Some(v);
        }
        Ok(())
    }

    /// Cached `log p_i(f)`.
    ///
    /// # Errors
    /// - [`DensityError::IndexOutOfRange`] for a bad index.
    /// - [`DensityError::UncachedLikelihood`] for a slot not filled since the
    ///   last reset.
    pub fn get_log_likelihood(&self, index: usize) -> DensityResult<f64> {
        self.check_index(index)?;
        self.cache[index].ok_or(DensityError::UncachedLikelihood { index })
    }

    /// Cached `p_i(f)`.
    pub fn get_likelihood(&self, index: usize) -> DensityResult<f64> {
        Ok(self.get_log_likelihood(index)?.exp())
    }

    /// `p_i(f)` computed in place, bypassing the cache.
    pub fn compute_likelihood(&self, f: ArrayView1<f64>, index: usize) -> DensityResult<f64> {
        self.get_pdf(index)?.compute_likelihood(f)
    }

    /// `log p_i(f)` computed in place, bypassing the cache.
    pub fn compute_log_likelihood(&self, f: ArrayView1<f64>, index: usize) -> DensityResult<f64> {
        self.get_pdf(index)?.compute_log_likelihood(f)
    }

    // ---- Files ----

    /// Replace the pool with the contents of a gk file.
    pub fn read_gk<P: AsRef<Path>>(&mut self, path: P) -> DensityResult<()> {
        let file = File::open(path)?;
        self.read_gk_from(BufReader::new(file))
    }

    pub fn write_gk<P: AsRef<Path>>(&self, path: P) -> DensityResult<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write_gk_to(&mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Replace the pool with a gk stream. The pool is untouched on error;
    /// on success every cache slot is unfilled.
    pub fn read_gk_from<R: BufRead>(&mut self, reader: R) -> DensityResult<()> {
        let contents = read_pool(reader)?;
        self.cache = vec![None; contents.densities.len()];
        self.dim = contents.dim;
        self.densities = contents.densities;
        Ok(())
    }

    pub fn write_gk_to<W: Write>(&self, w: &mut W) -> DensityResult<()> {
        write_pool(w, self.dim, &self.densities)
    }
}
