//! rust_densities — Gaussian density pools with ML/MMI re-estimation and
//! optional Python bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that exposes
//! density pools and mixtures to Python via the `_rust_densities` extension
//! module.
//!
//! Key behaviors
//! -------------
//! - Re-export the core Rust modules (`densities`, `pool`, `optimization`) as
//!   the public crate surface.
//! - Define `#[pyclass]` wrappers and the `#[pymodule]` initializer for the
//!   `_rust_densities` Python extension when `python-bindings` is enabled.
//! - Register the `rust_densities.pool` submodule in `sys.modules` so that
//!   dot-notation imports work.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner modules; this file performs FFI
//!   glue, input conversion, and error mapping only.
//! - Density indices exposed to Python are the pool's own `usize` indices;
//!   mixtures hold indices, never densities.
//!
//! Conventions
//! -----------
//! - Errors from core Rust code are [`densities::errors::DensityError`]
//!   values internally and surface as Python `ValueError`s.
//! - Estimation modes are passed as strings (`"ml"`, `"mmi"`).
//!
//! Downstream usage
//! ----------------
//! - Native Rust code should depend on [`pool::PdfPool`],
//!   [`pool::Mixture`], and the variants under [`densities::gaussians`]
//!   directly and ignore the PyO3 items.
//!
//! Testing notes
//! -------------
//! - Core behavior is covered by unit tests in the inner modules and by the
//!   integration test under `tests/`.

pub mod densities;
pub mod optimization;
pub mod pool;
pub mod utils;

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    densities::{
        core::mode::EstimationMode,
        gaussians::{DiagonalGaussian, Gaussian},
    },
    pool::{Mixture, PdfPool},
    utils::{extract_estimation_opts, extract_feature},
};

/// PdfPool — Python-facing wrapper around [`PdfPool`].
///
/// Purpose
/// -------
/// Let Python callers load and save pool files, fill the likelihood cache
/// for one observation, and drive per-density accumulation and
/// re-estimation by index.
///
/// Parameters
/// ----------
/// Constructed from Python via `PdfPool(dim)`:
/// - `dim`: `usize`
///   Feature dimension shared by every density in the pool.
///
/// Notes
/// -----
/// - Densities of the constrained variants enter the pool through
///   `read_gk`; `add_diagonal` covers the common programmatic case.
#[cfg(feature = "python-bindings")]
#[pyclass(name = "PdfPool", module = "rust_densities.pool")]
pub struct PyPdfPool {
    inner: PdfPool,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl PyPdfPool {
    #[new]
    #[pyo3(text_signature = "(dim, /)")]
    pub fn new(dim: usize) -> Self {
        PyPdfPool { inner: PdfPool::new(dim) }
    }

    #[getter]
    pub fn dim(&self) -> usize {
        self.inner.dim()
    }

    #[getter]
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    pub fn __len__(&self) -> usize {
        self.inner.size()
    }

    /// Replace the pool contents with the densities of a pool file.
    pub fn read_gk(&mut self, path: &str) -> PyResult<()> {
        Ok(self.inner.read_gk(path)?)
    }

    pub fn write_gk(&self, path: &str) -> PyResult<()> {
        Ok(self.inner.write_gk(path)?)
    }

    /// Append a diagonal density and return its index.
    pub fn add_diagonal<'py>(
        &mut self, py: Python<'py>, mean: &Bound<'py, PyAny>, var: &Bound<'py, PyAny>,
    ) -> PyResult<usize> {
        let mean = extract_feature(py, mean)?;
        let var = extract_feature(py, var)?;
        let g = DiagonalGaussian::from_parameters(mean, var)?;
        Ok(self.inner.add_pdf(g)?)
    }

    /// Variant tag of the density at `index` (`"diag"`, `"full"`, ...).
    pub fn tag(&self, index: usize) -> PyResult<&'static str> {
        Ok(self.inner.get_pdf(index)?.tag())
    }

    pub fn get_mean(&self, index: usize) -> PyResult<Vec<f64>> {
        Ok(self.inner.get_pdf(index)?.get_mean().to_vec())
    }

    pub fn cache_likelihood<'py>(&mut self, py: Python<'py>, f: &Bound<'py, PyAny>) -> PyResult<()> {
        let f = extract_feature(py, f)?;
        Ok(self.inner.cache_likelihood(f.view())?)
    }

    pub fn reset_cache(&mut self) {
        self.inner.reset_cache();
    }

    pub fn get_likelihood(&self, index: usize) -> PyResult<f64> {
        Ok(self.inner.get_likelihood(index)?)
    }

    pub fn get_log_likelihood(&self, index: usize) -> PyResult<f64> {
        Ok(self.inner.get_log_likelihood(index)?)
    }

    pub fn compute_log_likelihood<'py>(
        &self, py: Python<'py>, f: &Bound<'py, PyAny>, index: usize,
    ) -> PyResult<f64> {
        let f = extract_feature(py, f)?;
        Ok(self.inner.compute_log_likelihood(f.view(), index)?)
    }

    pub fn start_accumulating(&mut self, index: usize) -> PyResult<()> {
        self.inner.get_pdf_mut(index)?.start_accumulating();
        Ok(())
    }

    pub fn accumulate_ml<'py>(
        &mut self, py: Python<'py>, index: usize, prior: f64, f: &Bound<'py, PyAny>,
    ) -> PyResult<()> {
        let f = extract_feature(py, f)?;
        Ok(self.inner.get_pdf_mut(index)?.accumulate_ml(prior, f.view())?)
    }

    pub fn accumulate_mmi_denominator<'py>(
        &mut self, py: Python<'py>, index: usize, priors: Vec<f64>,
        features: Vec<Bound<'py, PyAny>>,
    ) -> PyResult<()> {
        let owned = features
            .iter()
            .map(|raw| extract_feature(py, raw))
            .collect::<PyResult<Vec<_>>>()?;
        let views: Vec<_> = owned.iter().map(|f| f.view()).collect();
        Ok(self.inner.get_pdf_mut(index)?.accumulate_mmi_denominator(&priors, &views)?)
    }

    /// Re-estimate the density at `index` from its accumulated statistics.
    #[pyo3(
        signature = (
            index,
            mode = "ml",
            variance_floor = None,
            ebw_e = None,
            tol_grad = None,
            tol_cost = None,
            max_iter = None,
            line_searcher = None,
            lbfgs_mem = None,
        ),
        text_signature = "(index, /, mode='ml', variance_floor=None, ebw_e=None, tol_grad=None, \
                          tol_cost=None, max_iter=None, line_searcher=None, lbfgs_mem=None)"
    )]
    pub fn estimate_parameters(
        &mut self, index: usize, mode: &str, variance_floor: Option<f64>, ebw_e: Option<f64>,
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
        line_searcher: Option<&str>, lbfgs_mem: Option<usize>,
    ) -> PyResult<()> {
        let mode: EstimationMode = mode.parse()?;
        let opts = extract_estimation_opts(
            variance_floor,
            ebw_e,
            tol_grad,
            tol_cost,
            max_iter,
            line_searcher,
            lbfgs_mem,
        )?;
        Ok(self.inner.get_pdf_mut(index)?.estimate_parameters(mode, &opts)?)
    }
}

/// Mixture — Python-facing wrapper around [`Mixture`].
///
/// Components are `(index, weight)` pairs into a `PdfPool` passed to each
/// evaluation call.
#[cfg(feature = "python-bindings")]
#[pyclass(name = "Mixture", module = "rust_densities.pool")]
#[derive(Default)]
pub struct PyMixture {
    inner: Mixture,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl PyMixture {
    #[new]
    pub fn new() -> Self {
        PyMixture::default()
    }

    #[getter]
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    #[getter]
    pub fn components(&self) -> Vec<(usize, f64)> {
        self.inner.get_components().iter().map(|c| (c.index, c.weight)).collect()
    }

    pub fn add_component(&mut self, index: usize, weight: f64) -> PyResult<()> {
        Ok(self.inner.add_component(index, weight)?)
    }

    pub fn normalize_weights(&mut self) -> PyResult<()> {
        Ok(self.inner.normalize_weights()?)
    }

    /// Weighted sum of the pool's cached likelihoods.
    pub fn compute_likelihood(&self, pool: PyRef<'_, PyPdfPool>) -> PyResult<f64> {
        Ok(self.inner.compute_likelihood(&pool.inner)?)
    }

    pub fn compute_log_likelihood(&self, pool: PyRef<'_, PyPdfPool>) -> PyResult<f64> {
        Ok(self.inner.compute_log_likelihood(&pool.inner)?)
    }

    pub fn compute_log_likelihood_of<'py>(
        &self, py: Python<'py>, f: &Bound<'py, PyAny>, pool: PyRef<'py, PyPdfPool>,
    ) -> PyResult<f64> {
        let f = extract_feature(py, f)?;
        Ok(self.inner.compute_log_likelihood_of(f.view(), &pool.inner)?)
    }

    /// Split component `k`, appending the second daughter to `pool`.
    pub fn split_component(&mut self, mut pool: PyRefMut<'_, PyPdfPool>, k: usize) -> PyResult<usize> {
        Ok(self.inner.split_component(&mut pool.inner, k)?)
    }
}

#[cfg(feature = "python-bindings")]
#[pymodule]
fn _rust_densities<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    let pool_mod = PyModule::new(_py, "pool")?;
    pool(_py, m, &pool_mod)?;

    // Manually add submodules into sys.modules to allow for dot notation.
    _py.import("sys")?.getattr("modules")?.set_item("rust_densities.pool", pool_mod)?;
    Ok(())
}

#[cfg(feature = "python-bindings")]
fn pool<'py>(
    _py: Python, rust_densities: &Bound<'py, PyModule>, m: &Bound<'py, PyModule>,
) -> PyResult<()> {
    m.add_class::<PyPdfPool>()?;
    m.add_class::<PyMixture>()?;
    rust_densities.add_submodule(m)?;
    Ok(())
}
