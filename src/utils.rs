//! Helpers for the PyO3 boundary: array extraction and option builders.
#[cfg(feature = "python-bindings")]
use ndarray::Array1;

#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    densities::core::options::{EbwOptions, EstimationOptions, DEFAULT_EBW_E, DEFAULT_VARIANCE_FLOOR},
    optimization::loglik_optimizer::traits::{LineSearcher, MLEOptions, Tolerances},
};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // Vec → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray1,
};

/// Accept a 1-D `numpy.ndarray`, a pandas `Series`, or any float sequence
/// and return a contiguous read-only `f64` view.
#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        if arr_ro.as_slice().is_ok() {
            return Ok(arr_ro);
        }
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(series_ro) = obj.extract::<PyReadonlyArray1<f64>>() {
            if series_ro.as_slice().is_ok() {
                return Ok(series_ro);
            }
        }
    }

    let vec: Vec<f64> = raw_data.extract().map_err(|_| {
        pyo3::exceptions::PyTypeError::new_err(
            "expected a 1-D numpy.ndarray, pandas.Series, or sequence of float64",
        )
    })?;
    Ok(vec.into_pyarray(py).readonly())
}

/// Copy a Python feature vector into an owned [`Array1`], rejecting NaNs.
#[cfg(feature = "python-bindings")]
pub fn extract_feature<'py>(py: Python<'py>, raw: &Bound<'py, PyAny>) -> PyResult<Array1<f64>> {
    let arr = extract_f64_array(py, raw)?;
    let slice = arr.as_slice().map_err(|_| {
        PyValueError::new_err("feature must be a 1-D contiguous float64 array or sequence")
    })?;
    if slice.iter().any(|v| v.is_nan()) {
        return Err(PyValueError::new_err("feature must not contain NaN values"));
    }
    Ok(Array1::from(slice.to_vec()))
}

/// Build [`EstimationOptions`] from optional Python keyword arguments.
///
/// Missing values fall back to the Rust defaults; the optimizer block only
/// matters for the precision- and exponential-subspace variants.
#[cfg(feature = "python-bindings")]
pub fn extract_estimation_opts(
    variance_floor: Option<f64>, ebw_e: Option<f64>, tol_grad: Option<f64>,
    tol_cost: Option<f64>, max_iter: Option<usize>, line_searcher: Option<&str>,
    lbfgs_mem: Option<usize>,
) -> PyResult<EstimationOptions> {
    let ebw = EbwOptions::new(ebw_e.unwrap_or(DEFAULT_EBW_E))?;
    let mle = extract_mle_opts(tol_grad, tol_cost, max_iter, line_searcher, lbfgs_mem)?;
    Ok(EstimationOptions::new(variance_floor.unwrap_or(DEFAULT_VARIANCE_FLOOR), ebw, mle)?)
}

#[cfg(feature = "python-bindings")]
fn extract_mle_opts(
    tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    line_searcher: Option<&str>, lbfgs_mem: Option<usize>,
) -> PyResult<MLEOptions> {
    use std::str::FromStr;

    use crate::densities::errors::DensityError;

    if tol_grad.is_none()
        && tol_cost.is_none()
        && max_iter.is_none()
        && line_searcher.is_none()
        && lbfgs_mem.is_none()
    {
        return Ok(MLEOptions::default());
    }

    let defaults = MLEOptions::default();
    let tols = Tolerances::new(
        tol_grad.or(defaults.tols.tol_grad),
        tol_cost,
        max_iter.or(defaults.tols.max_iter),
    )
    .map_err(DensityError::from)?;

    let ls = match line_searcher {
        Some(name) => LineSearcher::from_str(name).map_err(DensityError::from)?,
        None => defaults.line_searcher,
    };

    Ok(MLEOptions::new(tols, ls, false, lbfgs_mem).map_err(DensityError::from)?)
}
