//! linalg — `ndarray` ↔ `nalgebra` bridge and the decompositions the
//! densities need.
//!
//! Purpose
//! -------
//! Densities store their parameters in `ndarray` containers, while Cholesky
//! factorizations, inverses, and linear solves come from `nalgebra`. This
//! module copies matrices across the boundary and wraps the handful of
//! factorizations used by the full-covariance and subspace variants.
//!
//! Key behaviors
//! -------------
//! - [`fill_dmatrix`] / [`to_array2`] copy between `Array2` and `DMatrix`.
//! - [`spd_factor`] Cholesky-factors a symmetric matrix, returning its
//!   inverse and log-determinant, or `None` when the matrix is not
//!   positive definite (or holds non-finite entries).
//! - [`min_relative_pivot`] measures how far a symmetric matrix is from
//!   singular, so that round-off on a rank-deficient matrix is not taken
//!   for positive definiteness.
//! - [`solve_spd`] solves `A x = b` for symmetric positive-definite `A`,
//!   used for Gram-matrix projections onto subspace bases.
//! - Small helpers: [`outer`], [`symmetrize`], [`trace_product`],
//!   [`frobenius`], [`quadratic_form`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs to [`spd_factor`] are symmetric; only the lower triangle is read
//!   by the Cholesky routine.
//! - Log-determinants are computed as `2 Σ log L_ii` from the Cholesky
//!   factor, which avoids under/overflow of the determinant itself.
use crate::densities::errors::{DensityError, DensityResult};
use nalgebra::{Cholesky, DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use statrs::consts::LN_SQRT_2PI;

/// `ln(2π)`, the per-dimension term of every Gaussian normalizer.
pub const LN_2PI: f64 = 2.0 * LN_SQRT_2PI;

/// Smallest squared Cholesky pivot, relative to the largest diagonal entry,
/// that [`is_well_conditioned`] accepts.
pub const PIVOT_TOLERANCE: f64 = 1e-12;

/// Inverse and log-determinant of a symmetric positive-definite matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SpdFactor {
    pub inverse: Array2<f64>,
    pub log_det: f64,
}

/// Copy a square `ndarray` matrix into a `nalgebra::DMatrix`.
///
/// Writes column by column to follow `DMatrix`'s column-major layout.
pub fn fill_dmatrix(src: ArrayView2<f64>, dst: &mut DMatrix<f64>) {
    let (rows, cols) = src.dim();
    for j in 0..cols {
        for i in 0..rows {
            dst[(i, j)] = src[[i, j]];
        }
    }
}

/// Copy a `nalgebra::DMatrix` back into an owned `Array2`.
pub fn to_array2(src: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((src.nrows(), src.ncols()), |(i, j)| src[(i, j)])
}

/// Cholesky-factor a symmetric matrix.
///
/// Returns `None` when the matrix is not square, holds non-finite entries,
/// or is not positive definite.
pub fn spd_factor(a: ArrayView2<f64>) -> Option<SpdFactor> {
    let (rows, cols) = a.dim();
    if rows != cols || a.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let mut m = DMatrix::<f64>::zeros(rows, cols);
    fill_dmatrix(a, &mut m);
    let chol = Cholesky::new(m)?;
    let l = chol.l_dirty();
    let mut log_det = 0.0;
    for i in 0..rows {
        log_det += l[(i, i)].ln();
    }
    let inverse = to_array2(&chol.inverse());
    Some(SpdFactor { inverse, log_det: 2.0 * log_det })
}

/// [`spd_factor`] that reports failure as [`DensityError::Numerical`].
pub fn spd_factor_or(a: ArrayView2<f64>, reason: &'static str) -> DensityResult<SpdFactor> {
    spd_factor(a).ok_or(DensityError::Numerical { reason })
}

/// `true` when `a` is symmetric positive definite (Cholesky succeeds).
pub fn is_positive_definite(a: ArrayView2<f64>) -> bool {
    spd_factor(a).is_some()
}

/// `min_i L_ii² / max_i A_ii` over the Cholesky factor `L` of `a`.
///
/// Returns `None` when `a` is not square, holds non-finite entries, has no
/// positive diagonal entry, or fails to factor.
pub fn min_relative_pivot(a: ArrayView2<f64>) -> Option<f64> {
    let (rows, cols) = a.dim();
    if rows != cols || a.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let scale = a.diag().iter().fold(0.0_f64, |acc, v| acc.max(*v));
    if scale <= 0.0 {
        return None;
    }
    let mut m = DMatrix::<f64>::zeros(rows, cols);
    fill_dmatrix(a, &mut m);
    let chol = Cholesky::new(m)?;
    let l = chol.l_dirty();
    (0..rows).map(|i| l[(i, i)] * l[(i, i)] / scale).reduce(f64::min)
}

/// `true` when `a` factors with every relative pivot above
/// [`PIVOT_TOLERANCE`].
pub fn is_well_conditioned(a: ArrayView2<f64>) -> bool {
    min_relative_pivot(a).is_some_and(|p| p > PIVOT_TOLERANCE)
}

/// Solve `A x = b` for symmetric positive-definite `A` via Cholesky.
///
/// Returns `None` when `A` is singular or indefinite.
pub fn solve_spd(a: ArrayView2<f64>, b: ArrayView1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    if a.dim() != (n, n) {
        return None;
    }
    let mut m = DMatrix::<f64>::zeros(n, n);
    fill_dmatrix(a, &mut m);
    let chol = Cholesky::new(m)?;
    let rhs = DVector::from_iterator(n, b.iter().copied());
    let x = chol.solve(&rhs);
    if x.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(Array1::from_iter(x.iter().copied()))
}

/// Outer product `a bᵀ`.
pub fn outer(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j])
}

/// Replace `a` by `(a + aᵀ) / 2` in place.
pub fn symmetrize(a: &mut Array2<f64>) {
    let n = a.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (a[[i, j]] + a[[j, i]]);
            a[[i, j]] = avg;
            a[[j, i]] = avg;
        }
    }
}

/// `tr(A B)` without forming the product.
pub fn trace_product(a: ArrayView2<f64>, b: ArrayView2<f64>) -> f64 {
    let mut acc = 0.0;
    for ((i, j), &v) in a.indexed_iter() {
        acc += v * b[[j, i]];
    }
    acc
}

/// Frobenius inner product `Σ_ij A_ij B_ij`.
pub fn frobenius(a: ArrayView2<f64>, b: ArrayView2<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// `xᵀ A x`.
pub fn quadratic_form(a: ArrayView2<f64>, x: ArrayView1<f64>) -> f64 {
    x.dot(&a.dot(&x))
}
