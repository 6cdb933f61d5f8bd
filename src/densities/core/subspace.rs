//! Subspace descriptors — shared bases for the constrained Gaussians.
//!
//! Purpose
//! -------
//! A subspace descriptor is an immutable basis shared (through `Arc`) by
//! every density built against it. Densities store only a coefficient
//! vector λ; the descriptor turns λ back into matrices.
//!
//! - [`PrecisionSubspace`]: symmetric `dim × dim` matrices `B_k`, with
//!   precision `P(λ) = Σ_k λ_k B_k`.
//! - [`ExponentialSubspace`]: pairs `(v_k, S_k)` of a vector and a symmetric
//!   matrix, with natural parameters `ψ(λ) = Σ_k λ_k v_k` and
//!   `P(λ) = Σ_k λ_k S_k`.
//!
//! Key behaviors
//! -------------
//! - Constructors validate shapes and symmetry and precompute the Gram
//!   matrix of the basis under the Frobenius inner product (plus the vector
//!   dot product for exponential pairs). A singular Gram matrix, i.e. a
//!   linearly dependent basis, is rejected.
//! - `project` returns the least-squares coefficients of a target matrix
//!   (or natural-parameter pair) by solving the Gram system. It is exact
//!   when the target lies in the span of the basis.
//! - `full_symmetric` / `diagonal` / `full` build the canonical bases that
//!   span every symmetric matrix, every diagonal matrix, or every natural
//!   parameter pair.
//!
//! Invariants & assumptions
//! ------------------------
//! - Basis matrices are symmetric to within [`SYMMETRY_TOLERANCE`] relative
//!   to their largest entry.
//! - The Gram matrix is symmetric positive definite.
use crate::densities::{
    core::{
        linalg::{frobenius, is_well_conditioned, solve_spd},
        validation::{validate_dim, validate_square},
    },
    errors::{DensityError, DensityResult},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Relative tolerance for the symmetry check on basis matrices.
pub const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// Shared basis of symmetric matrices for precision-constrained Gaussians.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecisionSubspace {
    dim: usize,
    basis: Vec<Array2<f64>>,
    gram: Array2<f64>,
}

impl PrecisionSubspace {
    /// Build a subspace from explicit basis matrices.
    ///
    /// # Errors
    /// - [`DensityError::InvalidSubspace`] for an empty basis, a
    ///   non-symmetric element, or linearly dependent elements.
    /// - [`DensityError::DimensionMismatch`] for an element that is not
    ///   `dim × dim`.
    pub fn new(dim: usize, basis: Vec<Array2<f64>>) -> DensityResult<Self> {
        if basis.is_empty() {
            return Err(DensityError::InvalidSubspace { reason: "The basis must not be empty." });
        }
        for b in &basis {
            validate_square(dim, b.view())?;
            check_symmetric(b.view())?;
        }
        let n = basis.len();
        let gram = Array2::from_shape_fn((n, n), |(k, l)| frobenius(basis[k].view(), basis[l].view()));
        check_gram(gram.view())?;
        Ok(Self { dim, basis, gram })
    }

    /// Basis spanning every symmetric `dim × dim` matrix:
    /// `E_ii` for each `i`, then `E_ij + E_ji` for each `i < j`.
    pub fn full_symmetric(dim: usize) -> DensityResult<Self> {
        Self::new(dim, symmetric_unit_basis(dim))
    }

    /// Basis spanning every diagonal `dim × dim` matrix.
    pub fn diagonal(dim: usize) -> DensityResult<Self> {
        let basis = (0..dim)
            .map(|i| {
                let mut e = Array2::zeros((dim, dim));
                e[[i, i]] = 1.0;
                e
            })
            .collect();
        Self::new(dim, basis)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of basis elements (length of every coefficient vector).
    pub fn len(&self) -> usize {
        self.basis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.basis.is_empty()
    }

    pub fn basis(&self) -> &[Array2<f64>] {
        &self.basis
    }

    /// `P(λ) = Σ_k λ_k B_k`.
    ///
    /// # Errors
    /// [`DensityError::DimensionMismatch`] if `coeffs.len() != self.len()`.
    pub fn precision(&self, coeffs: ArrayView1<f64>) -> DensityResult<Array2<f64>> {
        validate_dim(self.len(), coeffs.len())?;
        let mut p = Array2::zeros((self.dim, self.dim));
        for (b, &c) in self.basis.iter().zip(coeffs.iter()) {
            p.scaled_add(c, b);
        }
        Ok(p)
    }

    /// Least-squares coefficients of `target` in the Frobenius norm.
    ///
    /// # Errors
    /// - [`DensityError::DimensionMismatch`] for a target of the wrong shape.
    /// - [`DensityError::Numerical`] if the Gram system cannot be solved.
    pub fn project(&self, target: ArrayView2<f64>) -> DensityResult<Array1<f64>> {
        validate_square(self.dim, target)?;
        let rhs = Array1::from_iter(self.basis.iter().map(|b| frobenius(b.view(), target)));
        solve_spd(self.gram.view(), rhs.view())
            .ok_or(DensityError::Numerical { reason: "Singular precision-subspace basis solve." })
    }
}

/// Shared basis of `(vector, matrix)` pairs for exponential-subspace
/// constrained Gaussians.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialSubspace {
    dim: usize,
    linear: Vec<Array1<f64>>,
    quadratic: Vec<Array2<f64>>,
    gram: Array2<f64>,
}

impl ExponentialSubspace {
    /// Build a subspace from explicit `(v_k, S_k)` pairs.
    ///
    /// # Errors
    /// - [`DensityError::InvalidSubspace`] for an empty basis, a
    ///   non-symmetric `S_k`, or linearly dependent pairs.
    /// - [`DensityError::DimensionMismatch`] for wrongly shaped elements.
    pub fn new(dim: usize, basis: Vec<(Array1<f64>, Array2<f64>)>) -> DensityResult<Self> {
        if basis.is_empty() {
            return Err(DensityError::InvalidSubspace { reason: "The basis must not be empty." });
        }
        for (v, s) in &basis {
            validate_dim(dim, v.len())?;
            validate_square(dim, s.view())?;
            check_symmetric(s.view())?;
        }
        let (linear, quadratic): (Vec<_>, Vec<_>) = basis.into_iter().unzip();
        let n = linear.len();
        let gram = Array2::from_shape_fn((n, n), |(k, l)| {
            linear[k].dot(&linear[l]) + frobenius(quadratic[k].view(), quadratic[l].view())
        });
        check_gram(gram.view())?;
        Ok(Self { dim, linear, quadratic, gram })
    }

    /// Basis spanning every natural-parameter pair: `(e_i, 0)` for each `i`,
    /// followed by `(0, B)` for each element `B` of
    /// [`PrecisionSubspace::full_symmetric`].
    pub fn full(dim: usize) -> DensityResult<Self> {
        let mut basis: Vec<(Array1<f64>, Array2<f64>)> = (0..dim)
            .map(|i| {
                let mut e = Array1::zeros(dim);
                e[i] = 1.0;
                (e, Array2::zeros((dim, dim)))
            })
            .collect();
        basis.extend(symmetric_unit_basis(dim).into_iter().map(|b| (Array1::zeros(dim), b)));
        Self::new(dim, basis)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.linear.len()
    }

    pub fn is_empty(&self) -> bool {
        self.linear.is_empty()
    }

    /// Linear parts `v_k`.
    pub fn linear(&self) -> &[Array1<f64>] {
        &self.linear
    }

    /// Quadratic parts `S_k`.
    pub fn quadratic(&self) -> &[Array2<f64>] {
        &self.quadratic
    }

    /// Natural parameters `(ψ(λ), P(λ))`.
    ///
    /// # Errors
    /// [`DensityError::DimensionMismatch`] if `coeffs.len() != self.len()`.
    pub fn natural(&self, coeffs: ArrayView1<f64>) -> DensityResult<(Array1<f64>, Array2<f64>)> {
        validate_dim(self.len(), coeffs.len())?;
        let mut psi = Array1::zeros(self.dim);
        let mut p = Array2::zeros((self.dim, self.dim));
        for ((v, s), &c) in self.linear.iter().zip(self.quadratic.iter()).zip(coeffs.iter()) {
            psi.scaled_add(c, v);
            p.scaled_add(c, s);
        }
        Ok((psi, p))
    }

    /// Least-squares coefficients of the pair `(psi, p)`.
    ///
    /// # Errors
    /// - [`DensityError::DimensionMismatch`] for wrongly shaped targets.
    /// - [`DensityError::Numerical`] if the Gram system cannot be solved.
    pub fn project(&self, psi: ArrayView1<f64>, p: ArrayView2<f64>) -> DensityResult<Array1<f64>> {
        validate_dim(self.dim, psi.len())?;
        validate_square(self.dim, p)?;
        let rhs = Array1::from_iter(
            self.linear
                .iter()
                .zip(self.quadratic.iter())
                .map(|(v, s)| v.dot(&psi) + frobenius(s.view(), p)),
        );
        solve_spd(self.gram.view(), rhs.view()).ok_or(DensityError::Numerical {
            reason: "Singular exponential-subspace basis solve.",
        })
    }
}

fn symmetric_unit_basis(dim: usize) -> Vec<Array2<f64>> {
    let mut basis = Vec::with_capacity(dim * (dim + 1) / 2);
    for i in 0..dim {
        let mut e = Array2::zeros((dim, dim));
        e[[i, i]] = 1.0;
        basis.push(e);
    }
    for i in 0..dim {
        for j in (i + 1)..dim {
            let mut e = Array2::zeros((dim, dim));
            e[[i, j]] = 1.0;
            e[[j, i]] = 1.0;
            basis.push(e);
        }
    }
    basis
}

fn check_symmetric(m: ArrayView2<f64>) -> DensityResult<()> {
    let scale = m.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())).max(1.0);
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (m[[i, j]], m[[j, i]]);
            if !a.is_finite() || !b.is_finite() || (a - b).abs() > SYMMETRY_TOLERANCE * scale {
                return Err(DensityError::InvalidSubspace {
                    reason: "Basis matrices must be finite and symmetric.",
                });
            }
        }
    }
    if m.diag().iter().any(|v| !v.is_finite()) {
        return Err(DensityError::InvalidSubspace {
            reason: "Basis matrices must be finite and symmetric.",
        });
    }
    Ok(())
}

/// Reject a Gram matrix whose Cholesky pivots collapse to round-off size
/// relative to its diagonal, i.e. a linearly dependent basis.
fn check_gram(gram: ArrayView2<f64>) -> DensityResult<()> {
    if !is_well_conditioned(gram) {
        return Err(DensityError::InvalidSubspace {
            reason: "Basis elements are linearly dependent.",
        });
    }
    Ok(())
}
