//! loglik_optimizer::types — shared numeric aliases and solver wiring.
//!
//! Purpose
//! -------
//! Centralize the numeric types and solver aliases used when fitting
//! subspace coefficients, so the rest of the optimizer code stays agnostic
//! to `ndarray` and argmin generics.
//!
//! Conventions
//! -----------
//! - `Theta` is the coefficient vector λ of a subspace-constrained density;
//!   its length equals the number of basis elements in the subspace.
//! - `Cost` is the negated auxiliary log-likelihood; higher layers only see
//!   log-likelihood values.
//! - `DEFAULT_LBFGS_MEM` is the history size used unless the caller
//!   overrides it in `MLEOptions`.
use argmin::solver::{
    linesearch::{
        condition::ArmijoCondition, BacktrackingLineSearch, HagerZhangLineSearch,
        MoreThuenteLineSearch,
    },
    quasinewton::LBFGS,
};
use ndarray::Array1;
use std::collections::HashMap;

/// Coefficient vector `λ` being optimized.
pub type Theta = Array1<f64>;

/// Gradient vector `∇ℓ(λ)` or `∇c(λ)`, same length as [`Theta`].
pub type Grad = Array1<f64>;

/// Scalar objective value used by the solver (`c(λ) = -ℓ(λ)`).
pub type Cost = f64;

/// Function-evaluation counters as reported by the solver.
pub type FnEvalMap = HashMap<String, u64>;

/// Default history size (`m`) for L-BFGS runs.
pub const DEFAULT_LBFGS_MEM: usize = 7;

/// Sufficient-decrease constant for the Armijo backtracking search.
pub const ARMIJO_C: f64 = 1e-4;

/// Step contraction factor for the Armijo backtracking search.
pub const BACKTRACKING_RHO: f64 = 0.5;

/// Hager–Zhang line search specialized to this crate’s numeric types.
pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;

/// More–Thuente line search specialized to this crate’s numeric types.
pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;

/// Armijo backtracking line search specialized to this crate’s numeric types.
pub type BacktrackingLS = BacktrackingLineSearch<Theta, Grad, ArmijoCondition<Cost>, Cost>;

/// L-BFGS solver wired to the Hager–Zhang line search.
pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;

/// L-BFGS solver wired to the More–Thuente line search.
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;

/// L-BFGS solver wired to the Armijo backtracking line search.
pub type LbfgsBacktracking = LBFGS<BacktrackingLS, Theta, Grad, Cost>;
