//! loglik_optimizer — argmin-powered maximizer for subspace coefficients.
//!
//! Purpose
//! -------
//! Fit the coefficient vector λ of a subspace-constrained Gaussian by
//! maximizing its auxiliary log-likelihood `Q(λ)`. Callers implement
//! [`LogLikelihood`] on an objective that owns the sufficient statistics and
//! invoke [`maximize`] to run L-BFGS with a configurable line search.
//!
//! Key behaviors
//! -------------
//! - [`adapter::ArgMinAdapter`] turns `Q(λ)` into the argmin cost
//!   `c(λ) = -Q(λ)`, falling back to finite differences when no analytic
//!   gradient is available.
//! - [`maximize`] validates the start with [`LogLikelihood::check`], selects
//!   a solver from [`builders`] and runs it via [`run::run_lbfgs`].
//! - Configuration ([`Tolerances`], [`MLEOptions`]) is validated on
//!   construction in [`traits`] using the helpers in [`validation`].
//!
//! Invariants & assumptions
//! ------------------------
//! - The optimizer always maximizes; objectives implement `Q` and `∇Q`,
//!   never the cost.
//! - Coefficients outside the positive-definite cone are reported by the
//!   objective as a finite penalty value, so line searches that only compare
//!   costs (the default Armijo backtracking) step back into the feasible
//!   region instead of aborting.
//!
//! Conventions
//! -----------
//! - [`OptimOutcome::value`] is reported as `Q(λ̂)`, not the cost.
//! - Errors bubble up as [`OptResult<T>`](crate::optimization::errors::OptResult).
//!
//! Testing notes
//! -------------
//! - Unit tests in submodules cover sign conventions in [`adapter`], solver
//!   wiring in [`builders`], configuration invariants in [`traits`] and
//!   convergence on toy quadratics in [`api`].
//! - Coefficient recovery for real subspaces is exercised by the density
//!   tests and the pool integration test.

pub mod adapter;
pub mod api;
pub mod builders;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::maximize;
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, FnEvalMap, Grad, Theta, DEFAULT_LBFGS_MEM};

pub mod prelude {
    pub use super::api::maximize;
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
