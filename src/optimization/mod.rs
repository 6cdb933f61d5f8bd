//! optimization — coefficient maximizer and its error surface.
//!
//! Purpose
//! -------
//! Host the numerical optimization used when re-estimating subspace
//! constrained densities (PCGMM and SCGMM). The density layer builds an
//! auxiliary objective from accumulated statistics and hands it to
//! [`loglik_optimizer::maximize`]; it never touches argmin directly.
//!
//! Conventions
//! -----------
//! - Objectives are maximized; the argmin cost is their negation.
//! - Every failure is an [`errors::OptError`]. Density code converts it into
//!   `DensityError::OptimizationFailed` at the boundary.
//! - No logging happens here unless the `obs_slog` feature is enabled and a
//!   caller sets `MLEOptions::verbose`.

pub mod errors;
pub mod loglik_optimizer;

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
}
