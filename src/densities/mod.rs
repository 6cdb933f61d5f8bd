//! densities — Gaussian density variants, their training statistics, and
//! shared numerical building blocks.
//!
//! Purpose
//! -------
//! Provide the probability densities an acoustic model scores feature
//! vectors against: diagonal, full-covariance, precision-subspace and
//! exponential-subspace constrained Gaussians. Each variant can evaluate
//! `p(f)` / `log p(f)`, accumulate weighted statistics, and re-estimate its
//! parameters by maximum likelihood or by Extended Baum–Welch for MMI.
//!
//! Key behaviors
//! -------------
//! - [`core`]: accumulators, ML/EBW moment estimators, subspace descriptors,
//!   options, linear algebra, validation, and the token reader used by the
//!   pool file format.
//! - [`gaussians`]: the [`Pdf`] and [`Gaussian`] contracts, the four
//!   variants, and the [`Density`] sum type.
//! - [`errors`]: [`DensityError`] and the [`DensityResult`] alias.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every stored covariance/precision is symmetric positive definite.
//! - Parameter updates are atomic; an error never leaves a density
//!   half-updated.
//! - ML statistics and MMI denominator statistics are kept apart until the
//!   estimation mode picks which to read.
//!
//! Downstream usage
//! ----------------
//! - Densities are normally owned by a [`crate::pool::PdfPool`] and scored
//!   through its likelihood cache; mixtures refer to them by index.
//! - `use crate::densities::prelude::*` pulls in the everyday types.

pub mod core;
pub mod errors;
pub mod gaussians;

pub use self::core::{
    Accumulator, EbwOptions, EstimationMode, EstimationOptions, ExponentialSubspace,
    PrecisionSubspace, DEFAULT_VARIANCE_FLOOR,
};
pub use self::errors::{DensityError, DensityResult};
pub use self::gaussians::{
    Daughters, Density, DiagonalGaussian, FullCovarianceGaussian, Gaussian, Pdf,
    PrecisionConstrainedGaussian, SubspaceConstrainedGaussian,
};

pub mod prelude {
    pub use super::core::{
        EbwOptions, EstimationMode, EstimationOptions, ExponentialSubspace, PrecisionSubspace,
    };
    pub use super::errors::{DensityError, DensityResult};
    pub use super::gaussians::{
        Density, DiagonalGaussian, FullCovarianceGaussian, Gaussian, Pdf,
        PrecisionConstrainedGaussian, SubspaceConstrainedGaussian,
    };
}
