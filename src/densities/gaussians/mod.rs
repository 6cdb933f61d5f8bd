//! gaussians — the four Gaussian density variants and their shared
//! contracts.
//!
//! - [`DiagonalGaussian`]: per-dimension variances.
//! - [`FullCovarianceGaussian`]: dense covariance with cached Cholesky.
//! - [`PrecisionConstrainedGaussian`]: precision in a shared matrix basis.
//! - [`SubspaceConstrainedGaussian`]: natural parameters in a shared basis.
//! - [`Density`]: sum type stored by the pool.
//!
//! The subspace-constrained variants fit their coefficients with the
//! objectives in [`objectives`] and the L-BFGS driver from
//! [`crate::optimization`].

pub mod density;
pub mod diagonal;
pub mod full;
pub mod objectives;
pub mod precision_constrained;
pub mod subspace_constrained;
pub mod traits;

pub use self::density::Density;
pub use self::diagonal::DiagonalGaussian;
pub use self::full::FullCovarianceGaussian;
pub use self::precision_constrained::PrecisionConstrainedGaussian;
pub use self::subspace_constrained::SubspaceConstrainedGaussian;
pub use self::traits::{Daughters, Gaussian, Pdf};
