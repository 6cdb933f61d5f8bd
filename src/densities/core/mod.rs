//! core — building blocks shared by every Gaussian variant.
//!
//! Purpose
//! -------
//! Collect the pieces the density variants are assembled from: accumulator
//! records, moment estimators (ML and Extended Baum–Welch), subspace
//! descriptors, estimation options and mode, linear-algebra helpers, the gk
//! token reader, and shape/weight validation.
//!
//! Key behaviors
//! -------------
//! - [`accumulators`]: ML and MMI-denominator tracks kept strictly apart.
//! - [`ebw`]: new mean/covariance from statistics, before flooring.
//! - [`subspace`]: `Arc`-shared bases for the constrained variants.
//! - [`linalg`]: `ndarray` ↔ `nalgebra` bridge, Cholesky, Gram solves.
//! - [`tokens`]: whitespace tokenizer and writers for the text layout.
//!
//! Conventions
//! -----------
//! - Feature vectors are `ArrayView1<f64>`; parameters are owned `Array1` /
//!   `Array2`.
//! - Nothing here logs or performs I/O beyond the reader/writer handed in.

pub mod accumulators;
pub mod ebw;
pub mod linalg;
pub mod mode;
pub mod options;
pub mod subspace;
pub mod tokens;
pub mod validation;

pub use self::accumulators::{
    Accumulator, DiagonalAccumulator, DiagonalStats, FullCovarianceAccumulator, FullStats,
    Statistics, Tracks,
};
pub use self::mode::EstimationMode;
pub use self::options::{EbwOptions, EstimationOptions, DEFAULT_VARIANCE_FLOOR};
pub use self::subspace::{ExponentialSubspace, PrecisionSubspace};
pub use self::tokens::TokenReader;
