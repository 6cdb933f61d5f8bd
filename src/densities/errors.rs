//! Errors for Gaussian densities, pools, and mixtures (dimension checks,
//! accumulation state, numerical breakdowns, and gk file I/O).
//!
//! This module defines the density error type, [`DensityError`], used across
//! the density variants, the pool/cache layer, mixtures, and the Python
//! bindings. It implements `Display`/`Error` and converts to `PyErr` when the
//! `python-bindings` feature is enabled.
//!
//! ## Conventions
//! - **Indices are 0-based** (pool slots, mixture components, vector entries).
//! - Every error is deterministic: nothing in the density stack retries
//!   internally, so an error always reflects a programming or data problem
//!   the caller must handle.
//! - Optimizer/backend errors raised while fitting subspace coefficients are
//!   normalized to [`DensityError::OptimizationFailed`] with a human-readable
//!   status.
use crate::optimization::errors::OptError;

/// Crate-wide result alias for density operations that may produce
/// [`DensityError`].
pub type DensityResult<T> = Result<T, DensityError>;

/// Unified error type for densities, pools, and mixtures.
///
/// Covers dimensionality and length validation, accumulator lifecycle
/// violations, numerical failures (non-positive-definite matrices, singular
/// basis solves, zero weight sums), cache misuse, option validation, and
/// pool-file I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum DensityError {
    // ---- Shape / length validation ----
    /// Feature or parameter dimensionality disagrees with the density.
    DimensionMismatch { expected: usize, actual: usize },

    /// Parallel arrays (e.g. MMI priors vs. features) have different lengths.
    LengthMismatch { what: &'static str, left: usize, right: usize },

    /// Pool index outside `0..size`.
    IndexOutOfRange { index: usize, size: usize },

    // ---- Accumulation / estimation ----
    /// `estimate_parameters` was called with zero accumulated weight.
    NoStatistics,

    /// An `accumulate_*` call arrived without a prior `start_accumulating`.
    NotAccumulating,

    /// An accumulator of the wrong kind was handed to a density.
    AccumulatorMismatch { expected: &'static str, found: &'static str },

    /// A prior or mixture weight is negative or non-finite.
    InvalidWeight { index: usize, value: f64 },

    // ---- Numerical ----
    /// Non-positive-definite covariance/precision, zero-sum weights, or a
    /// singular basis solve.
    Numerical { reason: &'static str },

    /// A subspace descriptor failed validation.
    InvalidSubspace { reason: &'static str },

    // ---- Cache ----
    /// The cache slot has not been filled since the last reset.
    UncachedLikelihood { index: usize },

    // ---- Options ----
    /// An estimation option is out of its valid range.
    InvalidOption { name: &'static str, value: f64, reason: &'static str },

    /// An estimation mode name did not parse.
    UnknownMode { name: String },

    // ---- Pool files ----
    /// Underlying reader/writer failure.
    Io { message: String },

    /// Malformed, truncated, or unknown content in a gk stream.
    Format { line: usize, reason: String },

    // ---- Coefficient optimizer ----
    /// Optimizer failed; include a human-readable status/reason.
    OptimizationFailed { status: String },
}

impl std::error::Error for DensityError {}

impl std::fmt::Display for DensityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Shape / length validation ----
            DensityError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {expected}, got {actual}")
            }
            DensityError::LengthMismatch { what, left, right } => {
                write!(f, "Length mismatch for {what}: {left} vs {right}")
            }
            DensityError::IndexOutOfRange { index, size } => {
                write!(f, "Index {index} is out of range for a pool of size {size}")
            }
            // ---- Accumulation / estimation ----
            DensityError::NoStatistics => {
                write!(f, "No accumulated statistics: total weight is zero.")
            }
            DensityError::NotAccumulating => {
                write!(f, "Accumulator not initialized; call start_accumulating first.")
            }
            DensityError::AccumulatorMismatch { expected, found } => {
                write!(f, "Accumulator kind mismatch: expected {expected}, found {found}")
            }
            DensityError::InvalidWeight { index, value } => {
                write!(f, "Weight at index {index} must be finite and >= 0; got {value}")
            }
            // ---- Numerical ----
            DensityError::Numerical { reason } => {
                write!(f, "Numerical error: {reason}")
            }
            DensityError::InvalidSubspace { reason } => {
                write!(f, "Invalid subspace descriptor: {reason}")
            }
            // ---- Cache ----
            DensityError::UncachedLikelihood { index } => {
                write!(f, "Likelihood for index {index} has not been cached for this frame.")
            }
            // ---- Options ----
            DensityError::InvalidOption { name, value, reason } => {
                write!(f, "Invalid option {name} = {value}: {reason}")
            }
            DensityError::UnknownMode { name } => {
                write!(f, "Unknown estimation mode '{name}'; expected 'ml' or 'mmi'")
            }
            // ---- Pool files ----
            DensityError::Io { message } => {
                write!(f, "I/O error: {message}")
            }
            DensityError::Format { line, reason } => {
                write!(f, "Malformed pool file at line {line}: {reason}")
            }
            // ---- Coefficient optimizer ----
            DensityError::OptimizationFailed { status } => {
                write!(f, "Optimizer failed with status: {status}")
            }
        }
    }
}

impl From<std::io::Error> for DensityError {
    fn from(err: std::io::Error) -> DensityError {
        DensityError::Io { message: err.to_string() }
    }
}

impl From<OptError> for DensityError {
    fn from(err: OptError) -> DensityError {
        DensityError::OptimizationFailed { status: err.to_string() }
    }
}

/// Convert a [`DensityError`] into a Python `ValueError` with the error message.
///
/// This is used at the Rust↔Python boundary to surface domain errors cleanly.
#[cfg(feature = "python-bindings")]
impl std::convert::From<DensityError> for pyo3::PyErr {
    fn from(err: DensityError) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
