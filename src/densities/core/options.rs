//! Estimation options — configuration for parameter re-estimation.
//!
//! Purpose
//! -------
//! Collect the knobs consulted by `estimate_parameters` in one validated
//! struct: the variance floor, the Extended Baum–Welch smoothing multiplier
//! used in MMI mode, and the optimizer options used by the subspace
//! constrained variants when fitting their coefficient vectors.
//!
//! Invariants & assumptions
//! ------------------------
//! - `variance_floor` is finite and strictly positive.
//! - `EbwOptions::e` is finite and non-negative.
//! - `mle` has been validated by its own constructor (or is the default).
//!
//! Conventions
//! -----------
//! - The floor applies to per-dimension variances (diagonal variant) and to
//!   the covariance diagonal (full and subspace variants) after every
//!   update, ML and MMI alike.
use crate::{
    densities::errors::{DensityError, DensityResult},
    optimization::loglik_optimizer::MLEOptions,
};

/// Default lower bound on estimated variances.
pub const DEFAULT_VARIANCE_FLOOR: f64 = 1e-4;

/// Default Extended Baum–Welch smoothing multiplier `E`.
pub const DEFAULT_EBW_E: f64 = 2.0;

/// Extended Baum–Welch smoothing configuration.
///
/// The per-density smoothing constant is `D = max(E·γ_den, 2·D_min)` where
/// `γ_den` is the denominator occupancy and `D_min` the smallest constant
/// that keeps the updated covariance positive definite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EbwOptions {
    pub e: f64,
}

impl EbwOptions {
    /// Validated constructor.
    ///
    /// # Errors
    /// [`DensityError::InvalidOption`] when `e` is negative or non-finite.
    pub fn new(e: f64) -> DensityResult<Self> {
        if !e.is_finite() || e < 0.0 {
            return Err(DensityError::InvalidOption {
                name: "ebw.e",
                value: e,
                reason: "The smoothing multiplier must be finite and non-negative.",
            });
        }
        Ok(Self { e })
    }
}

impl Default for EbwOptions {
    fn default() -> Self {
        Self { e: DEFAULT_EBW_E }
    }
}

/// EstimationOptions — configuration for `Gaussian::estimate_parameters`.
///
/// Fields
/// ------
/// - `variance_floor`: `f64`
///   Minimum variance enforced after estimation.
/// - `ebw`: [`EbwOptions`]
///   Smoothing used in MMI mode; ignored in ML mode.
/// - `mle`: [`MLEOptions`]
///   L-BFGS configuration for the coefficient fits of the precision- and
///   exponential-subspace variants; ignored by diagonal and full densities.
///
/// Default
/// -------
/// `variance_floor = 1e-4`, `ebw.e = 2.0`, `mle = MLEOptions::default()`
/// (Armijo backtracking, `tol_grad = 1e-9`, 500 iterations).
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationOptions {
    pub variance_floor: f64,
    pub ebw: EbwOptions,
    pub mle: MLEOptions,
}

impl EstimationOptions {
    /// Validated constructor.
    ///
    /// # Errors
    /// [`DensityError::InvalidOption`] when `variance_floor` is not finite
    /// and strictly positive.
    pub fn new(variance_floor: f64, ebw: EbwOptions, mle: MLEOptions) -> DensityResult<Self> {
        if !variance_floor.is_finite() || variance_floor <= 0.0 {
            return Err(DensityError::InvalidOption {
                name: "variance_floor",
                value: variance_floor,
                reason: "The variance floor must be finite and strictly positive.",
            });
        }
        Ok(Self { variance_floor, ebw, mle })
    }
}

impl Default for EstimationOptions {
    fn default() -> Self {
        Self {
            variance_floor: DEFAULT_VARIANCE_FLOOR,
            ebw: EbwOptions::default(),
            mle: MLEOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Ensure both option constructors reject out-of-range values and keep
    // valid ones unchanged.
    //
    // Given
    // -----
    // - `variance_floor` of 0.0 and NaN, `e` of -1.0, and a valid triple.
    //
    // Expect
    // ------
    // - `InvalidOption` for the invalid values; the valid triple is stored
    //   verbatim.
    fn options_validate_ranges() {
        // Act / Assert
        assert!(matches!(
            EstimationOptions::new(0.0, EbwOptions::default(), MLEOptions::default()),
            Err(DensityError::InvalidOption { name: "variance_floor", .. })
        ));
        assert!(EstimationOptions::new(f64::NAN, EbwOptions::default(), MLEOptions::default())
            .is_err());
        assert!(matches!(EbwOptions::new(-1.0), Err(DensityError::InvalidOption { .. })));

        let ebw = EbwOptions::new(3.5).expect("valid e");
        let opts = EstimationOptions::new(1e-3, ebw, MLEOptions::default()).expect("valid");
        assert_eq!(opts.variance_floor, 1e-3);
        assert_eq!(opts.ebw.e, 3.5);
    }
}
