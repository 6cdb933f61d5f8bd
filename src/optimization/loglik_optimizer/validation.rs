//! Validation helpers for coefficient optimization.
//!
//! - **Tolerance checks**: [`verify_tol_grad`], [`verify_tol_cost`].
//! - **Gradient validation**: [`validate_grad`] (length and finiteness).
//! - **Coefficient estimates**: [`validate_theta_hat`].
//! - **Objective values**: [`validate_value`].
//! - **Coefficient length**: [`validate_theta_len`] against a subspace size.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{Grad, Theta},
};

/// Validate the optional gradient-norm tolerance.
///
/// # Errors
/// Returns [`OptError::InvalidTolGrad`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_grad(tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate the optional cost-change tolerance.
///
/// # Errors
/// Returns [`OptError::InvalidTolCost`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_cost(tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate a gradient vector against dimension and finiteness.
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] if length does not match `dim`.
/// - [`OptError::InvalidGradient`] for the first non-finite element.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidGradient {
                index,
                value,
                reason: "Gradient elements must be finite.",
            });
        }
    }
    Ok(())
}

/// Validate and unwrap an estimated coefficient vector.
///
/// # Errors
/// - [`OptError::MissingThetaHat`] if no vector was provided.
/// - [`OptError::InvalidThetaHat`] if any element is non-finite.
pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    let t = theta_hat.ok_or(OptError::MissingThetaHat)?;
    if let Some((index, &value)) = t.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(OptError::InvalidThetaHat {
            index,
            value,
            reason: "Parameter estimates must be finite.",
        });
    }
    Ok(t)
}

/// Validate that a scalar objective value is finite.
///
/// # Errors
/// Returns [`OptError::NonFiniteCost`] if the value is `NaN` or infinite.
pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}

/// Validate that a coefficient vector has one entry per basis element.
///
/// # Errors
/// Returns [`OptError::CoefficientLengthMismatch`] on a length mismatch.
pub fn validate_theta_len(theta: &Theta, expected: usize) -> OptResult<()> {
    if theta.len() != expected {
        return Err(OptError::CoefficientLengthMismatch { expected, actual: theta.len() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Ensure `validate_grad` flags both wrong lengths and non-finite entries.
    //
    // Given
    // -----
    // - A length-2 gradient checked against `dim = 3`.
    // - A gradient with a `NaN` in position 1.
    //
    // Expect
    // ------
    // - `GradientDimMismatch` and `InvalidGradient { index: 1, .. }`.
    fn validate_grad_checks_length_and_finiteness() {
        // Arrange
        let short = array![1.0, 2.0];
        let nan = array![1.0, f64::NAN, 3.0];

        // Act / Assert
        assert_eq!(
            validate_grad(&short, 3),
            Err(OptError::GradientDimMismatch { expected: 3, found: 2 })
        );
        assert!(matches!(validate_grad(&nan, 3), Err(OptError::InvalidGradient { index: 1, .. })));
    }

    #[test]
    // Purpose
    // -------
    // Verify `validate_theta_hat` requires a present, finite vector.
    //
    // Given
    // -----
    // - `None`, a vector holding `+inf`, and a finite vector.
    //
    // Expect
    // ------
    // - `MissingThetaHat`, `InvalidThetaHat`, and `Ok` respectively.
    fn validate_theta_hat_requires_finite_vector() {
        // Act / Assert
        assert_eq!(validate_theta_hat(None), Err(OptError::MissingThetaHat));
        assert!(matches!(
            validate_theta_hat(Some(array![0.0, f64::INFINITY])),
            Err(OptError::InvalidThetaHat { index: 1, .. })
        ));
        assert_eq!(validate_theta_hat(Some(array![0.5, 1.5])), Ok(array![0.5, 1.5]));
    }

    #[test]
    // Purpose
    // -------
    // Ensure tolerance checks reject zero and infinite values but accept
    // `None`.
    //
    // Given
    // -----
    // - `Some(0.0)`, `Some(inf)`, and `None`.
    //
    // Expect
    // ------
    // - Errors for the first two, `Ok` for `None`.
    fn tolerance_checks_reject_zero_and_infinite() {
        // Act / Assert
        assert!(verify_tol_grad(Some(0.0)).is_err());
        assert!(verify_tol_cost(Some(f64::INFINITY)).is_err());
        assert!(verify_tol_grad(None).is_ok());
        assert!(verify_tol_cost(None).is_ok());
    }
}
