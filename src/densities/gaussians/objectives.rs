//! Coefficient objectives for the subspace-constrained Gaussians.
//!
//! Purpose
//! -------
//! Express "find the subspace coefficients λ that best explain these
//! moments" as a [`LogLikelihood`] so the L-BFGS driver in
//! [`crate::optimization`] can maximize it.
//!
//! Key behaviors
//! -------------
//! - [`PrecisionObjective`]: per-frame auxiliary
//!   `Q(λ) = ½ ln|P(λ)| − ½ tr(P(λ) S)` for a target covariance `S`,
//!   with gradient `∂Q/∂λ_k = ½ tr(P⁻¹ B_k) − ½ tr(B_k S)`.
//! - [`ExponentialObjective`]: per-frame expected log-likelihood
//!   `L(λ) = ψᵀx̄ − ½ tr(P M₂) − ½ ψᵀP⁻¹ψ + ½ ln|P|` for a target mean `x̄`
//!   and second moment `M₂`, with gradient
//!   `∂L/∂λ_k = v_kᵀ(x̄ − μ) − ½ tr(S_k (M₂ − Σ − μμᵀ))`.
//! - [`fit_coefficients`]: start from the best feasible candidate and run
//!   the optimizer, never returning a worse or infeasible point.
//!
//! Invariants & assumptions
//! ------------------------
//! - Coefficients whose precision is not positive definite evaluate to
//!   [`INFEASIBLE_VALUE`]. Armijo backtracking treats that as a failed
//!   trial step and shrinks, so accepted iterates stay inside the cone.
//! - Gradients are only defined at feasible points; asking for one
//!   elsewhere yields [`OptError::InfeasibleCoefficients`].
use crate::{
    densities::{
        core::{
            linalg::{outer, spd_factor, trace_product, SpdFactor},
            subspace::{ExponentialSubspace, PrecisionSubspace},
        },
        errors::{DensityError, DensityResult},
    },
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{maximize, Cost, Grad, LogLikelihood, MLEOptions, Theta},
    },
};
use ndarray::{Array1, Array2};

/// Objective value reported for coefficients outside the positive-definite
/// cone. Finite so the cost adapter accepts it.
pub const INFEASIBLE_VALUE: f64 = -1e100;

fn check_len(expected: usize, theta: &Theta) -> OptResult<()> {
    if theta.len() != expected {
        return Err(OptError::CoefficientLengthMismatch { expected, actual: theta.len() });
    }
    Ok(())
}

/// Maximum-likelihood fit of precision-subspace coefficients to a target
/// covariance.
#[derive(Debug, Clone)]
pub struct PrecisionObjective<'a> {
    subspace: &'a PrecisionSubspace,
    target: Array2<f64>,
}

impl<'a> PrecisionObjective<'a> {
    pub fn new(subspace: &'a PrecisionSubspace, target: Array2<f64>) -> Self {
        Self { subspace, target }
    }

    fn precision(&self, theta: &Theta) -> OptResult<Array2<f64>> {
        check_len(self.subspace.len(), theta)?;
        self.subspace.precision(theta.view()).map_err(|_| OptError::CoefficientLengthMismatch {
            expected: self.subspace.len(),
            actual: theta.len(),
        })
    }

    fn factor(&self, theta: &Theta) -> OptResult<Option<SpdFactor>> {
        Ok(spd_factor(self.precision(theta)?.view()))
    }
}

impl LogLikelihood for PrecisionObjective<'_> {
    fn value(&self, theta: &Theta) -> OptResult<Cost> {
        let p = self.precision(theta)?;
        match spd_factor(p.view()) {
            Some(f) => Ok(0.5 * f.log_det - 0.5 * trace_product(p.view(), self.target.view())),
            None => Ok(INFEASIBLE_VALUE),
        }
    }

    fn check(&self, theta: &Theta) -> OptResult<()> {
        match self.factor(theta)? {
            Some(_) => Ok(()),
            None => Err(OptError::InfeasibleStart),
        }
    }

    fn grad(&self, theta: &Theta) -> OptResult<Grad> {
        let f = self.factor(theta)?.ok_or(OptError::InfeasibleCoefficients)?;
        Ok(Array1::from_iter(self.subspace.basis().iter().map(|b| {
            0.5 * trace_product(f.inverse.view(), b.view())
                - 0.5 * trace_product(b.view(), self.target.view())
        })))
    }
}

/// Maximum-likelihood fit of exponential-subspace coefficients to a target
/// mean and second moment.
#[derive(Debug, Clone)]
pub struct ExponentialObjective<'a> {
    subspace: &'a ExponentialSubspace,
    mean: Array1<f64>,
    second: Array2<f64>,
}

impl<'a> ExponentialObjective<'a> {
    /// Targets are the mean `x̄` and the covariance `Σ`; the second moment
    /// `M₂ = Σ + x̄x̄ᵀ` is formed here.
    pub fn new(subspace: &'a ExponentialSubspace, mean: Array1<f64>, cov: Array2<f64>) -> Self {
        let second = cov + outer(mean.view(), mean.view());
        Self { subspace, mean, second }
    }

    fn natural(&self, theta: &Theta) -> OptResult<(Array1<f64>, Array2<f64>)> {
        check_len(self.subspace.len(), theta)?;
        self.subspace.natural(theta.view()).map_err(|_| OptError::CoefficientLengthMismatch {
            expected: self.subspace.len(),
            actual: theta.len(),
        })
    }
}

impl LogLikelihood for ExponentialObjective<'_> {
    fn value(&self, theta: &Theta) -> OptResult<Cost> {
        let (psi, p) = self.natural(theta)?;
        let Some(f) = spd_factor(p.view()) else {
            return Ok(INFEASIBLE_VALUE);
        };
        let mu = f.inverse.dot(&psi);
        Ok(psi.dot(&self.mean) - 0.5 * trace_product(p.view(), self.second.view())
            - 0.5 * psi.dot(&mu)
            + 0.5 * f.log_det)
    }

    fn check(&self, theta: &Theta) -> OptResult<()> {
        let (_, p) = self.natural(theta)?;
        if spd_factor(p.view()).is_none() {
            return Err(OptError::InfeasibleStart);
        }
        Ok(())
    }

    fn grad(&self, theta: &Theta) -> OptResult<Grad> {
        let (psi, p) = self.natural(theta)?;
        let f = spd_factor(p.view()).ok_or(OptError::InfeasibleCoefficients)?;
        let mu = f.inverse.dot(&psi);
        let residual = &self.second - &f.inverse - &outer(mu.view(), mu.view());
        let shift = &self.mean - &mu;
        Ok(Array1::from_iter(self.subspace.linear().iter().zip(self.subspace.quadratic()).map(
            |(v, s)| v.dot(&shift) - 0.5 * trace_product(s.view(), residual.view()),
        )))
    }
}

/// Maximize `objective` from the best feasible start in `starts`.
///
/// The optimizer result is kept only when it is feasible and scores at
/// least as well as the start.
///
/// # Errors
/// - [`DensityError::Numerical`] when no start is feasible.
/// - [`DensityError::OptimizationFailed`] when the optimizer errors.
pub fn fit_coefficients<F: LogLikelihood>(
    objective: &F, starts: Vec<Array1<f64>>, mle: &MLEOptions,
) -> DensityResult<Array1<f64>> {
    let mut best: Option<(Array1<f64>, f64)> = None;
    for start in starts {
        if objective.check(&start).is_err() {
            continue;
        }
        let value = objective.value(&start)?;
        if best.as_ref().map_or(true, |(_, v)| value > *v) {
            best = Some((start, value));
        }
    }
    let (start, start_value) = best.ok_or(DensityError::Numerical {
        reason: "No positive-definite starting point for the subspace coefficients.",
    })?;

    let outcome = maximize(objective, start.clone(), mle)?;
    if outcome.value >= start_value && objective.check(&outcome.theta_hat).is_ok() {
        Ok(outcome.theta_hat)
    } else {
        Ok(start)
    }
}
