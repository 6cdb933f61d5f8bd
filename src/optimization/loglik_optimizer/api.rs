//! loglik_optimizer::api — the single maximization entry point.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        adapter::ArgMinAdapter,
        builders::{
            build_optimizer_backtracking, build_optimizer_hager_zhang,
            build_optimizer_more_thuente,
        },
        run::run_lbfgs,
        traits::{LineSearcher, LogLikelihood, MLEOptions},
        OptimOutcome, Theta,
    },
};

/// Maximize an objective `ℓ(λ)` with L-BFGS and the line search chosen in
/// `opts`.
///
/// # Behavior
/// - Validates the starting point via `f.check(&theta0)`.
/// - Wraps `f` in an [`ArgMinAdapter`] exposing `c(λ) = -ℓ(λ)` to argmin.
/// - Builds the solver for `opts.line_searcher` and runs it.
///
/// # Errors
/// - Anything returned by `f.check`.
/// - Solver construction and runtime errors.
///
/// # Example
/// ```no_run
/// use ndarray::array;
/// use rust_densities::optimization::errors::OptResult;
/// use rust_densities::optimization::loglik_optimizer::{
///     maximize, LogLikelihood, MLEOptions, Theta,
/// };
///
/// struct Bowl;
/// impl LogLikelihood for Bowl {
///     fn value(&self, theta: &Theta) -> OptResult<f64> {
///         Ok(-theta.dot(theta))
///     }
///     fn check(&self, _: &Theta) -> OptResult<()> {
///         Ok(())
///     }
/// }
///
/// let out = maximize(&Bowl, array![0.1, -0.2, 0.3], &MLEOptions::default())?;
/// println!("λ̂ = {:?}", out.theta_hat);
/// # Ok::<(), rust_densities::optimization::errors::OptError>(())
/// ```
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0)?;
    let problem = ArgMinAdapter::new(f);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::Backtracking => {
            let solver = build_optimizer_backtracking(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::{
        errors::OptError,
        loglik_optimizer::{Cost, Grad, Tolerances},
    };
    use ndarray::array;

    /// ℓ(λ) = -½‖λ - c‖², maximized at `c`.
    struct Quadratic {
        center: Theta,
    }

    impl LogLikelihood for Quadratic {
        fn value(&self, theta: &Theta) -> OptResult<Cost> {
            let d = theta - &self.center;
            Ok(-0.5 * d.dot(&d))
        }
        fn check(&self, theta: &Theta) -> OptResult<()> {
            if theta.len() != self.center.len() {
                return Err(OptError::CoefficientLengthMismatch {
                    expected: self.center.len(),
                    actual: theta.len(),
                });
            }
            Ok(())
        }
        fn grad(&self, theta: &Theta) -> OptResult<Grad> {
            Ok(&self.center - theta)
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify every line search drives a concave quadratic to its maximizer.
    //
    // Given
    // -----
    // - `Quadratic` centered at (1, -2, 0.5), started at the origin.
    //
    // Expect
    // ------
    // - `theta_hat` within 1e-5 of the center and `value` near zero.
    fn maximize_finds_quadratic_peak_with_each_line_search() {
        // Arrange
        let f = Quadratic { center: array![1.0, -2.0, 0.5] };
        for ls in [LineSearcher::Backtracking, LineSearcher::MoreThuente, LineSearcher::HagerZhang]
        {
            let tols = Tolerances::new(Some(1e-10), None, Some(200)).expect("valid tolerances");
            let opts = MLEOptions::new(tols, ls, false, None).expect("valid options");

            // Act
            let out = maximize(&f, array![0.0, 0.0, 0.0], &opts).expect("optimization succeeds");

            // Assert
            for i in 0..3 {
                assert!(
                    (out.theta_hat[i] - f.center[i]).abs() < 1e-5,
                    "{ls:?}: component {i} = {}",
                    out.theta_hat[i]
                );
            }
            assert!(out.value > -1e-8);
        }
    }

    #[test]
    // Purpose
    // -------
    // Ensure `maximize` stops at `check` before running the solver.
    //
    // Given
    // -----
    // - A length-2 start for a 3-dimensional objective.
    //
    // Expect
    // ------
    // - `OptError::CoefficientLengthMismatch`.
    fn maximize_rejects_start_failing_check() {
        // Arrange
        let f = Quadratic { center: array![1.0, 2.0, 3.0] };

        // Act
        let res = maximize(&f, array![0.0, 0.0], &MLEOptions::default());

        // Assert
        assert_eq!(res, Err(OptError::CoefficientLengthMismatch { expected: 3, actual: 2 }));
    }
}
