//! loglik_optimizer::builders — L-BFGS solver construction.
//!
//! One builder per [`LineSearcher`](super::traits::LineSearcher) variant.
//! Each picks the L-BFGS history size from `opts.lbfgs_mem` (falling back to
//! [`DEFAULT_LBFGS_MEM`]) and applies the optional gradient and cost-change
//! tolerances through [`configure_lbfgs`]. The initial coefficients and the
//! iteration cap are runtime concerns applied by
//! [`run_lbfgs`](super::run::run_lbfgs).
use argmin::solver::{linesearch::condition::ArmijoCondition, quasinewton::LBFGS};

use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        traits::MLEOptions,
        types::{
            BacktrackingLS, Cost, Grad, HagerZhangLS, LbfgsBacktracking, LbfgsHagerZhang,
            LbfgsMoreThuente, MoreThuenteLS, Theta, ARMIJO_C, BACKTRACKING_RHO, DEFAULT_LBFGS_MEM,
        },
    },
};

/// L-BFGS with a Hager–Zhang line search.
pub fn build_optimizer_hager_zhang(opts: &MLEOptions) -> OptResult<LbfgsHagerZhang> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    configure_lbfgs(LbfgsHagerZhang::new(HagerZhangLS::new(), mem), opts)
}

/// L-BFGS with a More–Thuente line search.
pub fn build_optimizer_more_thuente(opts: &MLEOptions) -> OptResult<LbfgsMoreThuente> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    configure_lbfgs(LbfgsMoreThuente::new(MoreThuenteLS::new(), mem), opts)
}

/// L-BFGS with an Armijo backtracking line search.
///
/// The Armijo condition uses [`ARMIJO_C`] and each rejected step is scaled
/// by [`BACKTRACKING_RHO`].
///
/// # Errors
/// Propagates argmin's parameter validation for the Armijo constant and the
/// contraction factor, plus any tolerance error from [`configure_lbfgs`].
pub fn build_optimizer_backtracking(opts: &MLEOptions) -> OptResult<LbfgsBacktracking> {
    let condition = ArmijoCondition::new(ARMIJO_C)?;
    let backtracking = BacktrackingLS::new(condition).rho(BACKTRACKING_RHO)?;
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    configure_lbfgs(LbfgsBacktracking::new(backtracking, mem), opts)
}

/// Apply `tol_grad` / `tol_cost` from `opts` to an L-BFGS solver.
///
/// # Errors
/// Tolerances rejected by argmin are surfaced as [`OptError`](crate::optimization::errors::OptError).
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &MLEOptions,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(g) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(c)?;
    }
    Ok(solver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::loglik_optimizer::traits::{LineSearcher, Tolerances};

    fn opts_with(line_searcher: LineSearcher, mem: Option<usize>) -> MLEOptions {
        let tols = Tolerances::new(Some(1e-6), Some(1e-8), Some(50)).expect("valid tolerances");
        MLEOptions::new(tols, line_searcher, false, mem).expect("valid options")
    }

    #[test]
    // Purpose
    // -------
    // Ensure every line-search builder succeeds with valid options, both with
    // the default and an explicit L-BFGS memory.
    //
    // Given
    // -----
    // - Valid tolerances and `lbfgs_mem` of `None` and `Some(11)`.
    //
    // Expect
    // ------
    // - All three builders return `Ok`.
    fn builders_accept_valid_options() {
        for mem in [None, Some(11)] {
            assert!(build_optimizer_hager_zhang(&opts_with(LineSearcher::HagerZhang, mem)).is_ok());
            assert!(
                build_optimizer_more_thuente(&opts_with(LineSearcher::MoreThuente, mem)).is_ok()
            );
            assert!(
                build_optimizer_backtracking(&opts_with(LineSearcher::Backtracking, mem)).is_ok()
            );
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify `configure_lbfgs` is a no-op when both tolerances are absent.
    //
    // Given
    // -----
    // - Tolerances with only `max_iter` set.
    //
    // Expect
    // ------
    // - `configure_lbfgs` returns `Ok`.
    fn configure_lbfgs_respects_absent_tolerances() {
        // Arrange
        let raw = LBFGS::new(MoreThuenteLS::new(), DEFAULT_LBFGS_MEM);
        let tols = Tolerances::new(None, None, Some(50)).expect("valid tolerances");
        let opts = MLEOptions::new(tols, LineSearcher::MoreThuente, false, None)
            .expect("valid options");

        // Act
        let configured = configure_lbfgs(raw, &opts);

        // Assert
        assert!(configured.is_ok());
    }
}
