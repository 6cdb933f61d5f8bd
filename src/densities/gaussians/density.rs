//! Density — closed sum type over the Gaussian variants stored in a pool.
//!
//! Every [`Pdf`] / [`Gaussian`] operation dispatches with one `match`.
//! Binary operations (merge, Kullback–Leibler) use the variant's own
//! implementation when both operands share a variant and fall back to the
//! moment-based defaults otherwise.
use crate::densities::{
    core::{
        accumulators::Accumulator, mode::EstimationMode, options::EstimationOptions,
        tokens::TokenReader,
    },
    errors::DensityResult,
    gaussians::{
        diagonal::DiagonalGaussian,
        full::FullCovarianceGaussian,
        precision_constrained::PrecisionConstrainedGaussian,
        subspace_constrained::SubspaceConstrainedGaussian,
        traits::{gaussian_kl, moment_merge, Daughters, Gaussian, Pdf},
    },
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::io::{BufRead, Write};

#[derive(Debug, Clone, PartialEq)]
pub enum Density {
    Diagonal(DiagonalGaussian),
    Full(FullCovarianceGaussian),
    PrecisionConstrained(PrecisionConstrainedGaussian),
    SubspaceConstrained(SubspaceConstrainedGaussian),
}

macro_rules! dispatch {
    ($self:expr, $g:ident => $body:expr) => {
        match $self {
            Density::Diagonal($g) => $body,
            Density::Full($g) => $body,
            Density::PrecisionConstrained($g) => $body,
            Density::SubspaceConstrained($g) => $body,
        }
    };
}

impl Density {
    /// Record tag used in pool files.
    pub fn tag(&self) -> &'static str {
        match self {
            Density::Diagonal(_) => "diag",
            Density::Full(_) => "full",
            Density::PrecisionConstrained(_) => "pcgmm",
            Density::SubspaceConstrained(_) => "scgmm",
        }
    }
}

impl From<DiagonalGaussian> for Density {
    fn from(g: DiagonalGaussian) -> Self {
        Density::Diagonal(g)
    }
}

impl From<FullCovarianceGaussian> for Density {
    fn from(g: FullCovarianceGaussian) -> Self {
        Density::Full(g)
    }
}

impl From<PrecisionConstrainedGaussian> for Density {
    fn from(g: PrecisionConstrainedGaussian) -> Self {
        Density::PrecisionConstrained(g)
    }
}

impl From<SubspaceConstrainedGaussian> for Density {
    fn from(g: SubspaceConstrainedGaussian) -> Self {
        Density::SubspaceConstrained(g)
    }
}

fn wrap<G: Into<Density>>(d: Daughters<G>) -> Daughters<Density> {
    Daughters { weight: d.weight, first: d.first.into(), second: d.second.into() }
}

impl Pdf for Density {
    fn dim(&self) -> usize {
        dispatch!(self, g => g.dim())
    }

    fn compute_log_likelihood(&self, f: ArrayView1<f64>) -> DensityResult<f64> {
        dispatch!(self, g => g.compute_log_likelihood(f))
    }

    fn compute_likelihood(&self, f: ArrayView1<f64>) -> DensityResult<f64> {
        dispatch!(self, g => g.compute_likelihood(f))
    }

    fn write<W: Write>(&self, w: &mut W) -> DensityResult<()> {
        dispatch!(self, g => g.write(w))
    }

    fn read<R: BufRead>(&mut self, tokens: &mut TokenReader<R>) -> DensityResult<()> {
        dispatch!(self, g => g.read(tokens))
    }
}

impl Gaussian for Density {
    fn reset(&mut self, dim: usize) -> DensityResult<()> {
        dispatch!(self, g => g.reset(dim))
    }

    fn get_mean(&self) -> Array1<f64> {
        dispatch!(self, g => g.get_mean())
    }

    fn get_covariance(&self) -> Array2<f64> {
        dispatch!(self, g => g.get_covariance())
    }

    fn set_mean(&mut self, mean: ArrayView1<f64>) -> DensityResult<()> {
        dispatch!(self, g => g.set_mean(mean))
    }

    fn set_covariance(&mut self, covariance: ArrayView2<f64>) -> DensityResult<()> {
        dispatch!(self, g => g.set_covariance(covariance))
    }

    fn start_accumulating(&mut self) {
        dispatch!(self, g => g.start_accumulating())
    }

    fn is_accumulating(&self) -> bool {
        dispatch!(self, g => g.is_accumulating())
    }

    fn accumulate_ml(&mut self, prior: f64, f: ArrayView1<f64>) -> DensityResult<()> {
        dispatch!(self, g => g.accumulate_ml(prior, f))
    }

    fn accumulate_mmi_denominator(
        &mut self, priors: &[f64], features: &[ArrayView1<f64>],
    ) -> DensityResult<()> {
        dispatch!(self, g => g.accumulate_mmi_denominator(priors, features))
    }

    fn estimate_parameters(
        &mut self, mode: EstimationMode, options: &EstimationOptions,
    ) -> DensityResult<()> {
        dispatch!(self, g => g.estimate_parameters(mode, options))
    }

    fn take_accumulator(&mut self) -> Option<Accumulator> {
        dispatch!(self, g => g.take_accumulator())
    }

    fn absorb_accumulator(&mut self, acc: Accumulator) -> DensityResult<()> {
        dispatch!(self, g => g.absorb_accumulator(acc))
    }

    fn split(&self, weight: f64) -> DensityResult<Daughters<Self>> {
        dispatch!(self, g => g.split(weight).map(wrap))
    }

    fn merge(&mut self, w1: f64, g1: &Self, w2: f64, g2: &Self) -> DensityResult<()> {
        match (self, g1, g2) {
            (Density::Diagonal(t), Density::Diagonal(a), Density::Diagonal(b)) => {
                t.merge(w1, a, w2, b)
            }
            (Density::Full(t), Density::Full(a), Density::Full(b)) => t.merge(w1, a, w2, b),
            (
                Density::PrecisionConstrained(t),
                Density::PrecisionConstrained(a),
                Density::PrecisionConstrained(b),
            ) => t.merge(w1, a, w2, b),
            (
                Density::SubspaceConstrained(t),
                Density::SubspaceConstrained(a),
                Density::SubspaceConstrained(b),
            ) => t.merge(w1, a, w2, b),
            (target, a, b) => moment_merge(target, w1, a, w2, b),
        }
    }

    fn kullback_leibler(&self, other: &Self) -> DensityResult<f64> {
        match (self, other) {
            (Density::Diagonal(a), Density::Diagonal(b)) => a.kullback_leibler(b),
            (Density::Full(a), Density::Full(b)) => a.kullback_leibler(b),
            (Density::PrecisionConstrained(a), Density::PrecisionConstrained(b)) => {
                a.kullback_leibler(b)
            }
            (Density::SubspaceConstrained(a), Density::SubspaceConstrained(b)) => {
                a.kullback_leibler(b)
            }
            (a, b) => gaussian_kl(a, b),
        }
    }
}
