//! Integration tests for density pools, mixtures, and re-estimation.
//!
//! Purpose
//! -------
//! - Validate the end-to-end flows a recognizer relies on: a pool holding
//!   every density variant is persisted and reloaded, its cache feeds
//!   mixtures, and per-density accumulators drive ML and MMI updates.
//!
//! Coverage
//! --------
//! - `pool::PdfPool`: gk round trips through memory and the filesystem,
//!   cache fills versus in-place evaluation.
//! - `pool::Mixture`: cached and direct evaluation, component splitting.
//! - `densities::gaussians`: ML training of all four variants and the
//!   Extended Baum–Welch MMI update of the diagonal variant.
//!
//! Exclusions
//! ----------
//! - Optimizer internals and per-module edge cases; those are covered by
//!   unit tests next to the code.
//! - Python bindings.
use approx::assert_relative_eq;
use ndarray::{array, Array1};
use rust_densities::{
    densities::prelude::*,
    pool::{Mixture, PdfPool},
};
use std::sync::Arc;

/// Purpose
/// -------
/// Four observations with sample mean `[2, 1]` and sample covariance
/// `[[0.5, 0], [0, 2]]` (divisor `n`).
fn training_frames() -> Vec<Array1<f64>> {
    vec![array![3.0, 1.0], array![1.0, 1.0], array![2.0, 3.0], array![2.0, -1.0]]
}

/// Purpose
/// -------
/// Build a 2-D pool holding one density of each variant, with the two
/// precision-constrained densities sharing one subspace.
fn mixed_pool() -> PdfPool {
    let precision = Arc::new(PrecisionSubspace::diagonal(2).expect("valid basis"));
    let exponential = Arc::new(ExponentialSubspace::full(2).expect("valid basis"));

    let mut pool = PdfPool::new(2);
    pool.add_pdf(
        DiagonalGaussian::from_parameters(array![0.5, -1.0], array![1.5, 0.25])
            .expect("valid diagonal"),
    )
    .expect("dimension matches");
    pool.add_pdf(
        FullCovarianceGaussian::from_parameters(array![1.0, 0.0], array![[2.0, 0.3], [0.3, 1.0]])
            .expect("valid full"),
    )
    .expect("dimension matches");
    pool.add_pdf(
        PrecisionConstrainedGaussian::from_parameters(
            Arc::clone(&precision),
            array![0.0, 1.0],
            array![2.0, 0.5],
        )
        .expect("valid pcgmm"),
    )
    .expect("dimension matches");
    pool.add_pdf(
        PrecisionConstrainedGaussian::from_parameters(
            precision,
            array![-1.0, 1.0],
            array![1.0, 4.0],
        )
        .expect("valid pcgmm"),
    )
    .expect("dimension matches");
    pool.add_pdf(SubspaceConstrainedGaussian::new(exponential).expect("identity fits"))
        .expect("dimension matches");
    pool
}

#[test]
// Purpose
// -------
// A pool with every variant survives a gk round trip in memory: tags,
// log-likelihoods, and subspace sharing are preserved.
//
// Given
// -----
// - `mixed_pool()` written with `write_gk_to` and read back with
//   `read_gk_from` into a pool of a different dimension.
//
// Expect
// ------
// - Same size, dimension, and tags.
// - Log-likelihoods at a test point agree within 1e-9.
// - The two precision-constrained densities still share one subspace.
fn gk_round_trip_preserves_every_variant() {
    // Arrange
    let pool = mixed_pool();
    let mut bytes = Vec::new();
    pool.write_gk_to(&mut bytes).expect("in-memory write");
    let mut reloaded = PdfPool::new(7);
    let point = array![0.4, 0.2];

    // Act
    reloaded.read_gk_from(bytes.as_slice()).expect("valid stream");

    // Assert
    assert_eq!(reloaded.size(), pool.size());
    assert_eq!(reloaded.dim(), 2);
    for i in 0..pool.size() {
        let a = pool.get_pdf(i).expect("in range");
        let b = reloaded.get_pdf(i).expect("in range");
        assert_eq!(a.tag(), b.tag());
        let la = pool.compute_log_likelihood(point.view(), i).expect("dim");
        let lb = reloaded.compute_log_likelihood(point.view(), i).expect("dim");
        assert!((la - lb).abs() < 1e-9, "density {i}: {la} vs {lb}");
    }
    match (reloaded.get_pdf(2).expect("in range"), reloaded.get_pdf(3).expect("in range")) {
        (Density::PrecisionConstrained(a), Density::PrecisionConstrained(b)) => {
            assert!(Arc::ptr_eq(a.subspace(), b.subspace()));
        }
        other => panic!("unexpected variants {other:?}"),
    }
}

#[test]
// Purpose
// -------
// The file-based entry points write and read the same pool.
//
// Given
// -----
// - `mixed_pool()` written to a temporary path with `write_gk`.
//
// Expect
// ------
// - `read_gk` restores the means of every density.
fn gk_file_round_trip() {
    // Arrange
    let pool = mixed_pool();
    let path = std::env::temp_dir().join(format!("rust_densities_pool_{}.gk", std::process::id()));
    pool.write_gk(&path).expect("writable temp dir");
    let mut reloaded = PdfPool::new(2);

    // Act
    let result = reloaded.read_gk(&path);
    let _ = std::fs::remove_file(&path);

    // Assert
    result.expect("valid file");
    for i in 0..pool.size() {
        let a = pool.get_pdf(i).expect("in range").get_mean();
        let b = reloaded.get_pdf(i).expect("in range").get_mean();
        assert!((&a - &b).iter().all(|d| d.abs() < 1e-12));
    }
}

#[test]
// Purpose
// -------
// Mixture evaluation from the cache matches direct evaluation, in both
// the linear and log domain.
//
// Given
// -----
// - `mixed_pool()`, a mixture over densities 0, 1, and 4 with weights
//   0.2, 0.5, 0.3, and the cache filled for one frame.
//
// Expect
// ------
// - Cached and direct likelihoods agree within 1e-12 (relative).
// - The log form equals the log of the linear form within 1e-10.
fn mixture_reads_cache_consistently() {
    // Arrange
    let mut pool = mixed_pool();
    let f = array![1.2, -0.3];
    let mut mixture = Mixture::new();
    mixture.add_component(0, 0.2).expect("valid weight");
    mixture.add_component(1, 0.5).expect("valid weight");
    mixture.add_component(4, 0.3).expect("valid weight");

    // Act
    pool.cache_likelihood(f.view()).expect("dimension matches");
    let cached = mixture.compute_likelihood(&pool).expect("slots filled");
    let direct = mixture.compute_likelihood_of(f.view(), &pool).expect("dimension matches");
    let log_cached = mixture.compute_log_likelihood(&pool).expect("slots filled");

    // Assert
    assert_relative_eq!(cached, direct, max_relative = 1e-12);
    assert_relative_eq!(log_cached, cached.ln(), epsilon = 1e-10);
    for i in 0..pool.size() {
        let from_cache = pool.get_log_likelihood(i).expect("filled");
        let in_place = pool.compute_log_likelihood(f.view(), i).expect("dimension matches");
        assert_eq!(from_cache, in_place);
    }
}

#[test]
// Purpose
// -------
// Ten identical observations move a diagonal density to that point and
// clamp its variance at the configured floor.
//
// Given
// -----
// - A 2-D diagonal density at the origin inside a pool.
// - `accumulate_ml(1.0, [2, 4])` ten times, then an ML estimate.
//
// Expect
// ------
// - Mean [2, 4] within 1e-6 and both variances equal to the floor.
// - The accumulator is released.
fn identical_observations_hit_the_variance_floor() {
    // Arrange
    let mut pool = PdfPool::new(2);
    let idx = pool.add_pdf(DiagonalGaussian::new(2)).expect("dimension matches");
    let opts = EstimationOptions::default();
    let g = pool.get_pdf_mut(idx).expect("in range");
    g.start_accumulating();
    for _ in 0..10 {
        g.accumulate_ml(1.0, array![2.0, 4.0].view()).expect("accumulating");
    }

    // Act
    g.estimate_parameters(EstimationMode::Ml, &opts).expect("statistics present");

    // Assert
    let mean = g.get_mean();
    let cov = g.get_covariance();
    assert!((mean[0] - 2.0).abs() < 1e-6 && (mean[1] - 4.0).abs() < 1e-6);
    assert_eq!(cov[[0, 0]], opts.variance_floor);
    assert_eq!(cov[[1, 1]], opts.variance_floor);
    assert!(!g.is_accumulating());
}

#[test]
// Purpose
// -------
// ML training recovers the sample moments for every variant whose
// subspace spans them, and all of them agree on the trained density.
//
// Given
// -----
// - `training_frames()` accumulated into a full density, a
//   precision-constrained density on the diagonal basis, and a
//   subspace-constrained density on the full basis.
//
// Expect
// ------
// - Full and subspace-constrained: mean [2, 1], covariance
//   [[0.5, 0], [0, 2]] within 1e-6, equal log-likelihoods within 1e-6.
// - Precision-constrained: coefficients [2, 0.5] within 1e-5.
fn ml_training_recovers_moments_across_variants() {
    // Arrange
    let precision = Arc::new(PrecisionSubspace::diagonal(2).expect("valid basis"));
    let exponential = Arc::new(ExponentialSubspace::full(2).expect("valid basis"));
    let mut pool = PdfPool::new(2);
    pool.add_pdf(FullCovarianceGaussian::new(2)).expect("dimension matches");
    pool.add_pdf(PrecisionConstrainedGaussian::new(precision).expect("identity fits"))
        .expect("dimension matches");
    pool.add_pdf(SubspaceConstrainedGaussian::new(exponential).expect("identity fits"))
        .expect("dimension matches");
    let opts = EstimationOptions::default();

    // Act
    for i in 0..pool.size() {
        let g = pool.get_pdf_mut(i).expect("in range");
        g.start_accumulating();
        for f in training_frames() {
            g.accumulate_ml(1.0, f.view()).expect("accumulating");
        }
        g.estimate_parameters(EstimationMode::Ml, &opts).expect("statistics present");
    }

    // Assert
    for i in [0, 2] {
        let g = pool.get_pdf(i).expect("in range");
        let mean = g.get_mean();
        let cov = g.get_covariance();
        assert!((mean[0] - 2.0).abs() < 1e-6 && (mean[1] - 1.0).abs() < 1e-6);
        assert!((cov[[0, 0]] - 0.5).abs() < 1e-6 && (cov[[1, 1]] - 2.0).abs() < 1e-6);
        assert!(cov[[0, 1]].abs() < 1e-6);
    }
    let point = array![1.5, 0.0];
    let full = pool.compute_log_likelihood(point.view(), 0).expect("dimension matches");
    let scgmm = pool.compute_log_likelihood(point.view(), 2).expect("dimension matches");
    assert!((full - scgmm).abs() < 1e-6);
    match pool.get_pdf(1).expect("in range") {
        Density::PrecisionConstrained(g) => {
            let coeffs = g.get_precision_coeffs();
            assert!((coeffs[0] - 2.0).abs() < 1e-5 && (coeffs[1] - 0.5).abs() < 1e-5);
        }
        other => panic!("unexpected variant {other:?}"),
    }
}

#[test]
// Purpose
// -------
// The MMI update combines numerator and denominator statistics with the
// Extended Baum–Welch rule, and ML mode ignores the denominator.
//
// Given
// -----
// - Two 1-D standard normal densities. Numerator frames 1 and 3, one
//   denominator frame at 0 (weight 1).
// - Without smoothing the variance goes negative; the smallest valid
//   constant is D_min = 1, so D = max(E·γ_den, 2·D_min) = 2.
//
// Expect
// ------
// - MMI: mean 4/3 and variance 20/9 within 1e-12.
// - ML on the same statistics: mean 2 and variance 1.
fn mmi_update_uses_smoothed_denominator() {
    // Arrange
    let mut pool = PdfPool::new(1);
    let mmi = pool.add_pdf(DiagonalGaussian::new(1)).expect("dimension matches");
    let ml = pool.add_pdf(DiagonalGaussian::new(1)).expect("dimension matches");
    let opts = EstimationOptions::default();
    let den = [array![0.0]];
    let den_views: Vec<_> = den.iter().map(|f| f.view()).collect();
    for i in [mmi, ml] {
        let g = pool.get_pdf_mut(i).expect("in range");
        g.start_accumulating();
        g.accumulate_ml(1.0, array![1.0].view()).expect("accumulating");
        g.accumulate_ml(1.0, array![3.0].view()).expect("accumulating");
        g.accumulate_mmi_denominator(&[1.0], &den_views).expect("accumulating");
    }

    // Act
    pool.get_pdf_mut(mmi)
        .expect("in range")
        .estimate_parameters(EstimationMode::Mmi, &opts)
        .expect("smoothable");
    pool.get_pdf_mut(ml)
        .expect("in range")
        .estimate_parameters(EstimationMode::Ml, &opts)
        .expect("statistics present");

    // Assert
    let g = pool.get_pdf(mmi).expect("in range");
    assert_relative_eq!(g.get_mean()[0], 4.0 / 3.0, epsilon = 1e-12);
    assert_relative_eq!(g.get_covariance()[[0, 0]], 20.0 / 9.0, epsilon = 1e-12);
    let g = pool.get_pdf(ml).expect("in range");
    assert!((g.get_mean()[0] - 2.0).abs() < 1e-12);
    assert!((g.get_covariance()[[0, 0]] - 1.0).abs() < 1e-12);
}

#[test]
// Purpose
// -------
// Splitting a mixture component grows the pool by one density, halves the
// weight, and keeps the mixture normalized.
//
// Given
// -----
// - A pool with one diagonal density and a mixture {0: 1.0}.
//
// Expect
// ------
// - New index 1, two components at weight 0.5.
// - Daughter means are symmetric around the parent mean.
// - Any stale cache slot for index 0 is invalidated.
fn split_component_grows_pool() {
    // Arrange
    let mut pool = PdfPool::new(2);
    pool.add_pdf(
        DiagonalGaussian::from_parameters(array![1.0, 2.0], array![4.0, 1.0]).expect("valid"),
    )
    .expect("dimension matches");
    pool.cache_likelihood(array![0.0, 0.0].view()).expect("dimension matches");
    let mut mixture = Mixture::new();
    mixture.add_component(0, 1.0).expect("valid weight");

    // Act
    let new_index = mixture.split_component(&mut pool, 0).expect("valid component");

    // Assert
    assert_eq!(new_index, 1);
    assert_eq!(pool.size(), 2);
    let weights: Vec<f64> = mixture.get_components().iter().map(|c| c.weight).collect();
    assert_eq!(weights, vec![0.5, 0.5]);
    let m0 = pool.get_pdf(0).expect("in range").get_mean();
    let m1 = pool.get_pdf(1).expect("in range").get_mean();
    assert!(((&m0 + &m1) / 2.0 - array![1.0, 2.0]).iter().all(|d| d.abs() < 1e-12));
    assert!(pool.get_log_likelihood(0).is_err());
}
