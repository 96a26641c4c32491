//! Gaussian Process (GP) sampler with Expected Improvement acquisition.
//!
//! Builds a Gaussian Process surrogate with a **Matérn 5/2 kernel** (with
//! ARD lengthscales) over the unit cube and selects the next candidate by
//! maximizing the **Expected Improvement (EI)** acquisition function.
//!
//! # Algorithm overview
//!
//! 1. **Fit GP**: observations are standardized (zero mean, unit variance)
//!    and a GP is fitted via Cholesky decomposition. ARD lengthscales are set
//!    to the per-dimension standard deviation of the training inputs. A known
//!    standard error of the mean adds `(sem / y_std)²` to that observation's
//!    diagonal entry.
//! 2. **Maximize EI**: `n_candidates` random points (with pinned dimensions
//!    held at their fixed values) are evaluated under the GP posterior and
//!    the point with the highest Expected Improvement is returned.
//!
//! The GP uses at most 100 training points (the most recent ones) to keep
//! the O(n³) fitting cost manageable. With fewer than two observations, or
//! when the Cholesky decomposition fails, candidates are drawn uniformly.
//!
//! # Configuration
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `n_candidates` | 1000 | Random candidates for EI maximization |
//! | `noise_variance` | 1e-6 | Observation noise added to kernel diagonal |
//! | `seed` | random | RNG seed for reproducibility |

use nalgebra::{DMatrix, DVector};
use parking_lot::Mutex;

use super::common::{materialize, pinned_dimensions, random_unit_point};
use super::{Observation, Sampler};
use crate::search_space::{FixedFeatures, ParameterMap, SearchSpace};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Gaussian Process sampler for Bayesian optimization.
///
/// # Examples
///
/// ```
/// use sim_optimizer::sampler::GpSampler;
///
/// let sampler = GpSampler::builder()
///     .n_candidates(2000)
///     .noise_variance(1e-4)
///     .seed(42)
///     .build();
/// ```
pub struct GpSampler {
    n_candidates: usize,
    noise_variance: f64,
    rng: Mutex<fastrand::Rng>,
}

impl GpSampler {
    /// Creates a new GP sampler with a random seed.
    #[must_use]
    pub fn new() -> Self {
        GpSamplerBuilder::new().build()
    }

    /// Creates a new GP sampler with a fixed seed for reproducibility.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        GpSamplerBuilder::new().seed(seed).build()
    }

    /// Creates a builder for configuring a `GpSampler`.
    #[must_use]
    pub fn builder() -> GpSamplerBuilder {
        GpSamplerBuilder::new()
    }

    /// Fits a GP to `history`.
    ///
    /// Returns `None` with fewer than two observations or when the kernel
    /// matrix is not positive definite.
    #[must_use]
    pub fn fit(&self, history: &[Observation]) -> Option<FittedGp> {
        fit_gp(history, self.noise_variance)
    }

    /// Samples a candidate using an already fitted model, or uniformly at
    /// random when `model` is `None`.
    #[must_use]
    pub fn sample_with(
        &self,
        model: Option<&FittedGp>,
        space: &SearchSpace,
        fixed: &FixedFeatures,
    ) -> ParameterMap {
        let pinned = pinned_dimensions(space, fixed);
        let mut rng = self.rng.lock();
        let point = match model {
            Some(model) if model.n_dims() == space.len() => {
                optimize_acquisition(model, space.len(), &pinned, self.n_candidates, &mut rng)
            }
            _ => random_unit_point(&mut rng, space.len()),
        };
        materialize(space, fixed, &point)
    }
}

impl Default for GpSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for configuring a [`GpSampler`].
///
/// All options have sensible defaults:
/// - `n_candidates`: 1000
/// - `noise_variance`: 1e-6
/// - `seed`: random
#[derive(Debug, Clone, Default)]
pub struct GpSamplerBuilder {
    n_candidates: Option<usize>,
    noise_variance: Option<f64>,
    seed: Option<u64>,
}

impl GpSamplerBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of random candidate points for acquisition optimization.
    ///
    /// Default: 1000.
    #[must_use]
    pub fn n_candidates(mut self, n: usize) -> Self {
        self.n_candidates = Some(n);
        self
    }

    /// Sets the observation noise variance added to the kernel diagonal.
    ///
    /// Default: 1e-6 (near-noiseless).
    #[must_use]
    pub fn noise_variance(mut self, v: f64) -> Self {
        self.noise_variance = Some(v);
        self
    }

    /// Sets the random seed for reproducibility.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the configured [`GpSampler`].
    #[must_use]
    pub fn build(self) -> GpSampler {
        GpSampler {
            n_candidates: self.n_candidates.unwrap_or(DEFAULT_N_CANDIDATES).max(1),
            noise_variance: self.noise_variance.unwrap_or(DEFAULT_NOISE_VAR),
            rng: Mutex::new(
                self.seed
                    .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed),
            ),
        }
    }
}

/// A fitted GP model ready for predictions.
///
/// This is the artifact cached by a generation step between proposals.
/// It is never serialized.
#[derive(Debug)]
pub struct FittedGp {
    /// Cholesky factor L of K + Σ.
    cholesky: nalgebra::linalg::Cholesky<f64, nalgebra::Dyn>,
    /// α = (K + Σ)^{-1} y.
    alpha: DVector<f64>,
    /// Training inputs (each row is a data point in [0, 1]^d).
    x_train: Vec<Vec<f64>>,
    /// ARD lengthscales per dimension.
    lengthscales: Vec<f64>,
    /// Signal variance.
    signal_var: f64,
    /// Best observed (standardized) y.
    f_best: f64,
    /// Number of observations in the history the model was fitted on.
    n_observations: usize,
}

impl FittedGp {
    /// Number of observations in the history the model was fitted on.
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    /// Dimensionality of the training inputs.
    #[must_use]
    pub fn n_dims(&self) -> usize {
        self.lengthscales.len()
    }

    /// Posterior mean and standard deviation (standardized units) at `x`.
    #[must_use]
    pub fn predict(&self, x: &[f64]) -> (f64, f64) {
        predict(self, x)
    }
}

// ---------------------------------------------------------------------------
// Internal constants
// ---------------------------------------------------------------------------

/// Default number of candidate points for EI optimization.
const DEFAULT_N_CANDIDATES: usize = 1000;
/// Default observation noise variance.
const DEFAULT_NOISE_VAR: f64 = 1e-6;
/// Maximum number of training points to use for the GP.
const MAX_TRAIN_POINTS: usize = 100;
/// Precomputed √5 constant.
const SQRT_5: f64 = 2.236_067_977_499_79;

// ---------------------------------------------------------------------------
// Matérn 5/2 kernel
// ---------------------------------------------------------------------------

/// Matérn 5/2 kernel with ARD lengthscales.
///
/// `k(x1, x2) = σ² (1 + √5 r + 5/3 r²) exp(-√5 r)`
/// where `r = sqrt(Σ ((x1_i - x2_i) / l_i)²)`
fn matern52(x1: &[f64], x2: &[f64], lengthscales: &[f64], signal_var: f64) -> f64 {
    let mut r_sq = 0.0;
    for i in 0..x1.len() {
        let diff = (x1[i] - x2[i]) / lengthscales[i];
        r_sq += diff * diff;
    }
    let r = r_sq.sqrt();
    let sqrt5_r = SQRT_5 * r;
    signal_var * (1.0 + sqrt5_r + 5.0 / 3.0 * r_sq) * (-sqrt5_r).exp()
}

/// Build the kernel matrix `K + diag(noise)`.
fn kernel_matrix(x: &[Vec<f64>], lengthscales: &[f64], signal_var: f64, noise: &[f64]) -> DMatrix<f64> {
    let n = x.len();
    DMatrix::from_fn(n, n, |i, j| {
        let k = matern52(&x[i], &x[j], lengthscales, signal_var);
        if i == j { k + noise[i] } else { k }
    })
}

/// Compute the kernel vector k(x*, X) for a test point.
fn kernel_vector(x_star: &[f64], x_train: &[Vec<f64>], lengthscales: &[f64], signal_var: f64) -> DVector<f64> {
    DVector::from_fn(x_train.len(), |i, _| {
        matern52(x_star, &x_train[i], lengthscales, signal_var)
    })
}

// ---------------------------------------------------------------------------
// GP fitting and prediction
// ---------------------------------------------------------------------------

#[allow(clippy::cast_precision_loss)]
fn fit_gp(history: &[Observation], noise_var: f64) -> Option<FittedGp> {
    let start = history.len().saturating_sub(MAX_TRAIN_POINTS);
    let recent = &history[start..];
    let n = recent.len();
    if n < 2 {
        return None;
    }
    let d = recent[0].point.len();
    if d == 0 || recent.iter().any(|o| o.point.len() != d) {
        return None;
    }

    // Standardize y
    let y_mean = recent.iter().map(|o| o.value).sum::<f64>() / n as f64;
    let y_var = recent.iter().map(|o| (o.value - y_mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let y_std = y_var.sqrt().max(1e-10);
    let y_standardized: Vec<f64> = recent.iter().map(|o| (o.value - y_mean) / y_std).collect();
    let f_best = y_standardized.iter().copied().fold(f64::INFINITY, f64::min);

    let noise: Vec<f64> = recent
        .iter()
        .map(|o| noise_var + o.sem.map_or(0.0, |s| (s / y_std).powi(2)))
        .collect();

    let x_train: Vec<Vec<f64>> = recent.iter().map(|o| o.point.clone()).collect();

    // ARD lengthscales: per-dimension std dev of training X, clamped
    let lengthscales: Vec<f64> = (0..d)
        .map(|j| {
            let mean_j = x_train.iter().map(|x| x[j]).sum::<f64>() / n as f64;
            let var_j = x_train.iter().map(|x| (x[j] - mean_j).powi(2)).sum::<f64>() / n as f64;
            var_j.sqrt().max(0.01)
        })
        .collect();

    // Signal variance = 1.0 (data is standardized)
    let signal_var = 1.0;

    let k = kernel_matrix(&x_train, &lengthscales, signal_var, &noise);
    let cholesky = nalgebra::linalg::Cholesky::new(k)?;

    let y_vec = DVector::from_column_slice(&y_standardized);
    let alpha = cholesky.solve(&y_vec);

    Some(FittedGp {
        cholesky,
        alpha,
        x_train,
        lengthscales,
        signal_var,
        f_best,
        n_observations: history.len(),
    })
}

fn predict(model: &FittedGp, x: &[f64]) -> (f64, f64) {
    let k_star = kernel_vector(x, &model.x_train, &model.lengthscales, model.signal_var);

    // Mean: k*^T α
    let mean = k_star.dot(&model.alpha);

    // Variance: k(x*, x*) - k*^T (K + Σ)^{-1} k*
    let v = model.cholesky.solve(&k_star);
    let var = (model.signal_var - k_star.dot(&v)).max(0.0);

    (mean, var.sqrt())
}

// ---------------------------------------------------------------------------
// Normal distribution helpers
// ---------------------------------------------------------------------------

/// Standard normal PDF.
fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF (Hart approximation).
fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let abs_x = x.abs();
    let t = 1.0 / (1.0 + 0.231_641_9 * abs_x);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;

    let poly = 0.319_381_530 * t - 0.356_563_782 * t2 + 1.781_477_937 * t3 - 1.821_255_978 * t4
        + 1.330_274_429 * t5;
    let cdf = 1.0 - norm_pdf(abs_x) * poly;

    if x >= 0.0 { cdf } else { 1.0 - cdf }
}

/// `EI(x) = (f_best - mean) Φ(z) + std φ(z)` where `z = (f_best - mean) / std`
fn expected_improvement(mean: f64, std: f64, f_best: f64) -> f64 {
    if std < 1e-12 {
        return (f_best - mean).max(0.0);
    }
    let z = (f_best - mean) / std;
    let improvement = (f_best - mean) * norm_cdf(z) + std * norm_pdf(z);
    improvement.max(0.0)
}

// ---------------------------------------------------------------------------
// Acquisition optimization
// ---------------------------------------------------------------------------

/// Find the point of [0, 1]^d maximizing EI via random search, with pinned
/// dimensions held at their values.
fn optimize_acquisition(
    model: &FittedGp,
    n_dims: usize,
    pinned: &[(usize, f64)],
    n_candidates: usize,
    rng: &mut fastrand::Rng,
) -> Vec<f64> {
    let mut best_ei = f64::NEG_INFINITY;
    let mut best_x = vec![0.5; n_dims];

    for _ in 0..n_candidates {
        let mut x = random_unit_point(rng, n_dims);
        for &(dim, value) in pinned {
            x[dim] = value;
        }
        let (mean, std) = predict(model, &x);
        let ei = expected_improvement(mean, std, model.f_best);
        if ei > best_ei {
            best_ei = ei;
            best_x = x;
        }
    }

    best_x
}

// ---------------------------------------------------------------------------
// Sampler trait implementation
// ---------------------------------------------------------------------------

impl Sampler for GpSampler {
    fn sample(
        &self,
        space: &SearchSpace,
        fixed: &FixedFeatures,
        _position: u64,
        history: &[Observation],
    ) -> ParameterMap {
        let model = self.fit(history);
        self.sample_with(model.as_ref(), space, fixed)
    }
}
