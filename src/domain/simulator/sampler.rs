use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

/// Source of execution-time jitter.
///
/// The VM pool asks the sampler for a concrete runtime given the expected
/// runtime on a machine and its standard deviation. Implementations must not
/// apply any floor; the caller clamps the result.
pub trait ExecutionTimeSampler: std::fmt::Debug {
    fn sample(&mut self, mean: f64, std_dev: f64) -> f64;
}

/// Normal-distribution sampler backed by a seedable `StdRng`.
#[derive(Debug)]
pub struct GaussianSampler {
    rng: StdRng,
}

impl GaussianSampler {
    pub fn from_seed(seed: u64) -> Self {
        GaussianSampler { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        GaussianSampler { rng: StdRng::from_os_rng() }
    }

    /// Seeded when a seed is given, entropy-backed otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::from_seed(seed),
            None => Self::from_entropy(),
        }
    }
}

impl ExecutionTimeSampler for GaussianSampler {
    fn sample(&mut self, mean: f64, std_dev: f64) -> f64 {
        if std_dev <= 0.0 {
            return mean;
        }

        match Normal::new(mean, std_dev) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(e) => {
                log::warn!("Cannot build normal distribution (mean {}, std dev {}): {}. Using the mean.", mean, std_dev, e);
                mean
            }
        }
    }
}
