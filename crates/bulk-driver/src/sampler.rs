//! Conductivity model samplers.
//!
//! A sampler hands the driver a finite, exactly sized stream of conductivity
//! fields. Each field is a `Vec<f64>` of length `nx * nz` flattened
//! `ix * nz + iz`. The driver pairs the stream with output indices in order,
//! so the i-th field drawn is written to the i-th allocated index.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use fw25d_core::Mesh;

use crate::config::SamplerConfig;

/// Source of conductivity fields.
pub trait ModelSampler {
    type Samples: Iterator<Item = Vec<f64>> + Send;

    /// Up to `count` fields for `mesh`. Yielding fewer is reported by the
    /// driver as a shortfall.
    fn samples(&mut self, mesh: &Mesh, count: usize) -> Self::Samples;
}

// ============================================================================
// Log-Uniform Sampler
// ============================================================================

/// Independent per-cell conductivity, log-uniform in `[sigma_min, sigma_max]`.
///
/// Every call to [`ModelSampler::samples`] derives a child stream from the
/// sampler's own generator, so partitions drawn from one seeded sampler are
/// distinct but reproducible.
#[derive(Debug, Clone)]
pub struct LogUniformSampler {
    rng: ChaCha8Rng,
    ln_min: f64,
    ln_max: f64,
}

impl LogUniformSampler {
    pub fn new(sigma_min: f64, sigma_max: f64, seed: u64) -> Self {
        let (lo, hi) = if sigma_min <= sigma_max {
            (sigma_min, sigma_max)
        } else {
            (sigma_max, sigma_min)
        };
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            ln_min: lo.ln(),
            ln_max: hi.ln(),
        }
    }

    /// Seeded from the config, or from the thread RNG when no seed is set.
    pub fn from_config(config: &SamplerConfig) -> Self {
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        Self::new(config.sigma_min, config.sigma_max, seed)
    }
}

impl ModelSampler for LogUniformSampler {
    type Samples = LogUniformSamples;

    fn samples(&mut self, mesh: &Mesh, count: usize) -> LogUniformSamples {
        LogUniformSamples {
            rng: ChaCha8Rng::seed_from_u64(self.rng.random()),
            cells: mesh.len(),
            remaining: count,
            ln_min: self.ln_min,
            ln_max: self.ln_max,
        }
    }
}

/// Lazy field stream returned by [`LogUniformSampler`].
#[derive(Debug)]
pub struct LogUniformSamples {
    rng: ChaCha8Rng,
    cells: usize,
    remaining: usize,
    ln_min: f64,
    ln_max: f64,
}

impl Iterator for LogUniformSamples {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Vec<f64>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let field = (0..self.cells)
            .map(|_| self.rng.random_range(self.ln_min..=self.ln_max).exp())
            .collect();
        Some(field)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for LogUniformSamples {}
