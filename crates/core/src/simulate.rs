//! Forward simulation: conductivity field in, synthetic measurements out.
//!
//! [`ForwardContext::prepare`] does the expensive, model-independent work once
//! (geometry resolution and operator cache). A [`ForwardSimulator`] then
//! applies the shared operator to any number of conductivity vectors and is
//! safe to call from many threads at once.

use std::sync::Arc;

use log::info;
use ndarray::{Array1, ArrayView2};

use crate::cache::{CacheError, CacheOutcome, OperatorCache};
use crate::geometry::{self, ArrayType, GeometryError, ResolveReport, SourceReceiverSet};
use crate::grid::Mesh;
use crate::io::{ConfigError, ForwardConfig};
use crate::operator::{ForwardKernel, KernelError, Para};

// ============================================================================
// Context
// ============================================================================

/// Read-only state shared by every simulation of one run.
#[derive(Debug, Clone)]
pub struct ForwardContext {
    pub sources: SourceReceiverSet,
    pub mesh: Mesh,
    pub para: Arc<Para>,
    pub cache_outcome: CacheOutcome,
    pub report: ResolveReport,
}

impl ForwardContext {
    /// Resolve the survey and obtain the forward operator. An empty survey is
    /// refused before the operator cache is read or written.
    pub fn prepare<K: ForwardKernel + ?Sized>(
        config: &ForwardConfig,
        kernel: &K,
    ) -> Result<Self, ForwardError> {
        let raw = config.read_geometry()?;
        let (sources, report) = geometry::resolve(&raw, config.array_type)?;
        if sources.is_empty() {
            return Err(ForwardError::EmptyGeometry {
                array_type: config.array_type,
            });
        }
        let mesh = config.mesh();

        info!(
            "survey {}: {} measurements from {} unique sources",
            config.array_type,
            sources.receiver_count(),
            sources.source_count()
        );

        let cache = OperatorCache::new(&config.para_path);
        let (para, cache_outcome) = cache.obtain(&sources, &mesh, config.num_k_g, kernel)?;

        Ok(Self {
            sources,
            mesh,
            para,
            cache_outcome,
            report,
        })
    }

    /// Length of every simulated measurement vector.
    pub fn receiver_count(&self) -> usize {
        self.sources.receiver_count()
    }

    /// Length every conductivity vector must have.
    pub fn cell_count(&self) -> usize {
        self.mesh.len()
    }
}

// ============================================================================
// Simulator
// ============================================================================

/// Applies a prepared operator to conductivity vectors.
#[derive(Debug)]
pub struct ForwardSimulator<K> {
    context: Arc<ForwardContext>,
    kernel: Arc<K>,
}

impl<K> Clone for ForwardSimulator<K> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            kernel: Arc::clone(&self.kernel),
        }
    }
}

impl<K: ForwardKernel> ForwardSimulator<K> {
    pub fn new(context: Arc<ForwardContext>, kernel: Arc<K>) -> Self {
        Self { context, kernel }
    }

    pub fn prepare(config: &ForwardConfig, kernel: Arc<K>) -> Result<Self, ForwardError> {
        let context = ForwardContext::prepare(config, kernel.as_ref())?;
        Ok(Self::new(Arc::new(context), kernel))
    }

    pub fn context(&self) -> &ForwardContext {
        &self.context
    }

    /// Simulate one conductivity vector of length `nx * nz`, flattened
    /// `ix * nz + iz`. Returns one value per measurement.
    pub fn simulate(&self, sigma: &[f64]) -> Result<Array1<f64>, ForwardError> {
        let mesh = &self.context.mesh;
        if sigma.len() != mesh.len() {
            return Err(ForwardError::LengthMismatch {
                expected: mesh.len(),
                found: sigma.len(),
            });
        }
        let grid = ArrayView2::from_shape((mesh.nx, mesh.nz), sigma).map_err(|_| {
            ForwardError::LengthMismatch {
                expected: mesh.len(),
                found: sigma.len(),
            }
        })?;
        let output = self.kernel.solve(grid, &self.context.para)?;
        Ok(output.dobs)
    }
}

/// One-shot convenience: prepare (reusing the operator cache) and simulate a
/// single conductivity vector.
pub fn forward_simulation<K: ForwardKernel>(
    sigma: &[f64],
    config: &ForwardConfig,
    kernel: Arc<K>,
) -> Result<Array1<f64>, ForwardError> {
    ForwardSimulator::prepare(config, kernel)?.simulate(sigma)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("no measurements survive the {array_type} array filter")]
    EmptyGeometry { array_type: ArrayType },

    #[error("conductivity vector has {found} values, mesh has {expected} cells")]
    LengthMismatch { expected: usize, found: usize },
}
