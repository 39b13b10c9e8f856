//! Forward operator (`Para`) and the kernel trait that assembles and applies it.
//!
//! The operator is geometry- and discretisation-dependent but independent of
//! the conductivity model being simulated, so it is assembled once (see
//! [`crate::cache`]) and applied to many conductivity fields.
//!
//! Shapes:
//! - `q`: coupling matrix, `receivers × cells`
//! - `b`: source matrix, `cells × unique sources`

use std::f64::consts::PI;

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::geometry::{PairLocation, SourceReceiverSet};
use crate::grid::Mesh;

// ============================================================================
// Operator
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Para {
    /// Coupling matrix, one row per measurement, one column per cell.
    pub q: Array2<f64>,
    /// Source matrix, one row per cell, one column per unique source.
    pub b: Array2<f64>,
}

impl Para {
    /// Check the operator against the current survey and mesh.
    pub fn check_shape(&self, set: &SourceReceiverSet, mesh: &Mesh) -> Result<(), ShapeMismatch> {
        let (q_rows, q_cols) = self.q.dim();
        if q_rows != set.srcnum.len() {
            return Err(ShapeMismatch::CouplingRows {
                expected: set.srcnum.len(),
                found: q_rows,
            });
        }
        if q_cols != mesh.len() {
            return Err(ShapeMismatch::CouplingCols {
                expected: mesh.len(),
                found: q_cols,
            });
        }
        if self.b.ncols() != set.source_count() {
            return Err(ShapeMismatch::SourceCols {
                expected: set.source_count(),
                found: self.b.ncols(),
            });
        }
        Ok(())
    }

    pub fn receiver_count(&self) -> usize {
        self.q.nrows()
    }
}

/// Which operator invariant an artifact violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ShapeMismatch {
    #[error("Q has {found} rows, survey has {expected} measurements")]
    CouplingRows { expected: usize, found: usize },

    #[error("Q has {found} columns, mesh has {expected} cells")]
    CouplingCols { expected: usize, found: usize },

    #[error("b has {found} columns, survey has {expected} unique sources")]
    SourceCols { expected: usize, found: usize },
}

// ============================================================================
// Kernel Trait
// ============================================================================

/// Everything operator assembly depends on.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInput<'a> {
    pub srcloc: &'a [PairLocation],
    pub dx: &'a [f64],
    pub dz: &'a [f64],
    /// Reference conductivity on the `(nx, nz)` grid.
    pub sigma: ArrayView2<'a, f64>,
    /// Wavenumber quadrature size; its meaning belongs to the kernel.
    pub num_k_g: usize,
    pub recloc: &'a [PairLocation],
    pub srcnum: &'a [usize],
}

/// Result of one forward solve.
#[derive(Debug, Clone)]
pub struct KernelOutput {
    /// Simulated potential difference per measurement.
    pub dobs: Array1<f64>,
    /// Auxiliary per-source field (`cells × sources`).
    pub potentials: Array2<f64>,
}

/// A 2.5D forward solver: assembles the operator and applies it.
///
/// Implementations are shared read-only across worker threads.
pub trait ForwardKernel: Send + Sync {
    /// Stable identifier, folded into the operator cache fingerprint.
    fn id(&self) -> &str;

    fn assemble(&self, input: &AssemblyInput<'_>) -> Result<Para, KernelError>;

    /// `sigma` has shape `(nx, nz)`.
    fn solve(&self, sigma: ArrayView2<'_, f64>, para: &Para) -> Result<KernelOutput, KernelError>;
}

// ============================================================================
// Sensitivity Kernel
// ============================================================================

/// Linearised homogeneous half-space kernel.
///
/// `q[i, c]` is the sensitivity of measurement `i` to the resistivity of cell
/// `c`, `(gA - gB) · (gM - gN) · area / 4π²` with `gE` the gradient of `1/r`
/// from electrode `E`, scaled by the reference resistivity. A solve is
/// `dobs = q · ρ` with `ρ = 1/σ`. This is a stand-in with the right shapes
/// and determinism, not a 2.5D PDE solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensitivityKernel;

impl SensitivityKernel {
    pub const ID: &'static str = "halfspace-sensitivity-v1";

    pub fn new() -> Self {
        Self
    }
}

impl ForwardKernel for SensitivityKernel {
    fn id(&self) -> &str {
        Self::ID
    }

    fn assemble(&self, input: &AssemblyInput<'_>) -> Result<Para, KernelError> {
        let mesh = Mesh::from_spacing(input.dx.to_vec(), input.dz.to_vec());
        if input.sigma.dim() != (mesh.nx, mesh.nz) {
            return Err(KernelError::GridMismatch {
                expected: (mesh.nx, mesh.nz),
                found: input.sigma.dim(),
            });
        }
        if input.recloc.len() != input.srcnum.len() {
            return Err(KernelError::Assembly(format!(
                "{} receiver rows but {} source indices",
                input.recloc.len(),
                input.srcnum.len()
            )));
        }

        let xs = mesh.x_centers();
        let zs = mesh.z_centers();
        let floor = 0.25 * min_spacing(&mesh).powi(2);

        let mut q = Array2::<f64>::zeros((input.recloc.len(), mesh.len()));
        for (i, (rec, &s)) in input.recloc.iter().zip(input.srcnum).enumerate() {
            let src = input.srcloc.get(s).ok_or_else(|| {
                KernelError::Assembly(format!("receiver {i} points at missing source {s}"))
            })?;
            for ix in 0..mesh.nx {
                for iz in 0..mesh.nz {
                    let cell = [xs[ix], zs[iz]];
                    let ga = sub(
                        grad_inv_r(cell, [src[0], src[1]], floor),
                        grad_inv_r(cell, [src[2], src[3]], floor),
                    );
                    let gm = sub(
                        grad_inv_r(cell, [rec[0], rec[1]], floor),
                        grad_inv_r(cell, [rec[2], rec[3]], floor),
                    );
                    let area = mesh.dx[ix] * mesh.dz[iz];
                    let rho_ref = 1.0 / input.sigma[[ix, iz]];
                    q[[i, mesh.idx(ix, iz)]] =
                        rho_ref * area * (ga[0] * gm[0] + ga[1] * gm[1]) / (4.0 * PI * PI);
                }
            }
        }

        let mut b = Array2::<f64>::zeros((mesh.len(), input.srcloc.len()));
        for (s, src) in input.srcloc.iter().enumerate() {
            if let Some(a) = mesh.locate(src[0], src[1]) {
                b[[a, s]] += 1.0;
            }
            if let Some(bb) = mesh.locate(src[2], src[3]) {
                b[[bb, s]] -= 1.0;
            }
        }

        Ok(Para { q, b })
    }

    fn solve(&self, sigma: ArrayView2<'_, f64>, para: &Para) -> Result<KernelOutput, KernelError> {
        let cells = sigma.len();
        if para.q.ncols() != cells || para.b.nrows() != cells {
            return Err(KernelError::CellCount {
                expected: para.q.ncols(),
                found: cells,
            });
        }
        if let Some((position, &value)) = sigma
            .iter()
            .enumerate()
            .find(|(_, s)| !(s.is_finite() && **s > 0.0))
        {
            return Err(KernelError::NonPositiveConductivity { position, value });
        }

        let rho: Array1<f64> = sigma.iter().map(|s| 1.0 / s).collect();
        let dobs = para.q.dot(&rho);
        let potentials = &para.b * &rho.view().insert_axis(Axis(1));
        Ok(KernelOutput { dobs, potentials })
    }
}

fn min_spacing(mesh: &Mesh) -> f64 {
    let min = mesh
        .dx
        .iter()
        .chain(mesh.dz.iter())
        .copied()
        .fold(f64::INFINITY, f64::min);
    if min.is_finite() {
        min
    } else {
        1.0
    }
}

/// Gradient of `1/r` at `cell` for a point source at `electrode`, with
/// `floor` regularising `r²` near the electrode.
fn grad_inv_r(cell: [f64; 2], electrode: [f64; 2], floor: f64) -> [f64; 2] {
    let dx = cell[0] - electrode[0];
    let dz = cell[1] - electrode[1];
    let r2 = dx * dx + dz * dz + floor;
    let r3 = r2 * r2.sqrt();
    [-dx / r3, -dz / r3]
}

#[inline]
fn sub(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    #[error("conductivity grid is {found:?}, operator expects {expected:?}")]
    GridMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("conductivity vector has {found} cells, operator expects {expected}")]
    CellCount { expected: usize, found: usize },

    #[error("conductivity at cell {position} is {value}; must be finite and positive")]
    NonPositiveConductivity { position: usize, value: f64 },

    #[error("operator assembly failed: {0}")]
    Assembly(String),
}
