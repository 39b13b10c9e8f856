//! Rectangular cell mesh for the 2.5D forward model.
//!
//! Cells are addressed `(ix, iz)` with `ix` along the survey line and `iz`
//! increasing with depth. Flattened storage is row-major over `(nx, nz)`, so
//! the flat index of a cell is `ix * nz + iz`. Conductivity vectors, the
//! columns of the coupling matrix and the rows of the source matrix all use
//! this ordering.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub nx: usize,
    pub nz: usize,
    /// Horizontal cell widths (length `nx`).
    pub dx: Vec<f64>,
    /// Vertical cell heights (length `nz`).
    pub dz: Vec<f64>,
}

impl Mesh {
    /// Unit-spaced mesh, the discretisation used for dataset generation.
    pub fn uniform(nx: usize, nz: usize) -> Self {
        Self {
            nx,
            nz,
            dx: vec![1.0; nx],
            dz: vec![1.0; nz],
        }
    }

    pub fn from_spacing(dx: Vec<f64>, dz: Vec<f64>) -> Self {
        Self {
            nx: dx.len(),
            nz: dz.len(),
            dx,
            dz,
        }
    }

    #[inline]
    pub fn idx(&self, ix: usize, iz: usize) -> usize {
        ix * self.nz + iz
    }

    pub fn len(&self) -> usize {
        self.nx * self.nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total horizontal extent of the mesh.
    pub fn width(&self) -> f64 {
        self.dx.iter().sum()
    }

    /// Horizontal cell centres, with the mesh centred on `x = 0`.
    pub fn x_centers(&self) -> Vec<f64> {
        centers(&self.dx, -0.5 * self.width())
    }

    /// Vertical cell centres, measured downward from the surface.
    pub fn z_centers(&self) -> Vec<f64> {
        centers(&self.dz, 0.0)
    }

    /// Flat index of the cell containing `(x, z)`; points outside the mesh
    /// snap to the nearest boundary cell. `None` for an empty mesh.
    pub fn locate(&self, x: f64, z: f64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let ix = bin(&self.dx, x + 0.5 * self.width());
        let iz = bin(&self.dz, z);
        Some(self.idx(ix, iz))
    }
}

fn centers(spacing: &[f64], origin: f64) -> Vec<f64> {
    let mut edge = origin;
    spacing
        .iter()
        .map(|d| {
            let center = edge + 0.5 * d;
            edge += d;
            center
        })
        .collect()
}

fn bin(spacing: &[f64], offset: f64) -> usize {
    let mut edge = 0.0;
    for (i, d) in spacing.iter().enumerate() {
        edge += d;
        if offset < edge {
            return i;
        }
    }
    spacing.len().saturating_sub(1)
}
