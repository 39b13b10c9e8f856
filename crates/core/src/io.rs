//! Configuration and geometry file parsing.
//!
//! Both files are TOML. The forward section carries everything needed to
//! resolve the survey and obtain the forward operator:
//!
//! ```toml
//! [forward]
//! geometry_urf = "geometry.toml"
//! array_type = "Wenner"
//! nx = 64
//! nz = 20
//! Para_pkl = "cache/para.bin"
//! num_k_g = 4
//! ```
//!
//! The geometry description lists electrode roles, the coordinate table
//! (`[id, x, y, z]`, `z` positive up) and optionally an explicit list of
//! `[c1, c2, p1, p2]` measurements:
//!
//! ```toml
//! current = [1, 2, 3, 4]
//! potential = [1, 2, 3, 4]
//! coordinates = [
//!     [1, 0.0, 0.0, 0.0],
//!     [2, 1.0, 0.0, 0.0],
//!     [3, 2.0, 0.0, 0.0],
//!     [4, 3.0, 0.0, 0.0],
//! ]
//! pairs = [[1, 4, 2, 3]]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::geometry::{ArrayType, Electrode, ElectrodeQuadruple, GeometryError, RawGeometry};
use crate::grid::Mesh;

// ============================================================================
// Forward Configuration
// ============================================================================

/// Survey, discretisation and operator-cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardConfig {
    /// Path to the geometry description.
    pub geometry_urf: PathBuf,

    /// Electrode arrangement policy.
    pub array_type: ArrayType,

    /// Number of cells along the line.
    pub nx: usize,

    /// Number of cells in depth.
    pub nz: usize,

    /// Operator cache file.
    #[serde(rename = "Para_pkl", alias = "para_path")]
    pub para_path: PathBuf,

    /// Wavenumber quadrature size, passed through to the kernel.
    pub num_k_g: usize,
}

impl ForwardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nx == 0 || self.nz == 0 {
            return Err(ConfigError::Invalid(format!(
                "grid must have at least one cell in each direction (nx={}, nz={})",
                self.nx, self.nz
            )));
        }
        if self.num_k_g == 0 {
            return Err(ConfigError::Invalid("num_k_g must be positive".into()));
        }
        if self.para_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("Para_pkl must not be empty".into()));
        }
        Ok(())
    }

    /// Make relative paths relative to `base` (the config file's directory).
    pub fn rebase(&mut self, base: &Path) {
        rebase_path(&mut self.geometry_urf, base);
        rebase_path(&mut self.para_path, base);
    }

    pub fn mesh(&self) -> Mesh {
        Mesh::uniform(self.nx, self.nz)
    }

    pub fn read_geometry(&self) -> Result<RawGeometry, ConfigError> {
        read_geometry(&self.geometry_urf)
    }
}

/// Join `path` onto `base` when it is relative.
pub fn rebase_path(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

/// Wrapper so a forward section can be parsed on its own.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ForwardFile {
    forward: ForwardConfig,
}

/// Load a file that contains only a `[forward]` section.
pub fn read_forward_config(path: &Path) -> Result<ForwardConfig, ConfigError> {
    let content = read_text(path)?;
    let file: ForwardFile = toml::from_str(&content).map_err(|source| ConfigError::Toml {
        path: path.to_owned(),
        source,
    })?;
    let mut config = file.forward;
    if let Some(base) = path.parent() {
        config.rebase(base);
    }
    config.validate()?;
    Ok(config)
}

// ============================================================================
// Geometry Description
// ============================================================================

/// On-disk survey description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeometryFile {
    #[serde(default)]
    pub current: Vec<u32>,
    #[serde(default)]
    pub potential: Vec<u32>,
    #[serde(default)]
    pub aux_potential: Vec<u32>,
    /// `[id, x, y, z]` rows.
    #[serde(default)]
    pub coordinates: Vec<[f64; 4]>,
    #[serde(default)]
    pub pairs: Option<Vec<[u32; 4]>>,
}

impl TryFrom<GeometryFile> for RawGeometry {
    type Error = GeometryError;

    fn try_from(file: GeometryFile) -> Result<Self, Self::Error> {
        let electrodes = file
            .coordinates
            .iter()
            .enumerate()
            .map(|(row, &[id, x, y, z])| {
                if id.fract() != 0.0 || id < 0.0 || id > f64::from(u32::MAX) {
                    return Err(GeometryError::InvalidCoordinate {
                        row,
                        reason: format!("electrode id {id} is not a non-negative integer"),
                    });
                }
                if !(x.is_finite() && y.is_finite() && z.is_finite()) {
                    return Err(GeometryError::InvalidCoordinate {
                        row,
                        reason: "coordinates must be finite".into(),
                    });
                }
                Ok(Electrode {
                    id: id as u32,
                    x,
                    y,
                    z,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pairs = file.pairs.map(|rows| {
            rows.into_iter()
                .map(|[c1, c2, p1, p2]| ElectrodeQuadruple::new(c1, c2, p1, p2))
                .collect()
        });

        Ok(RawGeometry {
            current: file.current,
            potential: file.potential,
            aux_potential: file.aux_potential,
            electrodes,
            pairs,
        })
    }
}

/// Read and convert a geometry description.
pub fn read_geometry(path: &Path) -> Result<RawGeometry, ConfigError> {
    let content = read_text(path)?;
    let file: GeometryFile = toml::from_str(&content).map_err(|source| ConfigError::Toml {
        path: path.to_owned(),
        source,
    })?;
    Ok(RawGeometry::try_from(file)?)
}

pub fn read_text(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })
}

// ============================================================================
// Errors
// ============================================================================

/// Configuration and geometry loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
