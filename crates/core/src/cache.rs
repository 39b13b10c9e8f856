//! On-disk forward operator cache.
//!
//! Assembling the operator dominates preparation time, so it is persisted and
//! reused across runs. The artifact is a bincode-encoded [`OperatorArtifact`]
//! carrying a format version and a fingerprint of everything the operator was
//! assembled from (survey tables, mesh, `num_k_g`, kernel id).
//!
//! On load the artifact is classified:
//!
//! - absent → assemble and write ([`CacheOutcome::Created`])
//! - unreadable, foreign version, missing matrices, fingerprint or shape
//!   mismatch → assemble and overwrite ([`CacheOutcome::Recomputed`])
//! - otherwise → reuse without touching the file ([`CacheOutcome::Reused`])
//!
//! Staleness is never an error. Only I/O failures while writing and kernel
//! failures while assembling are.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::geometry::SourceReceiverSet;
use crate::grid::Mesh;
use crate::operator::{AssemblyInput, ForwardKernel, KernelError, Para, ShapeMismatch};

/// Bumped whenever the artifact layout changes.
pub const ARTIFACT_VERSION: u32 = 1;

// ============================================================================
// Artifact
// ============================================================================

/// Persisted operator plus the provenance needed to validate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorArtifact {
    pub format_version: u32,
    pub fingerprint: String,
    /// Coupling matrix `Q`.
    pub coupling: Option<Array2<f64>>,
    /// Source matrix `b`.
    pub sources: Option<Array2<f64>>,
}

impl OperatorArtifact {
    pub fn new(fingerprint: String, para: &Para) -> Self {
        Self {
            format_version: ARTIFACT_VERSION,
            fingerprint,
            coupling: Some(para.q.clone()),
            sources: Some(para.b.clone()),
        }
    }
}

/// Digest of every input operator assembly depends on.
pub fn fingerprint(set: &SourceReceiverSet, mesh: &Mesh, num_k_g: usize, kernel_id: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"fw25d-operator");
    hasher.update(&ARTIFACT_VERSION.to_le_bytes());
    hash_str(&mut hasher, kernel_id);
    hash_usize(&mut hasher, num_k_g);
    hash_floats(&mut hasher, &mesh.dx);
    hash_floats(&mut hasher, &mesh.dz);
    hash_usize(&mut hasher, set.srcloc.len());
    for row in &set.srcloc {
        hash_floats(&mut hasher, row);
    }
    hash_usize(&mut hasher, set.recloc.len());
    for row in &set.recloc {
        hash_floats(&mut hasher, row);
    }
    hash_usize(&mut hasher, set.srcnum.len());
    for &s in &set.srcnum {
        hash_usize(&mut hasher, s);
    }
    hasher.finalize().to_hex().to_string()
}

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    hash_usize(hasher, s.len());
    hasher.update(s.as_bytes());
}

fn hash_usize(hasher: &mut blake3::Hasher, v: usize) {
    hasher.update(&(v as u64).to_le_bytes());
}

fn hash_floats(hasher: &mut blake3::Hasher, values: &[f64]) {
    hash_usize(hasher, values.len());
    for v in values {
        hasher.update(&v.to_bits().to_le_bytes());
    }
}

// ============================================================================
// Cache States
// ============================================================================

/// Why an existing artifact could not be reused.
#[derive(Debug, Clone, PartialEq)]
pub enum StaleReason {
    Unreadable(String),
    FormatVersion { found: u32 },
    MissingCoupling,
    MissingSources,
    Fingerprint,
    Shape(ShapeMismatch),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::Unreadable(msg) => write!(f, "artifact unreadable ({msg})"),
            StaleReason::FormatVersion { found } => write!(
                f,
                "artifact format version {found}, expected {ARTIFACT_VERSION}"
            ),
            StaleReason::MissingCoupling => write!(f, "no Q matrix in artifact"),
            StaleReason::MissingSources => write!(f, "no b matrix in artifact"),
            StaleReason::Fingerprint => write!(f, "geometry or mesh fingerprint changed"),
            StaleReason::Shape(mismatch) => write!(f, "operator size is wrong: {mismatch}"),
        }
    }
}

/// What [`OperatorCache::obtain`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOutcome {
    Created,
    Reused,
    Recomputed(StaleReason),
}

impl CacheOutcome {
    pub fn recomputed(&self) -> bool {
        !matches!(self, CacheOutcome::Reused)
    }
}

impl fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheOutcome::Created => write!(f, "created"),
            CacheOutcome::Reused => write!(f, "reused"),
            CacheOutcome::Recomputed(reason) => write!(f, "recomputed ({reason})"),
        }
    }
}

/// Classification of whatever is on disk.
#[derive(Debug)]
pub enum CacheState {
    Absent,
    Stale(StaleReason),
    Valid(Para),
}

// ============================================================================
// Operator Cache
// ============================================================================

/// Operator cache keyed by file path.
#[derive(Debug, Clone)]
pub struct OperatorCache {
    path: PathBuf,
}

impl OperatorCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Classify the artifact on disk against the current survey.
    pub fn inspect(&self, set: &SourceReceiverSet, mesh: &Mesh, fingerprint: &str) -> CacheState {
        if !self.path.is_file() {
            return CacheState::Absent;
        }
        let artifact = match self.load() {
            Ok(artifact) => artifact,
            Err(e) => return CacheState::Stale(StaleReason::Unreadable(e.to_string())),
        };
        if artifact.format_version != ARTIFACT_VERSION {
            return CacheState::Stale(StaleReason::FormatVersion {
                found: artifact.format_version,
            });
        }
        let Some(q) = artifact.coupling else {
            return CacheState::Stale(StaleReason::MissingCoupling);
        };
        let Some(b) = artifact.sources else {
            return CacheState::Stale(StaleReason::MissingSources);
        };
        let para = Para { q, b };
        if let Err(mismatch) = para.check_shape(set, mesh) {
            return CacheState::Stale(StaleReason::Shape(mismatch));
        }
        if artifact.fingerprint != fingerprint {
            return CacheState::Stale(StaleReason::Fingerprint);
        }
        CacheState::Valid(para)
    }

    /// Return a valid operator for the survey, assembling and persisting it
    /// when the cache is absent or stale.
    pub fn obtain<K: ForwardKernel + ?Sized>(
        &self,
        set: &SourceReceiverSet,
        mesh: &Mesh,
        num_k_g: usize,
        kernel: &K,
    ) -> Result<(Arc<Para>, CacheOutcome), CacheError> {
        let fingerprint = fingerprint(set, mesh, num_k_g, kernel.id());
        let outcome = match self.inspect(set, mesh, &fingerprint) {
            CacheState::Valid(para) => {
                info!("loaded forward operator from {}", self.path.display());
                return Ok((Arc::new(para), CacheOutcome::Reused));
            }
            CacheState::Absent => {
                info!("creating forward operator at {}", self.path.display());
                CacheOutcome::Created
            }
            CacheState::Stale(reason) => {
                warn!(
                    "forward operator at {} is stale: {reason}; recomputing",
                    self.path.display()
                );
                CacheOutcome::Recomputed(reason)
            }
        };

        let para = assemble_uniform(set, mesh, num_k_g, kernel)?;
        self.store(&OperatorArtifact::new(fingerprint, &para))?;
        Ok((Arc::new(para), outcome))
    }

    pub fn load(&self) -> Result<OperatorArtifact, CacheError> {
        let file = File::open(&self.path).map_err(io_error(&self.path))?;
        bincode::deserialize_from(BufReader::new(file)).map_err(|source| CacheError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    /// Write through a sibling temporary file so readers never observe a
    /// partially written artifact. The temporary file is removed on failure.
    pub fn store(&self, artifact: &OperatorArtifact) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let tmp = temp_path(&self.path);
        let result = encode_to(&tmp, artifact)
            .and_then(|()| fs::rename(&tmp, &self.path).map_err(io_error(&self.path)));
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

fn encode_to(tmp: &Path, artifact: &OperatorArtifact) -> Result<(), CacheError> {
    let file = File::create(tmp).map_err(io_error(tmp))?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, artifact).map_err(|source| CacheError::Encode {
        path: tmp.to_owned(),
        source,
    })?;
    writer.flush().map_err(io_error(tmp))
}

/// Assemble the operator about a uniform unit-conductivity background.
pub fn assemble_uniform<K: ForwardKernel + ?Sized>(
    set: &SourceReceiverSet,
    mesh: &Mesh,
    num_k_g: usize,
    kernel: &K,
) -> Result<Para, KernelError> {
    let sigma = Array2::<f64>::ones((mesh.nx, mesh.nz));
    let input = AssemblyInput {
        srcloc: &set.srcloc,
        dx: &mesh.dx,
        dz: &mesh.dz,
        sigma: sigma.view(),
        num_k_g,
        recloc: &set.recloc,
        srcnum: &set.srcnum,
    };
    kernel.assemble(&input)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError {
    let path = path.to_owned();
    move |source| CacheError::Io { path, source }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("operator cache I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode operator cache {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: bincode::Error,
    },

    #[error("failed to encode operator cache {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        source: bincode::Error,
    },

    #[error(transparent)]
    Kernel(#[from] KernelError),
}
