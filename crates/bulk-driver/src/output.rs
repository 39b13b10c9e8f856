//! Per-sample output records.
//!
//! Every sample is persisted to its own file as `{inputs, targets}`: the
//! simulated observation vector and the resistivity field (`1 / sigma`) that
//! produced it. Files are written through a sibling temporary and renamed,
//! so a reader never sees a partial record under the final name.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name prefix of sample records.
pub const RECORD_PREFIX: &str = "raw_data_";

/// One training example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Simulated measurements, one per receiver.
    pub inputs: Vec<f64>,
    /// Resistivity per cell, `1 / sigma`, same ordering as the field.
    pub targets: Vec<f64>,
}

impl SampleRecord {
    pub fn new(observations: impl IntoIterator<Item = f64>, sigma: &[f64]) -> Self {
        Self {
            inputs: observations.into_iter().collect(),
            targets: sigma.iter().map(|s| 1.0 / s).collect(),
        }
    }
}

/// Record encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Bincode,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Bincode => "bin",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Bincode => write!(f, "bincode"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Write through a sibling temporary file, removed again if any step fails.
pub fn write_record(path: &Path, record: &SampleRecord, format: OutputFormat) -> Result<(), OutputError> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let result = encode_to(&tmp, record, format).and_then(|()| {
        fs::rename(&tmp, path).map_err(|source| OutputError::Io {
            path: path.to_owned(),
            source,
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn encode_to(tmp: &Path, record: &SampleRecord, format: OutputFormat) -> Result<(), OutputError> {
    let file = File::create(tmp).map_err(|source| OutputError::Io {
        path: tmp.to_owned(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    match format {
        OutputFormat::Bincode => bincode::serialize_into(&mut writer, record).map_err(|source| {
            OutputError::Bincode {
                path: tmp.to_owned(),
                source,
            }
        })?,
        OutputFormat::Json => serde_json::to_writer(&mut writer, record).map_err(|source| {
            OutputError::Json {
                path: tmp.to_owned(),
                source,
            }
        })?,
    }
    writer.flush().map_err(|source| OutputError::Io {
        path: tmp.to_owned(),
        source,
    })
}

pub fn read_record(path: &Path, format: OutputFormat) -> Result<SampleRecord, OutputError> {
    let file = File::open(path).map_err(|source| OutputError::Io {
        path: path.to_owned(),
        source,
    })?;
    let reader = BufReader::new(file);
    match format {
        OutputFormat::Bincode => {
            bincode::deserialize_from(reader).map_err(|source| OutputError::Bincode {
                path: path.to_owned(),
                source,
            })
        }
        OutputFormat::Json => serde_json::from_reader(reader).map_err(|source| OutputError::Json {
            path: path.to_owned(),
            source,
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("bincode error on {}: {source}", path.display())]
    Bincode {
        path: PathBuf,
        source: bincode::Error,
    },

    #[error("JSON error on {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
