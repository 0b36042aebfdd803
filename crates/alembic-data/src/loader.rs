//! File discovery, format detection and deserialization helpers.
//!
//! Content files are looked up by base name; the extension picks the parser.
//! Two files sharing a base name in different formats is an error rather
//! than a silent preference.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use alembic_core::registry::RegistryError;
use serde::de::DeserializeOwned;

use crate::schema::OutOfRange;

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("{dir} has no {file} file")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("{file}: expected a .ron, .toml or .json extension")]
    UnsupportedFormat { file: PathBuf },

    #[error("{a} and {b} define the same content")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("{file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("{file}: no {expected_kind} named '{name}'")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("{file}: '{name}' is defined twice")]
    DuplicateName { file: PathBuf, name: String },

    /// Content parsed but was rejected by the registry.
    #[error("invalid content in {file}: {source}")]
    Invalid {
        file: PathBuf,
        #[source]
        source: RegistryError,
    },

    /// A machine setting parsed but cannot be represented.
    #[error("{file}: {source}")]
    OutOfRange {
        file: PathBuf,
        #[source]
        source: OutOfRange,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    const EXTENSIONS: [(&'static str, Format); 3] =
        [("ron", Format::Ron), ("toml", Format::Toml), ("json", Format::Json)];
}

pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::EXTENSIONS
        .iter()
        .find(|(candidate, _)| Some(*candidate) == ext)
        .map(|(_, format)| *format)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Find `{base_name}.ron|toml|json` in `dir`. `Ok(None)` when absent.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for (ext, _) in Format::EXTENSIONS {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

fn parse<T: DeserializeOwned>(format: Format, content: &str, path: &Path) -> Result<T, DataLoadError> {
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(content).map_err(|e| parse_error(path, e)),
    }
}

/// Read and deserialize a single value.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    parse(format, &content, path)
}

/// Read a list. RON and JSON files hold the list at the top level; TOML
/// cannot, so there it lives under `toml_key` (`[[toml_key]]` tables).
pub fn deserialize_list<T: DeserializeOwned>(path: &Path, toml_key: &str) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    if format != Format::Toml {
        return parse(format, &content, path);
    }

    let mut table: toml::Table = parse(format, &content, path)?;
    let array = table
        .remove(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?;
    array.try_into().map_err(|e: toml::de::Error| parse_error(path, e))
}

// ===========================================================================
// Name resolution
// ===========================================================================

pub fn resolve_name<V: Copy>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<V, DataLoadError> {
    map.get(name).copied().ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Insert `name -> value`, rejecting a name seen before in the same table.
pub fn insert_unique<V>(
    map: &mut HashMap<String, V>,
    name: &str,
    value: V,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        return Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        });
    }
    map.insert(name.to_string(), value);
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
