//! # Policy Loading
//!
//! Reads policy definitions from YAML or JSON. A document holds either one
//! policy object or a list of them. A directory loads every `*.yaml`,
//! `*.yml` and `*.json` file in file-name order; duplicate names across
//! files are rejected the same way as within one file.

use std::path::{Path, PathBuf};

use govern_core::ConfigError;
use serde_json::Value;

use crate::policy::{PolicyDefinition, PolicySet};

/// Source format of a policy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    /// YAML 1.2 (also accepts most JSON).
    Yaml,
    /// Strict JSON.
    Json,
}

impl PolicyFormat {
    /// Infer from a file extension; anything but `.json` is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Parse definitions from document text. `source_name` labels errors.
pub fn parse_definitions(
    text: &str,
    format: PolicyFormat,
    source_name: &str,
) -> Result<Vec<PolicyDefinition>, ConfigError> {
    let malformed = |reason: String| ConfigError::Malformed {
        source_name: source_name.to_string(),
        reason,
    };

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let doc: Value = match format {
        PolicyFormat::Json => serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?,
        PolicyFormat::Yaml => serde_yaml::from_str(text).map_err(|e| malformed(e.to_string()))?,
    };

    match doc {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::from_value(item).map_err(|e| malformed(format!("entry {i}: {e}")))
            })
            .collect(),
        Value::Object(map) => Ok(vec![
            serde_json::from_value(Value::Object(map)).map_err(|e| malformed(e.to_string()))?
        ]),
        Value::Null => Ok(Vec::new()),
        _ => Err(malformed(
            "expected a policy object or a list of policy objects".to_string(),
        )),
    }
}

/// Parse and validate a policy set from document text.
pub fn load_policies_from_str(
    text: &str,
    format: PolicyFormat,
    source_name: &str,
) -> Result<PolicySet, ConfigError> {
    let defs = parse_definitions(text, format, source_name)?;
    PolicySet::from_definitions(&defs)
}

/// Read definitions from one file.
pub fn read_policy_file(path: &Path) -> Result<Vec<PolicyDefinition>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_definitions(&text, PolicyFormat::from_path(path), &path.display().to_string())
}

/// Policy files in `dir`, sorted by file name.
pub fn policy_files_in(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let io_err = |source: std::io::Error| ConfigError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_policy = path.is_file()
            && matches!(
                path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
                Some("yaml" | "yml" | "json")
            );
        if is_policy {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Load a validated policy set from a file or a directory of files.
pub fn load_policies(path: &Path) -> Result<PolicySet, ConfigError> {
    let files = if path.is_dir() {
        policy_files_in(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut defs = Vec::new();
    for file in &files {
        let mut parsed = read_policy_file(file)?;
        tracing::debug!(path = %file.display(), count = parsed.len(), "read policy file");
        defs.append(&mut parsed);
    }

    let set = PolicySet::from_definitions(&defs)?;
    tracing::info!(
        path = %path.display(),
        files = files.len(),
        policies = set.len(),
        rules = set.rule_count(),
        "loaded policies"
    );
    Ok(set)
}
