//! Versioned, checksummed persistence of project facts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::errors::{FactsError, FactsResult};
use crate::models::{ContractKey, ProjectFacts, FACTS_SCHEMA_VERSION};

pub const PROJECT_FACTS_FILE: &str = "project_facts.json";

/// Artifacts live in a dot-directory inside the analyzed project.
pub fn artifacts_dir_for(project_dir: &Path) -> PathBuf {
    project_dir.join(".solfacts")
}

pub fn artifacts_exist(artifacts_dir: &Path) -> bool {
    artifacts_dir.join(PROJECT_FACTS_FILE).exists()
}

fn content_checksum(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Path normalization
// ---------------------------------------------------------------------------

/// Relative form of `path` if it is absolute and under `project_root`,
/// matching on a whole component boundary.
fn relativize(path: &str, project_root: &str) -> Option<String> {
    if !Path::new(path).is_absolute() {
        return None;
    }
    let root = project_root.trim_end_matches('/');
    if root.is_empty() {
        return None;
    }
    let rest = path.strip_prefix(root)?.strip_prefix('/')?;
    (!rest.is_empty()).then(|| rest.to_string())
}

/// Rewrite every stored absolute path under the project root to its relative
/// form: contract keys (including the map keys), scopes, parents, function
/// paths and implementation contracts, and detector source locations.
/// Running it twice is a no-op.
pub fn normalize_paths(facts: &mut ProjectFacts) {
    let root = facts.project_dir.clone();
    let rewrite = |value: &mut String| {
        if let Some(relative) = relativize(value, &root) {
            *value = relative;
        }
    };
    let rewrite_key = |key: &mut ContractKey| rewrite(&mut key.path);

    // Keys change, so the map has to be rebuilt in place.
    let contracts = std::mem::take(&mut facts.contracts);
    for (mut key, mut model) in contracts {
        rewrite_key(&mut key);
        rewrite_key(&mut model.key);
        rewrite(&mut model.path);
        for scope in &mut model.scopes {
            rewrite_key(scope);
        }
        for parent in &mut model.directly_inherits {
            rewrite_key(parent);
        }
        let functions = model
            .functions_declared
            .values_mut()
            .chain(model.functions_inherited.values_mut());
        for function in functions {
            rewrite(&mut function.path);
            rewrite_key(&mut function.implementation_contract);
        }
        facts.contracts.insert(key, model);
    }

    for findings in facts.detector_results.values_mut() {
        for finding in findings {
            for location in &mut finding.source_locations {
                rewrite(&mut location.file_path);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Save / load
// ---------------------------------------------------------------------------

/// Serialize facts to `<artifacts_dir>/project_facts.json`, wrapped in a
/// `{ schema_version, checksum, data }` envelope. Paths are normalized first;
/// the write goes through a temp file and a rename.
pub fn save_project_facts(facts: &mut ProjectFacts, artifacts_dir: &Path) -> FactsResult<()> {
    normalize_paths(facts);

    // The checksum covers the canonical string form of `data`. Going through
    // a Value here keeps save and load byte-identical for the hashed text.
    let data = serde_json::to_value(&*facts)?;
    let checksum = content_checksum(&serde_json::to_string(&data)?);
    let envelope = serde_json::json!({
        "schema_version": FACTS_SCHEMA_VERSION,
        "checksum": checksum,
        "data": data,
    });

    fs::create_dir_all(artifacts_dir)?;
    let file_path = artifacts_dir.join(PROJECT_FACTS_FILE);
    let tmp_path = artifacts_dir.join(format!("{PROJECT_FACTS_FILE}.tmp"));
    fs::write(&tmp_path, serde_json::to_string_pretty(&envelope)?)?;
    fs::rename(&tmp_path, &file_path)?;

    info!(
        path = %file_path.display(),
        contracts = facts.contracts.len(),
        "saved project facts"
    );
    Ok(())
}

fn corrupt(message: impl Into<String>) -> FactsError {
    FactsError::CacheCorruption(message.into())
}

/// Load facts back from the artifact file.
///
/// A missing file is `NotFound`; everything else that goes wrong (bad JSON,
/// missing or mismatched schema version, checksum failure, undeserializable
/// payload) is `CacheCorruption`, so callers can tell "build fresh" from
/// "build fresh and say so".
pub fn load_project_facts(artifacts_dir: &Path) -> FactsResult<ProjectFacts> {
    let file_path = artifacts_dir.join(PROJECT_FACTS_FILE);
    let raw = match fs::read_to_string(&file_path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(FactsError::NotFound(format!(
                "no cached facts at '{}'",
                file_path.display()
            )));
        }
        Err(err) => return Err(err.into()),
    };

    let root: Value = serde_json::from_str(&raw)
        .map_err(|err| corrupt(format!("artifact is not valid JSON: {err}")))?;
    let envelope = root
        .as_object()
        .ok_or_else(|| corrupt("artifact root is not an object"))?;

    match envelope.get("schema_version").and_then(Value::as_u64) {
        Some(version) if version == u64::from(FACTS_SCHEMA_VERSION) => {}
        Some(version) => {
            return Err(corrupt(format!(
                "schema version {version} does not match {FACTS_SCHEMA_VERSION}; re-run analysis to regenerate"
            )));
        }
        None => {
            return Err(corrupt(
                "artifact has no integer schema version; legacy artifacts are not trusted",
            ));
        }
    }

    let data = envelope
        .get("data")
        .ok_or_else(|| corrupt("artifact is missing the 'data' field"))?;
    if let Some(stored) = envelope.get("checksum").and_then(Value::as_str) {
        let canonical = serde_json::to_string(data)
            .map_err(|err| corrupt(format!("artifact data does not re-serialize: {err}")))?;
        if content_checksum(&canonical) != stored {
            return Err(corrupt(
                "artifact checksum mismatch; the file may have been corrupted. Re-run analysis to regenerate",
            ));
        }
    }

    let mut facts: ProjectFacts = serde_json::from_value(data.clone())
        .map_err(|err| corrupt(format!("artifact payload does not deserialize: {err}")))?;
    // Heals artifacts written before normalization existed.
    normalize_paths(&mut facts);
    Ok(facts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
