//! In-process, path-keyed cache of fact snapshots.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::engine::LazyEngine;
use crate::errors::{FactsError, FactsResult};
use crate::models::ProjectFacts;
use crate::store::artifacts::{artifacts_dir_for, load_project_facts, save_project_facts};

/// Snapshots are shared read-only; rebuilding replaces the `Arc` wholesale.
///
/// The mutex stays held across a miss, so concurrent requests for the same
/// path trigger exactly one analysis.
#[derive(Default)]
pub struct FactsCache {
    entries: Mutex<IndexMap<PathBuf, Arc<ProjectFacts>>>,
}

impl FactsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &self,
        project_dir: &Path,
        engine: &LazyEngine,
    ) -> FactsResult<Arc<ProjectFacts>> {
        let canonical = canonical_project_dir(project_dir)?;

        let mut entries = self.entries.lock();
        if let Some(facts) = entries.get(&canonical) {
            return Ok(Arc::clone(facts));
        }

        let artifacts_dir = artifacts_dir_for(&canonical);
        let facts = match load_project_facts(&artifacts_dir) {
            Ok(facts) => {
                info!(
                    path = %canonical.display(),
                    contracts = facts.contracts.len(),
                    "loaded cached project facts"
                );
                facts
            }
            Err(FactsError::NotFound(_)) => build_and_save(&canonical, &artifacts_dir, engine)?,
            Err(FactsError::CacheCorruption(reason)) => {
                warn!(%reason, "cached facts rejected, re-analyzing");
                build_and_save(&canonical, &artifacts_dir, engine)?
            }
            Err(other) => return Err(other),
        };

        let facts = Arc::new(facts);
        entries.insert(canonical, Arc::clone(&facts));
        Ok(facts)
    }

    /// Drop the in-memory snapshot for one project. The artifact file stays;
    /// the next lookup reloads or rebuilds it.
    pub fn invalidate(&self, project_dir: &Path) -> bool {
        match canonical_project_dir(project_dir) {
            Ok(canonical) => self.entries.lock().shift_remove(&canonical).is_some(),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

fn canonical_project_dir(project_dir: &Path) -> FactsResult<PathBuf> {
    let canonical = project_dir.canonicalize().map_err(|err| {
        FactsError::NotFound(format!(
            "project directory '{}': {err}",
            project_dir.display()
        ))
    })?;
    if !canonical.is_dir() {
        return Err(FactsError::InvalidArgument(format!(
            "'{}' is not a directory",
            project_dir.display()
        )));
    }
    Ok(canonical)
}

fn build_and_save(
    project_dir: &Path,
    artifacts_dir: &Path,
    engine: &LazyEngine,
) -> FactsResult<ProjectFacts> {
    info!(path = %project_dir.display(), "analyzing project");
    let mut facts = engine.extract_facts(project_dir)?;
    let run = engine.run_detectors(project_dir)?;
    facts.detector_results = run.results;
    facts.available_detectors = run.available;
    save_project_facts(&mut facts, artifacts_dir)?;
    Ok(facts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
