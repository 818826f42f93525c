//! Seam between the fact store and whatever produces facts.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::errors::{FactsError, FactsResult};
use crate::models::{DetectorMetadata, DetectorResult, ProjectFacts};

/// Output of a detector pass, keyed by detector name.
#[derive(Clone, Debug, Default)]
pub struct DetectorRun {
    pub results: IndexMap<String, Vec<DetectorResult>>,
    pub available: Vec<DetectorMetadata>,
}

/// Anything able to analyze a project directory into facts. Implementations
/// wrap an external analyzer; tests substitute canned fixtures.
pub trait AnalysisEngine: Send + Sync {
    fn extract_facts(&self, project_dir: &Path) -> FactsResult<ProjectFacts>;

    fn run_detectors(&self, project_dir: &Path) -> FactsResult<DetectorRun>;
}

type EngineFactory = Box<dyn Fn() -> FactsResult<Arc<dyn AnalysisEngine>> + Send + Sync>;

/// Engine handle whose construction is deferred until first use.
///
/// Construction can be expensive or can fail outright (analyzer not
/// installed), so it runs at most once behind the guard. On failure the slot
/// stays empty and the next call tries again.
pub struct LazyEngine {
    factory: EngineFactory,
    slot: Mutex<Option<Arc<dyn AnalysisEngine>>>,
}

impl LazyEngine {
    pub fn new(
        factory: impl Fn() -> FactsResult<Arc<dyn AnalysisEngine>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            slot: Mutex::new(None),
        }
    }

    pub fn from_engine(engine: Arc<dyn AnalysisEngine>) -> Self {
        Self {
            factory: Box::new(move || Ok(Arc::clone(&engine))),
            slot: Mutex::new(None),
        }
    }

    /// Initialization failures always surface as [`FactsError::Analysis`].
    fn engine(&self) -> FactsResult<Arc<dyn AnalysisEngine>> {
        let mut slot = self.slot.lock();
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }
        tracing::debug!("initializing analysis engine");
        let engine = (self.factory)().map_err(|err| match err {
            err @ FactsError::Analysis(_) => err,
            other => FactsError::Analysis(other.to_string()),
        })?;
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    pub fn extract_facts(&self, project_dir: &Path) -> FactsResult<ProjectFacts> {
        self.engine()?.extract_facts(project_dir)
    }

    pub fn run_detectors(&self, project_dir: &Path) -> FactsResult<DetectorRun> {
        self.engine()?.run_detectors(project_dir)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
