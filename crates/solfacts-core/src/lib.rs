//! Solfacts core library — fact model and analysis query engine for Solidity
//! projects.
//!
//! Facts are produced once per project by an external analyzer behind the
//! [`engine::AnalysisEngine`] seam, persisted as a versioned, checksummed
//! JSON artifact, and held in an in-process path-keyed cache. Every query is
//! a pure function over an immutable [`models::ProjectFacts`] snapshot and
//! reports failures inside its response rather than unwinding.

pub mod engine;
pub mod errors;
pub mod models;
pub mod query;
pub mod store;

#[cfg(test)]
mod testutil;

pub use engine::{AnalysisEngine, DetectorRun, LazyEngine};
pub use errors::{FactsError, FactsResult};
pub use models::{ContractKey, FunctionKey, ProjectFacts};
pub use store::cache::FactsCache;
