//! Typed fact model for an analyzed Solidity project.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{FactsError, FactsResult};

// ---------------------------------------------------------------------------
// Schema / shared constants
// ---------------------------------------------------------------------------

/// Artifact schema version; bumped whenever the serialized fact model changes.
/// Compared for exact equality on load, any mismatch is corruption.
pub const FACTS_SCHEMA_VERSION: u32 = 1;

/// Default depth bound for inheritance / derivation trees.
pub const DEFAULT_MAX_DEPTH: u32 = 3;

/// Default node cap for call-graph exports.
pub const DEFAULT_MAX_NODES: usize = 100;

/// Lifecycle and test-framework entry points that are never dead code:
/// Solidity specials plus the Foundry `setUp`/`run` conventions.
pub const SPECIAL_FUNCTION_NAMES: [&str; 5] =
    ["constructor", "receive", "fallback", "setUp", "run"];

/// Prefix marking Foundry-style test functions.
pub const TEST_FUNCTION_PREFIX: &str = "test";

// ---------------------------------------------------------------------------
// 1. ContractKey / FunctionKey
// ---------------------------------------------------------------------------

/// Identity of a contract: name plus declaring file path relative to the
/// project root. Two contracts with the same name in different files are
/// distinct keys.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContractKey {
    pub contract_name: String,
    pub path: String,
}

impl ContractKey {
    pub fn new(contract_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            contract_name: contract_name.into(),
            path: path.into(),
        }
    }

    /// Stable string form used for artifact map keys: `Name@path!with!bangs`.
    /// Slashes are substituted so the key survives map-key contexts that
    /// treat `/` specially; [`ContractKey::decode`] is the exact inverse.
    pub fn encode(&self) -> String {
        format!("{}@{}", self.contract_name, self.path.replace('/', "!"))
    }

    /// Parse the string form produced by [`ContractKey::encode`].
    pub fn decode(s: &str) -> FactsResult<Self> {
        let (name, path) = s.split_once('@').ok_or_else(|| {
            FactsError::InvalidArgument(format!("invalid contract key encoding: {s:?}"))
        })?;
        Ok(Self {
            contract_name: name.to_string(),
            path: path.replace('!', "/"),
        })
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Identity of a function: ABI signature plus the owning contract's key parts.
/// The signature excludes visibility and return type; hashing it yields the
/// ABI selector.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionKey {
    pub signature: String,
    pub contract_name: String,
    pub path: String,
}

impl FunctionKey {
    pub fn new(
        signature: impl Into<String>,
        contract_name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            signature: signature.into(),
            contract_name: contract_name.into(),
            path: path.into(),
        }
    }

    /// The owning contract's key.
    pub fn contract_key(&self) -> ContractKey {
        ContractKey::new(self.contract_name.clone(), self.path.clone())
    }

    /// External-signature form `Contract.sig(args)` as recorded in callee lists.
    pub fn external_signature(&self) -> String {
        format!("{}.{}", self.contract_name, self.signature)
    }
}

// ---------------------------------------------------------------------------
// 2. Function facts
// ---------------------------------------------------------------------------

/// Callees of one function, grouped by call kind. Entries are external
/// signatures (`Contract.sig(args)`).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FunctionCallees {
    pub internal_callees: Vec<String>,
    pub external_callees: Vec<String>,
    pub library_callees: Vec<String>,
    pub has_low_level_calls: bool,
}

/// Facts for a single function. Immutable once constructed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionModel {
    pub signature: String,
    pub implementation_contract: ContractKey,
    /// Built-in modifiers: any of virtual, fallback, override, view, pure, payable.
    pub solidity_modifiers: Vec<String>,
    pub visibility: String,
    /// User-defined modifier names decorating the function.
    pub function_modifiers: Vec<String>,
    pub arguments: Vec<String>,
    pub returns: Vec<String>,
    pub path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub callees: FunctionCallees,
}

impl FunctionModel {
    /// Line span of the definition, inclusive.
    pub fn line_count(&self) -> u32 {
        self.line_end.saturating_sub(self.line_start) + 1
    }

    /// True for functions callable from outside the contract.
    pub fn is_entry_point(&self) -> bool {
        matches!(
            self.visibility.to_lowercase().as_str(),
            "public" | "external"
        )
    }
}

// ---------------------------------------------------------------------------
// 3. Contract facts
// ---------------------------------------------------------------------------

/// A state variable declared by a contract.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StateVariable {
    pub name: String,
    pub type_str: String,
    pub visibility: String,
    pub is_constant: bool,
    pub is_immutable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

/// One parameter of an event.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventParameter {
    pub name: String,
    pub type_str: String,
    pub indexed: bool,
}

/// An event declared by a contract.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub name: String,
    pub parameters: Vec<EventParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

/// Facts for a single contract, including both declared and inherited
/// functions keyed by signature.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ContractModel {
    pub name: String,
    pub key: ContractKey,
    pub path: String,
    pub is_abstract: bool,
    pub is_fully_implemented: bool,
    pub is_interface: bool,
    pub is_library: bool,
    /// Direct parents in source order; the first entry is the
    /// highest-priority base in linearization.
    pub directly_inherits: Vec<ContractKey>,
    /// Every contract visible from this contract's file scope, used to
    /// disambiguate bare names in external signatures.
    pub scopes: Vec<ContractKey>,
    pub functions_declared: IndexMap<String, FunctionModel>,
    pub functions_inherited: IndexMap<String, FunctionModel>,
    #[serde(default)]
    pub state_variables: Vec<StateVariable>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl ContractModel {
    /// Look up the stored signature matching `sig`, exact first, then via
    /// [`normalize_signature`]. Declared functions win over inherited ones.
    pub fn find_function_signature(&self, sig: &str) -> Option<&str> {
        if let Some((stored, _)) = self.functions_declared.get_key_value(sig) {
            return Some(stored);
        }
        if let Some((stored, _)) = self.functions_inherited.get_key_value(sig) {
            return Some(stored);
        }
        let normalized = normalize_signature(sig);
        for stored in self.functions_declared.keys() {
            if normalize_signature(stored) == normalized {
                return Some(stored);
            }
        }
        for stored in self.functions_inherited.keys() {
            if normalize_signature(stored) == normalized {
                return Some(stored);
            }
        }
        None
    }

    pub fn contains_function(&self, sig: &str) -> bool {
        self.find_function_signature(sig).is_some()
    }

    /// The function stored under an exact signature, declared copy preferred.
    pub fn function(&self, sig: &str) -> Option<&FunctionModel> {
        self.functions_declared
            .get(sig)
            .or_else(|| self.functions_inherited.get(sig))
    }

    /// Resolve a bare contract name against this contract's lexical scope.
    pub fn scope_key_for(&self, contract_name: &str) -> Option<&ContractKey> {
        self.scopes
            .iter()
            .find(|key| key.contract_name == contract_name)
    }
}

// ---------------------------------------------------------------------------
// 4. Detector facts
// ---------------------------------------------------------------------------

/// Metadata describing one available detector.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DetectorMetadata {
    pub name: String,
    pub description: String,
    /// High, Medium, Low, or Informational.
    pub impact: String,
    /// High, Medium, or Low.
    pub confidence: String,
}

/// Location in source code referenced by a finding.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SourceLocation {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// A single finding produced by a detector.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DetectorResult {
    pub detector_name: String,
    pub check: String,
    pub impact: String,
    pub confidence: String,
    pub description: String,
    pub source_locations: Vec<SourceLocation>,
}

// ---------------------------------------------------------------------------
// 5. ProjectFacts
// ---------------------------------------------------------------------------

/// The complete fact snapshot for one analyzed project: the unit of caching
/// and the sole input to every query. Read-only after construction except for
/// the path-normalization pass applied around the artifact boundary.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectFacts {
    #[serde(with = "contract_key_map")]
    pub contracts: IndexMap<ContractKey, ContractModel>,
    pub project_dir: String,
    #[serde(default)]
    pub detector_results: IndexMap<String, Vec<DetectorResult>>,
    #[serde(default)]
    pub available_detectors: Vec<DetectorMetadata>,
}

impl ProjectFacts {
    pub fn contract(&self, key: &ContractKey) -> Option<&ContractModel> {
        self.contracts.get(key)
    }
}

/// Serialize the contracts map with string-encoded keys. The structured
/// `ContractKey` stays the in-memory identity; the `Name@path!...` form
/// exists only inside the artifact.
mod contract_key_map {
    use indexmap::IndexMap;
    use serde::de::Error as DeError;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{ContractKey, ContractModel};

    pub fn serialize<S>(
        map: &IndexMap<ContractKey, ContractModel>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (key, model) in map {
            out.serialize_entry(&key.encode(), model)?;
        }
        out.end()
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<IndexMap<ContractKey, ContractModel>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = IndexMap::<String, ContractModel>::deserialize(deserializer)?;
        let mut out = IndexMap::with_capacity(raw.len());
        for (encoded, model) in raw {
            let key = ContractKey::decode(&encoded).map_err(D::Error::custom)?;
            out.insert(key, model);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// 6. Query context
// ---------------------------------------------------------------------------

/// Trace of how a lookup was resolved, attached to responses on request.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searched_calling_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searched_function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searched_contract: Option<String>,
}

// ---------------------------------------------------------------------------
// 7. Signature and path helpers
// ---------------------------------------------------------------------------

/// The name portion of a signature: text before the first `(`, or the whole
/// string when no parenthesis is present.
pub fn function_name_of(signature: &str) -> &str {
    match signature.find('(') {
        Some(idx) => &signature[..idx],
        None => signature,
    }
}

/// Strip qualified type prefixes from a signature's parameters so that
/// `swap(PoolKey,IPoolManager.SwapParams,bytes)` matches
/// `swap(PoolKey,SwapParams,bytes)`. Array suffixes are preserved and the
/// function name itself is never modified.
pub fn normalize_signature(signature: &str) -> String {
    let Some((name, rest)) = signature.split_once('(') else {
        return signature.to_string();
    };
    let params = rest.trim_end_matches(')');
    if params.is_empty() {
        return signature.to_string();
    }

    let normalized: Vec<String> = params
        .split(',')
        .map(|param| {
            let param = param.trim();
            let (base, suffix) = match param.strip_suffix("[]") {
                Some(base) => (base, "[]"),
                None => (param, ""),
            };
            let base = base.rsplit('.').next().unwrap_or(base);
            format!("{base}{suffix}")
        })
        .collect();

    format!("{}({})", name, normalized.join(","))
}

/// Split an external signature `Contract.sig(args)` into the contract name
/// and the local signature. The split is at the first dot; later dots belong
/// to qualified parameter types.
pub fn split_external_signature(ext_signature: &str) -> FactsResult<(&str, &str)> {
    ext_signature.split_once('.').ok_or_else(|| {
        FactsError::InvalidArgument(format!(
            "expected external signature 'ContractName.functionSignature(args)', got: \
             {ext_signature:?}"
        ))
    })
}

/// True when `file_path` matches any exclusion pattern, either as a leading
/// prefix (`lib/` matches `lib/foo.sol`) or as an inner path component
/// (`test/` matches `src/test/foo.sol`).
pub fn path_matches_exclusion(file_path: &str, exclude_patterns: &[String]) -> bool {
    let normalized = file_path.replace('\\', "/");
    for pattern in exclude_patterns {
        let pattern = pattern.trim_end_matches('/');
        if pattern.is_empty() {
            continue;
        }
        if normalized == pattern || normalized.starts_with(&format!("{pattern}/")) {
            return true;
        }
        if format!("/{normalized}/").contains(&format!("/{pattern}/")) {
            return true;
        }
    }
    false
}

/// Resolve `relative_path` under `project_dir` and verify the result stays
/// inside the project. Symlinks are resolved first, so `../` chains and links
/// pointing outside the root are both rejected.
pub fn validate_path_within_project(
    project_dir: &Path,
    relative_path: &str,
) -> FactsResult<PathBuf> {
    let project_abs = project_dir.canonicalize().map_err(|err| {
        FactsError::NotFound(format!(
            "project directory '{}': {err}",
            project_dir.display()
        ))
    })?;
    let full = project_abs.join(relative_path).canonicalize().map_err(|err| {
        FactsError::NotFound(format!("source file '{relative_path}': {err}"))
    })?;
    if !full.starts_with(&project_abs) {
        return Err(FactsError::InvalidArgument(format!(
            "path '{relative_path}' escapes the project directory"
        )));
    }
    Ok(full)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
