//! Call-relationship queries: callees, callers, and dead code.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::{
    function_name_of, normalize_signature, ContractKey, ContractModel, FunctionCallees,
    FunctionKey, FunctionModel, ProjectFacts, QueryContext, SPECIAL_FUNCTION_NAMES,
    TEST_FUNCTION_PREFIX,
};
use crate::query::guards::{apply_pagination, Pagination};
use crate::query::resolve::{contract_not_found, resolve_by_key};

// ---------------------------------------------------------------------------
// list_function_callees
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCalleesRequest {
    pub path: String,
    pub function_key: FunctionKey,
    #[serde(default)]
    pub include_query_context: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCalleesResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_context: Option<QueryContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callees: Option<FunctionCallees>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn list_function_callees(
    request: &FunctionCalleesRequest,
    facts: &ProjectFacts,
) -> FunctionCalleesResponse {
    match resolve_by_key(facts, &request.function_key) {
        Ok(resolved) => FunctionCalleesResponse {
            success: true,
            query_context: request.include_query_context.then_some(resolved.context),
            callees: Some(resolved.function.callees.clone()),
            error_message: None,
        },
        Err(err) => FunctionCalleesResponse {
            success: false,
            query_context: None,
            callees: None,
            error_message: Some(err.to_string()),
        },
    }
}

// ---------------------------------------------------------------------------
// list_function_callers
// ---------------------------------------------------------------------------

/// Callers of one function, grouped by how the call is made. Lists are
/// deduplicated and sorted.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FunctionCallers {
    pub internal_callers: Vec<FunctionKey>,
    pub external_callers: Vec<FunctionKey>,
    pub library_callers: Vec<FunctionKey>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCallersRequest {
    pub path: String,
    pub function_key: FunctionKey,
    #[serde(default)]
    pub include_query_context: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCallersResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_context: Option<QueryContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callers: Option<FunctionCallers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn list_function_callers(
    request: &FunctionCallersRequest,
    facts: &ProjectFacts,
) -> FunctionCallersResponse {
    let context = match resolve_by_key(facts, &request.function_key) {
        Ok(resolved) => resolved.context,
        Err(err) => {
            return FunctionCallersResponse {
                success: false,
                query_context: None,
                callers: None,
                error_message: Some(err.to_string()),
            }
        }
    };

    let target = request.function_key.external_signature();
    let normalized_target = normalize_signature(&target);
    let matches_target =
        |callee: &String| *callee == target || normalize_signature(callee) == normalized_target;

    let mut internal: BTreeSet<FunctionKey> = BTreeSet::new();
    let mut external: BTreeSet<FunctionKey> = BTreeSet::new();
    let mut library: BTreeSet<FunctionKey> = BTreeSet::new();

    for (contract_key, model) in &facts.contracts {
        // The inherited copy is the effective one when a signature appears in
        // both tables.
        let mut effective: IndexMap<&String, &FunctionModel> = IndexMap::new();
        for (sig, func) in &model.functions_declared {
            effective.insert(sig, func);
        }
        for (sig, func) in &model.functions_inherited {
            effective.insert(sig, func);
        }

        for (sig, func) in effective {
            let caller = FunctionKey::new(
                sig.clone(),
                contract_key.contract_name.clone(),
                contract_key.path.clone(),
            );
            if func.callees.internal_callees.iter().any(matches_target) {
                internal.insert(caller.clone());
            }
            if func.callees.external_callees.iter().any(matches_target) {
                external.insert(caller.clone());
            }
            if func.callees.library_callees.iter().any(matches_target) {
                library.insert(caller);
            }
        }
    }

    FunctionCallersResponse {
        success: true,
        query_context: request.include_query_context.then_some(context),
        callers: Some(FunctionCallers {
            internal_callers: internal.into_iter().collect(),
            external_callers: external.into_iter().collect(),
            library_callers: library.into_iter().collect(),
        }),
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// find_dead_code
// ---------------------------------------------------------------------------

/// Functions with lifecycle or test-framework meaning are never dead even
/// without recorded callers.
fn is_special_function(signature: &str) -> bool {
    let name = function_name_of(signature);
    SPECIAL_FUNCTION_NAMES.contains(&name) || name.starts_with(TEST_FUNCTION_PREFIX)
}

fn is_potential_entry_point(visibility: &str, signature: &str) -> bool {
    matches!(visibility.to_lowercase().as_str(), "public" | "external")
        || is_special_function(signature)
}

/// A function no recorded call reaches.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeadCodeFunction {
    pub function_key: FunctionKey,
    pub visibility: String,
    pub is_entry_point: bool,
    pub reason: String,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindDeadCodeRequest {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_key: Option<ContractKey>,
    /// Public/external functions may be called from outside the project;
    /// keeping them out is the safe default.
    #[serde(default = "default_true")]
    pub exclude_entry_points: bool,
    #[serde(default)]
    pub include_inherited: bool,
    #[serde(flatten)]
    pub page: Pagination,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindDeadCodeResponse {
    pub success: bool,
    pub dead_functions: Vec<DeadCodeFunction>,
    pub total_count: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn find_dead_code(request: &FindDeadCodeRequest, facts: &ProjectFacts) -> FindDeadCodeResponse {
    let failed = |message: String| FindDeadCodeResponse {
        success: false,
        dead_functions: Vec::new(),
        total_count: 0,
        has_more: false,
        error_message: Some(message),
    };

    if let Err(err) = request.page.validate() {
        return failed(err.to_string());
    }

    // Every call target recorded anywhere in declared functions.
    let mut called: HashSet<&String> = HashSet::new();
    for model in facts.contracts.values() {
        for func in model.functions_declared.values() {
            called.extend(func.callees.internal_callees.iter());
            called.extend(func.callees.external_callees.iter());
            called.extend(func.callees.library_callees.iter());
        }
    }

    let selected: Vec<(&ContractKey, &ContractModel)> = match &request.contract_key {
        Some(key) => match facts.contract(key) {
            Some(model) => vec![(key, model)],
            None => return failed(contract_not_found(key).to_string()),
        },
        None => facts.contracts.iter().collect(),
    };

    let mut dead_functions: Vec<DeadCodeFunction> = Vec::new();
    for (contract_key, model) in selected {
        // Interfaces and libraries declare for others to call.
        if model.is_interface || model.is_library {
            continue;
        }

        for (sig, func) in &model.functions_declared {
            let ext_sig = format!("{}.{}", contract_key.contract_name, sig);
            if called.contains(&ext_sig) {
                continue;
            }
            let is_entry = is_potential_entry_point(&func.visibility, sig);
            if request.exclude_entry_points && is_entry {
                continue;
            }
            if is_special_function(sig) {
                continue;
            }
            let reason = if matches!(
                func.visibility.to_lowercase().as_str(),
                "internal" | "private"
            ) {
                "Internal/private function with no internal callers"
            } else {
                "Function is never called from within the codebase"
            };
            dead_functions.push(DeadCodeFunction {
                function_key: FunctionKey::new(
                    sig.clone(),
                    contract_key.contract_name.clone(),
                    contract_key.path.clone(),
                ),
                visibility: func.visibility.clone(),
                is_entry_point: is_entry,
                reason: reason.to_string(),
            });
        }

        if request.include_inherited {
            for (sig, func) in &model.functions_inherited {
                let ext_sig = format!("{}.{}", contract_key.contract_name, sig);
                if called.contains(&ext_sig) {
                    continue;
                }
                let is_entry = is_potential_entry_point(&func.visibility, sig);
                if request.exclude_entry_points && is_entry {
                    continue;
                }
                if is_special_function(sig) {
                    continue;
                }
                dead_functions.push(DeadCodeFunction {
                    function_key: FunctionKey::new(
                        sig.clone(),
                        contract_key.contract_name.clone(),
                        contract_key.path.clone(),
                    ),
                    visibility: func.visibility.clone(),
                    is_entry_point: is_entry,
                    reason: "Inherited function is never called from within the codebase"
                        .to_string(),
                });
            }
        }
    }

    let page = apply_pagination(dead_functions, &request.page);
    FindDeadCodeResponse {
        success: true,
        dead_functions: page.items,
        total_count: page.total_count,
        has_more: page.has_more,
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
