//! Function resolution across inheritance and calling context.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::{FactsError, FactsResult};
use crate::models::{
    normalize_signature, split_external_signature, ContractKey, ContractModel, FunctionKey,
    FunctionModel, ProjectFacts, QueryContext,
};
use crate::query::guards::{apply_pagination, Pagination};

// ---------------------------------------------------------------------------
// Core resolution
// ---------------------------------------------------------------------------

/// A resolved function together with its owning contract and lookup trace.
pub struct Resolved<'a> {
    pub contract: &'a ContractModel,
    pub function: &'a FunctionModel,
    pub context: QueryContext,
}

pub(crate) fn contract_not_found(key: &ContractKey) -> FactsError {
    FactsError::NotFound(format!(
        "contract '{}' at '{}'; use list_contracts or search_contracts to discover available \
         contracts",
        key.contract_name, key.path
    ))
}

fn function_not_found(signature: &str, contract_name: &str) -> FactsError {
    FactsError::NotFound(format!(
        "function '{signature}' in contract '{contract_name}'; use list_functions for this \
         contract or search_functions to match by pattern"
    ))
}

/// Resolve a function by its fully-qualified key. The declared copy wins over
/// an inherited one stored under the same signature; spelling differences in
/// qualified parameter types are bridged by normalized matching.
pub fn resolve_by_key<'a>(facts: &'a ProjectFacts, key: &FunctionKey) -> FactsResult<Resolved<'a>> {
    let contract_key = key.contract_key();
    let contract = facts
        .contracts
        .get(&contract_key)
        .ok_or_else(|| contract_not_found(&contract_key))?;

    let function = contract
        .find_function_signature(&key.signature)
        .and_then(|stored| contract.function(stored))
        .ok_or_else(|| function_not_found(&key.signature, &contract_key.contract_name))?;

    let context = QueryContext {
        searched_calling_context: Some(contract_key.to_string()),
        searched_function: Some(key.external_signature()),
        searched_contract: Some(contract_key.contract_name.clone()),
    };

    Ok(Resolved {
        contract,
        function,
        context,
    })
}

/// Resolve an external signature `Contract.sig(args)` from the point of view
/// of `calling_context`. The named target must be in the caller's lexical
/// scope; a name match elsewhere in the project is not good enough, two
/// unrelated contracts may share a name.
pub fn resolve_external<'a>(
    facts: &'a ProjectFacts,
    ext_signature: &str,
    calling_context: &ContractKey,
) -> FactsResult<Resolved<'a>> {
    let (target_name, local_sig) = split_external_signature(ext_signature)?;

    let calling = facts
        .contracts
        .get(calling_context)
        .ok_or_else(|| contract_not_found(calling_context))?;

    let target_key = calling.scope_key_for(target_name).ok_or_else(|| {
        FactsError::NotFound(format!(
            "contract '{target_name}' is not in scope for '{}'; use get_contract to inspect the \
             scopes field",
            calling_context.contract_name
        ))
    })?;

    let target = facts
        .contracts
        .get(target_key)
        .ok_or_else(|| contract_not_found(target_key))?;

    let function = target
        .find_function_signature(local_sig)
        .and_then(|stored| target.function(stored))
        .ok_or_else(|| function_not_found(local_sig, &target_key.contract_name))?;

    let context = QueryContext {
        searched_calling_context: Some(calling_context.to_string()),
        searched_function: Some(ext_signature.to_string()),
        searched_contract: Some(target_key.contract_name.clone()),
    };

    Ok(Resolved {
        contract: target,
        function,
        context,
    })
}

/// The declared function stored under `signature`, exact first, then via
/// normalized matching. Inherited tables are deliberately not consulted.
fn declared_function<'a>(model: &'a ContractModel, signature: &str) -> Option<&'a FunctionModel> {
    if let Some(function) = model.functions_declared.get(signature) {
        return Some(function);
    }
    let normalized = normalize_signature(signature);
    model
        .functions_declared
        .iter()
        .find(|(stored, _)| normalize_signature(stored) == normalized)
        .map(|(_, function)| function)
}

/// Find every contract below `parent` in the inheritance graph that declares
/// `signature`. A declaring child is recorded and its subtree still searched,
/// since deeper overrides are implementations too; a non-declaring child only
/// forwards the search. Inheritance cycles terminate via the visited set.
pub fn implementations_of<'a>(
    facts: &'a ProjectFacts,
    parent: &ContractModel,
    signature: &str,
) -> Vec<&'a ContractModel> {
    let mut found = Vec::new();
    let mut visited: HashSet<ContractKey> = HashSet::new();
    visited.insert(parent.key.clone());
    collect_implementations(facts, &parent.key, signature, &mut visited, &mut found);
    found
}

fn collect_implementations<'a>(
    facts: &'a ProjectFacts,
    parent_key: &ContractKey,
    signature: &str,
    visited: &mut HashSet<ContractKey>,
    found: &mut Vec<&'a ContractModel>,
) {
    for (key, model) in &facts.contracts {
        if !model.directly_inherits.contains(parent_key) {
            continue;
        }
        if !visited.insert(key.clone()) {
            continue;
        }
        if declared_function(model, signature).is_some() {
            found.push(model);
        }
        collect_implementations(facts, key, signature, visited, found);
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Request to look up one function by key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetFunctionRequest {
    pub path: String,
    pub function_key: FunctionKey,
    #[serde(default)]
    pub include_query_context: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetFunctionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_context: Option<QueryContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn get_function(request: &GetFunctionRequest, facts: &ProjectFacts) -> GetFunctionResponse {
    match resolve_by_key(facts, &request.function_key) {
        Ok(resolved) => GetFunctionResponse {
            success: true,
            query_context: request.include_query_context.then_some(resolved.context),
            function: Some(resolved.function.clone()),
            error_message: None,
        },
        Err(err) => GetFunctionResponse {
            success: false,
            query_context: None,
            function: None,
            error_message: Some(err.to_string()),
        },
    }
}

/// One implementing contract in a `list_function_implementations` response.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ImplementationInfo {
    pub contract_key: ContractKey,
    pub is_abstract: bool,
    pub is_interface: bool,
    pub function_visibility: String,
    pub function_modifiers: Vec<String>,
}

/// Request to find implementations of an abstract or interface function.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListFunctionImplementationsRequest {
    pub path: String,
    pub contract_key: ContractKey,
    pub function_signature: String,
    #[serde(flatten)]
    pub page: Pagination,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListFunctionImplementationsResponse {
    pub success: bool,
    pub implementations: Vec<ImplementationInfo>,
    pub total_count: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn list_function_implementations(
    request: &ListFunctionImplementationsRequest,
    facts: &ProjectFacts,
) -> ListFunctionImplementationsResponse {
    let failed = |err: FactsError| ListFunctionImplementationsResponse {
        success: false,
        implementations: Vec::new(),
        total_count: 0,
        has_more: false,
        error_message: Some(err.to_string()),
    };

    if let Err(err) = request.page.validate() {
        return failed(err);
    }
    let contract = match facts.contracts.get(&request.contract_key) {
        Some(contract) => contract,
        None => return failed(contract_not_found(&request.contract_key)),
    };
    if !contract.contains_function(&request.function_signature) {
        return failed(function_not_found(
            &request.function_signature,
            &request.contract_key.contract_name,
        ));
    }

    let implementations: Vec<ImplementationInfo> =
        implementations_of(facts, contract, &request.function_signature)
            .into_iter()
            .filter_map(|model| {
                declared_function(model, &request.function_signature).map(|function| {
                    ImplementationInfo {
                        contract_key: model.key.clone(),
                        is_abstract: model.is_abstract,
                        is_interface: model.is_interface,
                        function_visibility: function.visibility.clone(),
                        function_modifiers: function.function_modifiers.clone(),
                    }
                })
            })
            .collect();

    let page = apply_pagination(implementations, &request.page);
    ListFunctionImplementationsResponse {
        success: true,
        implementations: page.items,
        total_count: page.total_count,
        has_more: page.has_more,
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
