//! Shared fixture builders for unit tests.

use indexmap::IndexMap;

use crate::models::{
    ContractKey, ContractModel, FunctionCallees, FunctionModel, ProjectFacts, StateVariable,
};

pub(crate) fn key(name: &str, path: &str) -> ContractKey {
    ContractKey::new(name, path)
}

/// An empty concrete contract whose scope contains only itself.
pub(crate) fn contract(name: &str, path: &str) -> ContractModel {
    ContractModel {
        name: name.to_string(),
        key: key(name, path),
        path: path.to_string(),
        is_abstract: false,
        is_fully_implemented: true,
        is_interface: false,
        is_library: false,
        directly_inherits: Vec::new(),
        scopes: vec![key(name, path)],
        functions_declared: IndexMap::new(),
        functions_inherited: IndexMap::new(),
        state_variables: Vec::new(),
        events: Vec::new(),
    }
}

pub(crate) fn function(sig: &str, contract_name: &str, path: &str, visibility: &str) -> FunctionModel {
    FunctionModel {
        signature: sig.to_string(),
        implementation_contract: key(contract_name, path),
        solidity_modifiers: Vec::new(),
        visibility: visibility.to_string(),
        function_modifiers: Vec::new(),
        arguments: Vec::new(),
        returns: Vec::new(),
        path: path.to_string(),
        line_start: 1,
        line_end: 5,
        callees: FunctionCallees::default(),
    }
}

pub(crate) fn callees(internal: &[&str], external: &[&str], library: &[&str]) -> FunctionCallees {
    FunctionCallees {
        internal_callees: internal.iter().map(|s| s.to_string()).collect(),
        external_callees: external.iter().map(|s| s.to_string()).collect(),
        library_callees: library.iter().map(|s| s.to_string()).collect(),
        has_low_level_calls: false,
    }
}

pub(crate) fn state_var(name: &str, type_str: &str) -> StateVariable {
    StateVariable {
        name: name.to_string(),
        type_str: type_str.to_string(),
        visibility: "internal".to_string(),
        is_constant: false,
        is_immutable: false,
        line_number: None,
    }
}

pub(crate) fn add_declared(contract: &mut ContractModel, func: FunctionModel) {
    contract
        .functions_declared
        .insert(func.signature.clone(), func);
}

pub(crate) fn add_inherited(contract: &mut ContractModel, func: FunctionModel) {
    contract
        .functions_inherited
        .insert(func.signature.clone(), func);
}

pub(crate) fn facts(contracts: Vec<ContractModel>) -> ProjectFacts {
    let mut map = IndexMap::new();
    for model in contracts {
        map.insert(model.key.clone(), model);
    }
    ProjectFacts {
        contracts: map,
        project_dir: "/project".to_string(),
        detector_results: IndexMap::new(),
        available_detectors: Vec::new(),
    }
}

/// Put every contract of the project into every other contract's scope, the
/// common case for fixtures that exercise cross-contract resolution.
pub(crate) fn link_scopes(facts: &mut ProjectFacts) {
    let all: Vec<ContractKey> = facts.contracts.keys().cloned().collect();
    for model in facts.contracts.values_mut() {
        model.scopes = all.clone();
    }
}
