//! Inheritance and derivation tree builders.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::FactsError;
use crate::models::{ContractKey, ContractModel, ProjectFacts, DEFAULT_MAX_DEPTH};
use crate::query::guards::validate_max_depth;
use crate::query::resolve::contract_not_found;

// ---------------------------------------------------------------------------
// Tree construction
// ---------------------------------------------------------------------------

/// One node of an inheritance or derivation tree.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TreeNode {
    pub contract_key: ContractKey,
    pub children: Vec<TreeNode>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Direction {
    /// Follow `directly_inherits` upward.
    Ancestors,
    /// Scan for contracts that list the current key in `directly_inherits`.
    Descendants,
}

fn child_keys(facts: &ProjectFacts, key: &ContractKey, direction: Direction) -> Vec<ContractKey> {
    match direction {
        Direction::Ancestors => facts
            .contract(key)
            .map(|model| model.directly_inherits.clone())
            .unwrap_or_default(),
        Direction::Descendants => facts
            .contracts
            .iter()
            .filter(|(_, model)| model.directly_inherits.contains(key))
            .map(|(child, _)| child.clone())
            .collect(),
    }
}

/// Recursive builder shared by both directions. The visited set is cloned per
/// branch so a diamond ancestor appears under every path that reaches it,
/// while a true cycle still terminates as a leaf. A dangling key has no
/// resolvable children and likewise becomes a leaf, never an error.
fn build_tree(
    facts: &ProjectFacts,
    key: &ContractKey,
    direction: Direction,
    visited: &HashSet<ContractKey>,
    depth: u32,
    max_depth: Option<u32>,
    truncated: &mut bool,
) -> TreeNode {
    let mut node = TreeNode {
        contract_key: key.clone(),
        children: Vec::new(),
    };
    if visited.contains(key) {
        return node;
    }
    let mut visited = visited.clone();
    visited.insert(key.clone());

    let children = child_keys(facts, key, direction);
    if children.is_empty() {
        return node;
    }
    if let Some(max) = max_depth {
        if depth >= max {
            *truncated = true;
            return node;
        }
    }
    for child in &children {
        node.children.push(build_tree(
            facts,
            child,
            direction,
            &visited,
            depth + 1,
            max_depth,
            truncated,
        ));
    }
    node
}

/// Flattened transitive ancestors in first-encounter DFS order. The global
/// visited set both terminates cycles and deduplicates diamond bases.
pub fn ancestors_of(facts: &ProjectFacts, contract: &ContractModel) -> Vec<ContractKey> {
    let mut seen: HashSet<ContractKey> = HashSet::new();
    seen.insert(contract.key.clone());
    let mut out = Vec::new();
    collect_ancestors(facts, contract, &mut seen, &mut out);
    out
}

fn collect_ancestors(
    facts: &ProjectFacts,
    contract: &ContractModel,
    seen: &mut HashSet<ContractKey>,
    out: &mut Vec<ContractKey>,
) {
    for parent in &contract.directly_inherits {
        if !seen.insert(parent.clone()) {
            continue;
        }
        out.push(parent.clone());
        if let Some(model) = facts.contract(parent) {
            collect_ancestors(facts, model, seen, out);
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

fn default_max_depth() -> Option<u32> {
    Some(DEFAULT_MAX_DEPTH)
}

/// Request for the ancestor tree of one contract. A missing `max_depth` field
/// defaults to [`DEFAULT_MAX_DEPTH`]; an explicit `null` removes the bound.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetInheritanceHierarchyRequest {
    pub path: String,
    pub contract_key: ContractKey,
    #[serde(default = "default_max_depth")]
    pub max_depth: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetInheritanceHierarchyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<TreeNode>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn get_inheritance_hierarchy(
    request: &GetInheritanceHierarchyRequest,
    facts: &ProjectFacts,
) -> GetInheritanceHierarchyResponse {
    match tree_for(
        facts,
        &request.contract_key,
        Direction::Ancestors,
        request.max_depth,
    ) {
        Ok((tree, truncated)) => GetInheritanceHierarchyResponse {
            success: true,
            tree: Some(tree),
            truncated,
            error_message: None,
        },
        Err(err) => GetInheritanceHierarchyResponse {
            success: false,
            tree: None,
            truncated: false,
            error_message: Some(err.to_string()),
        },
    }
}

/// Request for the derived-contracts tree of one contract; shape mirrors
/// [`GetInheritanceHierarchyRequest`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetDerivedContractsRequest {
    pub path: String,
    pub contract_key: ContractKey,
    #[serde(default = "default_max_depth")]
    pub max_depth: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetDerivedContractsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<TreeNode>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn get_derived_contracts(
    request: &GetDerivedContractsRequest,
    facts: &ProjectFacts,
) -> GetDerivedContractsResponse {
    match tree_for(
        facts,
        &request.contract_key,
        Direction::Descendants,
        request.max_depth,
    ) {
        Ok((tree, truncated)) => GetDerivedContractsResponse {
            success: true,
            tree: Some(tree),
            truncated,
            error_message: None,
        },
        Err(err) => GetDerivedContractsResponse {
            success: false,
            tree: None,
            truncated: false,
            error_message: Some(err.to_string()),
        },
    }
}

fn tree_for(
    facts: &ProjectFacts,
    root: &ContractKey,
    direction: Direction,
    max_depth: Option<u32>,
) -> Result<(TreeNode, bool), FactsError> {
    validate_max_depth(max_depth)?;
    if facts.contract(root).is_none() {
        return Err(contract_not_found(root));
    }
    let mut truncated = false;
    let tree = build_tree(
        facts,
        root,
        direction,
        &HashSet::new(),
        0,
        max_depth,
        &mut truncated,
    );
    Ok((tree, truncated))
}

/// Request for the flattened transitive ancestor list of one contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetInheritedContractsRequest {
    pub path: String,
    pub contract_key: ContractKey,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetInheritedContractsResponse {
    pub success: bool,
    pub inherited_contracts: Vec<ContractKey>,
    pub total_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn get_inherited_contracts(
    request: &GetInheritedContractsRequest,
    facts: &ProjectFacts,
) -> GetInheritedContractsResponse {
    let contract = match facts.contract(&request.contract_key) {
        Some(contract) => contract,
        None => {
            return GetInheritedContractsResponse {
                success: false,
                inherited_contracts: Vec::new(),
                total_count: 0,
                error_message: Some(contract_not_found(&request.contract_key).to_string()),
            }
        }
    };
    let ancestors = ancestors_of(facts, contract);
    GetInheritedContractsResponse {
        success: true,
        total_count: ancestors.len(),
        inherited_contracts: ancestors,
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
