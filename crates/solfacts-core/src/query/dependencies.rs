//! Contract dependency graph and circular-dependency detection.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::{ContractKey, ProjectFacts};
use crate::query::resolve::contract_not_found;

// ---------------------------------------------------------------------------
// Graph model
// ---------------------------------------------------------------------------

/// Why one contract depends on another.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Inherits,
    Calls,
    UsesLibrary,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DependencyEdge {
    pub contract_key: ContractKey,
    pub relationship: Relationship,
}

/// Both directions of the dependency relation for one contract.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ContractDependencies {
    pub contract_key: ContractKey,
    pub depends_on: Vec<DependencyEdge>,
    pub depended_by: Vec<DependencyEdge>,
}

struct DependencyGraph {
    depends_on: IndexMap<ContractKey, Vec<DependencyEdge>>,
    depended_by: IndexMap<ContractKey, Vec<DependencyEdge>>,
}

impl DependencyGraph {
    fn record_for(&self, key: &ContractKey) -> ContractDependencies {
        ContractDependencies {
            contract_key: key.clone(),
            depends_on: self.depends_on.get(key).cloned().unwrap_or_default(),
            depended_by: self.depended_by.get(key).cloned().unwrap_or_default(),
        }
    }
}

/// Resolve a callee's contract-name prefix against the project, first match
/// in map order. The owning contract itself never matches; internal calls are
/// not dependencies.
fn resolve_callee_target<'a>(
    facts: &'a ProjectFacts,
    owner: &ContractKey,
    callee: &str,
) -> Option<&'a ContractKey> {
    // An unqualified callee keeps its parentheses and so never matches a
    // contract name.
    let target_name = callee.split_once('.').map_or(callee, |(name, _)| name);
    facts
        .contracts
        .keys()
        .find(|key| *key != owner && key.contract_name == target_name)
}

fn build_graph(
    facts: &ProjectFacts,
    include_external_calls: bool,
    include_library_usage: bool,
) -> DependencyGraph {
    let mut graph = DependencyGraph {
        depends_on: IndexMap::new(),
        depended_by: IndexMap::new(),
    };
    for key in facts.contracts.keys() {
        graph.depends_on.insert(key.clone(), Vec::new());
        graph.depended_by.insert(key.clone(), Vec::new());
    }

    for (key, model) in &facts.contracts {
        // Inheritance edges are unconditional. A dangling parent still shows
        // in depends_on; only the reverse direction needs a live entry.
        for parent in &model.directly_inherits {
            push_edge(&mut graph, key, parent, Relationship::Inherits);
        }

        if include_external_calls {
            for function in model.functions_declared.values() {
                for callee in &function.callees.external_callees {
                    if let Some(target) = resolve_callee_target(facts, key, callee) {
                        let target = target.clone();
                        if !has_edge_to(&graph, key, &target) {
                            push_edge(&mut graph, key, &target, Relationship::Calls);
                        }
                    }
                }
            }
        }

        if include_library_usage {
            for function in model.functions_declared.values() {
                for callee in &function.callees.library_callees {
                    if let Some(target) = resolve_callee_target(facts, key, callee) {
                        let target = target.clone();
                        if !has_edge_to(&graph, key, &target) {
                            push_edge(&mut graph, key, &target, Relationship::UsesLibrary);
                        }
                    }
                }
            }
        }
    }
    graph
}

fn has_edge_to(graph: &DependencyGraph, from: &ContractKey, to: &ContractKey) -> bool {
    graph
        .depends_on
        .get(from)
        .is_some_and(|edges| edges.iter().any(|edge| &edge.contract_key == to))
}

fn push_edge(
    graph: &mut DependencyGraph,
    from: &ContractKey,
    to: &ContractKey,
    relationship: Relationship,
) {
    if let Some(edges) = graph.depends_on.get_mut(from) {
        edges.push(DependencyEdge {
            contract_key: to.clone(),
            relationship,
        });
    }
    if let Some(edges) = graph.depended_by.get_mut(to) {
        edges.push(DependencyEdge {
            contract_key: from.clone(),
            relationship,
        });
    }
}

// ---------------------------------------------------------------------------
// Cycle detection
// ---------------------------------------------------------------------------

/// Enumerate dependency cycles. Each cycle is reported closed, first key
/// repeated at the end, starting from the earliest map-order member reached.
fn detect_cycles(graph: &DependencyGraph) -> Vec<Vec<ContractKey>> {
    let adjacency: IndexMap<&ContractKey, Vec<&ContractKey>> = graph
        .depends_on
        .iter()
        .map(|(key, edges)| {
            (
                key,
                edges.iter().map(|edge| &edge.contract_key).collect(),
            )
        })
        .collect();

    let mut visited: HashSet<&ContractKey> = HashSet::new();
    let mut rec_stack: HashSet<&ContractKey> = HashSet::new();
    let mut path: Vec<&ContractKey> = Vec::new();
    let mut cycles = Vec::new();

    for &node in adjacency.keys() {
        if !visited.contains(node) {
            cycle_dfs(
                &adjacency,
                node,
                &mut visited,
                &mut rec_stack,
                &mut path,
                &mut cycles,
            );
        }
    }
    cycles
}

fn cycle_dfs<'a>(
    adjacency: &IndexMap<&'a ContractKey, Vec<&'a ContractKey>>,
    node: &'a ContractKey,
    visited: &mut HashSet<&'a ContractKey>,
    rec_stack: &mut HashSet<&'a ContractKey>,
    path: &mut Vec<&'a ContractKey>,
    cycles: &mut Vec<Vec<ContractKey>>,
) {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    let neighbors = adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);
    for &neighbor in neighbors {
        if !visited.contains(neighbor) {
            cycle_dfs(adjacency, neighbor, visited, rec_stack, path, cycles);
        } else if rec_stack.contains(neighbor) {
            if let Some(idx) = path.iter().position(|&key| key == neighbor) {
                let mut cycle: Vec<ContractKey> =
                    path[idx..].iter().map(|&key| key.clone()).collect();
                cycle.push(neighbor.clone());
                cycles.push(cycle);
            }
        }
    }

    path.pop();
    rec_stack.remove(node);
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Request for the dependency view of one contract or the whole project.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetContractDependenciesRequest {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_key: Option<ContractKey>,
    #[serde(default = "default_true")]
    pub include_external_calls: bool,
    #[serde(default = "default_true")]
    pub include_library_usage: bool,
    #[serde(default = "default_true")]
    pub detect_circular: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetContractDependenciesResponse {
    pub success: bool,
    pub dependencies: Vec<ContractDependencies>,
    /// Cycles are a whole-graph property and ignore the contract filter.
    pub circular_dependencies: Vec<Vec<ContractKey>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn get_contract_dependencies(
    request: &GetContractDependenciesRequest,
    facts: &ProjectFacts,
) -> GetContractDependenciesResponse {
    if let Some(key) = &request.contract_key {
        if facts.contract(key).is_none() {
            return GetContractDependenciesResponse {
                success: false,
                dependencies: Vec::new(),
                circular_dependencies: Vec::new(),
                error_message: Some(contract_not_found(key).to_string()),
            };
        }
    }

    let graph = build_graph(
        facts,
        request.include_external_calls,
        request.include_library_usage,
    );

    let dependencies = match &request.contract_key {
        Some(key) => vec![graph.record_for(key)],
        None => facts
            .contracts
            .keys()
            .map(|key| graph.record_for(key))
            .collect(),
    };

    let circular_dependencies = if request.detect_circular {
        detect_cycles(&graph)
    } else {
        Vec::new()
    };

    GetContractDependenciesResponse {
        success: true,
        dependencies,
        circular_dependencies,
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
