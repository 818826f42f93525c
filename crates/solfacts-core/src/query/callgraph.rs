//! Call graph export in Mermaid and GraphViz DOT formats.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{FactsError, FactsResult};
use crate::models::{function_name_of, ContractKey, ContractModel, ProjectFacts, DEFAULT_MAX_NODES};
use crate::query::guards::validate_max_nodes;
use crate::query::resolve::contract_not_found;

// ---------------------------------------------------------------------------
// Graph assembly
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GraphFormat {
    Mermaid,
    Dot,
}

fn parse_format(format: &str) -> FactsResult<GraphFormat> {
    match format {
        "mermaid" => Ok(GraphFormat::Mermaid),
        "dot" => Ok(GraphFormat::Dot),
        other => Err(FactsError::InvalidArgument(format!(
            "unsupported graph format {other:?}; expected \"mermaid\" or \"dot\""
        ))),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EdgeKind {
    Internal,
    External,
    Library,
}

/// Replace characters that break Mermaid/DOT identifiers with underscores.
fn sanitize_node_id(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '.' | '(' | ')' | ',' | ' ' | '-' => '_',
            other => other,
        })
        .collect()
}

fn function_label(contract_name: &str, signature: &str, full: bool) -> String {
    if full {
        format!("{contract_name}.{signature}")
    } else {
        format!("{}.{}", contract_name, function_name_of(signature))
    }
}

fn callee_label(callee: &str, full: bool) -> String {
    if full {
        callee.to_string()
    } else {
        callee
            .split_once('(')
            .map_or(callee, |(head, _)| head)
            .to_string()
    }
}

/// Node ids mapped to display labels, in first-encounter order, plus the
/// kind-tagged edge list. Every edge endpoint has a node entry: callees that
/// are not declared in the selected contracts still become nodes.
struct CallGraph {
    nodes: IndexMap<String, String>,
    edges: Vec<(String, String, EdgeKind)>,
}

fn build_call_graph(
    request: &ExportCallGraphRequest,
    facts: &ProjectFacts,
) -> FactsResult<CallGraph> {
    let selected: Vec<(&ContractKey, &ContractModel)> = match &request.contract_key {
        Some(key) => {
            let model = facts.contract(key).ok_or_else(|| contract_not_found(key))?;
            vec![(key, model)]
        }
        None => facts.contracts.iter().collect(),
    };

    let mut graph = CallGraph {
        nodes: IndexMap::new(),
        edges: Vec::new(),
    };

    for (key, model) in selected {
        for (sig, func) in &model.functions_declared {
            if request.entry_points_only && !func.is_entry_point() {
                continue;
            }

            let node_id = sanitize_node_id(&format!("{}_{}", key.contract_name, sig));
            let label = function_label(&key.contract_name, sig, request.full_labels);
            graph.nodes.insert(node_id.clone(), label);

            let mut add_callees = |callees: &[String], kind: EdgeKind| {
                for callee in callees {
                    let callee_id = sanitize_node_id(callee);
                    graph.edges.push((node_id.clone(), callee_id.clone(), kind));
                    graph
                        .nodes
                        .entry(callee_id)
                        .or_insert_with(|| callee_label(callee, request.full_labels));
                }
            };

            if request.include_internal_calls {
                add_callees(&func.callees.internal_callees, EdgeKind::Internal);
            }
            if request.include_external_calls {
                add_callees(&func.callees.external_callees, EdgeKind::External);
            }
            if request.include_library_calls {
                add_callees(&func.callees.library_callees, EdgeKind::Library);
            }
        }
    }
    Ok(graph)
}

/// Cut the graph down to `max_nodes`, preferring high-degree nodes so the
/// connected core survives. Ties break on node id so the cut is stable.
fn truncate_graph(graph: &mut CallGraph, max_nodes: usize) -> bool {
    if graph.nodes.len() <= max_nodes {
        return false;
    }

    let mut degrees: HashMap<&str, usize> = HashMap::new();
    for (from, to, _) in &graph.edges {
        *degrees.entry(from.as_str()).or_insert(0) += 1;
        *degrees.entry(to.as_str()).or_insert(0) += 1;
    }

    let kept: HashSet<String> = {
        let mut ranked: Vec<&String> = graph.nodes.keys().collect();
        ranked.sort_by(|a, b| {
            let da = degrees.get(a.as_str()).copied().unwrap_or(0);
            let db = degrees.get(b.as_str()).copied().unwrap_or(0);
            db.cmp(&da).then_with(|| a.cmp(b))
        });
        ranked.into_iter().take(max_nodes).cloned().collect()
    };

    graph.nodes.retain(|id, _| kept.contains(id));
    graph
        .edges
        .retain(|(from, to, _)| kept.contains(from) && kept.contains(to));
    true
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_mermaid(graph: &CallGraph) -> String {
    let mut lines = vec!["graph TD".to_string()];
    for (id, label) in &graph.nodes {
        lines.push(format!("    {id}[\"{label}\"]"));
    }
    for (from, to, kind) in &graph.edges {
        let arrow = match kind {
            EdgeKind::Internal => "-->",
            EdgeKind::External => "-.->",
            EdgeKind::Library => "==>",
        };
        lines.push(format!("    {from} {arrow} {to}"));
    }
    lines.join("\n")
}

fn render_dot(graph: &CallGraph) -> String {
    let mut lines = vec![
        "digraph CallGraph {".to_string(),
        "    rankdir=TB;".to_string(),
        "    node [shape=box];".to_string(),
    ];
    for (id, label) in &graph.nodes {
        lines.push(format!("    {id} [label=\"{label}\"];"));
    }
    for (from, to, kind) in &graph.edges {
        let line = match kind {
            EdgeKind::Internal => format!("    {from} -> {to};"),
            EdgeKind::External => format!("    {from} -> {to} [style=dashed];"),
            EdgeKind::Library => format!("    {from} -> {to} [style=bold];"),
        };
        lines.push(line);
    }
    lines.push("}".to_string());
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_format() -> String {
    "mermaid".to_string()
}

fn default_max_nodes() -> usize {
    DEFAULT_MAX_NODES
}

/// Request to export the project or single-contract call graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportCallGraphRequest {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_key: Option<ContractKey>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub entry_points_only: bool,
    #[serde(default = "default_true")]
    pub include_internal_calls: bool,
    #[serde(default = "default_true")]
    pub include_external_calls: bool,
    #[serde(default = "default_true")]
    pub include_library_calls: bool,
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    #[serde(default)]
    pub full_labels: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportCallGraphResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub node_count: usize,
    pub edge_count: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn export_call_graph(
    request: &ExportCallGraphRequest,
    facts: &ProjectFacts,
) -> ExportCallGraphResponse {
    match try_export(request, facts) {
        Ok(response) => response,
        Err(err) => ExportCallGraphResponse {
            success: false,
            graph: None,
            format: None,
            node_count: 0,
            edge_count: 0,
            truncated: false,
            error_message: Some(err.to_string()),
        },
    }
}

fn try_export(
    request: &ExportCallGraphRequest,
    facts: &ProjectFacts,
) -> FactsResult<ExportCallGraphResponse> {
    let format = parse_format(&request.format)?;
    validate_max_nodes(request.max_nodes)?;

    let mut graph = build_call_graph(request, facts)?;
    let truncated = truncate_graph(&mut graph, request.max_nodes);

    let rendered = match format {
        GraphFormat::Mermaid => render_mermaid(&graph),
        GraphFormat::Dot => render_dot(&graph),
    };

    Ok(ExportCallGraphResponse {
        success: true,
        graph: Some(rendered),
        format: Some(request.format.clone()),
        node_count: graph.nodes.len(),
        edge_count: graph.edges.len(),
        truncated,
        error_message: None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
