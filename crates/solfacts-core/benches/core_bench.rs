//! Criterion benchmarks for solfacts-core.
//!
//! Every benchmark runs against synthetic fact snapshots built in memory, so
//! no Solidity toolchain is needed. The generator produces inheritance
//! chains, packed storage variables, and call edges dense enough to give the
//! tree builders, the layout engine, and the graph exporter real work.
//!
//! ## Benchmark groups
//!
//! 1. **inheritance** — Ancestor/descendant tree building on deep chains.
//! 2. **storage_layout** — Slot assignment over inherited variable chains.
//! 3. **callgraph** — Graph building, degree-ranked truncation, rendering.
//! 4. **serving** — Callers scan, dead code, search, project overview.
//! 5. **artifacts** — Checksummed save/load round trips.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/solfacts-core/Cargo.toml
//! # Run only the call-graph group:
//! cargo bench --manifest-path crates/solfacts-core/Cargo.toml -- callgraph
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexMap;

use solfacts_core::models::{
    ContractKey, ContractModel, FunctionCallees, FunctionKey, FunctionModel, ProjectFacts,
    StateVariable,
};
use solfacts_core::query::callgraph::{export_call_graph, ExportCallGraphRequest};
use solfacts_core::query::calls::{
    find_dead_code, list_function_callers, FindDeadCodeRequest, FunctionCallersRequest,
};
use solfacts_core::query::contracts::{get_project_overview, GetProjectOverviewRequest};
use solfacts_core::query::functions::{search_functions, SearchFunctionsRequest};
use solfacts_core::query::guards::Pagination;
use solfacts_core::query::inheritance::{
    get_derived_contracts, get_inheritance_hierarchy, GetDerivedContractsRequest,
    GetInheritanceHierarchyRequest,
};
use solfacts_core::query::storage_layout::{get_storage_layout, GetStorageLayoutRequest};
use solfacts_core::store::artifacts::{load_project_facts, save_project_facts};

// ---------------------------------------------------------------------------
// Synthetic project generator
// ---------------------------------------------------------------------------

fn key(index: usize) -> ContractKey {
    ContractKey::new(format!("Contract{index}"), format!("src/Contract{index}.sol"))
}

fn make_function(contract: usize, index: usize, callees: FunctionCallees) -> FunctionModel {
    let visibility = match index % 4 {
        0 => "public",
        1 => "external",
        2 => "internal",
        _ => "private",
    };
    FunctionModel {
        signature: format!("fn_{contract}_{index}(uint256)"),
        implementation_contract: key(contract),
        solidity_modifiers: if index % 3 == 0 {
            vec!["view".to_string()]
        } else {
            Vec::new()
        },
        visibility: visibility.to_string(),
        function_modifiers: Vec::new(),
        arguments: vec!["uint256".to_string()],
        returns: vec!["uint256".to_string()],
        path: format!("src/Contract{contract}.sol"),
        line_start: (index * 12 + 1) as u32,
        line_end: (index * 12 + 9) as u32,
        callees,
    }
}

/// Build `contracts` contracts in one inheritance chain. Each declares
/// `functions_per_contract` functions whose callees chain within the
/// contract, cross to the next contract, and hit a shared library, plus a
/// handful of packable state variables.
fn synthetic_facts(contracts: usize, functions_per_contract: usize) -> ProjectFacts {
    let var_types = ["uint8", "address", "uint256", "bool", "mapping(address => uint256)"];
    let mut map: IndexMap<ContractKey, ContractModel> = IndexMap::new();

    for c in 0..contracts {
        let contract_key = key(c);
        let mut declared: IndexMap<String, FunctionModel> = IndexMap::new();
        for f in 0..functions_per_contract {
            let mut callees = FunctionCallees::default();
            if f + 1 < functions_per_contract {
                callees
                    .internal_callees
                    .push(format!("Contract{c}.fn_{c}_{}(uint256)", f + 1));
            }
            if c + 1 < contracts && f == 0 {
                callees
                    .external_callees
                    .push(format!("Contract{}.fn_{}_0(uint256)", c + 1, c + 1));
            }
            if f % 3 == 0 {
                callees
                    .library_callees
                    .push("MathLib.mulDiv(uint256,uint256)".to_string());
            }
            let function = make_function(c, f, callees);
            declared.insert(function.signature.clone(), function);
        }

        // One level of inherited copies keeps callers and dead-code scans
        // honest about the declared/inherited split.
        let mut inherited: IndexMap<String, FunctionModel> = IndexMap::new();
        if c > 0 {
            for f in 0..functions_per_contract.min(3) {
                let function = make_function(c - 1, f, FunctionCallees::default());
                inherited.insert(function.signature.clone(), function);
            }
        }

        let state_variables = (0..4)
            .map(|v| StateVariable {
                name: format!("var_{c}_{v}"),
                type_str: var_types[(c + v) % var_types.len()].to_string(),
                visibility: "internal".to_string(),
                is_constant: false,
                is_immutable: false,
                line_number: Some((v + 2) as u32),
            })
            .collect();

        let directly_inherits = if c > 0 { vec![key(c - 1)] } else { Vec::new() };
        map.insert(
            contract_key.clone(),
            ContractModel {
                name: format!("Contract{c}"),
                key: contract_key.clone(),
                path: format!("src/Contract{c}.sol"),
                is_abstract: false,
                is_fully_implemented: true,
                is_interface: false,
                is_library: false,
                directly_inherits,
                scopes: vec![contract_key],
                functions_declared: declared,
                functions_inherited: inherited,
                state_variables,
                events: Vec::new(),
            },
        );
    }

    ProjectFacts {
        contracts: map,
        project_dir: "/project".to_string(),
        detector_results: IndexMap::new(),
        available_detectors: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Benchmark: inheritance trees
// ---------------------------------------------------------------------------

fn bench_inheritance(c: &mut Criterion) {
    let mut group = c.benchmark_group("inheritance");

    for &chain_len in &[10usize, 50, 200] {
        let facts = synthetic_facts(chain_len, 4);
        group.bench_with_input(
            BenchmarkId::new("hierarchy_unbounded", chain_len),
            &chain_len,
            |b, &n| {
                let request = GetInheritanceHierarchyRequest {
                    path: "/project".to_string(),
                    contract_key: key(n - 1),
                    max_depth: None,
                };
                b.iter(|| black_box(get_inheritance_hierarchy(black_box(&request), &facts)));
            },
        );
    }

    let facts = synthetic_facts(200, 4);
    group.bench_function("hierarchy_depth_3", |b| {
        let request = GetInheritanceHierarchyRequest {
            path: "/project".to_string(),
            contract_key: key(199),
            max_depth: Some(3),
        };
        b.iter(|| black_box(get_inheritance_hierarchy(black_box(&request), &facts)));
    });

    group.bench_function("derived_from_root", |b| {
        let request = GetDerivedContractsRequest {
            path: "/project".to_string(),
            contract_key: key(0),
            max_depth: None,
        };
        b.iter(|| black_box(get_derived_contracts(black_box(&request), &facts)));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: storage layout
// ---------------------------------------------------------------------------

fn bench_storage_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage_layout");

    for &chain_len in &[10usize, 50, 200] {
        let facts = synthetic_facts(chain_len, 4);
        group.bench_with_input(
            BenchmarkId::new("inherited_chain", chain_len),
            &chain_len,
            |b, &n| {
                let request = GetStorageLayoutRequest {
                    path: "/project".to_string(),
                    contract_key: key(n - 1),
                    include_inherited: true,
                    page: Pagination::default(),
                };
                b.iter(|| black_box(get_storage_layout(black_box(&request), &facts)));
            },
        );
    }

    let facts = synthetic_facts(200, 4);
    group.bench_function("declared_only", |b| {
        let request = GetStorageLayoutRequest {
            path: "/project".to_string(),
            contract_key: key(199),
            include_inherited: false,
            page: Pagination::default(),
        };
        b.iter(|| black_box(get_storage_layout(black_box(&request), &facts)));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: call graph export
// ---------------------------------------------------------------------------

fn graph_request(format: &str, max_nodes: usize) -> ExportCallGraphRequest {
    ExportCallGraphRequest {
        path: "/project".to_string(),
        contract_key: None,
        format: format.to_string(),
        entry_points_only: false,
        include_internal_calls: true,
        include_external_calls: true,
        include_library_calls: true,
        max_nodes,
        full_labels: false,
    }
}

fn bench_callgraph(c: &mut Criterion) {
    let mut group = c.benchmark_group("callgraph");

    for &(contracts, functions) in &[(10usize, 10usize), (50, 10), (100, 20)] {
        let facts = synthetic_facts(contracts, functions);
        let nodes = contracts * functions;
        group.bench_with_input(
            BenchmarkId::new("mermaid_untruncated", nodes),
            &nodes,
            |b, &n| {
                let request = graph_request("mermaid", n + 1);
                b.iter(|| black_box(export_call_graph(black_box(&request), &facts)));
            },
        );
    }

    let facts = synthetic_facts(100, 20);
    group.bench_function("mermaid_truncated_to_100", |b| {
        let request = graph_request("mermaid", 100);
        b.iter(|| black_box(export_call_graph(black_box(&request), &facts)));
    });

    group.bench_function("dot_truncated_to_100", |b| {
        let request = graph_request("dot", 100);
        b.iter(|| black_box(export_call_graph(black_box(&request), &facts)));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: serving operations
// ---------------------------------------------------------------------------

fn bench_serving(c: &mut Criterion) {
    let mut group = c.benchmark_group("serving");

    let facts = synthetic_facts(100, 10);

    group.bench_function("callers_scan", |b| {
        // fn_50_1 is called internally by fn_50_0 and inherited widely.
        let request = FunctionCallersRequest {
            path: "/project".to_string(),
            function_key: FunctionKey::new(
                "fn_50_1(uint256)",
                "Contract50",
                "src/Contract50.sol",
            ),
            include_query_context: false,
        };
        b.iter(|| black_box(list_function_callers(black_box(&request), &facts)));
    });

    group.bench_function("dead_code_full_project", |b| {
        let request = FindDeadCodeRequest {
            path: "/project".to_string(),
            contract_key: None,
            exclude_entry_points: true,
            include_inherited: false,
            page: Pagination::default(),
        };
        b.iter(|| black_box(find_dead_code(black_box(&request), &facts)));
    });

    group.bench_function("search_functions_regex", |b| {
        let request = SearchFunctionsRequest {
            path: "/project".to_string(),
            pattern: "^fn_[0-9]+_[02]$".to_string(),
            case_sensitive: false,
            search_signatures: false,
            exclude_paths: None,
            deduplicate: true,
            page: Pagination::default(),
        };
        b.iter(|| black_box(search_functions(black_box(&request), &facts)));
    });

    group.bench_function("project_overview", |b| {
        let request = GetProjectOverviewRequest {
            path: "/project".to_string(),
        };
        b.iter(|| black_box(get_project_overview(black_box(&request), &facts)));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: artifact save/load
// ---------------------------------------------------------------------------

fn bench_artifacts(c: &mut Criterion) {
    let mut group = c.benchmark_group("artifacts");
    group.sample_size(20);

    for &contracts in &[10usize, 100] {
        group.bench_with_input(
            BenchmarkId::new("save", contracts),
            &contracts,
            |b, &n| {
                let dir = tempfile::TempDir::new().unwrap();
                let mut facts = synthetic_facts(n, 10);
                b.iter(|| save_project_facts(black_box(&mut facts), dir.path()).unwrap());
            },
        );

        group.bench_with_input(
            BenchmarkId::new("load", contracts),
            &contracts,
            |b, &n| {
                let dir = tempfile::TempDir::new().unwrap();
                save_project_facts(&mut synthetic_facts(n, 10), dir.path()).unwrap();
                b.iter(|| black_box(load_project_facts(black_box(dir.path())).unwrap()));
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Register all benchmark groups
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_inheritance,
    bench_storage_layout,
    bench_callgraph,
    bench_serving,
    bench_artifacts,
);
criterion_main!(benches);
