//! Storage slot layout calculation with Solidity packing rules.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{ContractKey, ProjectFacts, StateVariable};
use crate::query::guards::{apply_pagination, Pagination};
use crate::query::resolve::contract_not_found;

const SLOT_SIZE: u32 = 32;

// ---------------------------------------------------------------------------
// Type sizing
// ---------------------------------------------------------------------------

/// Byte size of the elementary value types: `bool`, `address`, the
/// `uintN`/`intN`/`bytesN` progressions and the `uint`/`int` aliases.
/// Anything else is not elementary and sizes through [`type_size`].
fn elementary_type_size(type_str: &str) -> Option<u32> {
    match type_str {
        "bool" => return Some(1),
        "address" => return Some(20),
        "uint" | "int" => return Some(SLOT_SIZE),
        _ => {}
    }
    if let Some(bits) = type_str
        .strip_prefix("uint")
        .or_else(|| type_str.strip_prefix("int"))
    {
        let bits: u32 = bits.parse().ok()?;
        if (8..=256).contains(&bits) && bits % 8 == 0 {
            return Some(bits / 8);
        }
        return None;
    }
    if let Some(count) = type_str.strip_prefix("bytes") {
        let count: u32 = count.parse().ok()?;
        if (1..=SLOT_SIZE).contains(&count) {
            return Some(count);
        }
    }
    None
}

/// Storage size in bytes for a declared type. Reference types (mappings,
/// dynamic arrays, `string`/`bytes`) report the 32 bytes of their slot head;
/// structs and fixed arrays are approximated at one slot.
fn type_size(type_str: &str) -> u32 {
    let type_str = type_str.trim();

    // Contract and interface typed variables hold an address.
    if type_str.starts_with("contract ") || type_str.starts_with("interface ") {
        return 20;
    }
    if type_str.starts_with("mapping(") {
        return SLOT_SIZE;
    }
    if type_str.ends_with("[]") {
        return SLOT_SIZE;
    }
    if type_str == "string" || type_str == "bytes" {
        return SLOT_SIZE;
    }
    if type_str.starts_with("struct ") {
        return SLOT_SIZE;
    }
    // Enums almost always fit their smallest representation.
    if type_str.starts_with("enum ") {
        return 1;
    }
    // External function values carry an address plus a selector.
    if type_str.starts_with("function") {
        return 24;
    }
    // Fixed-size arrays, approximated at one slot.
    if type_str.contains('[') {
        return SLOT_SIZE;
    }
    elementary_type_size(type_str).unwrap_or(SLOT_SIZE)
}

/// True for types that must start at a fresh slot and cannot share one.
fn requires_new_slot(type_str: &str) -> bool {
    let type_str = type_str.trim();
    type_str.starts_with("mapping(")
        || type_str.ends_with("[]")
        || type_str == "string"
        || type_str == "bytes"
        || type_str.starts_with("struct ")
        || type_str.contains('[')
}

// ---------------------------------------------------------------------------
// Layout computation
// ---------------------------------------------------------------------------

/// One state variable's slot assignment.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StorageSlot {
    pub variable_name: String,
    pub slot: u32,
    pub offset: u32,
    pub size: u32,
    pub type_str: String,
    pub is_inherited: bool,
    pub declaring_contract: String,
}

/// Collect storage variables in linearization order: parents before children,
/// leftmost parent first, each contract once. Constants and immutables own no
/// storage and are skipped.
fn collect_chain_variables<'a>(
    facts: &'a ProjectFacts,
    key: &ContractKey,
    visited: &mut HashSet<ContractKey>,
    out: &mut Vec<(&'a StateVariable, &'a str)>,
) {
    if !visited.insert(key.clone()) {
        return;
    }
    let Some(model) = facts.contract(key) else {
        return;
    };
    for parent in &model.directly_inherits {
        collect_chain_variables(facts, parent, visited, out);
    }
    for var in &model.state_variables {
        if !var.is_constant && !var.is_immutable {
            out.push((var, model.name.as_str()));
        }
    }
}

/// Assign slots and intra-slot offsets to `variables` under the EVM packing
/// rules: a variable packs into the current slot when it fits and its type
/// allows sharing, otherwise the slot advances first.
fn assign_slots(variables: &[(&StateVariable, &str, bool)]) -> (Vec<StorageSlot>, u32) {
    let mut slots = Vec::with_capacity(variables.len());
    let mut current_slot: u32 = 0;
    let mut current_offset: u32 = 0;

    for (var, declaring_contract, is_inherited) in variables {
        let size = type_size(&var.type_str);
        let fresh = requires_new_slot(&var.type_str);

        // Advance mid-slot when the type forbids sharing or the remainder is
        // too small; a fresh type at offset zero stays put.
        if current_offset > 0 && (fresh || current_offset + size > SLOT_SIZE) {
            current_slot += 1;
            current_offset = 0;
        }

        slots.push(StorageSlot {
            variable_name: var.name.clone(),
            slot: current_slot,
            offset: current_offset,
            size,
            type_str: var.type_str.clone(),
            is_inherited: *is_inherited,
            declaring_contract: (*declaring_contract).to_string(),
        });

        current_offset += size;
        if current_offset >= SLOT_SIZE {
            current_slot += 1;
            current_offset = 0;
        }
    }

    let total_slots_used = current_slot + u32::from(current_offset > 0);
    (slots, total_slots_used)
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Request for the storage layout of one contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetStorageLayoutRequest {
    pub path: String,
    pub contract_key: ContractKey,
    #[serde(default = "default_true")]
    pub include_inherited: bool,
    #[serde(flatten)]
    pub page: Pagination,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetStorageLayoutResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_key: Option<ContractKey>,
    pub storage_slots: Vec<StorageSlot>,
    pub total_count: usize,
    pub total_slots_used: u32,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn get_storage_layout(
    request: &GetStorageLayoutRequest,
    facts: &ProjectFacts,
) -> GetStorageLayoutResponse {
    let failed = |message: String| GetStorageLayoutResponse {
        success: false,
        contract_key: Some(request.contract_key.clone()),
        storage_slots: Vec::new(),
        total_count: 0,
        total_slots_used: 0,
        has_more: false,
        error_message: Some(message),
    };

    if let Err(err) = request.page.validate() {
        return failed(err.to_string());
    }
    let contract = match facts.contract(&request.contract_key) {
        Some(contract) => contract,
        None => return failed(contract_not_found(&request.contract_key).to_string()),
    };

    // Interfaces declare no storage.
    if contract.is_interface {
        return GetStorageLayoutResponse {
            success: true,
            contract_key: Some(request.contract_key.clone()),
            storage_slots: Vec::new(),
            total_count: 0,
            total_slots_used: 0,
            has_more: false,
            error_message: None,
        };
    }

    let mut variables: Vec<(&StateVariable, &str, bool)> = Vec::new();
    if request.include_inherited {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        collect_chain_variables(facts, &request.contract_key, &mut visited, &mut chain);
        for (var, declaring) in chain {
            variables.push((var, declaring, declaring != contract.name));
        }
    } else {
        for var in &contract.state_variables {
            if !var.is_constant && !var.is_immutable {
                variables.push((var, contract.name.as_str(), false));
            }
        }
    }

    let (storage_slots, total_slots_used) = assign_slots(&variables);
    let page = apply_pagination(storage_slots, &request.page);

    GetStorageLayoutResponse {
        success: true,
        contract_key: Some(request.contract_key.clone()),
        storage_slots: page.items,
        total_count: page.total_count,
        total_slots_used,
        has_more: page.has_more,
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
