//! Source extraction for functions and whole contract files.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{FactsError, FactsResult};
use crate::models::{validate_path_within_project, ContractKey, FunctionKey, ProjectFacts};
use crate::query::resolve::{contract_not_found, resolve_by_key};

// ---------------------------------------------------------------------------
// Span extraction
// ---------------------------------------------------------------------------

struct Extract {
    source_code: String,
    line_start: u32,
    line_end: u32,
}

/// Read a 1-indexed inclusive line span from a file under the project root,
/// widened by `context_lines` on both sides but clamped to the file.
fn extract_span(
    project_dir: &Path,
    relative_path: &str,
    line_start: u32,
    line_end: u32,
    context_lines: u32,
) -> FactsResult<Extract> {
    if line_start == 0 || line_end == 0 || line_start > line_end {
        return Err(FactsError::InvalidArgument(format!(
            "invalid line range {line_start}-{line_end} for '{relative_path}'"
        )));
    }
    let full = validate_path_within_project(project_dir, relative_path)?;
    let contents = fs::read_to_string(full)?;
    let lines: Vec<&str> = contents.lines().collect();
    let total = lines.len();
    if line_start as usize > total || line_end as usize > total {
        return Err(FactsError::InvalidArgument(format!(
            "line range {line_start}-{line_end} exceeds file length ({total} lines)"
        )));
    }
    let from = line_start.saturating_sub(context_lines).max(1);
    let to = line_end.saturating_add(context_lines).min(total as u32);
    Ok(Extract {
        source_code: lines[from as usize - 1..to as usize].join("\n"),
        line_start: from,
        line_end: to,
    })
}

// ---------------------------------------------------------------------------
// get_function_source
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetFunctionSourceRequest {
    pub path: String,
    pub function_key: FunctionKey,
    /// Extra lines returned above and below the function body.
    #[serde(default)]
    pub context_lines: u32,
}

/// `line_start` and `line_end` describe the returned text, so they widen
/// along with `context_lines`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetFunctionSourceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn get_function_source(
    request: &GetFunctionSourceRequest,
    facts: &ProjectFacts,
) -> GetFunctionSourceResponse {
    let failed = |message: String| GetFunctionSourceResponse {
        success: false,
        source_code: None,
        file_path: None,
        line_start: None,
        line_end: None,
        error_message: Some(message),
    };

    let function = match resolve_by_key(facts, &request.function_key) {
        Ok(resolved) => resolved.function,
        Err(err) => return failed(err.to_string()),
    };
    match extract_span(
        Path::new(&facts.project_dir),
        &function.path,
        function.line_start,
        function.line_end,
        request.context_lines,
    ) {
        Ok(extract) => GetFunctionSourceResponse {
            success: true,
            source_code: Some(extract.source_code),
            file_path: Some(function.path.clone()),
            line_start: Some(extract.line_start),
            line_end: Some(extract.line_end),
            error_message: None,
        },
        Err(err) => failed(err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// get_contract_source
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetContractSourceRequest {
    pub path: String,
    pub contract_key: ContractKey,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetContractSourceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn get_contract_source(
    request: &GetContractSourceRequest,
    facts: &ProjectFacts,
) -> GetContractSourceResponse {
    let failed = |message: String| GetContractSourceResponse {
        success: false,
        source_code: None,
        file_path: None,
        error_message: Some(message),
    };

    let model = match facts.contract(&request.contract_key) {
        Some(model) => model,
        None => return failed(contract_not_found(&request.contract_key).to_string()),
    };

    let read = validate_path_within_project(Path::new(&facts.project_dir), &model.path)
        .and_then(|full| fs::read_to_string(full).map_err(FactsError::from));
    match read {
        Ok(source_code) => GetContractSourceResponse {
            success: true,
            source_code: Some(source_code),
            file_path: Some(model.path.clone()),
            error_message: None,
        },
        Err(err) => failed(err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
