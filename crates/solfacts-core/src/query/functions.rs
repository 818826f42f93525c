//! Function listing and search.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{
    function_name_of, path_matches_exclusion, ContractKey, FunctionKey, FunctionModel,
    ProjectFacts,
};
use crate::query::contracts::SortOrder;
use crate::query::guards::{apply_pagination, compile_pattern, Pagination};
use crate::query::resolve::contract_not_found;

// ---------------------------------------------------------------------------
// list_functions
// ---------------------------------------------------------------------------

/// Summary row for one function as seen from a contract.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionInfo {
    pub function_key: FunctionKey,
    pub visibility: String,
    pub solidity_modifiers: Vec<String>,
    /// True when declared by the contract itself, false when inherited.
    pub is_declared: bool,
    pub line_count: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FunctionSort {
    Name,
    Visibility,
    LineCount,
}

fn visibility_rank(visibility: &str) -> u8 {
    match visibility.to_lowercase().as_str() {
        "external" => 0,
        "public" => 1,
        "internal" => 2,
        "private" => 3,
        _ => 4,
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListFunctionsRequest {
    pub path: String,
    pub contract_key: ContractKey,
    /// Keep only functions whose visibility is one of these.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Vec<String>>,
    /// Keep only functions carrying at least one of these built-in modifiers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_modifiers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<FunctionSort>,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(flatten)]
    pub page: Pagination,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListFunctionsResponse {
    pub success: bool,
    pub functions: Vec<FunctionInfo>,
    pub total_count: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn keeps_function(request: &ListFunctionsRequest, func: &FunctionModel) -> bool {
    if let Some(visibility) = &request.visibility {
        if !visibility.contains(&func.visibility) {
            return false;
        }
    }
    if let Some(wanted) = &request.has_modifiers {
        if !wanted
            .iter()
            .any(|modifier| func.solidity_modifiers.contains(modifier))
        {
            return false;
        }
    }
    true
}

pub fn list_functions(
    request: &ListFunctionsRequest,
    facts: &ProjectFacts,
) -> ListFunctionsResponse {
    let failed = |message: String| ListFunctionsResponse {
        success: false,
        functions: Vec::new(),
        total_count: 0,
        has_more: false,
        error_message: Some(message),
    };

    if let Err(err) = request.page.validate() {
        return failed(err.to_string());
    }
    let Some(model) = facts.contract(&request.contract_key) else {
        return failed(contract_not_found(&request.contract_key).to_string());
    };

    let mut functions: Vec<FunctionInfo> = Vec::new();
    let tables = [
        (&model.functions_declared, true),
        (&model.functions_inherited, false),
    ];
    for (table, is_declared) in tables {
        for (sig, func) in table {
            if !keeps_function(request, func) {
                continue;
            }
            functions.push(FunctionInfo {
                function_key: FunctionKey::new(
                    sig.clone(),
                    request.contract_key.contract_name.clone(),
                    request.contract_key.path.clone(),
                ),
                visibility: func.visibility.clone(),
                solidity_modifiers: func.solidity_modifiers.clone(),
                is_declared,
                line_count: func.line_count(),
            });
        }
    }

    if let Some(sort_by) = request.sort_by {
        functions.sort_by(|a, b| {
            let ord = match sort_by {
                FunctionSort::Name => a
                    .function_key
                    .signature
                    .to_lowercase()
                    .cmp(&b.function_key.signature.to_lowercase()),
                FunctionSort::Visibility => {
                    visibility_rank(&a.visibility).cmp(&visibility_rank(&b.visibility))
                }
                FunctionSort::LineCount => a.line_count.cmp(&b.line_count),
            };
            match request.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }

    let page = apply_pagination(functions, &request.page);
    ListFunctionsResponse {
        success: true,
        functions: page.items,
        total_count: page.total_count,
        has_more: page.has_more,
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// search_functions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchFunctionsRequest {
    pub path: String,
    /// Regex searched against function names, or full signatures when
    /// `search_signatures` is set.
    pub pattern: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub search_signatures: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_paths: Option<Vec<String>>,
    /// Collapse repeats of the same (contract name, signature) pair, which
    /// otherwise show up once per inheriting contract.
    #[serde(default = "default_true")]
    pub deduplicate: bool,
    #[serde(flatten)]
    pub page: Pagination,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchFunctionsResponse {
    pub success: bool,
    pub matches: Vec<FunctionKey>,
    pub total_count: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn search_functions(
    request: &SearchFunctionsRequest,
    facts: &ProjectFacts,
) -> SearchFunctionsResponse {
    let failed = |message: String| SearchFunctionsResponse {
        success: false,
        matches: Vec::new(),
        total_count: 0,
        has_more: false,
        error_message: Some(message),
    };

    if let Err(err) = request.page.validate() {
        return failed(err.to_string());
    }
    let pattern = match compile_pattern(&request.pattern, request.case_sensitive) {
        Ok(pattern) => pattern,
        Err(err) => return failed(err.to_string()),
    };

    let exclude = request.exclude_paths.as_deref().unwrap_or(&[]);
    let mut matches: Vec<FunctionKey> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for (contract_key, model) in &facts.contracts {
        if path_matches_exclusion(&contract_key.path, exclude) {
            continue;
        }
        let signatures = model
            .functions_declared
            .keys()
            .chain(model.functions_inherited.keys());
        for sig in signatures {
            let target = if request.search_signatures {
                sig.as_str()
            } else {
                function_name_of(sig)
            };
            if !pattern.is_match(target) {
                continue;
            }
            if request.deduplicate
                && !seen.insert((contract_key.contract_name.clone(), sig.clone()))
            {
                continue;
            }
            matches.push(FunctionKey::new(
                sig.clone(),
                contract_key.contract_name.clone(),
                contract_key.path.clone(),
            ));
        }
    }

    let page = apply_pagination(matches, &request.page);
    SearchFunctionsResponse {
        success: true,
        matches: page.items,
        total_count: page.total_count,
        has_more: page.has_more,
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn sample_facts() -> ProjectFacts {
        let mut vault = testutil::contract("Vault", "src/Vault.sol");

        let mut deposit = testutil::function("deposit(uint256)", "Vault", "src/Vault.sol", "public");
        deposit.solidity_modifiers = vec!["payable".to_string()];
        deposit.line_end = 20;
        testutil::add_declared(&mut vault, deposit);

        let mut sweep = testutil::function("sweep()", "Vault", "src/Vault.sol", "private");
        sweep.line_end = 3;
        testutil::add_declared(&mut vault, sweep);

        let mut pause = testutil::function("pause()", "Base", "src/Base.sol", "external");
        pause.solidity_modifiers = vec!["virtual".to_string()];
        testutil::add_inherited(&mut vault, pause);

        testutil::facts(vec![vault])
    }

    fn list_request() -> ListFunctionsRequest {
        ListFunctionsRequest {
            path: "/project".to_string(),
            contract_key: testutil::key("Vault", "src/Vault.sol"),
            visibility: None,
            has_modifiers: None,
            sort_by: None,
            sort_order: SortOrder::Asc,
            page: Pagination::default(),
        }
    }

    #[test]
    fn test_list_functions_declared_before_inherited() {
        let facts = sample_facts();
        let response = list_functions(&list_request(), &facts);
        assert!(response.success);
        assert_eq!(response.total_count, 3);

        let rows: Vec<(&str, bool)> = response
            .functions
            .iter()
            .map(|f| (f.function_key.signature.as_str(), f.is_declared))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("deposit(uint256)", true),
                ("sweep()", true),
                ("pause()", false),
            ]
        );
        // Inherited rows carry the viewing contract's key.
        assert_eq!(response.functions[2].function_key.contract_name, "Vault");
    }

    #[test]
    fn test_list_functions_filters_by_visibility_and_modifiers() {
        let facts = sample_facts();

        let mut request = list_request();
        request.visibility = Some(vec!["public".to_string(), "external".to_string()]);
        let response = list_functions(&request, &facts);
        let sigs: Vec<&str> = response
            .functions
            .iter()
            .map(|f| f.function_key.signature.as_str())
            .collect();
        assert_eq!(sigs, vec!["deposit(uint256)", "pause()"]);

        let mut request = list_request();
        request.has_modifiers = Some(vec!["virtual".to_string()]);
        let response = list_functions(&request, &facts);
        assert_eq!(response.total_count, 1);
        assert_eq!(response.functions[0].function_key.signature, "pause()");
    }

    #[test]
    fn test_list_functions_sorts_by_visibility_then_reversed_line_count() {
        let facts = sample_facts();

        let mut request = list_request();
        request.sort_by = Some(FunctionSort::Visibility);
        let response = list_functions(&request, &facts);
        let visibilities: Vec<&str> = response
            .functions
            .iter()
            .map(|f| f.visibility.as_str())
            .collect();
        assert_eq!(visibilities, vec!["external", "public", "private"]);

        let mut request = list_request();
        request.sort_by = Some(FunctionSort::LineCount);
        request.sort_order = SortOrder::Desc;
        let response = list_functions(&request, &facts);
        assert_eq!(response.functions[0].function_key.signature, "deposit(uint256)");
        assert_eq!(response.functions[0].line_count, 20);
    }

    #[test]
    fn test_list_functions_unknown_contract_fails() {
        let facts = sample_facts();
        let mut request = list_request();
        request.contract_key = testutil::key("Ghost", "src/Ghost.sol");
        let response = list_functions(&request, &facts);
        assert!(!response.success);
        assert!(response.error_message.unwrap().contains("Ghost"));
    }

    fn search_request(pattern: &str) -> SearchFunctionsRequest {
        SearchFunctionsRequest {
            path: "/project".to_string(),
            pattern: pattern.to_string(),
            case_sensitive: false,
            search_signatures: false,
            exclude_paths: None,
            deduplicate: true,
            page: Pagination::default(),
        }
    }

    #[test]
    fn test_search_functions_names_versus_signatures() {
        let facts = sample_facts();

        // "uint256" appears only in the parameter list.
        let response = search_functions(&search_request("uint256"), &facts);
        assert_eq!(response.total_count, 0);

        let mut request = search_request("uint256");
        request.search_signatures = true;
        let response = search_functions(&request, &facts);
        assert_eq!(response.total_count, 1);
        assert_eq!(response.matches[0].signature, "deposit(uint256)");
    }

    #[test]
    fn test_search_functions_deduplicates_same_signature() {
        let mut facts = sample_facts();
        // An override artifact: pause() both declared and inherited.
        let vault_key = testutil::key("Vault", "src/Vault.sol");
        testutil::add_declared(
            facts.contracts.get_mut(&vault_key).unwrap(),
            testutil::function("pause()", "Vault", "src/Vault.sol", "external"),
        );

        let response = search_functions(&search_request("pause"), &facts);
        assert_eq!(response.total_count, 1);

        let mut raw = search_request("pause");
        raw.deduplicate = false;
        let response = search_functions(&raw, &facts);
        assert_eq!(response.total_count, 2);
    }

    #[test]
    fn test_search_functions_respects_exclusions_and_bad_patterns() {
        let facts = sample_facts();

        let mut request = search_request(".*");
        request.exclude_paths = Some(vec!["src/".to_string()]);
        let response = search_functions(&request, &facts);
        assert_eq!(response.total_count, 0);

        let response = search_functions(&search_request("([bad"), &facts);
        assert!(!response.success);
    }
}
