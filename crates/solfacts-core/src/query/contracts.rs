//! Contract listing, lookup, search, and project-wide statistics.

use serde::{Deserialize, Serialize};

use crate::models::{path_matches_exclusion, ContractKey, ContractModel, ProjectFacts};
use crate::query::guards::{apply_pagination, compile_pattern, Pagination};
use crate::query::resolve::contract_not_found;

// ---------------------------------------------------------------------------
// list_contracts
// ---------------------------------------------------------------------------

/// Summary row for one contract.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ContractInfo {
    pub key: ContractKey,
    pub is_abstract: bool,
    pub is_interface: bool,
    pub is_library: bool,
    pub is_fully_implemented: bool,
    /// Declared plus inherited functions.
    pub function_count: usize,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContractFilter {
    #[default]
    All,
    /// Non-abstract, non-interface, non-library.
    Concrete,
    Interface,
    Library,
    Abstract,
}

impl ContractFilter {
    fn keeps(self, model: &ContractModel) -> bool {
        match self {
            ContractFilter::All => true,
            ContractFilter::Concrete => {
                !model.is_interface && !model.is_library && !model.is_abstract
            }
            ContractFilter::Interface => model.is_interface,
            ContractFilter::Library => model.is_library,
            ContractFilter::Abstract => model.is_abstract,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContractSort {
    Name,
    Path,
    FunctionCount,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListContractsRequest {
    pub path: String,
    #[serde(default)]
    pub filter_type: ContractFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<ContractSort>,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_paths: Option<Vec<String>>,
    #[serde(flatten)]
    pub page: Pagination,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListContractsResponse {
    pub success: bool,
    pub contracts: Vec<ContractInfo>,
    pub total_count: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn list_contracts(
    request: &ListContractsRequest,
    facts: &ProjectFacts,
) -> ListContractsResponse {
    if let Err(err) = request.page.validate() {
        return ListContractsResponse {
            success: false,
            contracts: Vec::new(),
            total_count: 0,
            has_more: false,
            error_message: Some(err.to_string()),
        };
    }

    let exclude = request.exclude_paths.as_deref().unwrap_or(&[]);
    let mut contracts: Vec<ContractInfo> = facts
        .contracts
        .iter()
        .filter(|(key, model)| {
            !path_matches_exclusion(&key.path, exclude) && request.filter_type.keeps(model)
        })
        .map(|(key, model)| ContractInfo {
            key: key.clone(),
            is_abstract: model.is_abstract,
            is_interface: model.is_interface,
            is_library: model.is_library,
            is_fully_implemented: model.is_fully_implemented,
            function_count: model.functions_declared.len() + model.functions_inherited.len(),
        })
        .collect();

    if let Some(sort_by) = request.sort_by {
        contracts.sort_by(|a, b| {
            let ord = match sort_by {
                ContractSort::Name => a
                    .key
                    .contract_name
                    .to_lowercase()
                    .cmp(&b.key.contract_name.to_lowercase()),
                ContractSort::Path => a.key.path.to_lowercase().cmp(&b.key.path.to_lowercase()),
                ContractSort::FunctionCount => a.function_count.cmp(&b.function_count),
            };
            match request.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }

    let page = apply_pagination(contracts, &request.page);
    ListContractsResponse {
        success: true,
        contracts: page.items,
        total_count: page.total_count,
        has_more: page.has_more,
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// get_contract
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetContractRequest {
    pub path: String,
    pub contract_key: ContractKey,
    /// When false, the returned model carries empty function maps; useful for
    /// contracts with hundreds of inherited functions.
    #[serde(default = "default_true")]
    pub include_functions: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetContractResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<ContractModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn get_contract(request: &GetContractRequest, facts: &ProjectFacts) -> GetContractResponse {
    let Some(model) = facts.contract(&request.contract_key) else {
        return GetContractResponse {
            success: false,
            contract: None,
            error_message: Some(contract_not_found(&request.contract_key).to_string()),
        };
    };

    let mut contract = model.clone();
    if !request.include_functions {
        contract.functions_declared.clear();
        contract.functions_inherited.clear();
    }
    GetContractResponse {
        success: true,
        contract: Some(contract),
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// search_contracts
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchContractsRequest {
    pub path: String,
    /// Regex searched against contract names, unanchored.
    pub pattern: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_paths: Option<Vec<String>>,
    #[serde(flatten)]
    pub page: Pagination,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchContractsResponse {
    pub success: bool,
    pub matches: Vec<ContractKey>,
    pub total_count: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn search_contracts(
    request: &SearchContractsRequest,
    facts: &ProjectFacts,
) -> SearchContractsResponse {
    let failed = |message: String| SearchContractsResponse {
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
    let matches: Vec<ContractKey> = facts
        .contracts
        .keys()
        .filter(|key| {
            pattern.is_match(&key.contract_name) && !path_matches_exclusion(&key.path, exclude)
        })
        .cloned()
        .collect();

    let page = apply_pagination(matches, &request.page);
    SearchContractsResponse {
        success: true,
        matches: page.items,
        total_count: page.total_count,
        has_more: page.has_more,
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// get_project_overview
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ContractCounts {
    pub total: usize,
    pub concrete: usize,
    #[serde(rename = "abstract")]
    pub abstract_: usize,
    pub interface: usize,
    pub library: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FunctionCounts {
    pub total_declared: usize,
    pub total_inherited: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct VisibilityDistribution {
    pub public: usize,
    pub external: usize,
    pub internal: usize,
    pub private: usize,
}

/// Declared-function sizes bucketed by line span.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ComplexityDistribution {
    /// 1-10 lines.
    pub small: usize,
    /// 11-30 lines.
    pub medium: usize,
    /// 31-100 lines.
    pub large: usize,
    /// More than 100 lines.
    pub very_large: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FindingsByImpact {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub informational: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TopDetector {
    pub name: String,
    pub finding_count: usize,
    pub impact: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProjectOverview {
    pub contract_counts: ContractCounts,
    pub function_counts: FunctionCounts,
    pub visibility_distribution: VisibilityDistribution,
    pub complexity_distribution: ComplexityDistribution,
    pub detector_findings_by_impact: FindingsByImpact,
    /// Top 5 detectors by finding count.
    pub top_detectors: Vec<TopDetector>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetProjectOverviewRequest {
    pub path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetProjectOverviewResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<ProjectOverview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn get_project_overview(
    _request: &GetProjectOverviewRequest,
    facts: &ProjectFacts,
) -> GetProjectOverviewResponse {
    let mut contract_counts = ContractCounts {
        total: facts.contracts.len(),
        ..ContractCounts::default()
    };
    let mut function_counts = FunctionCounts::default();
    let mut visibility = VisibilityDistribution::default();
    let mut complexity = ComplexityDistribution::default();

    for model in facts.contracts.values() {
        // Library wins over interface wins over abstract for classification.
        if model.is_library {
            contract_counts.library += 1;
        } else if model.is_interface {
            contract_counts.interface += 1;
        } else if model.is_abstract {
            contract_counts.abstract_ += 1;
        } else {
            contract_counts.concrete += 1;
        }

        function_counts.total_declared += model.functions_declared.len();
        function_counts.total_inherited += model.functions_inherited.len();

        for func in model.functions_declared.values() {
            match func.visibility.to_lowercase().as_str() {
                "public" => visibility.public += 1,
                "external" => visibility.external += 1,
                "internal" => visibility.internal += 1,
                "private" => visibility.private += 1,
                _ => {}
            }
            match func.line_count() {
                0..=10 => complexity.small += 1,
                11..=30 => complexity.medium += 1,
                31..=100 => complexity.large += 1,
                _ => complexity.very_large += 1,
            }
        }
    }

    let mut findings = FindingsByImpact::default();
    for results in facts.detector_results.values() {
        for result in results {
            match result.impact.to_lowercase().as_str() {
                "high" => findings.high += 1,
                "medium" => findings.medium += 1,
                "low" => findings.low += 1,
                _ => findings.informational += 1,
            }
        }
    }

    let mut top_detectors: Vec<TopDetector> = facts
        .detector_results
        .iter()
        .filter_map(|(name, results)| {
            results.first().map(|first| TopDetector {
                name: name.clone(),
                finding_count: results.len(),
                impact: first.impact.to_lowercase(),
            })
        })
        .collect();
    top_detectors.sort_by(|a, b| b.finding_count.cmp(&a.finding_count));
    top_detectors.truncate(5);

    GetProjectOverviewResponse {
        success: true,
        overview: Some(ProjectOverview {
            contract_counts,
            function_counts,
            visibility_distribution: visibility,
            complexity_distribution: complexity,
            detector_findings_by_impact: findings,
            top_detectors,
        }),
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DetectorResult, SourceLocation};
    use crate::testutil;

    fn mixed_facts() -> ProjectFacts {
        let mut vault = testutil::contract("Vault", "src/Vault.sol");
        testutil::add_declared(
            &mut vault,
            testutil::function("deposit(uint256)", "Vault", "src/Vault.sol", "public"),
        );
        testutil::add_declared(
            &mut vault,
            testutil::function("sweep()", "Vault", "src/Vault.sol", "internal"),
        );

        let mut ivault = testutil::contract("IVault", "src/interfaces/IVault.sol");
        ivault.is_interface = true;

        let mut math = testutil::contract("MathLib", "lib/MathLib.sol");
        math.is_library = true;

        let mut base = testutil::contract("BaseVault", "src/BaseVault.sol");
        base.is_abstract = true;
        base.is_fully_implemented = false;

        testutil::facts(vec![vault, ivault, math, base])
    }

    fn list_request() -> ListContractsRequest {
        ListContractsRequest {
            path: "/project".to_string(),
            filter_type: ContractFilter::All,
            sort_by: None,
            sort_order: SortOrder::Asc,
            exclude_paths: None,
            page: Pagination::default(),
        }
    }

    #[test]
    fn test_list_contracts_filters_by_kind() {
        let facts = mixed_facts();

        let mut request = list_request();
        request.filter_type = ContractFilter::Concrete;
        let response = list_contracts(&request, &facts);
        assert_eq!(response.total_count, 1);
        assert_eq!(response.contracts[0].key.contract_name, "Vault");
        assert_eq!(response.contracts[0].function_count, 2);

        request.filter_type = ContractFilter::Interface;
        let response = list_contracts(&request, &facts);
        assert_eq!(response.contracts[0].key.contract_name, "IVault");

        request.filter_type = ContractFilter::Abstract;
        let response = list_contracts(&request, &facts);
        assert_eq!(response.contracts[0].key.contract_name, "BaseVault");
        assert!(!response.contracts[0].is_fully_implemented);
    }

    #[test]
    fn test_list_contracts_excludes_paths_and_sorts() {
        let facts = mixed_facts();
        let mut request = list_request();
        request.exclude_paths = Some(vec!["lib/".to_string()]);
        request.sort_by = Some(ContractSort::FunctionCount);
        request.sort_order = SortOrder::Desc;

        let response = list_contracts(&request, &facts);
        let names: Vec<&str> = response
            .contracts
            .iter()
            .map(|c| c.key.contract_name.as_str())
            .collect();
        // MathLib filtered out; Vault (2 functions) first, ties keep map order.
        assert_eq!(names, vec!["Vault", "IVault", "BaseVault"]);
    }

    #[test]
    fn test_list_contracts_paginates() {
        let facts = mixed_facts();
        let mut request = list_request();
        request.page = Pagination {
            limit: Some(2),
            offset: 1,
        };
        let response = list_contracts(&request, &facts);
        assert_eq!(response.contracts.len(), 2);
        assert_eq!(response.total_count, 4);
        assert!(response.has_more);
    }

    #[test]
    fn test_get_contract_with_and_without_functions() {
        let facts = mixed_facts();
        let request = GetContractRequest {
            path: "/project".to_string(),
            contract_key: testutil::key("Vault", "src/Vault.sol"),
            include_functions: true,
        };
        let full = get_contract(&request, &facts).contract.unwrap();
        assert_eq!(full.functions_declared.len(), 2);

        let slim_request = GetContractRequest {
            include_functions: false,
            ..request
        };
        let slim = get_contract(&slim_request, &facts).contract.unwrap();
        assert!(slim.functions_declared.is_empty());
        assert_eq!(slim.name, "Vault");
    }

    #[test]
    fn test_get_contract_unknown_key_fails() {
        let facts = mixed_facts();
        let request = GetContractRequest {
            path: "/project".to_string(),
            contract_key: testutil::key("Ghost", "src/Ghost.sol"),
            include_functions: true,
        };
        let response = get_contract(&request, &facts);
        assert!(!response.success);
        assert!(response.error_message.unwrap().contains("Ghost"));
    }

    #[test]
    fn test_search_contracts_is_case_insensitive_by_default() {
        let facts = mixed_facts();
        let request = SearchContractsRequest {
            path: "/project".to_string(),
            pattern: "vault".to_string(),
            case_sensitive: false,
            exclude_paths: None,
            page: Pagination::default(),
        };
        let response = search_contracts(&request, &facts);
        let names: Vec<&str> = response
            .matches
            .iter()
            .map(|k| k.contract_name.as_str())
            .collect();
        assert_eq!(names, vec!["Vault", "IVault", "BaseVault"]);

        let strict = SearchContractsRequest {
            pattern: "^Vault$".to_string(),
            case_sensitive: true,
            ..request
        };
        let response = search_contracts(&strict, &facts);
        assert_eq!(response.total_count, 1);
    }

    #[test]
    fn test_search_contracts_rejects_invalid_pattern() {
        let facts = mixed_facts();
        let request = SearchContractsRequest {
            path: "/project".to_string(),
            pattern: "([unclosed".to_string(),
            case_sensitive: false,
            exclude_paths: None,
            page: Pagination::default(),
        };
        let response = search_contracts(&request, &facts);
        assert!(!response.success);
        assert!(response
            .error_message
            .unwrap()
            .contains("Invalid argument"));
    }

    #[test]
    fn test_overview_counts_kinds_functions_and_findings() {
        let mut facts = mixed_facts();

        // One long declared function to land in the "large" bucket.
        let vault_key = testutil::key("Vault", "src/Vault.sol");
        let vault = facts.contracts.get_mut(&vault_key).unwrap();
        let mut long = testutil::function("rebalance()", "Vault", "src/Vault.sol", "external");
        long.line_start = 10;
        long.line_end = 60;
        testutil::add_declared(vault, long);

        let location = SourceLocation {
            file_path: "src/Vault.sol".to_string(),
            start_line: 1,
            end_line: 2,
        };
        let finding = |detector: &str, impact: &str| DetectorResult {
            detector_name: detector.to_string(),
            check: detector.to_string(),
            impact: impact.to_string(),
            confidence: "High".to_string(),
            description: "finding".to_string(),
            source_locations: vec![location.clone()],
        };
        facts.detector_results.insert(
            "reentrancy-eth".to_string(),
            vec![finding("reentrancy-eth", "High"), finding("reentrancy-eth", "High")],
        );
        facts
            .detector_results
            .insert("naming-convention".to_string(), vec![finding("naming-convention", "Informational")]);
        facts.detector_results.insert("unused".to_string(), Vec::new());

        let request = GetProjectOverviewRequest {
            path: "/project".to_string(),
        };
        let overview = get_project_overview(&request, &facts).overview.unwrap();

        assert_eq!(overview.contract_counts.total, 4);
        assert_eq!(overview.contract_counts.concrete, 1);
        assert_eq!(overview.contract_counts.abstract_, 1);
        assert_eq!(overview.contract_counts.interface, 1);
        assert_eq!(overview.contract_counts.library, 1);

        assert_eq!(overview.function_counts.total_declared, 3);
        assert_eq!(overview.visibility_distribution.public, 1);
        assert_eq!(overview.visibility_distribution.internal, 1);
        assert_eq!(overview.visibility_distribution.external, 1);

        assert_eq!(overview.complexity_distribution.small, 2);
        assert_eq!(overview.complexity_distribution.large, 1);

        assert_eq!(overview.detector_findings_by_impact.high, 2);
        assert_eq!(overview.detector_findings_by_impact.informational, 1);

        // Empty detector entries never rank; highest count first.
        assert_eq!(overview.top_detectors.len(), 2);
        assert_eq!(overview.top_detectors[0].name, "reentrancy-eth");
        assert_eq!(overview.top_detectors[0].finding_count, 2);
        assert_eq!(overview.top_detectors[0].impact, "high");
    }
}
