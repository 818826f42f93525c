//! Detector catalog and cached-finding queries.

use serde::{Deserialize, Serialize};

use crate::models::{DetectorMetadata, DetectorResult, ProjectFacts};
use crate::query::guards::{apply_pagination, Pagination};

// ---------------------------------------------------------------------------
// list_detectors
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListDetectorsRequest {
    pub path: String,
    /// Substring match against detector name or description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_filter: Option<String>,
    #[serde(flatten)]
    pub page: Pagination,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListDetectorsResponse {
    pub success: bool,
    pub detectors: Vec<DetectorMetadata>,
    pub total_count: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn list_detectors(
    request: &ListDetectorsRequest,
    facts: &ProjectFacts,
) -> ListDetectorsResponse {
    if let Err(err) = request.page.validate() {
        return ListDetectorsResponse {
            success: false,
            detectors: Vec::new(),
            total_count: 0,
            has_more: false,
            error_message: Some(err.to_string()),
        };
    }

    let mut detectors: Vec<DetectorMetadata> = facts.available_detectors.clone();
    if let Some(filter) = &request.name_filter {
        let needle = filter.to_lowercase();
        detectors.retain(|d| {
            d.name.to_lowercase().contains(&needle)
                || d.description.to_lowercase().contains(&needle)
        });
    }

    let page = apply_pagination(detectors, &request.page);
    ListDetectorsResponse {
        success: true,
        detectors: page.items,
        total_count: page.total_count,
        has_more: page.has_more,
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// run_detectors
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunDetectorsRequest {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Vec<String>>,
    #[serde(flatten)]
    pub page: Pagination,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunDetectorsResponse {
    pub success: bool,
    pub results: Vec<DetectorResult>,
    pub total_count: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Filter the cached findings by detector name, impact, and confidence. All
/// filters are case-insensitive; an empty filter list passes everything.
pub fn run_detectors(request: &RunDetectorsRequest, facts: &ProjectFacts) -> RunDetectorsResponse {
    if let Err(err) = request.page.validate() {
        return RunDetectorsResponse {
            success: false,
            results: Vec::new(),
            total_count: 0,
            has_more: false,
            error_message: Some(err.to_string()),
        };
    }

    let wanted_names: Option<Vec<String>> = request
        .detector_names
        .as_ref()
        .filter(|names| !names.is_empty())
        .map(|names| names.iter().map(|n| n.to_lowercase()).collect());

    let mut results: Vec<DetectorResult> = Vec::new();
    for (detector_name, findings) in &facts.detector_results {
        if let Some(wanted) = &wanted_names {
            if !wanted.contains(&detector_name.to_lowercase()) {
                continue;
            }
        }
        results.extend(findings.iter().cloned());
    }

    if let Some(impacts) = request.impact.as_ref().filter(|i| !i.is_empty()) {
        let wanted: Vec<String> = impacts.iter().map(|i| i.to_lowercase()).collect();
        results.retain(|r| wanted.contains(&r.impact.to_lowercase()));
    }
    if let Some(confidences) = request.confidence.as_ref().filter(|c| !c.is_empty()) {
        let wanted: Vec<String> = confidences.iter().map(|c| c.to_lowercase()).collect();
        results.retain(|r| wanted.contains(&r.confidence.to_lowercase()));
    }

    let page = apply_pagination(results, &request.page);
    RunDetectorsResponse {
        success: true,
        results: page.items,
        total_count: page.total_count,
        has_more: page.has_more,
        error_message: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
