//! Shared guardrails for request bounds, pagination, and search patterns.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::errors::{FactsError, FactsResult};

/// Pagination half of a request, flattened into paginated request types.
/// Offsets are unsigned by construction; the only rejectable bound is a zero
/// limit.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl Pagination {
    /// Reject out-of-range bounds before any lookup happens.
    pub fn validate(&self) -> FactsResult<()> {
        if self.limit == Some(0) {
            return Err(FactsError::InvalidArgument("limit must be >= 1".into()));
        }
        Ok(())
    }
}

/// One page of results plus the bookkeeping shared by paginated responses.
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub has_more: bool,
}

/// Slice `items` down to the requested window.
pub fn apply_pagination<T>(mut items: Vec<T>, pagination: &Pagination) -> Page<T> {
    let total_count = items.len();
    let offset = pagination.offset.min(total_count);
    let mut page = items.split_off(offset);
    if let Some(limit) = pagination.limit {
        page.truncate(limit);
    }
    let has_more = offset + page.len() < total_count;
    Page {
        items: page,
        total_count,
        has_more,
    }
}

/// Depth bounds are either unlimited (`None`) or at least one level.
pub fn validate_max_depth(max_depth: Option<u32>) -> FactsResult<()> {
    if max_depth == Some(0) {
        return Err(FactsError::InvalidArgument("max_depth must be >= 1".into()));
    }
    Ok(())
}

/// Node caps for graph exports must admit at least one node.
pub fn validate_max_nodes(max_nodes: usize) -> FactsResult<()> {
    if max_nodes == 0 {
        return Err(FactsError::InvalidArgument("max_nodes must be >= 1".into()));
    }
    Ok(())
}

/// Compile a user-supplied regex, reporting failures as invalid arguments.
pub fn compile_pattern(pattern: &str, case_sensitive: bool) -> FactsResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|err| FactsError::InvalidArgument(format!("invalid regex pattern: {err}")))
}
