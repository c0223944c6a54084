use axum::http::{HeaderMap, header};

use crate::core::types::Requester;

pub const SUBJECT_HEADER: &str = "x-subject";
pub const GROUPS_HEADER: &str = "x-groups";

/// Build the requester from trusted proxy headers.
///
/// Outside trusted-header mode every request is anonymous. In trusted
/// mode an `authorization` or `x-subject` header marks the request
/// authenticated and `x-groups` carries a comma-separated group list,
/// trimmed and de-duplicated in first-seen order.
pub fn from_headers(headers: &HeaderMap, trusted: bool) -> Requester {
    if !trusted {
        return Requester::anonymous();
    }
    let subject = headers
        .get(SUBJECT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let authenticated = subject.is_some() || headers.contains_key(header::AUTHORIZATION);
    if !authenticated {
        return Requester::anonymous();
    }
    let groups = headers
        .get(GROUPS_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(parse_groups)
        .unwrap_or_default();
    Requester::authenticated(subject, groups)
}

fn parse_groups(raw: &str) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    for group in raw.split(',') {
        let group = group.trim();
        if !group.is_empty() && !groups.iter().any(|g| g == group) {
            groups.push(group.to_string());
        }
    }
    groups
}
