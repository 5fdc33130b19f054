//! The allow/deny decision.

use super::glob_match;
use crate::classify::RequestContext;

/// Outcome of evaluating one request against the caller's rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Denied, with a human-readable reason for the trace record.
    Denied(String),
}

/// Evaluate a classified request.
///
/// Two gates, both of which must pass:
///
/// * **API gate**: if the request addresses an API (`_search`, `_mget`,
///   ...), some API rule must glob-match it and list the request method.
/// * **Index gate**: every index the request references must glob-match
///   some index rule that lists the request method. A request referencing
///   no index passes trivially.
///
/// An index equal to the caller's full comma-joined whitelist is the
/// product of the wildcard body rewrite and is approved as-is.
pub fn evaluate(ctx: &RequestContext) -> Decision {
    let method = &ctx.parts.method;

    if !ctx.api.is_empty() {
        let permitted = ctx
            .whitelisted_apis
            .iter()
            .any(|rule| glob_match(&rule.name, &ctx.api) && rule.allows(method));
        if !permitted {
            return Decision::Denied(format!("{} not in API whitelist", ctx.api));
        }
    }

    if ctx.indices.is_empty() {
        return Decision::Allowed;
    }

    let mut allowed = 0usize;
    let mut blocked: Vec<&str> = Vec::new();
    for index in &ctx.indices {
        if !ctx.whitelisted_index_names.is_empty() && *index == ctx.whitelisted_index_names {
            allowed += 1;
            continue;
        }
        let matched = ctx
            .whitelisted_indices
            .iter()
            .any(|rule| glob_match(&rule.name, index) && rule.allows(method));
        if matched {
            allowed += 1;
        } else {
            blocked.push(index.as_str());
        }
    }

    if allowed >= ctx.indices.len() {
        Decision::Allowed
    } else {
        Decision::Denied(format!("{} not in index whitelist", blocked.join(", ")))
    }
}
