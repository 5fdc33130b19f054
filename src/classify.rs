//! Request classification: body capture and index/API extraction.
//!
//! The backend's HTTP surface is irregular: the indices a request touches
//! can sit in the URI path, in a single JSON body, or scattered across
//! NDJSON lines, as a string or an array, plain or nested under document
//! descriptors. This module canonicalizes all of that into one
//! [`RequestContext`] the rewriter and evaluator operate on.
//!
//! The body is read from the socket exactly once and buffered; extraction
//! and the eventual upstream forward both see the same bytes.

use axum::extract::Request;
use bytes::Bytes;
use http::request::Parts;
use http_body_util::BodyExt;
use serde::Deserialize;
use serde_json::Value;

use crate::{authz::PolicyStore, config::AccessRule};

/// Everything the rewrite and evaluation stages need to know about one
/// request. Mutable until evaluation starts, read-only afterwards.
#[derive(Debug)]
pub struct RequestContext {
    /// Method, URI, and headers of the original request. The URI is
    /// replaced in place by a catch-all path rewrite.
    pub parts: Parts,

    /// The fully-buffered request body. Replaced in place by a wildcard
    /// body rewrite; forwarding always sends this buffer.
    pub body: Bytes,

    /// Path segment after the leading slash, empty if none.
    pub first_path_component: String,

    /// First `_`-prefixed path segment, empty if none.
    pub api: String,

    /// Index names referenced by the body and the URI, in that order.
    /// Duplicates are kept; the evaluator treats the list as a set.
    pub indices: Vec<String>,

    /// The caller's index rules.
    pub whitelisted_indices: Vec<AccessRule>,

    /// The caller's API rules.
    pub whitelisted_apis: Vec<AccessRule>,

    /// Comma-joined names of every whitelisted index, hidden ones
    /// included. Used by the wildcard body rewrite and recognized by the
    /// evaluator as self-approved.
    pub whitelisted_index_names: String,
}

/// Classification errors.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("failed to read request body: {0}")]
    BodyRead(#[from] axum::Error),
}

impl RequestContext {
    /// Buffer the request body and extract the referenced indices and API.
    ///
    /// Consumes the request; the buffered body in the returned context is
    /// what gets forwarded upstream.
    pub async fn from_request(
        req: Request,
        groups: &[String],
        policy: &PolicyStore,
    ) -> Result<Self, ClassifyError> {
        let (parts, body) = req.into_parts();
        let body = body.collect().await?.to_bytes();

        let first_path_component = first_path_component(parts.uri.path()).to_string();
        let api = extract_api(parts.uri.path()).to_string();

        let mut indices = extract_body_indices(&body);
        indices.extend(extract_uri_indices(parts.uri.path()));

        let whitelisted_indices = policy.indices_for(groups);
        let whitelisted_apis = policy.apis_for(groups);
        let whitelisted_index_names = whitelisted_indices
            .iter()
            .map(|rule| rule.name.as_str())
            .collect::<Vec<_>>()
            .join(",");

        Ok(Self {
            parts,
            body,
            first_path_component,
            api,
            indices,
            whitelisted_indices,
            whitelisted_apis,
            whitelisted_index_names,
        })
    }
}

/// The URL path segment directly after the leading slash.
pub fn first_path_component(path: &str) -> &str {
    path.split('/').nth(1).unwrap_or("")
}

/// The API a request addresses: the first path segment beginning with `_`.
///
/// Index-addressed endpoints put the index first (`/logs-web/_search`), so
/// the scan continues past the leading segment.
pub fn extract_api(path: &str) -> &str {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    match segments.next() {
        Some(first) if first.starts_with('_') => first,
        Some(_) => segments
            .find(|segment| segment.starts_with('_'))
            .unwrap_or(""),
        None => "",
    }
}

/// Indices named in the URI path.
///
/// The first path component is an index list unless it is an API segment
/// or the catch-all `*` (which the rewriter handles).
pub fn extract_uri_indices(path: &str) -> Vec<String> {
    let first = first_path_component(path);
    if first.is_empty() || first.starts_with('_') || first == "*" {
        return Vec::new();
    }
    first.split(',').map(str::to_string).collect()
}

/// Indices named anywhere in the request body.
///
/// The body is treated as NDJSON; every line is probed against each known
/// shape independently and the results are unioned. A line that does not
/// decode as some shape simply contributes nothing from that shape; the
/// backend API surface is too large to enumerate strictly.
pub fn extract_body_indices(body: &[u8]) -> Vec<String> {
    let mut indices = Vec::new();

    for line in body.split(|byte| *byte == b'\n') {
        if line.iter().all(|byte| byte.is_ascii_whitespace()) {
            continue;
        }
        indices.extend(line_string_index(line));
        indices.extend(line_array_index(line));
        indices.extend(line_bulk_indices(line));
    }

    // multi-get addresses indices per document, over the whole body
    indices.extend(multi_get_indices(body));

    indices
}

fn split_patterns(raw: &str) -> Vec<String> {
    raw.split(',').map(str::to_string).collect()
}

/// `{"index": "a,b"}`, the older search request shape.
fn line_string_index(line: &[u8]) -> Vec<String> {
    #[derive(Deserialize)]
    struct Line {
        index: String,
    }

    match serde_json::from_slice::<Line>(line) {
        Ok(parsed) if !parsed.index.is_empty() => split_patterns(&parsed.index),
        _ => Vec::new(),
    }
}

/// `{"index": ["a", "b"]}`, the newer search request shape.
fn line_array_index(line: &[u8]) -> Vec<String> {
    #[derive(Deserialize)]
    struct Line {
        index: Vec<String>,
    }

    match serde_json::from_slice::<Line>(line) {
        Ok(parsed) => parsed
            .index
            .iter()
            .flat_map(|entry| split_patterns(entry))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// `{"<op>": {"_index": "a"}}`: bulk action lines, where `<op>` is
/// `index`, `create`, `update`, `delete`, or whatever the backend grows
/// next.
fn line_bulk_indices(line: &[u8]) -> Vec<String> {
    let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(line) else {
        return Vec::new();
    };

    map.values()
        .filter_map(|value| value.get("_index").and_then(Value::as_str))
        .flat_map(split_patterns)
        .collect()
}

/// `{"docs": [{"_index": "a"}, ...]}`, the multi-get shape.
fn multi_get_indices(body: &[u8]) -> Vec<String> {
    #[derive(Deserialize)]
    struct MultiGet {
        docs: Vec<Doc>,
    }

    #[derive(Deserialize)]
    struct Doc {
        #[serde(rename = "_index", default)]
        index: String,
    }

    match serde_json::from_slice::<MultiGet>(body) {
        Ok(parsed) => parsed
            .docs
            .iter()
            .filter(|doc| !doc.index.is_empty())
            .flat_map(|doc| split_patterns(&doc.index))
            .collect(),
        Err(_) => Vec::new(),
    }
}
