//! Catch-all rewrites.
//!
//! Dashboard tooling queries `_all`, bare `_search`, and the `*` index
//! pattern as a matter of course. None of those can pass a whitelist, so
//! instead of denying them the gateway narrows them: the catch-all is
//! replaced with the caller's own whitelisted indices and the request
//! continues as if the caller had asked for exactly what they may see.
//!
//! Both rewrites are a pragmatic compatibility layer, not a general query
//! transformation. The body rewrite in particular is gross: a plain
//! substring substitution of `"*"` over the buffered body.

use bytes::Bytes;
use http::{HeaderValue, Uri, header::CONTENT_LENGTH};

use crate::{
    classify::{self, RequestContext},
    trace::Trace,
};

/// Whether a first path component triggers the path rewrite.
pub fn is_catch_all(first_path_component: &str) -> bool {
    matches!(first_path_component, "_all" | "_search" | "*")
}

/// Replace a catch-all path prefix with the caller's whitelisted indices.
///
/// `/_all/_search` becomes `/a,b,c/_search`; a bare `/_search` becomes
/// `/a,b,c/_search`; `/*/_search` likewise. Indices whose name starts with
/// `.` are hidden system indices and are never silently injected. The
/// suffix after the catch-all and the query string survive verbatim.
///
/// The API is re-derived from the rewritten path (so `/_all/_search` is
/// evaluated as `_search`, not `_all`). The injected index list is the
/// caller's own whitelist and self-approved by construction, so it is not
/// added to the referenced indices.
pub fn rewrite_catch_all_path(ctx: &mut RequestContext) {
    let visible = ctx
        .whitelisted_indices
        .iter()
        .filter(|rule| !rule.name.starts_with('.'))
        .map(|rule| rule.name.as_str())
        .collect::<Vec<_>>()
        .join(",");

    let path = ctx.parts.uri.path();
    let suffix = path.strip_prefix("/_all").unwrap_or(path);
    let suffix = suffix.strip_prefix("/*").unwrap_or(suffix);

    let rewritten = match ctx.parts.uri.query() {
        Some(query) => format!("/{visible}{suffix}?{query}"),
        None => format!("/{visible}{suffix}"),
    };

    match rewritten.parse::<Uri>() {
        Ok(uri) => {
            ctx.parts.uri = uri;
            ctx.first_path_component =
                classify::first_path_component(ctx.parts.uri.path()).to_string();
            ctx.api = classify::extract_api(ctx.parts.uri.path()).to_string();
        }
        Err(err) => {
            // leave the original path in place; evaluation will deny it
            tracing::warn!(error = %err, "catch-all rewrite produced an invalid URI");
        }
    }
}

/// Replace the `*` index pattern in the body with the caller's whitelisted
/// indices, hidden ones included.
///
/// Every occurrence of the exact byte sequence `"*"` in the buffered body
/// is substituted with the quoted comma-joined whitelist, the body and its
/// content length are swapped in place, and the `*` entry in the extracted
/// indices is replaced with the joined names so evaluation sees a value
/// the caller is entitled to by construction.
pub fn rewrite_wildcard_body(ctx: &mut RequestContext, trace: &mut Trace) {
    let Ok(body) = std::str::from_utf8(&ctx.body) else {
        // not textual JSON; nothing we can safely substitute
        return;
    };

    let names = ctx.whitelisted_index_names.clone();
    let rewritten = body.replace("\"*\"", &format!("\"{names}\""));

    trace.body = rewritten.clone();
    ctx.body = Bytes::from(rewritten);
    ctx.parts
        .headers
        .insert(CONTENT_LENGTH, HeaderValue::from(ctx.body.len()));

    for index in &mut ctx.indices {
        if index == "*" {
            *index = names.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};

    use super::*;
    use crate::{authz::PolicyStore, config::RbacConfig};

    fn policy() -> PolicyStore {
        let rbac: RbacConfig = serde_yaml::from_str(
            r#"
groups:
  analysts:
    whitelisted_indices:
      - name: logs-web
        rest_verbs: [GET, POST]
      - name: logs-db
        rest_verbs: [GET]
      - name: metrics-*
        rest_verbs: [GET]
      - name: .kibana
        rest_verbs: [GET, POST]
"#,
        )
        .unwrap();
        PolicyStore::new(rbac)
    }

    async fn context(method: &str, uri: &str, body: &str) -> RequestContext {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap();
        RequestContext::from_request(req, &["analysts".to_string()], &policy())
            .await
            .unwrap()
    }

    #[test]
    fn test_is_catch_all() {
        assert!(is_catch_all("_all"));
        assert!(is_catch_all("_search"));
        assert!(is_catch_all("*"));
        assert!(!is_catch_all("logs-web"));
        assert!(!is_catch_all("_msearch"));
        assert!(!is_catch_all(""));
    }

    #[tokio::test]
    async fn test_path_rewrite_replaces_all_and_hides_dotted_indices() {
        let mut ctx = context("GET", "/_all/_search", "").await;
        assert_eq!(ctx.api, "_all");

        rewrite_catch_all_path(&mut ctx);

        assert_eq!(
            ctx.parts.uri.path(),
            "/logs-web,logs-db,metrics-*/_search"
        );
        assert_eq!(ctx.api, "_search");
        assert_eq!(ctx.first_path_component, "logs-web,logs-db,metrics-*");
        // injected indices are the caller's own whitelist; not re-checked
        assert!(ctx.indices.is_empty());
    }

    #[tokio::test]
    async fn test_path_rewrite_prefixes_bare_search() {
        let mut ctx = context("GET", "/_search", "").await;
        rewrite_catch_all_path(&mut ctx);

        assert_eq!(
            ctx.parts.uri.path(),
            "/logs-web,logs-db,metrics-*/_search"
        );
    }

    #[tokio::test]
    async fn test_path_rewrite_replaces_star() {
        let mut ctx = context("GET", "/*/_search", "").await;
        rewrite_catch_all_path(&mut ctx);

        assert_eq!(
            ctx.parts.uri.path(),
            "/logs-web,logs-db,metrics-*/_search"
        );
    }

    #[tokio::test]
    async fn test_path_rewrite_preserves_query() {
        let mut ctx = context("GET", "/_all/_search?q=tag:wow&size=5", "").await;
        rewrite_catch_all_path(&mut ctx);

        assert_eq!(
            ctx.parts.uri.path_and_query().unwrap().as_str(),
            "/logs-web,logs-db,metrics-*/_search?q=tag:wow&size=5"
        );
    }

    #[tokio::test]
    async fn test_body_rewrite_substitutes_wildcard() {
        let body = concat!(
            r#"{"index":"*","ignore":[404],"timeout":"90s","requestTimeout":90000,"ignoreUnavailable":true}"#,
            "\n",
            r#"{"size":0,"query":{"bool":{"must":[{"match_all":{}}]}}}"#,
            "\n"
        );
        let mut ctx = context("POST", "/_msearch", body).await;
        let mut trace = Trace::default();

        assert_eq!(ctx.indices, vec!["*"]);
        rewrite_wildcard_body(&mut ctx, &mut trace);

        let expected = concat!(
            r#"{"index":"logs-web,logs-db,metrics-*,.kibana","ignore":[404],"timeout":"90s","requestTimeout":90000,"ignoreUnavailable":true}"#,
            "\n",
            r#"{"size":0,"query":{"bool":{"must":[{"match_all":{}}]}}}"#,
            "\n"
        );
        assert_eq!(&ctx.body[..], expected.as_bytes());
        assert_eq!(trace.body, expected);
        assert_eq!(
            ctx.parts.headers.get(CONTENT_LENGTH).unwrap(),
            &expected.len().to_string()
        );
        assert_eq!(ctx.indices, vec!["logs-web,logs-db,metrics-*,.kibana"]);
    }

    #[tokio::test]
    async fn test_body_rewrite_only_touches_exact_quoted_star() {
        let body = r#"{"index":["*"],"query":{"query_string":{"query":"status:*"}}}"#;
        let mut ctx = context("POST", "/_msearch", body).await;
        let mut trace = Trace::default();

        rewrite_wildcard_body(&mut ctx, &mut trace);

        let expected = r#"{"index":["logs-web,logs-db,metrics-*,.kibana"],"query":{"query_string":{"query":"status:*"}}}"#;
        assert_eq!(&ctx.body[..], expected.as_bytes());
    }
}
