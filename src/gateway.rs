//! The request pipeline.
//!
//! One handler serves every method and path: resolve the caller's
//! identity, classify the request, apply catch-all rewrites, evaluate
//! policy, then forward upstream or answer 401. The handler mutates only
//! its own per-request context and trace, so it is safe under arbitrary
//! concurrency; the policy store and upstream client are shared read-only.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    response::Response,
};

use crate::{
    AppState, auth,
    authz::{Decision, evaluate},
    classify::RequestContext,
    rewrite, trace::Trace,
};

/// Why a request never reached the upstream.
enum Rejection {
    /// Policy said no. Expected traffic, logged as info.
    Denied(String),
    /// The pipeline itself failed (e.g. the body could not be read).
    Failed(String),
}

/// Handle one request end to end.
///
/// Emits exactly one trace record per request, whatever the outcome.
pub async fn filter_request(State(state): State<AppState>, req: Request) -> Response {
    let started = Instant::now();
    let mut trace = Trace {
        path: req.uri().path().to_string(),
        method: req.method().to_string(),
        ..Trace::default()
    };

    let identity = auth::resolve(req.headers(), &state.config);
    trace.user = identity.user.clone();
    trace.groups = identity.groups.clone();

    let response = match authorize_and_forward(&state, req, &identity.groups, &mut trace).await {
        Ok(response) => response,
        Err(Rejection::Denied(message)) => {
            trace.message = message;
            empty_response(StatusCode::UNAUTHORIZED)
        }
        Err(Rejection::Failed(error)) => {
            trace.error = error;
            empty_response(StatusCode::UNAUTHORIZED)
        }
    };

    trace.code = response.status().as_u16();
    trace.elapsed = started.elapsed().as_millis() as u64;
    trace.emit();

    response
}

async fn authorize_and_forward(
    state: &AppState,
    req: Request,
    groups: &[String],
    trace: &mut Trace,
) -> Result<Response, Rejection> {
    let mut ctx = RequestContext::from_request(req, groups, &state.policy)
        .await
        .map_err(|err| Rejection::Failed(err.to_string()))?;
    trace.body = String::from_utf8_lossy(&ctx.body).into_owned();

    if state.config.rewrite_catch_all {
        if rewrite::is_catch_all(&ctx.first_path_component) {
            rewrite::rewrite_catch_all_path(&mut ctx);
        }
        if ctx.indices.iter().any(|index| index == "*") {
            rewrite::rewrite_wildcard_body(&mut ctx, trace);
        }
    }
    trace.indices = ctx.indices.clone();

    match evaluate(&ctx) {
        Decision::Denied(reason) => Err(Rejection::Denied(reason)),
        Decision::Allowed => match state.upstream.forward(ctx).await {
            Ok(response) => Ok(response),
            Err(err) => {
                trace.error = err.to_string();
                Ok(empty_response(StatusCode::BAD_GATEWAY))
            }
        },
    }
}

fn empty_response(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
