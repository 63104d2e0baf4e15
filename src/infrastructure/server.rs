// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

//! Axum HTTP surface for the echo server.
//!
//! One wildcard route evaluates every path and method against the
//! `_echo_response` parameter; two control endpoints manage the round-robin
//! counter state. Everything else is delegated to the resolver.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use percent_encoding::percent_decode_str;

use crate::application::counters::MatchCounters;
use crate::application::resolver::{Resolved, Resolver};
use crate::domain::context::RequestContext;
use crate::domain::store::ResponseStore;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Round-robin counters and reset timestamp.
    pub counters: Arc<MatchCounters>,
    /// Source of `file:` response content.
    pub store: Arc<dyn ResponseStore>,
}

/// Build the axum router for the echo server.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/_echo_reset", get(handle_reset))
        .route("/_echo_list_rules", get(handle_list_rules))
        .fallback(handle_echo)
        .with_state(state)
}

/// Handle GET /_echo_reset — clear counters and stamp the reset time.
async fn handle_reset(State(state): State<AppState>) -> &'static str {
    state.counters.reset();
    tracing::info!("match counters reset");
    "ok"
}

/// Handle GET /_echo_list_rules — dump the counter table to the log.
async fn handle_list_rules(State(state): State<AppState>) -> &'static str {
    for (key, count) in state.counters.snapshot() {
        tracing::info!(count, key = %key, "rule match counter");
    }
    "ok"
}

/// Handle everything else: evaluate `_echo_response` and emit the result.
async fn handle_echo(State(state): State<AppState>, req: Request) -> Response {
    let allowed = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::HEAD,
    ];
    if !allowed.contains(req.method()) {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let (parts, body) = req.into_parts();

    let path = percent_decode_str(parts.uri.path())
        .decode_utf8_lossy()
        .into_owned();
    let query = parse_query(parts.uri.query().unwrap_or(""));
    let spec = query.get("_echo_response").cloned().unwrap_or_default();

    let mut headers = HashMap::new();
    for (name, value) in &parts.headers {
        headers.insert(
            name.as_str().to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }

    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let body_text = String::from_utf8_lossy(&bytes).into_owned();

    let ctx = RequestContext::new(&path, query, headers, body_text);

    let request_id = uuid::Uuid::now_v7();
    tracing::debug!(%request_id, method = %parts.method, path = %ctx.path, "evaluating echo request");

    let resolver = Resolver::new(Arc::clone(&state.store), Arc::clone(&state.counters));
    let resolved = resolver.resolve(&ctx, spec.trim_start()).await;

    // The sleep happens after full resolution so nested files can override
    // the delay; a client disconnect drops the future mid-sleep.
    if resolved.delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(resolved.delay_ms)).await;
    }

    tracing::debug!(
        %request_id,
        status = resolved.status,
        delay_ms = resolved.delay_ms,
        "emitting response"
    );
    build_response(resolved)
}

/// Assemble the HTTP response from the resolved parts.
fn build_response(resolved: Resolved) -> Response {
    let status =
        StatusCode::from_u16(resolved.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = Response::new(Body::from(resolved.body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    for (name, value) in &resolved.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

/// Parse a query string into a map, percent-decoding keys and values.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let mut it = pair.splitn(2, '=');
            let key = it.next()?;
            if key.is_empty() {
                return None;
            }
            let value = it.next().unwrap_or("");
            Some((decode_component(key), decode_component(value)))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    percent_decode_str(&raw).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::infrastructure::store::DiskResponseStore;

    fn make_state() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let state = AppState {
            counters: Arc::new(MatchCounters::new()),
            store: Arc::new(DiskResponseStore::new(dir.path().to_path_buf())),
        };
        (state, dir)
    }

    fn echo_uri(path: &str, spec: &str) -> String {
        format!(
            "{path}?_echo_response={}",
            utf8_percent_encode(spec, NON_ALPHANUMERIC)
        )
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    async fn get(app: Router, uri: &str) -> Response {
        let req = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app.oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn test_static_content_with_status() {
        let (state, _dir) = make_state();
        let app = router(state);

        let resp = get(app, &echo_uri("/labs/X", r#"201 { "id": 4 }"#)).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(body_text(resp).await, r#"{ "id": 4 }"#);
    }

    #[tokio::test]
    async fn test_named_path_parameters_interpolated() {
        let (state, _dir) = make_state();
        let app = router(state);

        let resp = get(
            app,
            &echo_uri(
                "/samples/id:73/material:wood",
                r#"200 text:{ "id": {id}, "material": "{material}" }"#,
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, r#"{ "id": 73, "material": "wood" }"#);
    }

    #[tokio::test]
    async fn test_missing_spec_yields_empty_200() {
        let (state, _dir) = make_state();
        let app = router(state);

        let resp = get(app, "/anything/at/all").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "");
    }

    #[tokio::test]
    async fn test_default_content_type_is_html() {
        let (state, _dir) = make_state();
        let app = router(state);

        let resp = get(app, &echo_uri("/x", "200 hello")).await;
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_header_directive_overrides_content_type() {
        let (state, _dir) = make_state();
        let app = router(state);

        let spec = "text: HEADER: Content-Type: application/json\n{ \"ok\": true }";
        let resp = get(app, &echo_uri("/x", spec)).await;
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_text(resp).await, "{ \"ok\": true }");
    }

    #[tokio::test]
    async fn test_query_param_selects_rule() {
        let (state, _dir) = make_state();
        let app = router(state);

        let spec = "200\nPARAM:color /blue/ text: blue paint\nPARAM:color /green/ text: green paint";
        let uri = format!(
            "/paints?color=green&_echo_response={}",
            utf8_percent_encode(spec, NON_ALPHANUMERIC)
        );
        let resp = get(app, &uri).await;
        assert_eq!(body_text(resp).await.trim_end(), "green paint");
    }

    #[tokio::test]
    async fn test_body_selector_on_post() {
        let (state, _dir) = make_state();
        let app = router(state);

        let spec = "BODY: /urgent/ 202 text: queued fast\ntext: queued";
        let req = Request::builder()
            .method("POST")
            .uri(echo_uri("/jobs", spec))
            .body(Body::from("please be urgent about this"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(body_text(resp).await.trim_end(), "queued fast");
    }

    #[tokio::test]
    async fn test_json_selector_reads_request_body() {
        let (state, _dir) = make_state();
        let app = router(state);

        let spec = "JSON: order.size /large/ text: big one\ntext: regular";
        let req = Request::builder()
            .method("POST")
            .uri(echo_uri("/orders", spec))
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"order": {"size": "large"}}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(body_text(resp).await.trim_end(), "big one");
    }

    #[tokio::test]
    async fn test_round_robin_and_reset() {
        let (state, _dir) = make_state();
        let app = router(state);

        let spec = "--[ 1 ]--\npeanuts\n--[ 2 ]--\ncashews";
        let uri = echo_uri("/snacks", spec);

        let first = body_text(get(app.clone(), &uri).await).await;
        let second = body_text(get(app.clone(), &uri).await).await;
        assert_eq!(first.trim_end(), "peanuts");
        assert_eq!(second.trim_end(), "cashews");

        let resp = get(app.clone(), "/_echo_reset").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");

        // After a reset the cycle starts over.
        let again = body_text(get(app, &uri).await).await;
        assert_eq!(again.trim_end(), "peanuts");
    }

    #[tokio::test]
    async fn test_list_rules_returns_ok() {
        let (state, _dir) = make_state();
        let app = router(state);

        let _ = get(app.clone(), &echo_uri("/x", "200 hi")).await;
        let resp = get(app, "/_echo_list_rules").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");
    }

    #[tokio::test]
    async fn test_file_response_loaded_from_disk() {
        let (state, dir) = make_state();
        std::fs::write(dir.path().join("reply.echo"), "text: from disk").unwrap();
        let app = router(state);

        let resp = get(app, &echo_uri("/x", "file: reply.echo")).await;
        assert_eq!(body_text(resp).await, "from disk");
    }

    #[tokio::test]
    async fn test_delay_is_honored() {
        let (state, _dir) = make_state();
        let app = router(state);

        let started = std::time::Instant::now();
        let resp = get(app, &echo_uri("/slow", "delay=50ms text: eventually")).await;
        assert_eq!(body_text(resp).await, "eventually");
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_unlisted_method_rejected() {
        let (state, _dir) = make_state();
        let app = router(state);

        let req = Request::builder()
            .method("PATCH")
            .uri("/x")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_head_method_allowed() {
        let (state, _dir) = make_state();
        let app = router(state);

        let req = Request::builder()
            .method("HEAD")
            .uri(echo_uri("/x", "204"))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_root_path_is_evaluated() {
        let (state, _dir) = make_state();
        let app = router(state);

        let resp = get(app, &echo_uri("/", "200 root reply")).await;
        assert_eq!(body_text(resp).await, "root reply");
    }

    #[tokio::test]
    async fn test_header_selector_reads_request_header() {
        let (state, _dir) = make_state();
        let app = router(state);

        let spec = "HEADER: X-Flavor /mint/ text: minty\ntext: plain";
        let req = Request::builder()
            .method("GET")
            .uri(echo_uri("/teas", spec))
            .header("X-Flavor", "mint chip")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(body_text(resp).await.trim_end(), "minty");
    }
}
