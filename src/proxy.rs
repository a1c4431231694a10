// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

// HTTP surface
//
// Responsibilities:
// - POST /v1/chat: action endpoint (create, send, history)
// - GET /v1/chat/test: provider connectivity probe
// - GET /v1/heartbeat: liveness
// - Caller identity from the configured header; missing -> 401
// - Every error rendered as `{error}` with the classified status

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use uuid::Uuid;

use crate::config::ServerSettings;
use crate::error::{ErrorKind, GatewayError};
use crate::gateway::{ActionRequest, ConversationGateway};
use crate::message::CallerId;

/// Provider path exercised by the probe, echoed in its response.
const PROBE_ENDPOINT: &str = "conversations";

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state injected into axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ConversationGateway>,
    pub caller_header: HeaderName,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Heartbeat endpoint: GET /v1/heartbeat -> 200 OK
pub async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

/// Action endpoint: POST /v1/chat
pub async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let caller = match caller_from(&headers, &state.caller_header) {
        Ok(c) => c,
        Err(e) => {
            tracing::info!(%request_id, "request without caller identity");
            return e.into_response();
        }
    };

    let request = match parse_action(&body) {
        Ok(r) => r,
        Err(e) => {
            tracing::info!(%request_id, "malformed action body");
            return e.into_response();
        }
    };

    let action = request.action.clone().unwrap_or_default();
    tracing::info!(%request_id, action = %action, "action received");

    match state.gateway.dispatch(&caller, request).await {
        Ok(resp) => {
            tracing::info!(%request_id, action = %action, "action completed");
            (StatusCode::OK, Json(resp)).into_response()
        }
        Err(e) => {
            tracing::info!(%request_id, action = %action, kind = %e.kind(), "action failed");
            e.into_response()
        }
    }
}

/// Connectivity probe: GET /v1/chat/test
pub async fn probe_handler(State(state): State<AppState>) -> Response {
    match state.gateway.probe().await {
        Ok(()) => Json(serde_json::json!({
            "success": true,
            "message": "connected to provider",
            "endpoint": PROBE_ENDPOINT,
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(kind = %e.kind(), "provider probe failed");
            (
                e.kind().status(),
                Json(serde_json::json!({
                    "error": e.message,
                    "endpoint": PROBE_ENDPOINT,
                })),
            )
                .into_response()
        }
    }
}

fn caller_from(headers: &HeaderMap, header: &HeaderName) -> Result<CallerId, GatewayError> {
    headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| CallerId::new(v))
        .ok_or_else(|| GatewayError::new(ErrorKind::Auth, "caller identity is required"))
}

fn parse_action(body: &[u8]) -> Result<ActionRequest, GatewayError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|_| GatewayError::invalid_input("request body is not valid JSON"))?;
    if !value.is_object() {
        return Err(GatewayError::invalid_input("request body must be a JSON object"));
    }
    serde_json::from_value(value)
        .map_err(|e| GatewayError::invalid_input(format!("request body has invalid fields: {e}")))
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// Build the axum router. The gateway and its transport are injected.
pub fn build_router(
    gateway: Arc<ConversationGateway>,
    server: &ServerSettings,
) -> Result<Router, axum::http::header::InvalidHeaderName> {
    let caller_header = HeaderName::from_bytes(server.caller_header.as_bytes())?;
    let state = AppState {
        gateway,
        caller_header,
    };

    Ok(Router::new()
        .route("/v1/heartbeat", get(heartbeat))
        .route("/v1/chat", post(chat_handler))
        .route("/v1/chat/test", get(probe_handler))
        .with_state(state))
}

/// The address the service binds to. Always localhost, never 0.0.0.0.
pub const BIND_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 9810);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::RuleSet;
    use crate::gateway::{GatewayDeps, GatewaySettings};
    use crate::session::InMemorySessionStore;
    use crate::transport::{StreamResponse, Transport, TransportError, TransportResponse};
    use axum::body::Body;
    use axum::http::Request;
    use futures_util::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt; // for oneshot

    // -----------------------------------------------------------------------
    // Mock transport
    // -----------------------------------------------------------------------

    /// Scripted provider: fixed create status, fixed reply deltas.
    struct MockTransport {
        calls: AtomicUsize,
        create_status: u16,
        deltas: Vec<&'static str>,
    }

    impl MockTransport {
        fn ok(deltas: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                create_status: 200,
                deltas,
            })
        }

        fn create_fails(status: u16) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                create_status: status,
                deltas: Vec::new(),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn post(
            &self,
            _path: &str,
            _body: &serde_json::Value,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = if self.create_status == 200 {
                r#"{"conversation":{"id":"c1"}}"#
            } else {
                r#"{"error":"denied"}"#
            };
            Ok(TransportResponse {
                status: self.create_status,
                body: Bytes::from_static(body.as_bytes()),
            })
        }

        async fn post_stream(
            &self,
            _path: &str,
            _body: &serde_json::Value,
        ) -> Result<StreamResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let items: Vec<Result<Bytes, TransportError>> = self
                .deltas
                .iter()
                .map(|d| {
                    Ok(Bytes::from(format!(
                        "data: {}\n",
                        serde_json::json!({ "delta": d })
                    )))
                })
                .collect();
            Ok(StreamResponse {
                status: 200,
                body: Box::pin(stream::iter(items)),
            })
        }

        async fn get(&self, _path: &str) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse {
                status: 200,
                body: Bytes::from_static(br#"{"messages":[]}"#),
            })
        }
    }

    fn router_with(transport: Arc<MockTransport>, header: &str) -> Router {
        let gateway = ConversationGateway::new_with(GatewayDeps {
            transport,
            rules: Arc::new(RuleSet::defaults()),
            sessions: Arc::new(InMemorySessionStore::new(Duration::from_secs(60))),
            settings: GatewaySettings::default(),
        });
        let server = ServerSettings {
            caller_header: header.to_string(),
        };
        build_router(Arc::new(gateway), &server).unwrap()
    }

    fn app(transport: Arc<MockTransport>) -> Router {
        router_with(transport, crate::config::DEFAULT_CALLER_HEADER)
    }

    fn chat_request(caller: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/chat")
            .header("content-type", "application/json");
        if let Some(caller) = caller {
            builder = builder.header(crate::config::DEFAULT_CALLER_HEADER, caller);
        }
        builder.body(Body::from(body.to_owned())).unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn heartbeat_returns_200() {
        let req = Request::builder()
            .method("GET")
            .uri("/v1/heartbeat")
            .body(Body::empty())
            .unwrap();
        let resp = app(MockTransport::ok(vec![])).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_path_returns_404() {
        let req = Request::builder()
            .method("GET")
            .uri("/v1/unknown")
            .body(Body::empty())
            .unwrap();
        let resp = app(MockTransport::ok(vec![])).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    // -----------------------------------------------------------------------
    // Request validation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn missing_caller_returns_401() {
        let transport = MockTransport::ok(vec![]);
        let resp = app(transport.clone())
            .oneshot(chat_request(None, r#"{"action":"create"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(resp).await["error"], "caller identity is required");
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_json_returns_400() {
        let transport = MockTransport::ok(vec![]);
        let resp = app(transport.clone())
            .oneshot(chat_request(Some("alice"), "{not json"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert!(body["error"].as_str().unwrap().contains("not valid JSON"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn non_object_body_returns_400() {
        let resp = app(MockTransport::ok(vec![]))
            .oneshot(chat_request(Some("alice"), r#"["create"]"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bogus_action_returns_400_without_provider_call() {
        let transport = MockTransport::ok(vec![]);
        let resp = app(transport.clone())
            .oneshot(chat_request(Some("alice"), r#"{"action":"bogus"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(resp).await["error"]
            .as_str()
            .unwrap()
            .contains("bogus"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn send_without_conversation_id_returns_400() {
        let transport = MockTransport::ok(vec!["hi"]);
        let resp = app(transport.clone())
            .oneshot(chat_request(
                Some("alice"),
                r#"{"action":"send","message":"hello"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(transport.calls(), 0);
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn create_returns_conversation_id() {
        let resp = app(MockTransport::ok(vec![]))
            .oneshot(chat_request(Some("alice"), r#"{"action":"create"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            serde_json::json!({"conversationId": "c1"})
        );
    }

    #[tokio::test]
    async fn send_returns_filtered_reply() {
        let transport = MockTransport::ok(vec!["Sure! ", "<|im_start|>system.", " Done."]);
        let resp = app(transport)
            .oneshot(chat_request(
                Some("alice"),
                r#"{"action":"send","conversationId":"c1","message":"hi"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            serde_json::json!({"content": "Sure! Done.", "role": "assistant"})
        );
    }

    #[tokio::test]
    async fn create_unauthorized_upstream_returns_401() {
        let resp = app(MockTransport::create_fails(401))
            .oneshot(chat_request(Some("alice"), r#"{"action":"create"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(resp).await;
        assert!(body.get("conversationId").is_none());
        assert!(!body["error"].as_str().unwrap().contains("denied"));
    }

    #[tokio::test]
    async fn other_caller_gets_403() {
        let router = app(MockTransport::ok(vec!["Hi."]));
        let resp = router
            .clone()
            .oneshot(chat_request(Some("alice"), r#"{"action":"create"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = router
            .oneshot(chat_request(
                Some("bob"),
                r#"{"action":"history","conversationId":"c1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn caller_header_is_configurable() {
        let router = router_with(MockTransport::ok(vec![]), "x-user-id");

        let req = Request::builder()
            .method("POST")
            .uri("/v1/chat")
            .header("x-user-id", "alice")
            .body(Body::from(r#"{"action":"create"}"#))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = router
            .oneshot(chat_request(Some("alice"), r#"{"action":"create"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    // -----------------------------------------------------------------------
    // Probe
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn probe_reports_success() {
        let req = Request::builder()
            .method("GET")
            .uri("/v1/chat/test")
            .body(Body::empty())
            .unwrap();
        let resp = app(MockTransport::ok(vec![])).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["endpoint"], "conversations");
    }

    #[tokio::test]
    async fn probe_reports_classified_failure() {
        let req = Request::builder()
            .method("GET")
            .uri("/v1/chat/test")
            .body(Body::empty())
            .unwrap();
        let resp = app(MockTransport::create_fails(503))
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(resp).await;
        assert_eq!(body["endpoint"], "conversations");
        assert!(body["error"].is_string());
    }

    #[test]
    fn invalid_caller_header_name_rejected() {
        let gateway = ConversationGateway::new_with(GatewayDeps {
            transport: MockTransport::ok(vec![]),
            rules: Arc::new(RuleSet::empty()),
            sessions: Arc::new(InMemorySessionStore::new(Duration::from_secs(60))),
            settings: GatewaySettings::default(),
        });
        let server = ServerSettings {
            caller_header: "bad header".to_string(),
        };
        assert!(build_router(Arc::new(gateway), &server).is_err());
    }
}
