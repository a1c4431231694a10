// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

// Provider transport
//
// Authenticated, project-scoped HTTP access to the provider. Paths are
// relative to `{base_url}/projects/{project_id}/`. The transport knows
// nothing about conversations; it moves bytes and reports status codes.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{Stream, TryStreamExt};

use crate::config::{ProviderSettings, Secret};

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// Raw streaming response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Sends authenticated requests to the provider project.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON body and buffer the full response.
    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError>;

    /// POST a JSON body and hand back the response body as a byte stream.
    async fn post_stream(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<StreamResponse, TransportError>;

    /// GET and buffer the full response.
    async fn get(&self, path: &str) -> Result<TransportResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct StreamResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl StreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drain the body. Used for error responses, whose bodies are small.
    pub async fn collect(self) -> Result<Bytes, TransportError> {
        let chunks: Vec<Bytes> = self.body.try_collect().await?;
        Ok(Bytes::from(chunks.concat()))
    }
}

impl fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("provider transport not configured: {0}")]
    Configuration(String),
    #[error("provider request failed: {0}")]
    Network(String),
    #[error("provider request timed out: {0}")]
    Timeout(String),
    #[error("provider response body failed: {0}")]
    Body(String),
}

impl TransportError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Reqwest transport
// ---------------------------------------------------------------------------

struct Credentials {
    project_url: String,
    api_key: Secret,
}

/// Production transport over a shared `reqwest::Client`.
///
/// Built once at startup and shared by reference. When the project id or
/// credential is missing it still builds, logs one warning, and fails every
/// call with `TransportError::Configuration`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl ReqwestTransport {
    pub fn new(settings: &ProviderSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| TransportError::Configuration(e.to_string()))?;
        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: reqwest::Client, settings: &ProviderSettings) -> Self {
        let credentials = match (&settings.project_id, &settings.api_key) {
            (Some(project), Some(key)) => Some(Credentials {
                project_url: format!(
                    "{}/projects/{}",
                    settings.base_url.trim_end_matches('/'),
                    project
                ),
                api_key: key.clone(),
            }),
            _ => {
                tracing::warn!(
                    has_project_id = settings.project_id.is_some(),
                    has_api_key = settings.api_key.is_some(),
                    "provider credentials missing; every provider call will fail"
                );
                None
            }
        };
        Self {
            client,
            credentials,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let creds = self.credentials.as_ref().ok_or_else(|| {
            TransportError::Configuration("provider project id or api key is not set".to_string())
        })?;

        tracing::debug!(
            method = %method,
            path = %path,
            has_body = body.is_some(),
            "provider request"
        );

        let url = format!("{}/{}", creds.project_url, path.trim_start_matches('/'));
        let mut req = self
            .client
            .request(method, url)
            .bearer_auth(creds.api_key.expose());
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req)
    }

    async fn buffered(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<TransportResponse, TransportError> {
        let resp = req.send().await.map_err(TransportError::from_reqwest)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(TransportError::from_reqwest)?;
        Ok(TransportResponse { status, body })
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field(
                "project_url",
                &self.credentials.as_ref().map(|c| c.project_url.as_str()),
            )
            .field("api_key", &self.credentials.as_ref().map(|c| &c.api_key))
            .finish()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        let req = self.request(reqwest::Method::POST, path, Some(body))?;
        self.buffered(req).await
    }

    async fn post_stream(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<StreamResponse, TransportError> {
        let req = self
            .request(reqwest::Method::POST, path, Some(body))?
            .header(reqwest::header::ACCEPT, "text/event-stream");
        let resp = req.send().await.map_err(TransportError::from_reqwest)?;
        let status = resp.status().as_u16();
        let body = resp.bytes_stream().map_err(TransportError::from_reqwest);
        Ok(StreamResponse {
            status,
            body: Box::pin(body),
        })
    }

    async fn get(&self, path: &str) -> Result<TransportResponse, TransportError> {
        let req = self.request(reqwest::Method::GET, path, None)?;
        self.buffered(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn unconfigured_transport_fails_fast() {
        let transport = ReqwestTransport::with_client(
            reqwest::Client::new(),
            &ProviderSettings::new(None, Some("key".to_string())),
        );
        assert!(!transport.is_configured());

        let err = transport
            .post("conversations", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Configuration(_)));

        let err = transport.get("conversations/abc/messages").await.unwrap_err();
        assert!(matches!(err, TransportError::Configuration(_)));
    }

    #[test]
    fn missing_key_leaves_transport_unconfigured() {
        let transport = ReqwestTransport::with_client(
            reqwest::Client::new(),
            &ProviderSettings::new(Some("proj".to_string()), None),
        );
        assert!(!transport.is_configured());
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let settings = ProviderSettings::new(
            Some("proj-1".to_string()),
            Some("sk-very-secret".to_string()),
        )
        .with_base_url("https://provider.test/api/v1/");
        let transport = ReqwestTransport::with_client(reqwest::Client::new(), &settings);
        let debug = format!("{transport:?}");
        assert!(debug.contains("https://provider.test/api/v1/projects/proj-1"));
        assert!(!debug.contains("sk-very-secret"));
    }

    #[tokio::test]
    async fn stream_response_collects_chunks() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"{\"error\":")),
            Ok(Bytes::from_static(b"\"nope\"}")),
        ]);
        let resp = StreamResponse {
            status: 401,
            body: Box::pin(body),
        };
        assert!(!resp.is_success());
        assert_eq!(resp.collect().await.unwrap(), &b"{\"error\":\"nope\"}"[..]);
    }

    #[tokio::test]
    async fn stream_response_collect_surfaces_body_error() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(TransportError::Body("reset".to_string())),
        ]);
        let resp = StreamResponse {
            status: 500,
            body: Box::pin(body),
        };
        assert_eq!(
            resp.collect().await.unwrap_err(),
            TransportError::Body("reset".to_string())
        );
    }
}
