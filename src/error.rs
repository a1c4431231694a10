// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

// Gateway error taxonomy and classifier
//
// Every failure that reaches a caller is a `GatewayError`. Component errors
// (transport, decode, stream) are folded in here; the original detail rides
// along as `source()` and never appears in the public message.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::stream::{DecodeError, StreamError};
use crate::transport::TransportError;

/// Upstream error bodies kept for diagnostics are cut to this many bytes.
pub const MAX_CAUSE_BODY_BYTES: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidAction,
    InvalidInput,
    Configuration,
    Auth,
    Permission,
    ProviderProtocol,
    Unavailable,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::InvalidAction | ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::Permission => StatusCode::FORBIDDEN,
            ErrorKind::Configuration | ErrorKind::ProviderProtocol | ErrorKind::Unavailable => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAction => "invalid_action",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Auth => "auth",
            ErrorKind::Permission => "permission",
            ErrorKind::ProviderProtocol => "provider_protocol",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic detail behind a `GatewayError`.
#[derive(Debug, thiserror::Error)]
pub enum Cause {
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("unexpected provider payload: {0}")]
    Payload(String),
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub cause: Option<Cause>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn invalid_action(action: Option<&str>) -> Self {
        let message = match action {
            Some(a) => format!("invalid action: {a:?}"),
            None => "invalid action: missing".to_string(),
        };
        Self::new(ErrorKind::InvalidAction, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    /// A provider response that does not have the expected shape.
    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProviderProtocol, "unexpected response from provider")
            .with_cause(Cause::Payload(detail.into()))
    }

    /// Classify a non-success provider status. `body` is kept, truncated,
    /// as the cause.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let kind = classify_status(status);
        let message = match kind {
            ErrorKind::Auth => "provider rejected the credentials",
            ErrorKind::Permission => "provider denied access to this resource",
            ErrorKind::Unavailable => "provider is unavailable",
            _ => "unexpected response from provider",
        };
        Self::new(kind, message).with_cause(Cause::Status {
            status,
            body: truncate_body(body),
        })
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Map a non-success provider status onto the error taxonomy.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        401 => ErrorKind::Auth,
        403 => ErrorKind::Permission,
        404 => ErrorKind::ProviderProtocol,
        408 | 429 | 500..=599 => ErrorKind::Unavailable,
        _ => ErrorKind::ProviderProtocol,
    }
}

fn truncate_body(body: &[u8]) -> String {
    let cut = body.len().min(MAX_CAUSE_BODY_BYTES);
    String::from_utf8_lossy(&body[..cut]).into_owned()
}

impl From<TransportError> for GatewayError {
    fn from(e: TransportError) -> Self {
        let (kind, message) = match &e {
            TransportError::Configuration(_) => {
                (ErrorKind::Configuration, "provider connection is not configured")
            }
            TransportError::Network(_) | TransportError::Timeout(_) | TransportError::Body(_) => {
                (ErrorKind::Unavailable, "provider is unavailable")
            }
        };
        Self::new(kind, message).with_cause(Cause::Transport(e))
    }
}

impl From<DecodeError> for GatewayError {
    fn from(e: DecodeError) -> Self {
        Self::new(ErrorKind::ProviderProtocol, "malformed response stream from provider")
            .with_cause(Cause::Decode(e))
    }
}

impl From<StreamError> for GatewayError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Transport(t) => t.into(),
            StreamError::Decode(d) => d.into(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        match &self.cause {
            Some(cause) => tracing::warn!(kind = %self.kind, cause = %cause, "request failed"),
            None => tracing::warn!(kind = %self.kind, error = %self.message, "request failed"),
        }
        (status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}
