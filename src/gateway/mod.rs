// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

// Conversation gateway
//
// Wires the provider transport, stream decoder, leak filter and session
// store into the three caller-facing operations:
// - create: open a provider conversation and record its owner
// - send: stream one reply, filter it, return it whole
// - history: fetch and map the transcript, filtered the same way
//
// Only `GatewayError` leaves this module.

mod dispatch;

pub use dispatch::{Action, ActionRequest, ActionResponse};

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;

use crate::config::Config;
use crate::error::GatewayError;
use crate::filter::{filter_text, ContentFilter, RuleSet};
use crate::message::{id_prefix, CallerId, Message, Role};
use crate::session::{InMemorySessionStore, SessionState, SessionStore};
use crate::stream::decode_stream;
use crate::transport::{ReqwestTransport, Transport, TransportError};

const CONVERSATIONS_PATH: &str = "conversations";

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

/// Per-deployment knobs the gateway needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Body of every conversation-creation request.
    pub create_metadata: serde_json::Value,
    /// Bound of the decoder channel for each `send`.
    pub channel_capacity: usize,
}

impl GatewaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            create_metadata: config.provider.create_metadata.clone(),
            channel_capacity: config.stream.channel_capacity,
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            create_metadata: crate::config::default_create_metadata(),
            channel_capacity: crate::config::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

pub struct GatewayDeps {
    pub transport: Arc<dyn Transport>,
    pub rules: Arc<RuleSet>,
    pub sessions: Arc<dyn SessionStore>,
    pub settings: GatewaySettings,
}

// ---------------------------------------------------------------------------
// ConversationGateway
// ---------------------------------------------------------------------------

pub struct ConversationGateway {
    deps: GatewayDeps,
}

impl ConversationGateway {
    pub fn new_with(deps: GatewayDeps) -> Self {
        Self { deps }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.deps.sessions
    }

    /// Open a new provider conversation owned by `caller`.
    pub async fn create(&self, caller: &CallerId) -> Result<String, GatewayError> {
        let conversation_id = self.open_conversation().await?;
        self.deps
            .sessions
            .update(SessionState::new(conversation_id.clone(), caller.clone()));
        tracing::info!(
            conversation = %id_prefix(&conversation_id),
            "conversation created"
        );
        Ok(conversation_id)
    }

    /// Send one user message and return the complete filtered reply.
    ///
    /// All-or-nothing: if the stream fails part way, nothing already
    /// received is returned.
    pub async fn send(
        &self,
        caller: &CallerId,
        conversation_id: &str,
        message: &str,
    ) -> Result<Message, GatewayError> {
        validate_conversation_id(conversation_id)?;
        if message.trim().is_empty() {
            return Err(GatewayError::invalid_input("message must not be empty"));
        }
        self.authorize(caller, conversation_id)?;

        let started = Instant::now();
        let path = messages_path(conversation_id);
        let body = serde_json::json!({ "input": { "message": message } });
        let response = self.deps.transport.post_stream(&path, &body).await?;

        if !response.is_success() {
            let status = response.status;
            let body = response.collect().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, &body));
        }

        let mut chunks = decode_stream(response.body, self.deps.settings.channel_capacity);
        let mut filter = ContentFilter::new(self.deps.rules.clone());
        let mut role = None;
        let mut deltas = 0usize;

        while let Some(item) = chunks.next().await {
            let chunk = item?;
            if role.is_none() {
                role = chunk.role;
            }
            if let Some(delta) = chunk.delta {
                deltas += 1;
                filter.push(&delta);
            }
        }

        let elided = filter.elided();
        let content = filter.finish();
        self.deps.sessions.record_turn(conversation_id);

        tracing::info!(
            conversation = %id_prefix(conversation_id),
            deltas,
            elided,
            latency_ms = started.elapsed().as_millis() as u64,
            "reply streamed"
        );

        Ok(Message::new(role.unwrap_or(Role::Assistant), content))
    }

    /// Fetch the transcript, oldest first.
    pub async fn history(
        &self,
        caller: &CallerId,
        conversation_id: &str,
    ) -> Result<Vec<Message>, GatewayError> {
        validate_conversation_id(conversation_id)?;
        self.authorize(caller, conversation_id)?;

        let response = self
            .deps
            .transport
            .get(&messages_path(conversation_id))
            .await?;
        if !response.is_success() {
            return Err(GatewayError::from_status(response.status, &response.body));
        }

        let messages = parse_history(&response.body, &self.deps.rules)?;
        tracing::info!(
            conversation = %id_prefix(conversation_id),
            messages = messages.len(),
            "history fetched"
        );
        Ok(messages)
    }

    /// Check that the provider accepts our credentials by creating a
    /// throwaway conversation. Nothing is recorded locally.
    pub async fn probe(&self) -> Result<(), GatewayError> {
        let conversation_id = self.open_conversation().await?;
        tracing::info!(
            conversation = %id_prefix(&conversation_id),
            "provider probe succeeded"
        );
        Ok(())
    }

    async fn open_conversation(&self) -> Result<String, GatewayError> {
        let response = self
            .deps
            .transport
            .post(CONVERSATIONS_PATH, &self.deps.settings.create_metadata)
            .await?;
        if !response.is_success() {
            return Err(GatewayError::from_status(response.status, &response.body));
        }
        extract_conversation_id(&response.body)
    }

    fn authorize(&self, caller: &CallerId, conversation_id: &str) -> Result<(), GatewayError> {
        self.deps
            .sessions
            .claim(conversation_id, caller)
            .map(|_| ())
            .map_err(|_| GatewayError::permission("conversation belongs to another caller"))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn messages_path(conversation_id: &str) -> String {
    format!("{CONVERSATIONS_PATH}/{conversation_id}/messages")
}

/// Reject ids that could change the shape of the upstream URL.
pub fn validate_conversation_id(id: &str) -> Result<(), GatewayError> {
    if id.is_empty() {
        return Err(GatewayError::invalid_input("conversationId must not be empty"));
    }
    if id == "." || id == ".." {
        return Err(GatewayError::invalid_input("conversationId is not valid"));
    }
    let bad = id.chars().any(|c| {
        matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control()
    });
    if bad {
        return Err(GatewayError::invalid_input("conversationId is not valid"));
    }
    Ok(())
}

fn extract_conversation_id(body: &[u8]) -> Result<String, GatewayError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| GatewayError::protocol(format!("create response is not JSON: {e}")))?;
    value
        .get("conversation")
        .and_then(|c| c.get("id"))
        .and_then(|id| id.as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::protocol("create response lacks conversation.id"))
}

fn parse_history(body: &[u8], rules: &Arc<RuleSet>) -> Result<Vec<Message>, GatewayError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| GatewayError::protocol(format!("history response is not JSON: {e}")))?;
    let entries = value
        .get("messages")
        .and_then(|m| m.as_array())
        .ok_or_else(|| GatewayError::protocol("history response lacks a messages array"))?;

    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let record = entry.as_object().ok_or_else(|| {
                GatewayError::protocol(format!("history entry {idx} is not an object"))
            })?;
            let role = Role::from_provider(record.get("role").and_then(|r| r.as_str()));
            let content = match record.get("content") {
                None | Some(serde_json::Value::Null) => String::new(),
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(_) => {
                    return Err(GatewayError::protocol(format!(
                        "history entry {idx} has non-text content"
                    )))
                }
            };
            let content = match role {
                Role::User => content,
                Role::Assistant | Role::System => filter_text(rules.clone(), &content),
            };
            Ok(Message::new(role, content))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Public factory
// ---------------------------------------------------------------------------

/// Build the production gateway from a loaded config.
pub fn build_gateway(config: &Config) -> Result<ConversationGateway, TransportError> {
    let transport = ReqwestTransport::new(&config.provider)?;
    let deps = GatewayDeps {
        transport: Arc::new(transport),
        rules: config.rules.clone(),
        sessions: Arc::new(InMemorySessionStore::new(config.session.ttl)),
        settings: GatewaySettings::from_config(config),
    };
    Ok(ConversationGateway::new_with(deps))
}
