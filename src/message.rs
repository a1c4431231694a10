// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

// Conversation message types
//
// Shared by the stream decoder (role hints on records), the gateway
// (send results, history mapping) and the HTTP surface (response bodies).

use std::fmt;

use serde::{Deserialize, Serialize};

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Map a provider role label. Anything unrecognized, or no label at all,
    /// is treated as assistant output.
    pub fn from_provider(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            Some(l) if l.eq_ignore_ascii_case("user") => Role::User,
            Some(l) if l.eq_ignore_ascii_case("system") => Role::System,
            _ => Role::Assistant,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversation turn as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Verified caller identity, as asserted by the auth front end.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerId(String);

impl CallerId {
    /// Returns `None` for a blank identity.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short, log-safe prefix of a conversation id.
pub fn id_prefix(id: &str) -> &str {
    match id.char_indices().nth(6) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
