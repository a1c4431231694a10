// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::filter::RuleSet;

/// Provider base URL used when the config does not override it.
pub const DEFAULT_BASE_URL: &str = "https://www.playlab.ai/api/v1";

/// Header carrying the verified caller identity set by the auth front end.
pub const DEFAULT_CALLER_HEADER: &str = "x-chatgate-caller";

pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Parsed and validated chatgate config.
#[derive(Debug)]
pub struct Config {
    /// Config format version. Always "v1".
    pub version: String,
    pub provider: ProviderSettings,
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub stream: StreamSettings,
    /// Compiled, versioned leak-marker rule table.
    pub rules: Arc<RuleSet>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Upstream provider connection settings.
///
/// `project_id` and `api_key` stay `None` when the config leaves them out or
/// references an unset variable; the transport then refuses every call.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub project_id: Option<String>,
    pub api_key: Option<Secret>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// JSON body sent with every conversation-creation request.
    pub create_metadata: serde_json::Value,
}

impl ProviderSettings {
    /// Settings with the given credentials and every other field defaulted.
    pub fn new(project_id: Option<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id,
            api_key: api_key.map(Secret::new),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            create_metadata: default_create_metadata(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Creation body that asks the provider to skip its welcome and system
/// banner messages, so a fresh conversation starts with an empty transcript.
pub fn default_create_metadata() -> serde_json::Value {
    serde_json::json!({
        "metadata": {
            "suppress_welcome": true,
            "suppress_system_banner": true
        }
    })
}

/// A credential whose `Debug` output never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

// ---------------------------------------------------------------------------
// Server / session / stream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Lowercased header name holding the verified caller identity.
    pub caller_header: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            caller_header: DEFAULT_CALLER_HEADER.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Local bookkeeping for a conversation is forgotten after this idle time.
    pub ttl: Duration,
    /// How often the service sweeps expired sessions.
    pub sweep_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Bound of the decoder-to-filter channel.
    pub channel_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}
