// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

// Raw YAML deserialization types (internal)
// These are separate from the public Config structs because:
// 1. the public types hold compiled regexes and redacted secrets
// 2. variable interpolation and defaults are applied between raw and public

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub chatgate: String,
    pub provider: Option<RawProvider>,
    pub server: Option<RawServer>,
    pub session: Option<RawSession>,
    pub stream: Option<RawStream>,
    pub filter: Option<RawFilter>,
}

#[derive(Debug, Deserialize)]
pub struct RawProvider {
    pub base_url: Option<String>,
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    pub timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub create_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct RawServer {
    pub caller_header: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawSession {
    pub ttl_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RawStream {
    pub channel_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RawFilter {
    pub version: Option<String>,
    /// If false, skip the embedded default leak rules. Default: true.
    pub use_default_rules: Option<bool>,
    #[serde(default)]
    pub rules: Vec<RawRule>,
}

/// A filter rule is either a bare regex string or a full mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawRule {
    Simple(String),
    Full {
        id: Option<String>,
        pattern: String,
        scope: Option<String>,
    },
}

/// Shape of the embedded default rule file.
#[derive(Debug, Deserialize)]
pub struct RawRuleFile {
    pub version: String,
    pub rules: Vec<RawRule>,
}
