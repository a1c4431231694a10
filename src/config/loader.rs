// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::filter::{FilterRule, RuleScope, RuleSet};

use super::defaults::default_leak_rules;
use super::error::ConfigError;
use super::interpolation::{process_env, resolve_optional, resolve_variables, EnvLookup};
use super::raw;
use super::source::ConfigSource;
use super::types::*;

/// Load and validate a chatgate config, resolving `${VAR}` from the process
/// environment.
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    load_config_with_env(source, &process_env)
}

/// Load and validate a chatgate config with an explicit variable lookup.
///
/// Steps:
/// 1. Read raw YAML from source
/// 2. Parse into raw deserialization types
/// 3. Validate version and value ranges
/// 4. Resolve variable interpolation (credentials tolerate missing variables)
/// 5. Compile filter rules, defaults first, then user rules
/// 6. Hash the rule table
pub fn load_config_with_env(
    source: &dyn ConfigSource,
    env: EnvLookup<'_>,
) -> Result<Config, ConfigError> {
    let raw_yaml = source.load()?;
    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.chatgate != "v1" {
        return Err(ConfigError::Validation(format!(
            "unsupported config version \"{}\", expected \"v1\"",
            raw.chatgate
        )));
    }

    let provider = build_provider(raw.provider, env)?;
    let server = build_server(raw.server)?;
    let session = build_session(raw.session)?;
    let stream = build_stream(raw.stream)?;
    let rules = build_rule_set(raw.filter)?;

    Ok(Config {
        version: raw.chatgate,
        provider,
        server,
        session,
        stream,
        rules: Arc::new(rules),
    })
}

/// Deterministic hash of a rule table: "sha256:{hex}".
///
/// Covers the version label and every rule's id, scope and pattern in order,
/// so two deployments report the same hash exactly when they filter alike.
pub fn compute_hash(version: &str, rules: &[FilterRule]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(version.as_bytes());
    for rule in rules {
        hasher.update(b"\n");
        hasher.update(rule.id.as_bytes());
        hasher.update(b"\t");
        hasher.update(rule.scope.as_str().as_bytes());
        hasher.update(b"\t");
        hasher.update(rule.pattern.as_bytes());
    }
    format!("sha256:{:x}", hasher.finalize())
}

fn build_provider(
    raw: Option<raw::RawProvider>,
    env: EnvLookup<'_>,
) -> Result<ProviderSettings, ConfigError> {
    let Some(raw) = raw else {
        return Ok(ProviderSettings::new(None, None));
    };

    let base_url = match raw.base_url.as_deref() {
        Some(url) => resolve_variables(url, env)?,
        None => DEFAULT_BASE_URL.to_string(),
    };
    let base_url = base_url.trim_end_matches('/').to_string();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "provider.base_url must be an http(s) URL, got \"{base_url}\""
        )));
    }

    let project_id = resolve_optional(raw.project_id.as_deref(), env)?;
    if let Some(id) = &project_id {
        if id.contains('/') || id.contains('?') || id.contains('#') {
            return Err(ConfigError::Validation(
                "provider.project_id must not contain '/', '?' or '#'".to_string(),
            ));
        }
    }
    let api_key = resolve_optional(raw.api_key.as_deref(), env)?.map(Secret::new);

    let timeout = positive_millis("provider.timeout_ms", raw.timeout_ms, DEFAULT_TIMEOUT_MS)?;
    let connect_timeout = positive_millis(
        "provider.connect_timeout_ms",
        raw.connect_timeout_ms,
        DEFAULT_CONNECT_TIMEOUT_MS,
    )?;

    let create_metadata = match raw.create_metadata {
        Some(value) if value.is_object() => value,
        Some(_) => {
            return Err(ConfigError::Validation(
                "provider.create_metadata must be a mapping".to_string(),
            ));
        }
        None => default_create_metadata(),
    };

    Ok(ProviderSettings {
        base_url,
        project_id,
        api_key,
        timeout,
        connect_timeout,
        create_metadata,
    })
}

fn positive_millis(field: &str, value: Option<u64>, default: u64) -> Result<Duration, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::Validation(format!("{field} must be greater than 0"))),
        Some(ms) => Ok(Duration::from_millis(ms)),
        None => Ok(Duration::from_millis(default)),
    }
}

fn build_server(raw: Option<raw::RawServer>) -> Result<ServerSettings, ConfigError> {
    let Some(header) = raw.and_then(|s| s.caller_header) else {
        return Ok(ServerSettings::default());
    };

    let header = header.trim().to_ascii_lowercase();
    let valid = !header.is_empty()
        && header
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !valid {
        return Err(ConfigError::Validation(format!(
            "server.caller_header \"{header}\" is not a valid header name"
        )));
    }

    Ok(ServerSettings {
        caller_header: header,
    })
}

fn build_session(raw: Option<raw::RawSession>) -> Result<SessionSettings, ConfigError> {
    let Some(raw) = raw else {
        return Ok(SessionSettings::default());
    };
    let defaults = SessionSettings::default();

    let ttl = match raw.ttl_secs {
        Some(0) => {
            return Err(ConfigError::Validation(
                "session.ttl_secs must be greater than 0".to_string(),
            ))
        }
        Some(secs) => Duration::from_secs(secs),
        None => defaults.ttl,
    };
    let sweep_interval = match raw.sweep_interval_secs {
        Some(0) => {
            return Err(ConfigError::Validation(
                "session.sweep_interval_secs must be greater than 0".to_string(),
            ))
        }
        Some(secs) => Duration::from_secs(secs),
        None => defaults.sweep_interval,
    };

    Ok(SessionSettings {
        ttl,
        sweep_interval,
    })
}

fn build_stream(raw: Option<raw::RawStream>) -> Result<StreamSettings, ConfigError> {
    match raw.and_then(|s| s.channel_capacity) {
        Some(0) => Err(ConfigError::Validation(
            "stream.channel_capacity must be greater than 0".to_string(),
        )),
        Some(capacity) => Ok(StreamSettings {
            channel_capacity: capacity,
        }),
        None => Ok(StreamSettings::default()),
    }
}

fn build_rule_set(raw: Option<raw::RawFilter>) -> Result<RuleSet, ConfigError> {
    let (version, use_defaults, user_rules) = match raw {
        Some(f) => (f.version, f.use_default_rules != Some(false), f.rules),
        None => (None, true, Vec::new()),
    };

    let mut rules = Vec::new();
    let mut default_version = None;
    if use_defaults {
        let defaults = default_leak_rules();
        default_version = Some(defaults.version);
        rules.extend(defaults.rules);
    }
    rules.extend(build_rules(user_rules, "custom")?);

    let mut seen = std::collections::HashSet::new();
    for rule in &rules {
        if !seen.insert(rule.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate filter rule id \"{}\"",
                rule.id
            )));
        }
    }

    let version = version
        .or(default_version)
        .unwrap_or_else(|| "unversioned".to_string());

    Ok(RuleSet::new(version, rules))
}

/// Compile raw rules. Bare strings get ids `{prefix}-{n}` (1-based).
pub(super) fn build_rules(
    raw: Vec<raw::RawRule>,
    prefix: &str,
) -> Result<Vec<FilterRule>, ConfigError> {
    raw.into_iter()
        .enumerate()
        .map(|(i, rule)| {
            let (id, pattern, scope) = match rule {
                raw::RawRule::Simple(pattern) => (None, pattern, None),
                raw::RawRule::Full { id, pattern, scope } => (id, pattern, scope),
            };
            let id = id.unwrap_or_else(|| format!("{prefix}-{}", i + 1));
            let scope = match scope.as_deref() {
                None | Some("leak_marker") => RuleScope::LeakMarker,
                Some(other) => {
                    return Err(ConfigError::Validation(format!(
                        "unknown scope \"{other}\" on filter rule \"{id}\", expected \"leak_marker\""
                    )));
                }
            };
            if pattern.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "filter rule \"{id}\" has an empty pattern"
                )));
            }
            FilterRule::new(id.clone(), &pattern, scope).map_err(|source| {
                ConfigError::InvalidRule {
                    id,
                    pattern,
                    source,
                }
            })
        })
        .collect()
}
