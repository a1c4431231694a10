// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

use crate::filter::FilterRule;

use super::loader::build_rules;
use super::raw::RawRuleFile;

/// The default leak-marker rules YAML, embedded at compile time.
const DEFAULT_LEAK_RULES_YAML: &str = include_str!("../../schema/default_leak_rules.yaml");

/// The embedded rule table: its curation label plus compiled rules.
pub struct DefaultRules {
    pub version: String,
    pub rules: Vec<FilterRule>,
}

/// Parse and compile the embedded default leak rules.
/// Called once at startup. Panics on invalid regex (these are our own rules).
pub fn default_leak_rules() -> DefaultRules {
    let raw: RawRuleFile = serde_yaml::from_str(DEFAULT_LEAK_RULES_YAML)
        .expect("default leak rules YAML is invalid");

    let rules = build_rules(raw.rules, "default")
        .unwrap_or_else(|e| panic!("default leak rule failed to compile: {e}"));

    DefaultRules {
        version: raw.version,
        rules,
    }
}
