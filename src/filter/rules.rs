// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use regex::Regex;

use crate::config::{compute_hash, default_leak_rules};

/// What a rule guards against. Only leak markers exist today; the scope is
/// part of the rule table hash so adding kinds later changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    LeakMarker,
}

impl RuleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleScope::LeakMarker => "leak_marker",
        }
    }
}

/// A compiled leak-marker rule. Keeps the source pattern for hashing and
/// display.
#[derive(Clone)]
pub struct FilterRule {
    pub id: String,
    pub pattern: String,
    pub scope: RuleScope,
    regex: Regex,
}

impl FilterRule {
    pub fn new(id: impl Into<String>, pattern: &str, scope: RuleScope) -> Result<Self, regex::Error> {
        Ok(Self {
            id: id.into(),
            pattern: pattern.to_string(),
            scope,
            regex: Regex::new(pattern)?,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl fmt::Debug for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRule")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("scope", &self.scope)
            .finish()
    }
}

/// The versioned rule table. Built once at startup and shared read-only
/// between every `send` call.
#[derive(Debug, Clone)]
pub struct RuleSet {
    version: String,
    rules: Vec<FilterRule>,
    hash: String,
}

impl RuleSet {
    pub fn new(version: impl Into<String>, rules: Vec<FilterRule>) -> Self {
        let version = version.into();
        let hash = compute_hash(&version, &rules);
        Self {
            version,
            rules,
            hash,
        }
    }

    /// The embedded default rules alone.
    pub fn defaults() -> Self {
        let defaults = default_leak_rules();
        Self::new(defaults.version, defaults.rules)
    }

    /// A table with no rules: every span passes.
    pub fn empty() -> Self {
        Self::new("empty", Vec::new())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// "sha256:{hex}" over version and rules.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule (in table order) that matches anywhere in `text`.
    pub fn first_match(&self, text: &str) -> Option<&FilterRule> {
        self.rules.iter().find(|rule| rule.is_match(text))
    }
}
