// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

// Config loader and validator
//
// Loads chatgate.yaml, validates structure, resolves variable interpolation,
// compiles leak-marker rules, and computes a deterministic rule-table hash.

mod defaults;
mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use defaults::{default_leak_rules, DefaultRules};
pub use error::ConfigError;
pub use interpolation::{process_env, resolve_optional, resolve_variables, EnvLookup};
pub use loader::{compute_hash, load_config, load_config_with_env};
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::*;
