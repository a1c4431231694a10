// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

use super::error::ConfigError;

/// Lookup used to resolve `${VAR}` references. The binaries pass the process
/// environment; tests pass a fixed map.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Process-environment lookup.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Replace every `${VAR}` in `input` with the looked-up value.
///
/// Returns `ConfigError::UndefinedVariable` for the first reference the
/// lookup cannot satisfy. An unterminated `${` or an empty `${}` is copied
/// through literally.
pub fn resolve_variables(input: &str, env: EnvLookup<'_>) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(0) | None => {
                out.push_str("${");
                rest = after;
            }
            Some(end) => {
                let name = &after[..end];
                let value = env(name).ok_or_else(|| ConfigError::UndefinedVariable {
                    name: name.to_string(),
                })?;
                out.push_str(&value);
                rest = &after[end + 1..];
            }
        }
    }
    out.push_str(rest);

    Ok(out)
}

/// Like [`resolve_variables`], but an undefined variable or a value that
/// resolves to blank text yields `None` instead of an error.
///
/// Used for the provider project id and credential: their absence must not
/// stop the process from starting, only every outbound call.
pub fn resolve_optional(
    input: Option<&str>,
    env: EnvLookup<'_>,
) -> Result<Option<String>, ConfigError> {
    let Some(input) = input else {
        return Ok(None);
    };
    match resolve_variables(input, env) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::UndefinedVariable { name }) => {
            tracing::warn!(variable = %name, "config variable not set; treating value as absent");
            Ok(None)
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn substitutes_defined_variables() {
        let env = lookup(&[("HOST", "example.org"), ("PORT", "8443")]);
        let out = resolve_variables("https://${HOST}:${PORT}/v1", &env).unwrap();
        assert_eq!(out, "https://example.org:8443/v1");
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let env = lookup(&[]);
        let err = resolve_variables("${MISSING}", &env).unwrap_err();
        assert!(matches!(err, ConfigError::UndefinedVariable { ref name } if name == "MISSING"));
    }

    #[test]
    fn malformed_references_are_literal() {
        let env = lookup(&[]);
        assert_eq!(resolve_variables("cost: ${", &env).unwrap(), "cost: ${");
        assert_eq!(resolve_variables("a ${} b", &env).unwrap(), "a ${} b");
    }

    #[test]
    fn optional_resolution_tolerates_missing_and_blank() {
        let env = lookup(&[("BLANK", "  ")]);
        assert_eq!(resolve_optional(Some("${NOPE}"), &env).unwrap(), None);
        assert_eq!(resolve_optional(Some("${BLANK}"), &env).unwrap(), None);
        assert_eq!(resolve_optional(None, &env).unwrap(), None);
        assert_eq!(
            resolve_optional(Some("literal"), &env).unwrap(),
            Some("literal".to_string())
        );
    }
}
