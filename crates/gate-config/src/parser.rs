//! Preference parser with environment variable substitution

use crate::{ConfigError, GatePreferences, MAX_BOOTSTRAP_BUDGET_MS, Result, SUPPORTED_VERSION};
use regex::Regex;
use std::path::Path;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Parse a YAML preference file
pub fn parse_file(path: impl AsRef<Path>) -> Result<GatePreferences> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse YAML preferences from a string
///
/// String values have `${VAR}` and `${VAR:-default}` substituted before
/// validation.
pub fn parse_str(content: &str) -> Result<GatePreferences> {
    let mut prefs: GatePreferences = serde_yaml::from_str(content)?;
    substitute_fields(&mut prefs)?;
    validate_preferences(&prefs)?;
    Ok(prefs)
}

fn substitute_fields(prefs: &mut GatePreferences) -> Result<()> {
    prefs.data_dir = substitute_env_vars(&prefs.data_dir)?;
    prefs.target_addr = substitute_env_vars(&prefs.target_addr)?;
    prefs.tor_binary = substitute_env_vars(&prefs.tor_binary)?;
    if let Some(level) = prefs.settings.log_level.as_mut() {
        *level = substitute_env_vars(level)?;
    }
    Ok(())
}

/// Validate preferences
pub fn validate_preferences(prefs: &GatePreferences) -> Result<()> {
    // Check version
    if prefs.version != SUPPORTED_VERSION {
        return Err(ConfigError::ValidationError(format!(
            "Unsupported version: {}, expected {}",
            prefs.version, SUPPORTED_VERSION
        )));
    }

    if prefs.data_dir.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "data_dir must not be empty".to_string(),
        ));
    }

    for (name, port) in [
        ("socks_port", prefs.socks_port),
        ("virtual_port", prefs.virtual_port),
        ("target_port", prefs.target_port),
    ] {
        if port == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between 1 and 65535",
                name
            )));
        }
    }

    if prefs.target_addr.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "target_addr must not be empty".to_string(),
        ));
    }

    if prefs.bootstrap.poll_interval_ms == 0 || prefs.bootstrap.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "bootstrap.poll_interval_ms and bootstrap.max_attempts must be positive".to_string(),
        ));
    }

    let budget_ms = prefs
        .bootstrap
        .poll_interval_ms
        .checked_mul(u64::from(prefs.bootstrap.max_attempts));
    if budget_ms.is_none_or(|ms| ms > MAX_BOOTSTRAP_BUDGET_MS) {
        return Err(ConfigError::ValidationError(format!(
            "bootstrap budget (poll_interval_ms x max_attempts) must not exceed {} ms",
            MAX_BOOTSTRAP_BUDGET_MS
        )));
    }

    if let Some(level) = &prefs.settings.log_level {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Unknown log level '{}', expected one of {}",
                level,
                LOG_LEVELS.join(", ")
            )));
        }
    }

    Ok(())
}

/// Substitute environment variables in a string
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}")?;
    let mut result = input.to_string();
    let mut errors = Vec::new();

    for cap in re.captures_iter(input) {
        let full_match = &cap[0];
        let var_expr = &cap[1];

        // Handle default values: ${VAR:-default}
        let (var_name, default_value) = match var_expr.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (var_expr, None),
        };

        match (std::env::var(var_name), default_value) {
            (Ok(value), _) => result = result.replace(full_match, &value),
            (Err(_), Some(default)) => result = result.replace(full_match, default),
            (Err(_), None) => errors.push(var_name.to_string()),
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::EnvVarNotFound(errors.join(", ")));
    }

    Ok(result)
}
