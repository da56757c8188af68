//! Validation helpers for settings documents.

use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::model::Settings;

/// Validate a settings document after it has been parsed.
///
/// # Errors
///
/// Returns `ConfigError::InvalidField` for the first relative path, empty
/// command, or malformed policy value encountered.
pub fn validate_settings(settings: &Settings) -> ConfigResult<()> {
    ensure_absolute("paths", "monitor_config", &settings.paths.monitor_config)?;
    ensure_absolute("paths", "policy_config", &settings.paths.policy_config)?;
    ensure_absolute("paths", "pid_dir", &settings.paths.pid_dir)?;
    ensure_absolute("paths", "varnishd_binary", &settings.paths.varnishd_binary)?;
    ensure_absolute("cache", "dir", &settings.cache.dir)?;
    ensure_absolute(
        "alternate_proxy",
        "server_dir",
        &settings.alternate_proxy.server_dir,
    )?;

    ensure_token("backend", "host", &settings.backend.host)?;

    ensure_url_prefix("policy", "personalized_prefix", &settings.policy.personalized_prefix)?;
    ensure_token("policy", "session_cookie", &settings.policy.session_cookie)?;
    ensure_token("policy", "logged_in_cookie", &settings.policy.logged_in_cookie)?;

    ensure_command(
        "services",
        "cache_proxy_restart",
        &settings.services.cache_proxy_restart,
    )?;
    ensure_command("services", "monitor_reload", &settings.services.monitor_reload)?;
    ensure_command("alternate_proxy", "restart", &settings.alternate_proxy.restart)?;
    ensure_command("package", "verify", &settings.package.verify)?;
    ensure_command("package", "install", &settings.package.install)?;
    Ok(())
}

fn ensure_absolute(section: &'static str, field: &'static str, path: &Path) -> ConfigResult<()> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            section,
            field,
            Some(path.display().to_string()),
            "must be an absolute path",
        ))
    }
}

// Values interpolated into quoted config strings.
fn ensure_token(section: &'static str, field: &'static str, value: &str) -> ConfigResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(section, field, None, "must not be empty"));
    }
    if trimmed
        .chars()
        .any(|ch| ch.is_whitespace() || matches!(ch, '"' | ';' | '=' | '\\'))
    {
        return Err(ConfigError::invalid(
            section,
            field,
            Some(value.to_string()),
            "must not contain whitespace, quotes, '=', ';' or backslashes",
        ));
    }
    Ok(())
}

// Interpolated into a quoted regex in the cache-policy script.
fn ensure_url_prefix(section: &'static str, field: &'static str, value: &str) -> ConfigResult<()> {
    if !value.starts_with('/') {
        return Err(ConfigError::invalid(
            section,
            field,
            Some(value.to_string()),
            "must start with '/'",
        ));
    }
    if value
        .chars()
        .any(|ch| ch.is_whitespace() || ch.is_control() || matches!(ch, '"' | '\\'))
    {
        return Err(ConfigError::invalid(
            section,
            field,
            Some(value.to_string()),
            "must not contain whitespace, quotes or backslashes",
        ));
    }
    Ok(())
}

fn ensure_command(section: &'static str, field: &'static str, command: &[String]) -> ConfigResult<()> {
    match command.first() {
        Some(program) if !program.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::invalid(
            section,
            field,
            None,
            "must name a program to run",
        )),
    }
}
