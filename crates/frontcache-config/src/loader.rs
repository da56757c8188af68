//! Settings file loading.
//!
//! # Design
//! - No file means built-in defaults; a file that exists must parse and validate.
//! - Unknown keys are rejected so typos surface instead of silently defaulting.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::Settings;
use crate::validate::validate_settings;

/// Load settings from an optional JSON file and validate them.
///
/// # Errors
///
/// Returns `ConfigError::Io` when the file cannot be read, `ConfigError::Json`
/// when it is not a valid settings document, and `ConfigError::InvalidField`
/// when validation fails.
pub fn load_settings(path: Option<&Path>) -> ConfigResult<Settings> {
    let settings = match path {
        Some(path) => {
            let payload = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                operation: "settings.read",
                path: path.to_path_buf(),
                source,
            })?;
            debug!(path = %path.display(), "loaded settings file");
            serde_json::from_str::<Settings>(&payload).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?
        }
        None => Settings::default(),
    };
    validate_settings(&settings)?;
    Ok(settings)
}
