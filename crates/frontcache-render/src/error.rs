//! Error types for rendering.

use frontcache_config::ConfigError;
use thiserror::Error;

/// Result type for rendering.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors produced before any file is rendered.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A required environment fact was missing.
    #[error("render input incomplete")]
    MissingFact {
        /// Name of the missing fact.
        fact: &'static str,
    },
    /// The tuning profile or settings failed validation.
    #[error("render input invalid")]
    InvalidInput {
        /// Underlying validation error.
        source: ConfigError,
    },
}

impl From<ConfigError> for RenderError {
    fn from(source: ConfigError) -> Self {
        match source {
            ConfigError::MissingFact { fact } => Self::MissingFact { fact },
            other => Self::InvalidInput { source: other },
        }
    }
}
