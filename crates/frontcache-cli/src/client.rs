//! CLI error type and the instance metadata client.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use frontcache_config::ConfigError;
use frontcache_fsops::FsOpsError;
use frontcache_render::RenderError;
use reqwest::{Client, Url};
use tracing::debug;

pub(crate) const DEFAULT_METADATA_URL: &str = "http://169.254.169.254/latest/meta-data/";
pub(crate) const DEFAULT_METADATA_TIMEOUT_SECS: u64 = 2;
pub(crate) const INSTANCE_TYPE_KEY: &str = "instance-type";
pub(crate) const LOCAL_HOSTNAME_KEY: &str = "local-hostname";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Settings and fact problems are the operator's to fix; IO is a failure.
pub(crate) fn config_error(err: ConfigError) -> CliError {
    match err {
        ConfigError::InvalidField {
            section,
            field,
            value,
            reason,
        } => CliError::validation(match value {
            Some(value) => format!("invalid setting {section}.{field} ({reason}): {value}"),
            None => format!("invalid setting {section}.{field} ({reason})"),
        }),
        ConfigError::MissingFact { fact } => {
            CliError::validation(format!("missing environment fact: {fact}"))
        }
        ConfigError::Json { ref path, .. } => {
            let message = format!("settings file {} is not valid", path.display());
            CliError::Validation(format!("{message}: {:#}", anyhow!(err)))
        }
        err @ ConfigError::Io { .. } => CliError::failure(err),
    }
}

pub(crate) fn render_error(err: RenderError) -> CliError {
    match err {
        RenderError::MissingFact { fact } => {
            CliError::validation(format!("missing environment fact: {fact}"))
        }
        RenderError::InvalidInput { source } => config_error(source),
    }
}

/// Reconcile failures carry their context in fields; surface it.
pub(crate) fn fsops_error(err: FsOpsError) -> CliError {
    match err {
        FsOpsError::CommandFailed {
            step,
            command,
            status,
            stderr,
        } => {
            let status =
                status.map_or_else(|| "a signal".to_string(), |code| format!("status {code}"));
            let mut message = format!("{step} command `{command}` exited with {status}");
            if !stderr.is_empty() {
                message.push_str(": ");
                message.push_str(&stderr);
            }
            CliError::failure(anyhow!(message))
        }
        FsOpsError::CommandSpawn { ref program, .. } => {
            let message = format!("could not start {program}");
            CliError::failure(anyhow!(err).context(message))
        }
        FsOpsError::InvalidInput {
            field,
            reason,
            ref value,
        } => CliError::validation(match value {
            Some(value) => format!("invalid {field} ({reason}): {value}"),
            None => format!("invalid {field} ({reason})"),
        }),
        FsOpsError::Io {
            ref path,
            operation,
            ..
        }
        | FsOpsError::Nix {
            ref path,
            operation,
            ..
        } => {
            let message = format!("{operation} failed for {}", path.display());
            CliError::failure(anyhow!(err).context(message))
        }
        other => CliError::failure(other),
    }
}

/// Reads host facts from the instance metadata service.
#[derive(Clone)]
pub(crate) struct MetadataClient {
    client: Client,
    base_url: Url,
}

impl MetadataClient {
    pub(crate) fn new(mut base_url: Url, timeout: Duration) -> CliResult<Self> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, base_url })
    }

    /// Fetch one metadata value. Missing, empty, or unreachable values are fatal.
    pub(crate) async fn fetch(&self, key: &str) -> CliResult<String> {
        let url = self
            .base_url
            .join(key)
            .map_err(|err| CliError::failure(anyhow!("invalid metadata URL: {err}")))?;
        debug!(url = %url, "querying instance metadata");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| CliError::failure(anyhow!("metadata request for {key} failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CliError::failure(anyhow!(
                "metadata request for {key} returned {status}"
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|err| CliError::failure(anyhow!("failed to read metadata {key}: {err}")))?;
        let value = body.trim();
        if value.is_empty() {
            return Err(CliError::failure(anyhow!("metadata {key} was empty")));
        }
        Ok(value.to_string())
    }

    pub(crate) async fn instance_type(&self) -> CliResult<String> {
        self.fetch(INSTANCE_TYPE_KEY).await
    }

    pub(crate) async fn local_hostname(&self) -> CliResult<String> {
        self.fetch(LOCAL_HOSTNAME_KEY).await
    }
}
