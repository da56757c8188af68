//! Environment detection: flags first, instance metadata for the rest.

use std::time::Duration;

use anyhow::anyhow;
use frontcache_config::{EnvironmentFacts, FactsBuilder, Settings};
use reqwest::Url;
use tracing::info;

use crate::cli::FactsArgs;
use crate::client::{CliError, CliResult, MetadataClient, config_error};

/// Everything detection learned about the host.
#[derive(Debug, Clone)]
pub(crate) struct DetectedHost {
    /// Raw machine class spelling, resolved later.
    pub(crate) machine_class: String,
    /// Facts threaded through rendering and reconciliation.
    pub(crate) facts: EnvironmentFacts,
}

/// Build the host facts. The metadata service is only queried for values the
/// flags did not supply, and any failure there is fatal.
pub(crate) async fn detect(args: &FactsArgs, settings: &Settings) -> CliResult<DetectedHost> {
    let mut metadata = None;

    let machine_class = match &args.machine_class {
        Some(class) => class.clone(),
        None => metadata_client(args, &mut metadata)?.instance_type().await?,
    };
    let private_hostname = match &args.private_hostname {
        Some(hostname) => hostname.clone(),
        None => metadata_client(args, &mut metadata)?.local_hostname().await?,
    };
    let has_alternate_proxy = if args.alternate_proxy {
        true
    } else if args.no_alternate_proxy {
        false
    } else {
        settings.alternate_proxy.server_dir.is_dir()
    };

    let mut builder = FactsBuilder::new()
        .owner(args.owner.as_str())
        .private_hostname(private_hostname)
        .alternate_proxy(has_alternate_proxy);
    if let Some(group) = &args.group {
        builder = builder.group(group.as_str());
    }
    if let Some(port) = args.target_port {
        builder = builder.target_port(port);
    }
    let facts = builder.build().map_err(config_error)?;

    info!(
        machine_class = %machine_class,
        private_hostname = %facts.private_hostname,
        has_alternate_proxy = facts.has_alternate_proxy,
        front_port = facts.front_port(),
        "environment detected"
    );
    Ok(DetectedHost {
        machine_class,
        facts,
    })
}

fn metadata_client<'a>(
    args: &FactsArgs,
    slot: &'a mut Option<MetadataClient>,
) -> CliResult<&'a MetadataClient> {
    if slot.is_none() {
        let base_url: Url = args.metadata_url.parse().map_err(|err| {
            CliError::validation(format!("invalid metadata URL {}: {err}", args.metadata_url))
        })?;
        let client = MetadataClient::new(base_url, Duration::from_secs(args.metadata_timeout))?;
        *slot = Some(client);
    }
    slot.as_ref()
        .ok_or_else(|| CliError::failure(anyhow!("metadata client unavailable")))
}

#[cfg(test)]
pub(crate) mod tests {
    use anyhow::{Result, anyhow};
    use httpmock::prelude::*;

    use super::*;
    use crate::client::DEFAULT_METADATA_TIMEOUT_SECS;

    pub(crate) fn facts_args(metadata_url: &str) -> FactsArgs {
        FactsArgs {
            machine_class: None,
            owner: "deploy".to_string(),
            group: None,
            private_hostname: None,
            alternate_proxy: false,
            no_alternate_proxy: true,
            target_port: None,
            metadata_url: metadata_url.to_string(),
            metadata_timeout: DEFAULT_METADATA_TIMEOUT_SECS,
        }
    }

    #[tokio::test]
    async fn missing_flags_are_filled_from_metadata() -> Result<()> {
        let server = MockServer::start_async().await;
        let instance = server.mock(|when, then| {
            when.method(GET).path("/instance-type");
            then.status(200).body("m2.2xlarge");
        });
        let hostname = server.mock(|when, then| {
            when.method(GET).path("/local-hostname");
            then.status(200).body("ip-10-0-0-12.ec2.internal\n");
        });

        let detected = detect(&facts_args(&server.base_url()), &Settings::default())
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(detected.machine_class, "m2.2xlarge");
        assert_eq!(detected.facts.private_hostname, "ip-10-0-0-12.ec2.internal");
        assert_eq!(detected.facts.owner_group, "deploy");
        assert_eq!(detected.facts.target_port, 8081);
        assert!(!detected.facts.has_alternate_proxy);
        instance.assert();
        hostname.assert();
        Ok(())
    }

    #[tokio::test]
    async fn flags_skip_metadata_entirely() -> Result<()> {
        // Nothing listens on the discard port; any metadata query would fail.
        let mut args = facts_args("http://127.0.0.1:9/");
        args.machine_class = Some("small".to_string());
        args.private_hostname = Some("host.internal".to_string());
        args.group = Some("www".to_string());
        args.target_port = Some(9292);
        args.no_alternate_proxy = false;
        args.alternate_proxy = true;

        let detected = detect(&args, &Settings::default())
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(detected.facts.owner_group, "www");
        assert_eq!(detected.facts.target_port, 9292);
        assert_eq!(detected.facts.front_port(), 81);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_metadata_is_fatal() -> Result<()> {
        let server = MockServer::start_async().await;
        let failing = server.mock(|when, then| {
            when.method(GET).path("/instance-type");
            then.status(503);
        });

        let err = detect(&facts_args(&server.base_url()), &Settings::default())
            .await
            .err()
            .ok_or_else(|| anyhow!("expected failure"))?;
        assert_eq!(err.exit_code(), 3);
        failing.assert();
        Ok(())
    }

    #[tokio::test]
    async fn alternate_proxy_is_detected_from_its_server_dir() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut settings = Settings::default();
        settings.alternate_proxy.server_dir = temp.path().to_path_buf();

        let mut args = facts_args("http://127.0.0.1:9/");
        args.machine_class = Some("large".to_string());
        args.private_hostname = Some("host.internal".to_string());
        args.no_alternate_proxy = false;

        let detected = detect(&args, &settings)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        assert!(detected.facts.has_alternate_proxy);
        Ok(())
    }
}
