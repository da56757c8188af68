//! Command-line surface for provisioning the cache front.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use frontcache_config::validate::validate_settings;
use frontcache_config::{Settings, load_settings};
use frontcache_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, Metrics, init_logging};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::client::{
    CliError, CliResult, DEFAULT_METADATA_TIMEOUT_SECS, DEFAULT_METADATA_URL, config_error,
};
use crate::commands::apply::handle_apply;
use crate::commands::policy::{handle_policy_fetch, handle_policy_recv};
use crate::commands::profile::handle_profile;
use crate::commands::render::handle_render;

/// Parses CLI arguments, executes the requested command, and reports the
/// outcome. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.map_or_else(LogFormat::infer, LogFormat::from),
        version: env!("CARGO_PKG_VERSION"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err}");
    }

    let run_id = Uuid::new_v4();
    let span = info_span!("frontcache", run_id = %run_id, command = cli.command.label());

    let metrics = match Metrics::new() {
        Ok(metrics) => metrics,
        Err(err) => {
            let err = CliError::failure(err);
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };
    let metrics_file = cli.metrics_file.clone();

    let result = dispatch(cli, &metrics).instrument(span.clone()).await;
    let _entered = span.enter();

    if let Some(path) = metrics_file
        && let Err(err) = metrics.write_textfile(&path)
    {
        warn!(path = %path.display(), error = %err, "failed to write metrics textfile");
    }

    match result {
        Ok(()) => {
            info!("command finished");
            0
        }
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, metrics: &Metrics) -> CliResult<()> {
    match cli.command {
        Command::Profile(args) => {
            let settings = load(&cli.settings)?;
            handle_profile(&settings, &args, cli.output, metrics)
        }
        Command::Render(args) => {
            let settings = load(&cli.settings)?;
            handle_render(settings, &args, cli.output, metrics).await
        }
        Command::Apply(args) => {
            let settings = load(&cli.settings)?;
            handle_apply(settings, &args, cli.output, metrics).await
        }
        Command::Policy(policy) => match policy {
            PolicyCommand::Recv(args) => handle_policy_recv(&args, cli.output),
            PolicyCommand::Fetch(args) => handle_policy_fetch(&args, cli.output),
        },
    }
}

/// Built-in defaults, then the settings file, then flag and env overrides.
pub(crate) fn load(args: &SettingsArgs) -> CliResult<Settings> {
    let mut settings = load_settings(args.config.as_deref()).map_err(config_error)?;
    if let Some(host) = &args.backend_host {
        settings.backend.host.clone_from(host);
    }
    if let Some(dir) = &args.cache_dir {
        settings.cache.dir.clone_from(dir);
    }
    validate_settings(&settings).map_err(config_error)?;
    Ok(settings)
}

#[derive(Parser)]
#[command(
    name = "frontcache",
    version,
    about = "Provision a caching reverse proxy in front of the application server"
)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) settings: SettingsArgs,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(
        long,
        global = true,
        env = "FRONTCACHE_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL
    )]
    pub(crate) log_level: String,
    #[arg(long, global = true, value_enum, env = "FRONTCACHE_LOG_FORMAT")]
    pub(crate) log_format: Option<LogFormatArg>,
    #[arg(
        long,
        global = true,
        env = "FRONTCACHE_METRICS_FILE",
        help = "Write Prometheus counters to this textfile when the command ends"
    )]
    pub(crate) metrics_file: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Settings file location and overrides.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct SettingsArgs {
    #[arg(long, global = true, env = "FRONTCACHE_CONFIG")]
    pub(crate) config: Option<PathBuf>,
    #[arg(long, global = true, env = "FRONTCACHE_BACKEND_HOST")]
    pub(crate) backend_host: Option<String>,
    #[arg(long, global = true, env = "FRONTCACHE_CACHE_DIR")]
    pub(crate) cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print the tuning profile for a machine class.
    Profile(ProfileArgs),
    /// Render configuration files into a directory without reconciling.
    Render(RenderArgs),
    /// Render, reconcile, and restart services.
    Apply(ApplyArgs),
    /// Evaluate the cache-policy rules against one message.
    #[command(subcommand)]
    Policy(PolicyCommand),
}

impl Command {
    pub(crate) const fn label(&self) -> &'static str {
        match self {
            Self::Profile(_) => "profile",
            Self::Render(_) => "render",
            Self::Apply(_) => "apply",
            Self::Policy(PolicyCommand::Recv(_)) => "policy_recv",
            Self::Policy(PolicyCommand::Fetch(_)) => "policy_fetch",
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum PolicyCommand {
    /// Run a client request through the receive rules.
    Recv(PolicyRecvArgs),
    /// Run a backend response through the fetch rules.
    Fetch(PolicyFetchArgs),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ProfileArgs {
    /// Machine class label or instance type, e.g. `m1.large`.
    pub(crate) class: String,
}

/// Facts supplied on the command line; anything omitted is detected.
#[derive(Args, Debug, Clone)]
pub(crate) struct FactsArgs {
    #[arg(long, env = "FRONTCACHE_MACHINE_CLASS")]
    pub(crate) machine_class: Option<String>,
    #[arg(long, env = "FRONTCACHE_OWNER")]
    pub(crate) owner: String,
    #[arg(long, env = "FRONTCACHE_GROUP")]
    pub(crate) group: Option<String>,
    #[arg(long, env = "FRONTCACHE_PRIVATE_HOSTNAME")]
    pub(crate) private_hostname: Option<String>,
    #[arg(long, conflicts_with = "no_alternate_proxy")]
    pub(crate) alternate_proxy: bool,
    #[arg(long)]
    pub(crate) no_alternate_proxy: bool,
    #[arg(long, env = "FRONTCACHE_TARGET_PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub(crate) target_port: Option<u16>,
    #[arg(long, env = "FRONTCACHE_METADATA_URL", default_value = DEFAULT_METADATA_URL)]
    pub(crate) metadata_url: String,
    #[arg(
        long,
        env = "FRONTCACHE_METADATA_TIMEOUT_SECS",
        default_value_t = DEFAULT_METADATA_TIMEOUT_SECS
    )]
    pub(crate) metadata_timeout: u64,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct RenderArgs {
    #[arg(long)]
    pub(crate) out: PathBuf,
    #[command(flatten)]
    pub(crate) facts: FactsArgs,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ApplyArgs {
    #[arg(long)]
    pub(crate) dry_run: bool,
    #[command(flatten)]
    pub(crate) facts: FactsArgs,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct PolicyRecvArgs {
    #[arg(long, default_value = "GET")]
    pub(crate) method: String,
    #[arg(long)]
    pub(crate) url: String,
    #[arg(long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
    pub(crate) headers: Vec<(String, String)>,
    #[arg(long, default_value = "127.0.0.1")]
    pub(crate) client_ip: IpAddr,
    #[arg(long, default_value_t = 0)]
    pub(crate) restarts: u32,
    #[arg(long, help = "Evaluate as if the backend were failing its health probe")]
    pub(crate) sick: bool,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct PolicyFetchArgs {
    #[arg(long, default_value_t = 200)]
    pub(crate) status: u16,
    #[arg(long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
    pub(crate) headers: Vec<(String, String)>,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub(crate) enum LogFormatArg {
    Json,
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Json => Self::Json,
            LogFormatArg::Pretty => Self::Pretty,
        }
    }
}

pub(crate) fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| "header must be NAME:VALUE".to_string())?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name must not be empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::{Result, anyhow};
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_apply_with_facts() -> Result<()> {
        let cli = Cli::try_parse_from([
            "frontcache",
            "--output",
            "json",
            "apply",
            "--dry-run",
            "--owner",
            "deploy",
            "--machine-class",
            "m1.large",
            "--private-hostname",
            "ip-10-0-0-12.ec2.internal",
            "--alternate-proxy",
        ])?;
        assert_eq!(cli.output, OutputFormat::Json);
        let Command::Apply(args) = cli.command else {
            return Err(anyhow!("expected apply"));
        };
        assert!(args.dry_run);
        assert_eq!(args.facts.owner, "deploy");
        assert!(args.facts.alternate_proxy);
        assert_eq!(args.facts.machine_class.as_deref(), Some("m1.large"));
        Ok(())
    }

    #[test]
    fn alternate_proxy_flags_conflict() {
        let result = Cli::try_parse_from([
            "frontcache",
            "apply",
            "--owner",
            "deploy",
            "--alternate-proxy",
            "--no-alternate-proxy",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn header_values_split_on_first_colon() -> Result<()> {
        assert_eq!(
            parse_header("Cookie: a=1; b=2").map_err(|err| anyhow!(err))?,
            ("Cookie".to_string(), "a=1; b=2".to_string())
        );
        assert_eq!(
            parse_header("Host:example.com:8080").map_err(|err| anyhow!(err))?,
            ("Host".to_string(), "example.com:8080".to_string())
        );
        assert!(parse_header("no separator").is_err());
        assert!(parse_header(": value").is_err());
        Ok(())
    }

    #[test]
    fn settings_overrides_are_validated() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("frontcache.json");
        fs::write(&path, r#"{"cache": {"dir": "/srv/varnish"}}"#)?;

        let settings = load(&SettingsArgs {
            config: Some(path.clone()),
            backend_host: Some("10.0.0.5".to_string()),
            cache_dir: None,
        })
        .map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(settings.cache.dir, PathBuf::from("/srv/varnish"));
        assert_eq!(settings.backend.host, "10.0.0.5");

        let err = load(&SettingsArgs {
            config: Some(path),
            backend_host: None,
            cache_dir: Some(PathBuf::from("relative/dir")),
        })
        .err()
        .ok_or_else(|| anyhow!("expected validation error"))?;
        assert_eq!(err.exit_code(), 2);
        Ok(())
    }
}
