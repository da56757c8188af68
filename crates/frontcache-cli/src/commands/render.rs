use std::path::PathBuf;

use frontcache_config::Settings;
use frontcache_fsops::{WriteOutcome, write_if_changed};
use frontcache_render::{ConfigKind, TemplateRenderer};
use frontcache_telemetry::Metrics;
use serde::Serialize;
use tracing::info;

use crate::cli::{OutputFormat, RenderArgs};
use crate::client::{CliError, CliResult, fsops_error, render_error};
use crate::commands::resolve_profile;
use crate::detect::detect;
use crate::output::{emit, written_files_table};

#[derive(Debug, Serialize)]
struct RenderedFile {
    kind: ConfigKind,
    path: PathBuf,
    written: bool,
}

pub(crate) async fn handle_render(
    settings: Settings,
    args: &RenderArgs,
    format: OutputFormat,
    metrics: &Metrics,
) -> CliResult<()> {
    let files = render_into(settings, args, metrics).await?;
    let rows: Vec<_> = files
        .iter()
        .map(|file| (file.kind.to_string(), file.path.as_path(), file.written))
        .collect();
    emit(&files, &written_files_table(&rows), format)
}

async fn render_into(
    settings: Settings,
    args: &RenderArgs,
    metrics: &Metrics,
) -> CliResult<Vec<RenderedFile>> {
    let host = detect(&args.facts, &settings).await?;
    let resolved = resolve_profile(&settings.cache.dir, &host.machine_class, metrics);
    let configs = TemplateRenderer::new(settings)
        .render(&resolved.profile, &host.facts)
        .map_err(render_error)?;

    let mut files = Vec::with_capacity(configs.len());
    for config in configs {
        let file_name = config.path.file_name().ok_or_else(|| {
            CliError::validation(format!(
                "rendered path {} has no file name",
                config.path.display()
            ))
        })?;
        let path = args.out.join(file_name);
        let written = write_if_changed(&path, &config.content, config.mode, None)
            .map_err(fsops_error)?
            == WriteOutcome::Written;
        if written {
            metrics.inc_file_written(config.kind.as_str());
        }
        info!(kind = %config.kind, path = %path.display(), written, "rendered");
        files.push(RenderedFile {
            kind: config.kind,
            path,
            written,
        });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::{Result, anyhow};
    use frontcache_test_support::fixtures::HostRoot;

    use super::*;
    use crate::detect::tests::facts_args;

    fn render_args(root: &HostRoot) -> RenderArgs {
        let mut facts = facts_args("http://127.0.0.1:9/");
        facts.machine_class = Some("m1.large".to_string());
        facts.private_hostname = Some("ip-10-0-0-12.ec2.internal".to_string());
        RenderArgs {
            out: root.join("out"),
            facts,
        }
    }

    #[tokio::test]
    async fn renders_both_files_into_the_output_directory() -> Result<()> {
        let root = HostRoot::new()?;
        let args = render_args(&root);
        let metrics = Metrics::new()?;

        let files = render_into(root.settings(), &args, &metrics)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|file| file.written));

        let monitor = fs::read_to_string(root.join("out/varnishd.monitrc"))?;
        assert!(monitor.contains("check process varnish_80"));
        let policy = fs::read_to_string(root.join("out/app.vcl"))?;
        assert!(policy.contains("backend default"));

        let again = render_into(root.settings(), &args, &metrics)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        assert!(again.iter().all(|file| !file.written));
        assert_eq!(metrics.snapshot().monitor_files_written, 1);
        Ok(())
    }
}
