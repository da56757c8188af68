use frontcache_config::Settings;
use frontcache_fsops::{
    CommandRunner, ReconcilePlan, ReconcileReport, ServiceReconciler, SystemCommandRunner,
};
use frontcache_render::TemplateRenderer;
use frontcache_telemetry::Metrics;

use crate::cli::{ApplyArgs, OutputFormat};
use crate::client::{CliResult, fsops_error, render_error};
use crate::commands::resolve_profile;
use crate::detect::detect;
use crate::output::{emit, report_table};

pub(crate) async fn handle_apply(
    settings: Settings,
    args: &ApplyArgs,
    format: OutputFormat,
    metrics: &Metrics,
) -> CliResult<()> {
    let report = apply_with(settings, args, SystemCommandRunner, metrics).await?;
    emit(&report, &report_table(&report), format)
}

async fn apply_with<R: CommandRunner + Send>(
    settings: Settings,
    args: &ApplyArgs,
    runner: R,
    metrics: &Metrics,
) -> CliResult<ReconcileReport> {
    let host = detect(&args.facts, &settings).await?;
    let resolved = resolve_profile(&settings.cache.dir, &host.machine_class, metrics);
    let configs = TemplateRenderer::new(settings.clone())
        .render(&resolved.profile, &host.facts)
        .map_err(render_error)?;

    let plan = ReconcilePlan::new(&settings, host.facts, configs).dry_run(args.dry_run);
    ServiceReconciler::new(settings, runner, metrics.clone())
        .reconcile(&plan)
        .map_err(fsops_error)
}

#[cfg(test)]
mod tests {
    use anyhow::{Result, anyhow};
    use frontcache_fsops::{RecordingRunner, ServiceKind};
    use frontcache_test_support::fixtures::HostRoot;

    use super::*;
    use crate::detect::tests::facts_args;

    fn apply_args(root: &HostRoot, dry_run: bool) -> Result<ApplyArgs> {
        let owned = root.facts(false)?;
        let mut facts = facts_args("http://127.0.0.1:9/");
        facts.owner = owned.owner_user;
        facts.group = Some(owned.owner_group);
        facts.machine_class = Some("m1.xlarge".to_string());
        facts.private_hostname = Some(owned.private_hostname);
        Ok(ApplyArgs { dry_run, facts })
    }

    #[tokio::test]
    async fn dry_run_reports_without_touching_disk() -> Result<()> {
        let root = HostRoot::new()?;
        let settings = root.settings();
        let report = apply_with(
            settings.clone(),
            &apply_args(&root, true)?,
            RecordingRunner::new(),
            &Metrics::new()?,
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;

        assert!(report.dry_run);
        assert_eq!(report.files_written.len(), 2);
        assert!(!settings.paths.monitor_config.exists());
        assert!(!settings.cache.dir.exists());
        Ok(())
    }

    #[tokio::test]
    async fn apply_converges_then_settles() -> Result<()> {
        let root = HostRoot::new()?;
        let settings = root.settings();
        let args = apply_args(&root, false)?;
        let metrics = Metrics::new()?;

        let first = apply_with(settings.clone(), &args, RecordingRunner::new(), &metrics)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(
            first.services_restarted,
            vec![ServiceKind::CacheProxy, ServiceKind::Monitor]
        );
        assert!(settings.paths.policy_config.is_file());
        assert!(settings.cache.dir.is_dir());

        let second = apply_with(settings, &args, RecordingRunner::new(), &metrics)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        assert!(second.is_noop(), "{second:?}");
        assert_eq!(metrics.snapshot().cache_proxy_restarts, 1);
        Ok(())
    }
}
