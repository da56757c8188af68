use std::fs;

use anyhow::Result;
use frontcache_config::{Settings, SizeProfileResolver};
use frontcache_fsops::{ReconcilePlan, RecordingRunner, ServiceKind, ServiceReconciler};
use frontcache_render::TemplateRenderer;
use frontcache_telemetry::Metrics;
use frontcache_test_support::fixtures::HostRoot;

fn plan(root: &HostRoot, settings: &Settings, class: &str) -> Result<ReconcilePlan> {
    let facts = root.facts(true)?;
    let resolved = SizeProfileResolver::new(&settings.cache.dir).resolve(class);
    let configs = TemplateRenderer::new(settings.clone()).render(&resolved.profile, &facts)?;
    Ok(ReconcilePlan::new(settings, facts, configs))
}

#[test]
fn second_run_with_unchanged_inputs_is_a_noop() -> Result<()> {
    let root = HostRoot::new()?;
    root.write(
        "etc/nginx/servers/app.conf",
        "server {\n  listen 81;\n  server_name app;\n}\n",
    )?;
    let settings = root.settings();
    let reconciler =
        ServiceReconciler::new(settings.clone(), RecordingRunner::new(), Metrics::new()?);

    let first = reconciler.reconcile(&plan(&root, &settings, "m1.xlarge")?)?;
    assert_eq!(first.files_written.len(), 2);
    assert_eq!(first.proxy_files_relocated.len(), 1);
    assert_eq!(
        first.services_restarted,
        vec![
            ServiceKind::AlternateProxy,
            ServiceKind::CacheProxy,
            ServiceKind::Monitor
        ]
    );
    let calls_after_first = reconciler.runner().calls().len();

    let second = reconciler.reconcile(&plan(&root, &settings, "m1.xlarge")?)?;
    assert!(second.is_noop(), "{second:?}");
    assert_eq!(second.files_unchanged.len(), 2);
    // Only the package verify command runs again.
    assert_eq!(reconciler.runner().calls().len(), calls_after_first + 1);

    let monitor = fs::read_to_string(&settings.paths.monitor_config)?;
    assert!(monitor.contains("check process varnish_81"));
    assert!(monitor.contains("-p thread_pools=4"));
    Ok(())
}

#[test]
fn profile_change_rewrites_only_the_monitor_stanza() -> Result<()> {
    let root = HostRoot::new()?;
    let settings = root.settings();
    let reconciler =
        ServiceReconciler::new(settings.clone(), RecordingRunner::new(), Metrics::new()?);

    reconciler.reconcile(&plan(&root, &settings, "m1.small")?)?;
    let report = reconciler.reconcile(&plan(&root, &settings, "c1.xlarge")?)?;

    assert_eq!(report.files_written, vec![settings.paths.monitor_config.clone()]);
    assert_eq!(report.files_unchanged, vec![settings.paths.policy_config.clone()]);
    assert_eq!(
        report.services_restarted,
        vec![ServiceKind::CacheProxy, ServiceKind::Monitor]
    );
    Ok(())
}
