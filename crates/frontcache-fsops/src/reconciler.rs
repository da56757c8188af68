//! `ServiceReconciler`: converge host state and restart what changed.
//!
//! # Design
//! - Steps run in a fixed order: package, directories, rendered files,
//!   alternate proxy, caching proxy restart, monitor reload.
//! - Nothing restarts unless something it depends on changed, so a second run
//!   over unchanged inputs is a no-op.
//! - A restart is marked pending before the change that needs it and cleared
//!   only after it succeeds, so a failed restart is retried by the next run.
//! - Dry runs walk the same steps and report what would happen without
//!   writing files or running commands.

use std::path::PathBuf;

use frontcache_config::defaults::{CACHE_DIR_MODE, KEEP_PREFIX};
use frontcache_config::{EnvironmentFacts, Settings};
use frontcache_render::RenderedConfig;
use frontcache_telemetry::Metrics;
use serde::Serialize;
use tracing::{info, warn};

use crate::alternate::{apply_relocation, plan_relocations};
use crate::error::{FsOpsError, FsOpsResult};
use crate::files::{WriteOutcome, ensure_directory, would_change, write_if_changed};
use crate::ownership::{Ownership, resolve_ownership};
use crate::pending::PendingRestarts;
use crate::runner::CommandRunner;

/// Services the reconciler may restart or reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// The alternate front proxy.
    AlternateProxy,
    /// The caching proxy itself.
    CacheProxy,
    /// The monitoring daemon.
    Monitor,
}

impl ServiceKind {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlternateProxy => "alternate_proxy",
            Self::CacheProxy => "cache_proxy",
            Self::Monitor => "monitor",
        }
    }
}

const CACHE_PROXY: &str = ServiceKind::CacheProxy.as_str();
const ALTERNATE_PROXY: &str = ServiceKind::AlternateProxy.as_str();

/// Everything one reconcile run converges.
#[derive(Debug, Clone)]
pub struct ReconcilePlan {
    /// Facts for ownership and the alternate proxy rewrite.
    pub facts: EnvironmentFacts,
    /// Rendered files, in write order.
    pub configs: Vec<RenderedConfig>,
    /// Directories that must exist, owned per `facts`.
    pub directories: Vec<PathBuf>,
    /// Report without touching disk or services.
    pub dry_run: bool,
}

impl ReconcilePlan {
    /// Plan for `configs` plus the cache directory from `settings`.
    #[must_use]
    pub fn new(settings: &Settings, facts: EnvironmentFacts, configs: Vec<RenderedConfig>) -> Self {
        Self {
            facts,
            configs,
            directories: vec![settings.cache.dir.clone()],
            dry_run: false,
        }
    }

    /// Toggle dry-run mode.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// What a reconcile run did, or would do in dry-run mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Whether this report describes a dry run.
    pub dry_run: bool,
    /// Whether the package install command ran.
    pub package_installed: bool,
    /// Directories created.
    pub directories_created: Vec<PathBuf>,
    /// Rendered files whose content changed.
    pub files_written: Vec<PathBuf>,
    /// Rendered files already up to date.
    pub files_unchanged: Vec<PathBuf>,
    /// Alternate-proxy server files moved to their kept names.
    pub proxy_files_relocated: Vec<PathBuf>,
    /// Services restarted or reloaded, in order.
    pub services_restarted: Vec<ServiceKind>,
}

impl ReconcileReport {
    /// Whether the run changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.package_installed
            && self.directories_created.is_empty()
            && self.files_written.is_empty()
            && self.proxy_files_relocated.is_empty()
            && self.services_restarted.is_empty()
    }
}

/// Applies a [`ReconcilePlan`] through a [`CommandRunner`].
pub struct ServiceReconciler<R> {
    settings: Settings,
    runner: R,
    metrics: Metrics,
}

impl<R: CommandRunner> ServiceReconciler<R> {
    /// Build a reconciler over validated settings.
    pub const fn new(settings: Settings, runner: R, metrics: Metrics) -> Self {
        Self {
            settings,
            runner,
            metrics,
        }
    }

    /// Runner used for external commands.
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Converge host state to `plan`.
    ///
    /// # Errors
    ///
    /// Fails fast on the first filesystem error, on a failed package install,
    /// on a failed alternate-proxy restart, and on a failed caching-proxy
    /// restart. A failed monitor reload is logged and tolerated.
    pub fn reconcile(&self, plan: &ReconcilePlan) -> FsOpsResult<ReconcileReport> {
        plan.facts
            .ensure_complete()
            .map_err(|_| FsOpsError::InvalidInput {
                field: "facts",
                reason: "incomplete",
                value: None,
            })?;

        let mut report = ReconcileReport {
            dry_run: plan.dry_run,
            ..ReconcileReport::default()
        };

        report.package_installed = self.ensure_package(plan.dry_run)?;
        let ownership = resolve_ownership(&plan.facts.owner_user, &plan.facts.owner_group)?;
        self.ensure_directories(plan, &ownership, &mut report)?;
        self.write_configs(plan, &ownership, &mut report)?;
        self.relocate_alternate_proxy(plan, &mut report)?;
        if !report.files_written.is_empty() || self.pending().is_pending(CACHE_PROXY) {
            self.restart_cache_proxy(plan.dry_run, &mut report)?;
            self.reload_monitor(plan.dry_run, &mut report)?;
        }

        info!(
            dry_run = report.dry_run,
            package_installed = report.package_installed,
            directories_created = report.directories_created.len(),
            files_written = report.files_written.len(),
            files_unchanged = report.files_unchanged.len(),
            proxy_files_relocated = report.proxy_files_relocated.len(),
            services_restarted = ?report.services_restarted,
            "reconcile finished"
        );
        Ok(report)
    }

    fn ensure_package(&self, dry_run: bool) -> FsOpsResult<bool> {
        let package = &self.settings.package;
        if dry_run {
            return Ok(false);
        }
        match self.runner.run(&package.verify) {
            Ok(outcome) if outcome.success() => return Ok(false),
            Ok(outcome) => {
                info!(status = ?outcome.status, "caching proxy package missing, installing");
            }
            Err(FsOpsError::CommandSpawn { program, .. }) => {
                info!(program = %program, "caching proxy binary missing, installing");
            }
            Err(err) => return Err(err),
        }
        self.run_required("package", &package.install)?;
        Ok(true)
    }

    fn ensure_directories(
        &self,
        plan: &ReconcilePlan,
        ownership: &Ownership,
        report: &mut ReconcileReport,
    ) -> FsOpsResult<()> {
        for dir in &plan.directories {
            let created = if plan.dry_run {
                !dir.is_dir()
            } else {
                ensure_directory(dir, CACHE_DIR_MODE, Some(ownership))?
            };
            if created {
                info!(path = %dir.display(), owner = %ownership.label, "directory created");
                report.directories_created.push(dir.clone());
            }
        }
        if !plan.dry_run {
            self.metrics
                .add_directories_created(report.directories_created.len() as u64);
        }
        Ok(())
    }

    fn write_configs(
        &self,
        plan: &ReconcilePlan,
        ownership: &Ownership,
        report: &mut ReconcileReport,
    ) -> FsOpsResult<()> {
        for config in &plan.configs {
            let written = if plan.dry_run {
                would_change(&config.path, &config.content)?
            } else {
                if would_change(&config.path, &config.content)? {
                    self.pending().mark(CACHE_PROXY)?;
                }
                write_if_changed(&config.path, &config.content, config.mode, Some(ownership))?
                    == WriteOutcome::Written
            };
            if written {
                info!(kind = %config.kind, path = %config.path.display(), "config written");
                if !plan.dry_run {
                    self.metrics.inc_file_written(config.kind.as_str());
                }
                report.files_written.push(config.path.clone());
            } else {
                report.files_unchanged.push(config.path.clone());
            }
        }
        Ok(())
    }

    fn relocate_alternate_proxy(
        &self,
        plan: &ReconcilePlan,
        report: &mut ReconcileReport,
    ) -> FsOpsResult<()> {
        if !plan.facts.has_alternate_proxy {
            return Ok(());
        }
        let relocations = plan_relocations(
            &self.settings.alternate_proxy.server_dir,
            KEEP_PREFIX,
            plan.facts.target_port,
        )?;
        if !plan.dry_run && !relocations.is_empty() {
            self.pending().mark(ALTERNATE_PROXY)?;
        }
        for relocation in &relocations {
            if !plan.dry_run {
                apply_relocation(relocation)?;
                self.metrics.inc_file_written(ServiceKind::AlternateProxy.as_str());
            }
            info!(
                from = %relocation.from.display(),
                to = %relocation.to.display(),
                target_port = plan.facts.target_port,
                "alternate proxy server relocated"
            );
            report.proxy_files_relocated.push(relocation.to.clone());
        }
        if !relocations.is_empty() || self.pending().is_pending(ALTERNATE_PROXY) {
            if !plan.dry_run {
                self.run_required(ALTERNATE_PROXY, &self.settings.alternate_proxy.restart)?;
                self.pending().clear(ALTERNATE_PROXY)?;
            }
            self.record_restart(ServiceKind::AlternateProxy, plan.dry_run, report);
        }
        Ok(())
    }

    fn restart_cache_proxy(&self, dry_run: bool, report: &mut ReconcileReport) -> FsOpsResult<()> {
        if !dry_run {
            self.run_required(CACHE_PROXY, &self.settings.services.cache_proxy_restart)?;
            self.pending().clear(CACHE_PROXY)?;
        }
        self.record_restart(ServiceKind::CacheProxy, dry_run, report);
        Ok(())
    }

    fn reload_monitor(&self, dry_run: bool, report: &mut ReconcileReport) -> FsOpsResult<()> {
        if dry_run {
            self.record_restart(ServiceKind::Monitor, dry_run, report);
            return Ok(());
        }
        let command = &self.settings.services.monitor_reload;
        match self.runner.run(command) {
            Ok(outcome) if outcome.success() => {
                self.record_restart(ServiceKind::Monitor, dry_run, report);
            }
            Ok(outcome) => warn!(
                status = ?outcome.status,
                stderr = %outcome.stderr,
                "monitor reload failed; continuing"
            ),
            Err(FsOpsError::CommandSpawn { program, source }) => warn!(
                program = %program,
                error = %source,
                "monitor reload could not start; continuing"
            ),
            Err(err) => return Err(err),
        }
        Ok(())
    }

    fn pending(&self) -> PendingRestarts {
        PendingRestarts::new(&self.settings.cache.dir)
    }

    fn run_required(&self, step: &'static str, command: &[String]) -> FsOpsResult<()> {
        let outcome = self.runner.run(command)?;
        if outcome.success() {
            return Ok(());
        }
        Err(FsOpsError::CommandFailed {
            step,
            command: command.join(" "),
            status: outcome.status,
            stderr: outcome.stderr,
        })
    }

    fn record_restart(&self, service: ServiceKind, dry_run: bool, report: &mut ReconcileReport) {
        if !dry_run {
            info!(service = service.as_str(), "service restarted");
            self.metrics.inc_service_restart(service.as_str());
        }
        report.services_restarted.push(service);
    }
}
