//! Prometheus-backed counters describing what a provisioning run changed.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - A run is a short-lived process, so counters are exported as a textfile
//!   for a node exporter to pick up rather than served over HTTP.

use std::fs;
use std::path::Path;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry for one provisioning run.
#[derive(Clone)]
pub struct Metrics {
    inner: std::sync::Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    files_written_total: IntCounterVec,
    service_restarts_total: IntCounterVec,
    profile_fallbacks_total: IntCounter,
    directories_created_total: IntCounter,
}

/// Snapshot of the run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Monitoring stanzas written.
    pub monitor_files_written: u64,
    /// Cache-policy scripts written.
    pub cache_policy_files_written: u64,
    /// Alternate-proxy server files relocated.
    pub alternate_proxy_files_written: u64,
    /// Successful caching-proxy restarts.
    pub cache_proxy_restarts: u64,
    /// Successful monitor reloads.
    pub monitor_reloads: u64,
    /// Successful alternate-proxy restarts.
    pub alternate_proxy_restarts: u64,
    /// Runs that fell back to the default tuning profile.
    pub profile_fallbacks: u64,
    /// Directories created.
    pub directories_created: u64,
}

impl Metrics {
    /// Construct a registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let files_written_total = register(
            &registry,
            "frontcache_files_written_total",
            IntCounterVec::new(
                Opts::new(
                    "frontcache_files_written_total",
                    "Managed files whose content changed, by kind",
                ),
                &["kind"],
            ),
        )?;
        let service_restarts_total = register(
            &registry,
            "frontcache_service_restarts_total",
            IntCounterVec::new(
                Opts::new(
                    "frontcache_service_restarts_total",
                    "Service restarts or reloads issued, by service",
                ),
                &["service"],
            ),
        )?;
        let profile_fallbacks_total = register(
            &registry,
            "frontcache_profile_fallbacks_total",
            IntCounter::with_opts(Opts::new(
                "frontcache_profile_fallbacks_total",
                "Unrecognised machine classes resolved to the default profile",
            )),
        )?;
        let directories_created_total = register(
            &registry,
            "frontcache_directories_created_total",
            IntCounter::with_opts(Opts::new(
                "frontcache_directories_created_total",
                "Directories created by the provisioner",
            )),
        )?;

        Ok(Self {
            inner: std::sync::Arc::new(MetricsInner {
                registry,
                files_written_total,
                service_restarts_total,
                profile_fallbacks_total,
                directories_created_total,
            }),
        })
    }

    /// Count a written file of `kind`.
    pub fn inc_file_written(&self, kind: &str) {
        self.inner
            .files_written_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Count a restart or reload of `service`.
    pub fn inc_service_restart(&self, service: &str) {
        self.inner
            .service_restarts_total
            .with_label_values(&[service])
            .inc();
    }

    /// Count a fallback to the default tuning profile.
    pub fn inc_profile_fallback(&self) {
        self.inner.profile_fallbacks_total.inc();
    }

    /// Count `count` created directories.
    pub fn add_directories_created(&self, count: u64) {
        self.inner.directories_created_total.inc_by(count);
    }

    /// Render the registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Write the rendered registry to `path`, replacing any previous export.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails or the file cannot be written.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let rendered = self.render()?;
        let staging = path.with_extension("prom.tmp");
        fs::write(&staging, rendered)
            .and_then(|()| fs::rename(&staging, path))
            .map_err(|source| TelemetryError::MetricsWrite {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Take a point-in-time snapshot of the run counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let files = |kind: &str| {
            self.inner
                .files_written_total
                .with_label_values(&[kind])
                .get()
        };
        let restarts = |service: &str| {
            self.inner
                .service_restarts_total
                .with_label_values(&[service])
                .get()
        };
        MetricsSnapshot {
            monitor_files_written: files("monitor"),
            cache_policy_files_written: files("cache_policy"),
            alternate_proxy_files_written: files("alternate_proxy"),
            cache_proxy_restarts: restarts("cache_proxy"),
            monitor_reloads: restarts("monitor"),
            alternate_proxy_restarts: restarts("alternate_proxy"),
            profile_fallbacks: self.inner.profile_fallbacks_total.get(),
            directories_created: self.inner.directories_created_total.get(),
        }
    }
}

fn register<C>(
    registry: &Registry,
    name: &'static str,
    collector: prometheus::Result<C>,
) -> Result<C>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    let collector = collector.map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(collector)
}
