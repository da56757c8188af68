//! Command handlers grouped by concern.

pub(crate) mod apply;
pub(crate) mod policy;
pub(crate) mod profile;
pub(crate) mod render;

use std::path::Path;

use frontcache_config::{ResolvedProfile, SizeProfileResolver};
use frontcache_telemetry::Metrics;

/// Resolve `raw` against the cache directory, counting fallbacks.
pub(crate) fn resolve_profile(cache_dir: &Path, raw: &str, metrics: &Metrics) -> ResolvedProfile {
    let resolved = SizeProfileResolver::new(cache_dir).resolve(raw);
    if resolved.is_fallback() {
        metrics.inc_profile_fallback();
    }
    resolved
}
