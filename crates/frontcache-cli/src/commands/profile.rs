use frontcache_config::Settings;
use frontcache_telemetry::Metrics;

use crate::cli::{OutputFormat, ProfileArgs};
use crate::client::CliResult;
use crate::commands::resolve_profile;
use crate::output::{emit, profile_table};

pub(crate) fn handle_profile(
    settings: &Settings,
    args: &ProfileArgs,
    format: OutputFormat,
    metrics: &Metrics,
) -> CliResult<()> {
    let resolved = resolve_profile(&settings.cache.dir, &args.class, metrics);
    emit(&resolved, &profile_table(&args.class, &resolved), format)
}
