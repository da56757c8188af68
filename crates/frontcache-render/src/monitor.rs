//! Monitoring daemon stanza that launches and watches the caching proxy.
//!
//! # Design
//! - The stanza owns the full `varnishd` command line, so every tuning value lands here.
//! - Process, pidfile, and group names carry the front port so stanzas for different
//!   ports never collide.

use std::path::{Path, PathBuf};

use frontcache_config::defaults::{ADMIN_PORT, THREAD_POOL_MIN};
use frontcache_config::{EnvironmentFacts, PathSettings, TuningProfile};

/// Pidfile used by the proxy listening on `port`.
#[must_use]
pub fn pid_file(pid_dir: &Path, port: u16) -> PathBuf {
    pid_dir.join(format!("varnish.{port}.pid"))
}

/// Name of the monitored process for `port`.
#[must_use]
pub fn process_name(port: u16) -> String {
    format!("varnish_{port}")
}

/// Render the stanza.
#[must_use]
pub fn render_monitor(
    profile: &TuningProfile,
    facts: &EnvironmentFacts,
    paths: &PathSettings,
) -> String {
    let port = facts.front_port();
    let name = process_name(port);
    let pid = pid_file(&paths.pid_dir, port);

    let start = [
        paths.varnishd_binary.display().to_string(),
        format!("-a :{port}"),
        format!("-T {}:{ADMIN_PORT}", facts.private_hostname),
        format!("-f {}", paths.policy_config.display()),
        format!("-s {}", profile.cache_spec),
        format!("-P {}", pid.display()),
        format!("-u {}", facts.owner_user),
        format!("-g {}", facts.owner_group),
        format!("-p thread_pools={}", profile.thread_pools),
        format!("-p thread_pool_min={THREAD_POOL_MIN}"),
        format!("-p thread_pool_max={}", profile.thread_pool_max),
        format!("-p overflow_max={}", profile.overflow_max),
        "-p listen_depth=2048".to_string(),
        "-p sess_timeout=10".to_string(),
    ]
    .join(" ");

    format!(
        "# Managed by frontcache. Local edits are overwritten.\n\
         check process {name}\n  \
         with pidfile {pid}\n  \
         start program = \"{start}\"\n  \
         stop program = \"/usr/bin/pkill -f 'varnishd -a :{port}'\"\n  \
         if failed host {host} port {port} protocol http for 3 cycles then restart\n  \
         group {name}\n",
        pid = pid.display(),
        host = facts.private_hostname,
    )
}
