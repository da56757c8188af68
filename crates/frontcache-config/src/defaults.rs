//! Built-in paths, ports, and commands used when the settings file is silent.
//!
//! # Design
//! - Centralize defaults so the loader, CLI help, and tests agree.
//! - Paths match the layout of the hosts this tool provisions.

/// Monitoring daemon stanza for the caching proxy.
pub const MONITOR_CONFIG_PATH: &str = "/etc/monit.d/varnishd.monitrc";
/// Cache-policy script loaded by `varnishd -f`.
pub const POLICY_CONFIG_PATH: &str = "/etc/varnish/app.vcl";
/// Directory holding pidfiles for the caching proxy.
pub const PID_DIR: &str = "/var/run";
/// Caching proxy binary.
pub const VARNISHD_BINARY: &str = "/usr/sbin/varnishd";
/// Directory holding the storage backing file.
pub const CACHE_DIR: &str = "/data/varnish";
/// Port of the management listener bound on the private host name.
pub const ADMIN_PORT: u16 = 6082;
/// Minimum threads kept alive per pool.
pub const THREAD_POOL_MIN: u32 = 100;
/// Mode applied to rendered configuration files.
pub const CONFIG_FILE_MODE: u32 = 0o644;
/// Mode applied to the cache directory.
pub const CACHE_DIR_MODE: u32 = 0o755;

/// Backend host the cache forwards misses to.
pub const BACKEND_HOST: &str = "127.0.0.1";
/// Port the application server listens on behind the cache.
pub const TARGET_PORT: u16 = 8081;

/// Front port used when no alternate proxy holds port 80.
pub const FRONT_PORT_DIRECT: u16 = 80;
/// Front port used when an alternate proxy is present and owns port 80.
pub const FRONT_PORT_BEHIND_ALTERNATE: u16 = 81;

/// Directory with the alternate proxy's virtual server files.
pub const ALTERNATE_SERVER_DIR: &str = "/etc/nginx/servers";
/// Prefix marking alternate proxy files that were already rewritten.
pub const KEEP_PREFIX: &str = "keep.";

/// URL prefix whose cache entries vary by session.
pub const PERSONALIZED_PREFIX: &str = "/account";
/// Cookie carrying the session identifier.
pub const SESSION_COOKIE: &str = "_session_id";
/// Cookie flagging a logged-in browser.
pub const LOGGED_IN_COOKIE: &str = "logged_in";

/// Command restarting the caching proxy.
pub const CACHE_PROXY_RESTART: &[&str] = &["/etc/init.d/varnish", "restart"];
/// Command reloading the monitoring daemon.
pub const MONITOR_RELOAD: &[&str] = &["/usr/bin/monit", "reload"];
/// Command restarting the alternate front proxy.
pub const ALTERNATE_PROXY_RESTART: &[&str] = &["/etc/init.d/nginx", "restart"];
/// Command verifying that the caching proxy package is installed.
pub const PACKAGE_VERIFY: &[&str] = &["/usr/sbin/varnishd", "-V"];
/// Command installing the caching proxy package.
pub const PACKAGE_INSTALL: &[&str] = &["/usr/bin/emerge", "--noreplace", "www-servers/varnish"];

pub(crate) fn command(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| (*part).to_string()).collect()
}
