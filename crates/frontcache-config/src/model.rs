//! Environment facts and the settings document.
//!
//! # Design
//! - Facts are detected once per run and threaded through calls as an immutable value.
//! - Settings sections default independently so a partial JSON file is valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};

/// Host facts gathered before rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentFacts {
    /// Account that owns the rendered files and cache directory.
    pub owner_user: String,
    /// Group that owns the rendered files and cache directory.
    pub owner_group: String,
    /// Private DNS name of the host.
    pub private_hostname: String,
    /// Whether an alternate front proxy is installed on the host.
    pub has_alternate_proxy: bool,
    /// Port of the application server behind the cache.
    pub target_port: u16,
}

impl EnvironmentFacts {
    /// Port the caching proxy listens on.
    #[must_use]
    pub const fn front_port(&self) -> u16 {
        if self.has_alternate_proxy {
            defaults::FRONT_PORT_BEHIND_ALTERNATE
        } else {
            defaults::FRONT_PORT_DIRECT
        }
    }

    /// Re-check that every required fact is present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingFact` for the first empty fact.
    pub fn ensure_complete(&self) -> ConfigResult<()> {
        let required: [(&'static str, &str); 3] = [
            ("owner_user", self.owner_user.as_str()),
            ("owner_group", self.owner_group.as_str()),
            ("private_hostname", self.private_hostname.as_str()),
        ];
        if let Some((fact, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::MissingFact { fact: *fact });
        }
        if self.target_port == 0 {
            return Err(ConfigError::MissingFact {
                fact: "target_port",
            });
        }
        Ok(())
    }
}

/// Collects facts from probes and flags; `build` rejects anything missing.
#[derive(Debug, Clone, Default)]
pub struct FactsBuilder {
    owner_user: Option<String>,
    owner_group: Option<String>,
    private_hostname: Option<String>,
    has_alternate_proxy: bool,
    target_port: Option<u16>,
}

impl FactsBuilder {
    /// Start with no facts recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the owning account; the group defaults to the same name.
    #[must_use]
    pub fn owner(mut self, user: impl Into<String>) -> Self {
        self.owner_user = Some(user.into());
        self
    }

    /// Record the owning group.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.owner_group = Some(group.into());
        self
    }

    /// Record the private host name.
    #[must_use]
    pub fn private_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.private_hostname = Some(hostname.into());
        self
    }

    /// Record whether an alternate front proxy is installed.
    #[must_use]
    pub const fn alternate_proxy(mut self, present: bool) -> Self {
        self.has_alternate_proxy = present;
        self
    }

    /// Record the application server port.
    #[must_use]
    pub const fn target_port(mut self, port: u16) -> Self {
        self.target_port = Some(port);
        self
    }

    /// Produce the immutable fact set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingFact` when a required value was never supplied
    /// or is blank.
    pub fn build(self) -> ConfigResult<EnvironmentFacts> {
        let owner_user = non_blank(self.owner_user, "owner_user")?;
        let owner_group = match self.owner_group {
            Some(group) => non_blank(Some(group), "owner_group")?,
            None => owner_user.clone(),
        };
        let private_hostname = non_blank(self.private_hostname, "private_hostname")?;
        let target_port = self.target_port.unwrap_or(defaults::TARGET_PORT);

        let facts = EnvironmentFacts {
            owner_user,
            owner_group,
            private_hostname,
            has_alternate_proxy: self.has_alternate_proxy,
            target_port,
        };
        facts.ensure_complete()?;
        Ok(facts)
    }
}

fn non_blank(value: Option<String>, fact: &'static str) -> ConfigResult<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingFact { fact })
}

/// Complete settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Output locations.
    pub paths: PathSettings,
    /// Backend the cache forwards to.
    pub backend: BackendSettings,
    /// Cache storage location.
    pub cache: CacheSettings,
    /// Cache-key variation for personalised pages.
    pub policy: PolicySettings,
    /// Alternate front proxy rewrite.
    pub alternate_proxy: AlternateProxySettings,
    /// Service control commands.
    pub services: ServiceSettings,
    /// Package verification and installation commands.
    pub package: PackageSettings,
}

/// Output locations of rendered files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathSettings {
    /// Monitoring daemon stanza.
    pub monitor_config: PathBuf,
    /// Cache-policy script.
    pub policy_config: PathBuf,
    /// Directory for the proxy pidfile.
    pub pid_dir: PathBuf,
    /// Caching proxy binary referenced by the start program.
    pub varnishd_binary: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            monitor_config: PathBuf::from(defaults::MONITOR_CONFIG_PATH),
            policy_config: PathBuf::from(defaults::POLICY_CONFIG_PATH),
            pid_dir: PathBuf::from(defaults::PID_DIR),
            varnishd_binary: PathBuf::from(defaults::VARNISHD_BINARY),
        }
    }
}

/// Backend definition in the cache-policy script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSettings {
    /// Backend host name or address.
    pub host: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            host: defaults::BACKEND_HOST.to_string(),
        }
    }
}

/// Storage location for the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Directory holding the storage backing file.
    pub dir: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(defaults::CACHE_DIR),
        }
    }
}

/// Cache-key variation for pages that differ per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicySettings {
    /// URL prefix whose entries vary by session.
    pub personalized_prefix: String,
    /// Session identifier cookie name.
    pub session_cookie: String,
    /// Logged-in flag cookie name.
    pub logged_in_cookie: String,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            personalized_prefix: defaults::PERSONALIZED_PREFIX.to_string(),
            session_cookie: defaults::SESSION_COOKIE.to_string(),
            logged_in_cookie: defaults::LOGGED_IN_COOKIE.to_string(),
        }
    }
}

/// Rewrite applied to the alternate front proxy when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlternateProxySettings {
    /// Directory with the proxy's server files; its presence marks the proxy installed.
    pub server_dir: PathBuf,
    /// Command restarting the proxy after a rewrite.
    pub restart: Vec<String>,
}

impl Default for AlternateProxySettings {
    fn default() -> Self {
        Self {
            server_dir: PathBuf::from(defaults::ALTERNATE_SERVER_DIR),
            restart: defaults::command(defaults::ALTERNATE_PROXY_RESTART),
        }
    }
}

/// Service control commands, run in field order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceSettings {
    /// Restart command for the caching proxy.
    pub cache_proxy_restart: Vec<String>,
    /// Reload command for the monitoring daemon.
    pub monitor_reload: Vec<String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache_proxy_restart: defaults::command(defaults::CACHE_PROXY_RESTART),
            monitor_reload: defaults::command(defaults::MONITOR_RELOAD),
        }
    }
}

/// Package verification and installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageSettings {
    /// Exits zero when the package is installed.
    pub verify: Vec<String>,
    /// Installs the package.
    pub install: Vec<String>,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            verify: defaults::command(defaults::PACKAGE_VERIFY),
            install: defaults::command(defaults::PACKAGE_INSTALL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> FactsBuilder {
        FactsBuilder::new()
            .owner("deploy")
            .private_hostname("ip-10-0-0-12.ec2.internal")
    }

    #[test]
    fn builder_defaults_group_and_target_port() -> ConfigResult<()> {
        let facts = builder().build()?;
        assert_eq!(facts.owner_group, "deploy");
        assert_eq!(facts.target_port, defaults::TARGET_PORT);
        assert!(!facts.has_alternate_proxy);
        Ok(())
    }

    #[test]
    fn builder_rejects_missing_private_hostname() {
        let result = FactsBuilder::new().owner("deploy").build();
        assert!(matches!(
            result,
            Err(ConfigError::MissingFact {
                fact: "private_hostname"
            })
        ));

        let blank = FactsBuilder::new()
            .owner("deploy")
            .private_hostname("   ")
            .build();
        assert!(matches!(
            blank,
            Err(ConfigError::MissingFact {
                fact: "private_hostname"
            })
        ));
    }

    #[test]
    fn builder_rejects_missing_owner_and_zero_port() {
        assert!(matches!(
            FactsBuilder::new().private_hostname("host").build(),
            Err(ConfigError::MissingFact { fact: "owner_user" })
        ));
        assert!(matches!(
            builder().target_port(0).build(),
            Err(ConfigError::MissingFact {
                fact: "target_port"
            })
        ));
    }

    #[test]
    fn front_port_follows_alternate_proxy_presence() -> ConfigResult<()> {
        assert_eq!(builder().build()?.front_port(), 80);
        assert_eq!(builder().alternate_proxy(true).build()?.front_port(), 81);
        Ok(())
    }

    #[test]
    fn settings_sections_default_independently() -> Result<(), serde_json::Error> {
        let settings: Settings = serde_json::from_str(r#"{"cache": {"dir": "/mnt/varnish"}}"#)?;
        assert_eq!(settings.cache.dir, PathBuf::from("/mnt/varnish"));
        assert_eq!(settings.paths, PathSettings::default());
        assert_eq!(
            settings.services.monitor_reload,
            vec!["/usr/bin/monit".to_string(), "reload".to_string()]
        );
        Ok(())
    }

    #[test]
    fn settings_reject_unknown_fields() {
        let result = serde_json::from_str::<Settings>(r#"{"cache": {"directory": "/x"}}"#);
        assert!(result.is_err());
    }
}
