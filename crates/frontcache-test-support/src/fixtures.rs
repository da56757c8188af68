//! Test fixtures and scratch filesystem roots.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use frontcache_config::{EnvironmentFacts, Settings};
use tempfile::TempDir;

/// Facts for a typical application host.
#[must_use]
pub fn sample_facts(has_alternate_proxy: bool) -> EnvironmentFacts {
    EnvironmentFacts {
        owner_user: "deploy".to_string(),
        owner_group: "deploy".to_string(),
        private_hostname: "ip-10-0-0-12.ec2.internal".to_string(),
        has_alternate_proxy,
        target_port: 8081,
    }
}

/// Scratch host root: every path the provisioner touches lives below it.
pub struct HostRoot {
    temp: TempDir,
}

impl HostRoot {
    /// Create an empty root.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("frontcache-host-")
            .tempdir()
            .context("failed to create scratch host root")?;
        Ok(Self { temp })
    }

    /// Root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Absolute path for `relative` under the root.
    #[must_use]
    pub fn join(&self, relative: &str) -> PathBuf {
        self.temp.path().join(relative.trim_start_matches('/'))
    }

    /// Settings with every file and directory redirected under the root.
    #[must_use]
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.paths.monitor_config = self.join("etc/monit.d/varnishd.monitrc");
        settings.paths.policy_config = self.join("etc/varnish/app.vcl");
        settings.paths.pid_dir = self.join("var/run");
        settings.cache.dir = self.join("data/varnish");
        settings.alternate_proxy.server_dir = self.join("etc/nginx/servers");
        settings
    }

    /// Facts owned by whoever runs the tests, so ownership changes succeed
    /// without privileges. Owner and group are numeric ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the root's metadata cannot be read.
    pub fn facts(&self, has_alternate_proxy: bool) -> Result<EnvironmentFacts> {
        let (uid, gid) = self.owner_ids()?;
        Ok(EnvironmentFacts {
            owner_user: uid.to_string(),
            owner_group: gid.to_string(),
            ..sample_facts(has_alternate_proxy)
        })
    }

    /// Write `contents` to `relative`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories or file cannot be written.
    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    #[cfg(unix)]
    fn owner_ids(&self) -> Result<(u32, u32)> {
        use std::os::unix::fs::MetadataExt;

        let metadata = fs::metadata(self.path()).context("failed to stat scratch host root")?;
        Ok((metadata.uid(), metadata.gid()))
    }

    #[cfg(not(unix))]
    fn owner_ids(&self) -> Result<(u32, u32)> {
        Ok((0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_stay_inside_the_root() -> Result<()> {
        let root = HostRoot::new()?;
        let settings = root.settings();
        for path in [
            &settings.paths.monitor_config,
            &settings.paths.policy_config,
            &settings.paths.pid_dir,
            &settings.cache.dir,
            &settings.alternate_proxy.server_dir,
        ] {
            assert!(path.starts_with(root.path()), "{}", path.display());
        }
        Ok(())
    }

    #[test]
    fn facts_use_numeric_owner_ids() -> Result<()> {
        let root = HostRoot::new()?;
        let facts = root.facts(false)?;
        assert!(facts.owner_user.parse::<u32>().is_ok());
        assert!(facts.owner_group.parse::<u32>().is_ok());
        Ok(())
    }
}
