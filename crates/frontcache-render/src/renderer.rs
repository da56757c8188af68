//! `TemplateRenderer`: profile plus facts in, rendered files out.
//!
//! # Design
//! - Inputs are validated up front; a missing fact fails before anything is produced.
//! - Output is a pure function of `(settings, profile, facts)`.

use frontcache_config::defaults::CONFIG_FILE_MODE;
use frontcache_config::{EnvironmentFacts, Settings, TuningProfile};
use frontcache_policy::{Backend, CacheKeyConfig, VclParams, emit_vcl};
use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::model::{ConfigKind, RenderedConfig};
use crate::monitor::render_monitor;

/// Renders the monitoring stanza and the cache-policy script.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    settings: Settings,
}

impl TemplateRenderer {
    /// Build a renderer over validated settings.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Parameters for the cache-policy script.
    #[must_use]
    pub fn vcl_params(&self, facts: &EnvironmentFacts) -> VclParams {
        let policy = &self.settings.policy;
        VclParams {
            backend: Backend {
                host: self.settings.backend.host.clone(),
                port: facts.target_port,
            },
            cache_key: CacheKeyConfig {
                personalized_prefix: policy.personalized_prefix.clone(),
                session_cookie: policy.session_cookie.clone(),
                logged_in_cookie: policy.logged_in_cookie.clone(),
            },
        }
    }

    /// Render both files, monitoring stanza first.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::MissingFact` when a required fact is blank and
    /// `RenderError::InvalidInput` when the profile fails validation.
    pub fn render(
        &self,
        profile: &TuningProfile,
        facts: &EnvironmentFacts,
    ) -> RenderResult<Vec<RenderedConfig>> {
        facts.ensure_complete()?;
        profile.validate()?;
        if self.settings.backend.host.trim().is_empty() {
            return Err(RenderError::MissingFact {
                fact: "backend_host",
            });
        }

        let monitor = self.file(
            ConfigKind::Monitor,
            render_monitor(profile, facts, &self.settings.paths),
            facts,
        );
        let policy = self.file(
            ConfigKind::CachePolicy,
            emit_vcl(&self.vcl_params(facts)),
            facts,
        );
        debug!(
            front_port = facts.front_port(),
            thread_pools = profile.thread_pools,
            "rendered cache front configuration"
        );
        Ok(vec![monitor, policy])
    }

    fn file(&self, kind: ConfigKind, content: String, facts: &EnvironmentFacts) -> RenderedConfig {
        let path = match kind {
            ConfigKind::Monitor => self.settings.paths.monitor_config.clone(),
            ConfigKind::CachePolicy => self.settings.paths.policy_config.clone(),
        };
        RenderedConfig {
            kind,
            path,
            content,
            mode: CONFIG_FILE_MODE,
            owner: facts.owner_user.clone(),
            group: facts.owner_group.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use frontcache_config::{MachineClass, SizeProfileResolver};
    use frontcache_test_support::fixtures::sample_facts;

    use super::*;

    fn profile() -> TuningProfile {
        SizeProfileResolver::new("/data/varnish").profile_for(MachineClass::Large)
    }

    #[test]
    fn renders_monitor_then_policy_with_ownership() -> anyhow::Result<()> {
        let renderer = TemplateRenderer::new(Settings::default());
        let files = renderer.render(&profile(), &sample_facts(false))?;

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].kind, ConfigKind::Monitor);
        assert_eq!(files[0].path.to_str(), Some("/etc/monit.d/varnishd.monitrc"));
        assert_eq!(files[1].kind, ConfigKind::CachePolicy);
        assert_eq!(files[1].path.to_str(), Some("/etc/varnish/app.vcl"));
        for file in &files {
            assert_eq!(file.owner, "deploy");
            assert_eq!(file.group, "deploy");
            assert_eq!(file.mode, 0o644);
        }
        Ok(())
    }

    #[test]
    fn identical_inputs_render_identical_bytes() -> anyhow::Result<()> {
        let renderer = TemplateRenderer::new(Settings::default());
        let first = renderer.render(&profile(), &sample_facts(true))?;
        let second = renderer.render(&profile(), &sample_facts(true))?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn backend_port_follows_target_port() -> anyhow::Result<()> {
        let renderer = TemplateRenderer::new(Settings::default());
        let mut facts = sample_facts(false);
        facts.target_port = 9292;
        let files = renderer.render(&profile(), &facts)?;
        assert!(files[1].content.contains(".port = \"9292\";"));
        Ok(())
    }

    #[test]
    fn missing_private_hostname_fails_before_rendering() {
        let renderer = TemplateRenderer::new(Settings::default());
        let mut facts = sample_facts(false);
        facts.private_hostname = String::new();
        assert!(matches!(
            renderer.render(&profile(), &facts),
            Err(RenderError::MissingFact {
                fact: "private_hostname"
            })
        ));
    }

    #[test]
    fn invalid_profile_is_rejected() {
        let renderer = TemplateRenderer::new(Settings::default());
        let mut profile = profile();
        profile.overflow_max = 0;
        assert!(matches!(
            renderer.render(&profile, &sample_facts(false)),
            Err(RenderError::InvalidInput { .. })
        ));
    }
}
