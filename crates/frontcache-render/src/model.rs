//! Rendered file descriptors handed to the reconciler.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use serde::Serialize;

/// Which configuration a rendered file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKind {
    /// Monitoring daemon stanza.
    Monitor,
    /// Cache-policy script.
    CachePolicy,
}

impl ConfigKind {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monitor => "monitor",
            Self::CachePolicy => "cache_policy",
        }
    }
}

impl Display for ConfigKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A file the reconciler should converge to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedConfig {
    /// What the file configures.
    pub kind: ConfigKind,
    /// Destination path.
    pub path: PathBuf,
    /// Full file contents.
    pub content: String,
    /// Permission bits.
    pub mode: u32,
    /// Owning account.
    pub owner: String,
    /// Owning group.
    pub group: String,
}
