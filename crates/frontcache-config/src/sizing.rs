//! Machine-class detection and the size-to-tuning lookup table.
//!
//! # Design
//! - Machine classes are an explicit enum; parsing is exact (after trimming and
//!   lowercasing) so `m2.xlarge` never resolves as `xlarge`.
//! - Unknown classes resolve to [`DEFAULT_PROFILE`] with a warning instead of an error.
//! - The table values are a compatibility contract and are kept verbatim, including
//!   the large thread-pool maxima on `c-xlarge` and `m2-4xlarge`.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};

/// File name of the storage backing file inside the cache directory.
pub const CACHE_FILE_NAME: &str = "varnish_storage.bin";
/// Size of the storage backing file for every machine class.
pub const CACHE_SIZE: &str = "1GB";

/// Detected size tier of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachineClass {
    /// `m1.small`.
    Small,
    /// `m1.large`.
    Large,
    /// `m1.xlarge`.
    #[serde(rename = "xlarge")]
    XLarge,
    /// `c1.medium`.
    #[serde(rename = "c-medium")]
    CMedium,
    /// `c1.xlarge`.
    #[serde(rename = "c-xlarge")]
    CXLarge,
    /// `m2.xlarge`.
    #[serde(rename = "m2-xlarge")]
    M2XLarge,
    /// `m2.2xlarge`.
    #[serde(rename = "m2-2xlarge")]
    M22XLarge,
    /// `m2.4xlarge`.
    #[serde(rename = "m2-4xlarge")]
    M24XLarge,
}

impl MachineClass {
    /// Every recognised class, in table order.
    pub const ALL: [Self; 8] = [
        Self::Small,
        Self::Large,
        Self::XLarge,
        Self::CMedium,
        Self::CXLarge,
        Self::M2XLarge,
        Self::M22XLarge,
        Self::M24XLarge,
    ];

    /// Canonical label used in settings and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Large => "large",
            Self::XLarge => "xlarge",
            Self::CMedium => "c-medium",
            Self::CXLarge => "c-xlarge",
            Self::M2XLarge => "m2-xlarge",
            Self::M22XLarge => "m2-2xlarge",
            Self::M24XLarge => "m2-4xlarge",
        }
    }

    /// Instance-type identifier reported by host metadata.
    #[must_use]
    pub const fn instance_type(self) -> &'static str {
        match self {
            Self::Small => "m1.small",
            Self::Large => "m1.large",
            Self::XLarge => "m1.xlarge",
            Self::CMedium => "c1.medium",
            Self::CXLarge => "c1.xlarge",
            Self::M2XLarge => "m2.xlarge",
            Self::M22XLarge => "m2.2xlarge",
            Self::M24XLarge => "m2.4xlarge",
        }
    }

    /// Parse either the canonical label or the instance-type identifier.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|class| class.as_str() == normalized || class.instance_type() == normalized)
    }

    const fn tuning(self) -> (u32, u32, u32) {
        match self {
            Self::Small => (1, 1_000, 2_000),
            Self::Large | Self::CMedium | Self::M2XLarge => (2, 2_000, 4_000),
            Self::XLarge | Self::M22XLarge => (4, 4_000, 8_000),
            // Aggressive maxima carried over unchanged from the production table.
            Self::CXLarge | Self::M24XLarge => (8, 8_000, 16_000),
        }
    }
}

impl Display for MachineClass {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// File-backed storage specification passed to `varnishd -s`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSpec {
    /// Absolute path of the storage backing file.
    pub path: PathBuf,
    /// Size of the storage file (for example `1GB`).
    pub size: String,
}

impl CacheSpec {
    /// Build the storage specification for a cache directory.
    #[must_use]
    pub fn in_dir(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(CACHE_FILE_NAME),
            size: CACHE_SIZE.to_string(),
        }
    }
}

impl Display for CacheSpec {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "file,{},{}", self.path.display(), self.size)
    }
}

/// Thread and storage tuning for one machine class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningProfile {
    /// Number of worker thread pools.
    pub thread_pools: u32,
    /// Maximum threads per pool.
    pub thread_pool_max: u32,
    /// Maximum queued requests beyond the pool size.
    pub overflow_max: u32,
    /// Storage specification.
    pub cache_spec: CacheSpec,
}

impl TuningProfile {
    /// Verify the profile invariants before it is rendered.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidField` when a counter is zero or the storage
    /// specification is incomplete.
    pub fn validate(&self) -> ConfigResult<()> {
        let counters = [
            ("thread_pools", self.thread_pools),
            ("thread_pool_max", self.thread_pool_max),
            ("overflow_max", self.overflow_max),
        ];
        for (field, value) in counters {
            if value == 0 {
                return Err(ConfigError::invalid(
                    "profile",
                    field,
                    Some(value.to_string()),
                    "must be positive",
                ));
            }
        }
        if !self.cache_spec.path.is_absolute() {
            return Err(ConfigError::invalid(
                "profile",
                "cache_spec.path",
                Some(self.cache_spec.path.display().to_string()),
                "must be absolute",
            ));
        }
        if self.cache_spec.size.trim().is_empty() || self.cache_spec.size.contains(',') {
            return Err(ConfigError::invalid(
                "profile",
                "cache_spec.size",
                Some(self.cache_spec.size.clone()),
                "must be a non-empty size without commas",
            ));
        }
        Ok(())
    }
}

/// Tuning used when the machine class is unknown: `(thread_pools, thread_pool_max, overflow_max)`.
pub const DEFAULT_PROFILE: (u32, u32, u32) = (1, 2_000, 2_000);

/// Outcome of resolving a raw machine-class string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedProfile {
    /// Recognised class, or `None` when the fallback profile was used.
    pub class: Option<MachineClass>,
    /// Resolved tuning values.
    pub profile: TuningProfile,
}

impl ResolvedProfile {
    /// Whether the fallback profile was selected.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        self.class.is_none()
    }
}

/// Maps machine classes to tuning profiles for a fixed cache directory.
#[derive(Debug, Clone)]
pub struct SizeProfileResolver {
    cache_dir: PathBuf,
}

impl SizeProfileResolver {
    /// Build a resolver whose profiles store their cache under `cache_dir`.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Profile for a known class.
    #[must_use]
    pub fn profile_for(&self, class: MachineClass) -> TuningProfile {
        self.build(class.tuning())
    }

    /// Resolve a raw class string, falling back to the default profile.
    #[must_use]
    pub fn resolve(&self, raw: &str) -> ResolvedProfile {
        MachineClass::parse(raw).map_or_else(
            || {
                warn!(
                    machine_class = raw,
                    "unrecognised machine class; using default tuning profile"
                );
                ResolvedProfile {
                    class: None,
                    profile: self.build(DEFAULT_PROFILE),
                }
            },
            |class| ResolvedProfile {
                class: Some(class),
                profile: self.profile_for(class),
            },
        )
    }

    fn build(&self, (thread_pools, thread_pool_max, overflow_max): (u32, u32, u32)) -> TuningProfile {
        TuningProfile {
            thread_pools,
            thread_pool_max,
            overflow_max,
            cache_spec: CacheSpec::in_dir(&self.cache_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> SizeProfileResolver {
        SizeProfileResolver::new("/data/varnish")
    }

    fn tuple(profile: &TuningProfile) -> (u32, u32, u32) {
        (
            profile.thread_pools,
            profile.thread_pool_max,
            profile.overflow_max,
        )
    }

    #[test]
    fn recognised_classes_match_the_table() {
        let expected = [
            ("small", (1, 1_000, 2_000)),
            ("large", (2, 2_000, 4_000)),
            ("xlarge", (4, 4_000, 8_000)),
            ("c-medium", (2, 2_000, 4_000)),
            ("c-xlarge", (8, 8_000, 16_000)),
            ("m2-xlarge", (2, 2_000, 4_000)),
            ("m2-2xlarge", (4, 4_000, 8_000)),
            ("m2-4xlarge", (8, 8_000, 16_000)),
        ];
        let resolver = resolver();
        for (label, values) in expected {
            let resolved = resolver.resolve(label);
            assert!(!resolved.is_fallback(), "{label} should be recognised");
            assert_eq!(tuple(&resolved.profile), values, "{label}");
            assert_eq!(
                resolved.profile.cache_spec.to_string(),
                "file,/data/varnish/varnish_storage.bin,1GB"
            );
        }
    }

    #[test]
    fn instance_type_identifiers_resolve_to_the_same_class() {
        for class in MachineClass::ALL {
            assert_eq!(MachineClass::parse(class.instance_type()), Some(class));
            assert_eq!(MachineClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(MachineClass::parse("  M1.Large \n"), Some(MachineClass::Large));
    }

    #[test]
    fn unknown_and_empty_classes_use_the_default_profile() {
        let resolver = resolver();
        for raw in ["", "   ", "t2.micro", "medium", "XLARGE-ish", "m2.8xlarge"] {
            let resolved = resolver.resolve(raw);
            assert!(resolved.is_fallback(), "{raw:?} should fall back");
            assert_eq!(tuple(&resolved.profile), DEFAULT_PROFILE);
        }
    }

    #[test]
    fn substring_lookalikes_do_not_match_shorter_classes() {
        assert_eq!(MachineClass::parse("m2.xlarge"), Some(MachineClass::M2XLarge));
        assert_eq!(MachineClass::parse("m2.4xlarge"), Some(MachineClass::M24XLarge));
        assert_eq!(MachineClass::parse("cc.xlarge"), None);
    }

    #[test]
    fn every_profile_passes_validation() {
        let resolver = resolver();
        for class in MachineClass::ALL {
            assert!(resolver.profile_for(class).validate().is_ok(), "{class}");
        }
        assert!(resolver.resolve("unknown").profile.validate().is_ok());
    }

    #[test]
    fn validation_rejects_zero_counters_and_relative_paths() {
        let mut profile = resolver().profile_for(MachineClass::Small);
        profile.thread_pools = 0;
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::InvalidField {
                field: "thread_pools",
                ..
            })
        ));

        let relative = SizeProfileResolver::new("relative/cache").profile_for(MachineClass::Large);
        assert!(matches!(
            relative.validate(),
            Err(ConfigError::InvalidField {
                field: "cache_spec.path",
                ..
            })
        ));
    }

    #[test]
    fn machine_class_serializes_with_canonical_labels() -> Result<(), serde_json::Error> {
        for class in MachineClass::ALL {
            let encoded = serde_json::to_string(&class)?;
            assert_eq!(encoded, format!("\"{}\"", class.as_str()));
        }
        Ok(())
    }
}
