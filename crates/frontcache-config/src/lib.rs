#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Host sizing, environment facts, and settings for the cache front provisioner.
//!
//! Layout: `sizing.rs` (machine classes and tuning profiles), `model.rs`
//! (environment facts and settings documents), `loader.rs` (settings file
//! loading), `validate.rs` (field validation), `defaults.rs` (built-in values).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod sizing;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::load_settings;
pub use model::{
    AlternateProxySettings, BackendSettings, CacheSettings, EnvironmentFacts, FactsBuilder,
    PackageSettings, PathSettings, PolicySettings, ServiceSettings, Settings,
};
pub use sizing::{
    CacheSpec, DEFAULT_PROFILE, MachineClass, ResolvedProfile, SizeProfileResolver, TuningProfile,
};
