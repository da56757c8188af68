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

//! Renders the monitoring stanza and cache-policy script for a host.
//!
//! Layout: `model.rs` (rendered file descriptors), `monitor.rs` (monitoring daemon
//! stanza), `renderer.rs` (`TemplateRenderer`), `error.rs`.

pub mod error;
pub mod model;
pub mod monitor;
pub mod renderer;

pub use error::{RenderError, RenderResult};
pub use model::{ConfigKind, RenderedConfig};
pub use renderer::TemplateRenderer;
