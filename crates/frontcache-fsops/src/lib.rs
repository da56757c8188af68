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

//! Filesystem and service reconciliation for the cache front.
//!
//! Layout: `files.rs` (directories and write-if-changed), `ownership.rs`
//! (owner/group resolution and chown), `alternate.rs` (alternate-proxy server
//! file relocation), `runner.rs` (external commands), `pending.rs` (restart
//! markers kept across runs), `reconciler.rs` (the ordered workflow and its
//! report).

pub mod alternate;
pub mod error;
pub mod files;
pub mod ownership;
pub mod pending;
pub mod reconciler;
pub mod runner;

pub use alternate::{Relocation, apply_relocation, plan_relocations, rewrite_listen};
pub use error::{FsOpsError, FsOpsResult};
pub use files::{WriteOutcome, ensure_directory, would_change, write_if_changed};
pub use ownership::{Ownership, apply_ownership, resolve_ownership};
pub use pending::PendingRestarts;
pub use reconciler::{ReconcilePlan, ReconcileReport, ServiceKind, ServiceReconciler};
pub use runner::{CommandOutcome, CommandRunner, RecordingRunner, SystemCommandRunner};
