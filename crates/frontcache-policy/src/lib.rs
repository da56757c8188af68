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

//! Cache-policy rule tables for the caching proxy.
//!
//! Each VCL subroutine is modelled as an ordered rule list. The list is evaluated
//! top-to-bottom with short-circuit semantics, and the same list emits the VCL
//! text, so the rendered script and the in-process decisions cannot drift apart.
//!
//! Layout: `message.rs` (requests, responses, headers), `recv.rs`, `hash.rs`,
//! `fetch.rs`, `deliver.rs` (one module per subroutine), `patterns.rs` (shared
//! regular expressions), `vcl.rs` (script assembly).

pub mod deliver;
pub mod fetch;
pub mod hash;
pub mod message;
mod patterns;
pub mod recv;
pub mod vcl;

pub use deliver::{
    CACHE_STATUS_HEADER, CacheStatus, REDIRECT_STATUS, SyntheticResponse, deliver_header,
    translate_error,
};
pub use fetch::{FETCH_RULES, FetchDecision, FetchOutcome, FetchRule, evaluate_fetch};
pub use hash::{CacheKeyConfig, hash_inputs};
pub use message::{BackendHealth, Headers, Request, Response};
pub use recv::{BanRule, RECV_RULES, RecvAction, RecvOutcome, RecvRule, evaluate_recv};
pub use vcl::{Backend, VclParams, emit_vcl};
