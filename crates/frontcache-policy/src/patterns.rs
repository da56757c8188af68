//! Regular expressions shared by the evaluator and the emitted VCL.
//!
//! The source strings are written verbatim into the script; the compiled forms
//! drive in-process evaluation.

use once_cell::sync::OnceCell;
use regex::Regex;

pub(crate) const MUTATING_METHODS: &str = "^(POST|PUT|DELETE|PATCH)$";
pub(crate) const AUTH_PATHS: &str = "^/(auth|login)";
pub(crate) const STATIC_ASSETS: &str = r"\.(png|gif|jpg|swf|css|js)$";
pub(crate) const PRECOMPRESSED: &str = r"\.(jpg|png|gif|gz|tgz|bz2|tbz|mp3|ogg)$";
pub(crate) const HTTPS_PROTO: &str = "(?i)https";
pub(crate) const NO_CACHE: &str = "(no-cache|private)";
pub(crate) const MAX_AGE: &str = "max-age";

/// A built-in pattern compiled on first use. Matching never panics: a
/// pattern that fails to compile matches nothing.
pub(crate) struct Pattern {
    source: &'static str,
    compiled: OnceCell<Option<Regex>>,
}

impl Pattern {
    const fn new(source: &'static str) -> Self {
        Self {
            source,
            compiled: OnceCell::new(),
        }
    }

    fn regex(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| Regex::new(self.source).ok())
            .as_ref()
    }

    pub(crate) fn is_match(&self, haystack: &str) -> bool {
        self.regex().is_some_and(|regex| regex.is_match(haystack))
    }
}

pub(crate) static MUTATING_METHODS_RE: Pattern = Pattern::new(MUTATING_METHODS);
pub(crate) static AUTH_PATHS_RE: Pattern = Pattern::new(AUTH_PATHS);
pub(crate) static STATIC_ASSETS_RE: Pattern = Pattern::new(STATIC_ASSETS);
pub(crate) static PRECOMPRESSED_RE: Pattern = Pattern::new(PRECOMPRESSED);
pub(crate) static HTTPS_PROTO_RE: Pattern = Pattern::new(HTTPS_PROTO);
pub(crate) static NO_CACHE_RE: Pattern = Pattern::new(NO_CACHE);
pub(crate) static MAX_AGE_RE: Pattern = Pattern::new(MAX_AGE);
