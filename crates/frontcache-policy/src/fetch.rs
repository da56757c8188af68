//! `vcl_fetch`: what happens to a backend response before it is stored.
//!
//! # Design
//! - `no-cache`/`private` is checked before `max-age`, so a response carrying both
//!   is never stored.
//! - Stored responses lose `Set-Cookie` and tell browsers not to cache; the proxy
//!   alone holds the copy for the retention window.

use std::time::Duration;

use serde::Serialize;

use crate::message::Response;
use crate::patterns::{MAX_AGE_RE, NO_CACHE_RE};

/// Retention for cacheable responses.
pub const CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// How long stale objects stay available for grace.
pub const OBJECT_GRACE: Duration = Duration::from_secs(60 * 60);
/// Client-facing `Cache-Control` on stored responses.
pub const CLIENT_CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

/// Storage decision for a backend response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum FetchDecision {
    /// Never cache; remember the decision so later requests skip the policy.
    HitForPass,
    /// Store for `ttl`.
    Cache {
        /// Retention window.
        ttl: Duration,
    },
}

/// One step of `vcl_fetch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchRule {
    /// Keep stale objects around for grace.
    KeepStale,
    /// `no-cache` or `private` responses are never stored.
    HonorNoCache,
    /// `max-age` responses are stored for [`CACHE_TTL`].
    HonorMaxAge,
    /// Anything else is not stored.
    DefaultPass,
}

/// Rule order for `vcl_fetch`.
pub const FETCH_RULES: [FetchRule; 4] = [
    FetchRule::KeepStale,
    FetchRule::HonorNoCache,
    FetchRule::HonorMaxAge,
    FetchRule::DefaultPass,
];

impl FetchRule {
    fn apply(self, response: &mut Response, grace: &mut Duration) -> Option<FetchDecision> {
        let cache_control = response.headers.get("Cache-Control").unwrap_or_default();
        match self {
            Self::KeepStale => {
                *grace = OBJECT_GRACE;
                None
            }
            Self::HonorNoCache => NO_CACHE_RE
                .is_match(cache_control)
                .then_some(FetchDecision::HitForPass),
            Self::HonorMaxAge => {
                if !MAX_AGE_RE.is_match(cache_control) {
                    return None;
                }
                response.headers.remove("Set-Cookie");
                response.headers.set("Cache-Control", CLIENT_CACHE_CONTROL);
                Some(FetchDecision::Cache { ttl: CACHE_TTL })
            }
            Self::DefaultPass => Some(FetchDecision::HitForPass),
        }
    }

    pub(crate) const fn vcl(self) -> &'static str {
        match self {
            Self::KeepStale => "  set beresp.grace = 1h;\n",
            Self::HonorNoCache => {
                r#"  if (beresp.http.Cache-Control ~ "(no-cache|private)") {
    return (hit_for_pass);
  }
"#
            }
            Self::HonorMaxAge => {
                r#"  if (beresp.http.Cache-Control ~ "max-age") {
    unset beresp.http.Set-Cookie;
    set beresp.ttl = 1w;
    set beresp.http.Cache-Control = "no-cache, no-store, must-revalidate";
    return (deliver);
  }
"#
            }
            Self::DefaultPass => "  return (hit_for_pass);\n",
        }
    }
}

/// Result of running a response through `vcl_fetch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    /// Storage decision.
    pub decision: FetchDecision,
    /// Grace window attached to the object.
    pub grace: Duration,
    /// Response after header rewrites.
    pub response: Response,
    /// Rule that produced the decision.
    pub decided_by: FetchRule,
}

impl FetchOutcome {
    /// Whether the response is stored.
    #[must_use]
    pub const fn is_cacheable(&self) -> bool {
        matches!(self.decision, FetchDecision::Cache { .. })
    }
}

/// Run `response` through [`FETCH_RULES`].
#[must_use]
pub fn evaluate_fetch(mut response: Response) -> FetchOutcome {
    let mut grace = Duration::ZERO;
    for rule in FETCH_RULES {
        if let Some(decision) = rule.apply(&mut response, &mut grace) {
            return FetchOutcome {
                decision,
                grace,
                response,
                decided_by: rule,
            };
        }
    }
    FetchOutcome {
        decision: FetchDecision::HitForPass,
        grace,
        response,
        decided_by: FetchRule::DefaultPass,
    }
}
