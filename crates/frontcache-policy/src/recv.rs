//! `vcl_recv`: request normalisation and the pass/lookup/redirect/purge decision.
//!
//! # Design
//! - Rules run in [`RECV_RULES`] order. Normalising rules rewrite the request and
//!   fall through; the first rule that returns an action ends evaluation.
//! - Later rules rely on earlier ones having returned (for example, cookie
//!   stripping never sees a POST), so the order is part of the contract.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use serde::Serialize;

use crate::message::{BackendHealth, Request};
use crate::patterns::{
    AUTH_PATHS_RE, HTTPS_PROTO_RE, MUTATING_METHODS_RE, PRECOMPRESSED_RE, STATIC_ASSETS_RE,
};

/// Grace applied while the backend probe passes.
pub const HEALTHY_GRACE: Duration = Duration::from_secs(30);
/// Grace applied while the backend probe fails.
pub const SICK_GRACE: Duration = Duration::from_secs(60 * 60);

/// Ban expression matching every entry for one host and URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BanRule {
    /// Host header of the purge request.
    pub host: String,
    /// URL of the purge request.
    pub url: String,
}

impl Display for BanRule {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "req.http.host == {} && req.url == {}",
            self.host, self.url
        )
    }
}

/// Terminal decision of `vcl_recv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecvAction {
    /// Look the object up in the cache.
    Lookup,
    /// Send straight to the backend without caching.
    Pass,
    /// Answer with a redirect to the HTTPS location.
    Redirect {
        /// Target of the redirect.
        location: String,
    },
    /// Invalidate matching entries and answer synthetically.
    Purge {
        /// Ban registered for the purge.
        ban: BanRule,
    },
}

/// One step of `vcl_recv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecvRule {
    /// Pick the grace window from backend health.
    Grace,
    /// Collapse `Accept-Encoding` to `gzip`, `deflate`, or nothing.
    NormalizeAcceptEncoding,
    /// Append the client address to `X-Forwarded-For` on the first attempt.
    AppendForwardedFor,
    /// Redirect plain-HTTP requests to HTTPS.
    ForceHttps,
    /// Pass POST, PUT, DELETE, and PATCH.
    PassMutatingMethods,
    /// Pass `/auth` and `/login` paths.
    PassAuthPaths,
    /// Drop cookies on static asset GETs.
    StripStaticCookies,
    /// Turn `PURGE` into a ban.
    Purge,
    /// Everything else is looked up.
    Lookup,
}

/// Rule order for `vcl_recv`.
pub const RECV_RULES: [RecvRule; 9] = [
    RecvRule::Grace,
    RecvRule::NormalizeAcceptEncoding,
    RecvRule::AppendForwardedFor,
    RecvRule::ForceHttps,
    RecvRule::PassMutatingMethods,
    RecvRule::PassAuthPaths,
    RecvRule::StripStaticCookies,
    RecvRule::Purge,
    RecvRule::Lookup,
];

struct RecvState {
    request: Request,
    health: BackendHealth,
    grace: Duration,
}

enum Step {
    Unchanged,
    Rewrote,
    Return(RecvAction),
}

impl RecvRule {
    fn apply(self, state: &mut RecvState) -> Step {
        let request = &mut state.request;
        match self {
            Self::Grace => {
                state.grace = match state.health {
                    BackendHealth::Healthy => HEALTHY_GRACE,
                    BackendHealth::Sick => SICK_GRACE,
                };
                Step::Rewrote
            }
            Self::NormalizeAcceptEncoding => {
                let Some(encoding) = request.headers.get("Accept-Encoding") else {
                    return Step::Unchanged;
                };
                let normalized = if PRECOMPRESSED_RE.is_match(&request.url) {
                    None
                } else if encoding.contains("gzip") {
                    Some("gzip")
                } else if encoding.contains("deflate") {
                    Some("deflate")
                } else {
                    None
                };
                match normalized {
                    Some(value) if value == encoding => Step::Unchanged,
                    Some(value) => {
                        request.headers.set("Accept-Encoding", value);
                        Step::Rewrote
                    }
                    None => {
                        request.headers.remove("Accept-Encoding");
                        Step::Rewrote
                    }
                }
            }
            Self::AppendForwardedFor => {
                if request.restarts != 0 {
                    return Step::Unchanged;
                }
                let client = request.client_ip.to_string();
                let chain = match request.headers.get("X-Forwarded-For") {
                    Some(existing) => format!("{existing}, {client}"),
                    None => client,
                };
                request.headers.set("X-Forwarded-For", chain);
                Step::Rewrote
            }
            Self::ForceHttps => {
                let secure = request
                    .headers
                    .get("X-Forwarded-Proto")
                    .is_some_and(|proto| HTTPS_PROTO_RE.is_match(proto));
                if secure {
                    Step::Unchanged
                } else {
                    Step::Return(RecvAction::Redirect {
                        location: format!("https://{}{}", request.host(), request.url),
                    })
                }
            }
            Self::PassMutatingMethods => {
                if MUTATING_METHODS_RE.is_match(&request.method) {
                    Step::Return(RecvAction::Pass)
                } else {
                    Step::Unchanged
                }
            }
            Self::PassAuthPaths => {
                if AUTH_PATHS_RE.is_match(&request.url) {
                    Step::Return(RecvAction::Pass)
                } else {
                    Step::Unchanged
                }
            }
            Self::StripStaticCookies => {
                if request.method == "GET"
                    && STATIC_ASSETS_RE.is_match(&request.url)
                    && request.headers.remove("Cookie").is_some()
                {
                    Step::Rewrote
                } else {
                    Step::Unchanged
                }
            }
            Self::Purge => {
                if request.method == "PURGE" {
                    Step::Return(RecvAction::Purge {
                        ban: BanRule {
                            host: request.host().to_string(),
                            url: request.url.clone(),
                        },
                    })
                } else {
                    Step::Unchanged
                }
            }
            Self::Lookup => Step::Return(RecvAction::Lookup),
        }
    }

    pub(crate) const fn vcl(self) -> &'static str {
        match self {
            Self::Grace => {
                "  if (req.backend.healthy) {
    set req.grace = 30s;
  } else {
    set req.grace = 1h;
  }
"
            }
            Self::NormalizeAcceptEncoding => {
                r#"  if (req.http.Accept-Encoding) {
    if (req.url ~ "\.(jpg|png|gif|gz|tgz|bz2|tbz|mp3|ogg)$") {
      remove req.http.Accept-Encoding;
    } elsif (req.http.Accept-Encoding ~ "gzip") {
      set req.http.Accept-Encoding = "gzip";
    } elsif (req.http.Accept-Encoding ~ "deflate") {
      set req.http.Accept-Encoding = "deflate";
    } else {
      remove req.http.Accept-Encoding;
    }
  }
"#
            }
            Self::AppendForwardedFor => {
                r#"  if (req.restarts == 0) {
    if (req.http.X-Forwarded-For) {
      set req.http.X-Forwarded-For = req.http.X-Forwarded-For + ", " + client.ip;
    } else {
      set req.http.X-Forwarded-For = client.ip;
    }
  }
"#
            }
            Self::ForceHttps => {
                r#"  if (req.http.X-Forwarded-Proto !~ "(?i)https") {
    error 750 "https://" + req.http.host + req.url;
  }
"#
            }
            Self::PassMutatingMethods => {
                r#"  if (req.request ~ "^(POST|PUT|DELETE|PATCH)$") {
    return (pass);
  }
"#
            }
            Self::PassAuthPaths => {
                r#"  if (req.url ~ "^/(auth|login)") {
    return (pass);
  }
"#
            }
            Self::StripStaticCookies => {
                r#"  if (req.request == "GET" && req.url ~ "\.(png|gif|jpg|swf|css|js)$") {
    unset req.http.cookie;
  }
"#
            }
            Self::Purge => {
                r#"  if (req.request == "PURGE") {
    ban("req.http.host == " + req.http.host + " && req.url == " + req.url);
    error 200 "Purged.";
  }
"#
            }
            Self::Lookup => "  return (lookup);\n",
        }
    }
}

/// Result of running a request through `vcl_recv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecvOutcome {
    /// Terminal decision.
    pub action: RecvAction,
    /// Grace window selected for the request.
    pub grace: Duration,
    /// Request after normalisation.
    pub request: Request,
    /// Rules that rewrote the request or produced the decision, in order.
    pub applied: Vec<RecvRule>,
}

/// Run `request` through [`RECV_RULES`].
#[must_use]
pub fn evaluate_recv(request: Request, health: BackendHealth) -> RecvOutcome {
    let mut state = RecvState {
        request,
        health,
        grace: HEALTHY_GRACE,
    };
    let mut applied = Vec::new();
    let mut action = RecvAction::Lookup;

    for rule in RECV_RULES {
        match rule.apply(&mut state) {
            Step::Unchanged => {}
            Step::Rewrote => applied.push(rule),
            Step::Return(decision) => {
                applied.push(rule);
                action = decision;
                break;
            }
        }
    }

    RecvOutcome {
        action,
        grace: state.grace,
        request: state.request,
        applied,
    }
}
