//! `vcl_hash`: cache key composition.

use regex::escape;
use serde::{Deserialize, Serialize};

use crate::message::Request;

/// Cookies that split the cache for personalised pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKeyConfig {
    /// URL prefix whose entries vary by session.
    pub personalized_prefix: String,
    /// Session identifier cookie.
    pub session_cookie: String,
    /// Logged-in flag cookie.
    pub logged_in_cookie: String,
}

/// Values mixed into the cache key, in hashing order.
///
/// URL and host always participate. Under the personalised prefix the session and
/// logged-in cookie values follow, so anonymous and authenticated variants of the
/// same page occupy different entries.
#[must_use]
pub fn hash_inputs(request: &Request, config: &CacheKeyConfig) -> Vec<String> {
    let mut inputs = vec![request.url.clone(), request.host().to_string()];
    if request.url.starts_with(&config.personalized_prefix) {
        for name in [&config.session_cookie, &config.logged_in_cookie] {
            if let Some(value) = request.cookie(name) {
                inputs.push(value.to_string());
            }
        }
    }
    inputs
}

pub(crate) fn vcl(config: &CacheKeyConfig) -> String {
    let mut body = String::from("  hash_data(req.url);\n  hash_data(req.http.host);\n");
    body.push_str(&format!(
        "  if (req.url ~ \"^{}\") {{\n",
        escape(&config.personalized_prefix)
    ));
    for name in [&config.session_cookie, &config.logged_in_cookie] {
        body.push_str(&cookie_hash(name));
    }
    body.push_str("  }\n  return (hash);\n");
    body
}

fn cookie_hash(name: &str) -> String {
    let name = escape(name);
    format!(
        "    if (req.http.Cookie ~ \"(^|;\\s*){name}=\") {{\n      hash_data(regsub(req.http.Cookie, \"^(.*;\\s*)?{name}=([^;]*).*$\", \"\\2\"));\n    }}\n"
    )
}
