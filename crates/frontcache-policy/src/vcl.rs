//! Assembly of the complete cache-policy script.

use serde::Serialize;

use crate::deliver::{DELIVER_VCL, ERROR_VCL};
use crate::fetch::FETCH_RULES;
use crate::hash::{self, CacheKeyConfig};
use crate::recv::RECV_RULES;

/// Backend the cache forwards misses to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backend {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Everything the script is templated on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VclParams {
    /// Backend definition.
    pub backend: Backend,
    /// Cache key variation.
    pub cache_key: CacheKeyConfig,
}

/// Render the script. Output depends only on `params`.
#[must_use]
pub fn emit_vcl(params: &VclParams) -> String {
    let mut out = String::from("# Managed by frontcache. Local edits are overwritten.\n\n");

    out.push_str(&format!(
        "backend default {{\n  .host = \"{}\";\n  .port = \"{}\";\n  .probe = {{\n    .url = \"/\";\n    .interval = 5s;\n    .timeout = 1s;\n    .window = 5;\n    .threshold = 3;\n  }}\n}}\n",
        params.backend.host, params.backend.port
    ));

    push_sub(
        &mut out,
        "vcl_recv",
        &RECV_RULES.iter().map(|rule| rule.vcl()).collect::<String>(),
    );
    push_sub(&mut out, "vcl_hash", &hash::vcl(&params.cache_key));
    push_sub(
        &mut out,
        "vcl_fetch",
        &FETCH_RULES.iter().map(|rule| rule.vcl()).collect::<String>(),
    );
    push_sub(&mut out, "vcl_deliver", DELIVER_VCL);
    push_sub(&mut out, "vcl_error", ERROR_VCL);
    out
}

fn push_sub(out: &mut String, name: &str, body: &str) {
    out.push_str("\nsub ");
    out.push_str(name);
    out.push_str(" {\n");
    out.push_str(body);
    out.push_str("}\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> VclParams {
        VclParams {
            backend: Backend {
                host: "127.0.0.1".to_string(),
                port: 8081,
            },
            cache_key: CacheKeyConfig {
                personalized_prefix: "/account".to_string(),
                session_cookie: "_session_id".to_string(),
                logged_in_cookie: "logged_in".to_string(),
            },
        }
    }

    #[test]
    fn script_is_deterministic() {
        assert_eq!(emit_vcl(&params()), emit_vcl(&params()));
    }

    #[test]
    fn backend_is_templated() {
        let script = emit_vcl(&params());
        assert!(script.contains(".host = \"127.0.0.1\";"));
        assert!(script.contains(".port = \"8081\";"));
    }

    #[test]
    fn subroutines_appear_in_order() {
        let script = emit_vcl(&params());
        let positions: Vec<usize> = [
            "sub vcl_recv",
            "sub vcl_hash",
            "sub vcl_fetch",
            "sub vcl_deliver",
            "sub vcl_error",
        ]
        .iter()
        .map(|name| script.find(name).unwrap_or(usize::MAX))
        .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(positions.iter().all(|position| *position != usize::MAX));
    }

    #[test]
    fn recv_rules_keep_their_order_in_the_script() {
        let script = emit_vcl(&params());
        let https = script.find("error 750").unwrap_or(usize::MAX);
        let pass = script.find("^(POST|PUT|DELETE|PATCH)$").unwrap_or(usize::MAX);
        let strip = script.find("unset req.http.cookie").unwrap_or(usize::MAX);
        let purge = script.find("req.request == \"PURGE\"").unwrap_or(usize::MAX);
        let lookup = script.find("return (lookup);").unwrap_or(usize::MAX);
        assert!(https < pass && pass < strip && strip < purge && purge < lookup);
    }

    #[test]
    fn braces_balance() {
        let script = emit_vcl(&params());
        let opens = script.matches('{').count();
        let closes = script.matches('}').count();
        assert_eq!(opens, closes);
    }
}
