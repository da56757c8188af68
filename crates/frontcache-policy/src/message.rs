//! Minimal request/response shapes the rule tables operate on.

use std::net::{IpAddr, Ipv4Addr};

use serde::Serialize;

/// Ordered header list with case-insensitive lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Empty header list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// First value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether a header named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace every value for `name` with a single value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.entries.push((name.to_string(), value.into()));
    }

    /// Remove every value for `name`, returning the first one.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let mut removed = None;
        self.entries.retain(|(key, value)| {
            if key.eq_ignore_ascii_case(name) {
                if removed.is_none() {
                    removed = Some(value.clone());
                }
                false
            } else {
                true
            }
        });
        removed
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Client request as seen by `vcl_recv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    /// Request method.
    pub method: String,
    /// Request URL path and query.
    pub url: String,
    /// Request headers.
    pub headers: Headers,
    /// Address of the connecting client.
    pub client_ip: IpAddr,
    /// Number of times the request was restarted.
    pub restarts: u32,
}

impl Request {
    /// Request from the loopback address with no headers.
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Headers::new(),
            client_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            restarts: 0,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Set the client address.
    #[must_use]
    pub const fn client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = ip;
        self
    }

    /// Set the restart counter.
    #[must_use]
    pub const fn restarts(mut self, restarts: u32) -> Self {
        self.restarts = restarts;
        self
    }

    /// Value of the `Host` header, empty when absent.
    #[must_use]
    pub fn host(&self) -> &str {
        self.headers.get("Host").unwrap_or_default()
    }

    /// Value of a named cookie from the `Cookie` header.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers.get("Cookie")?.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
    }
}

/// Backend response as seen by `vcl_fetch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
}

impl Response {
    /// Response with the given status and no headers.
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }
}

/// Health of the backend probe when a request arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendHealth {
    /// Probe is passing.
    Healthy,
    /// Probe is failing.
    Sick,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookups_ignore_case() {
        let mut headers: Headers = [("Accept-Encoding", "gzip")].into_iter().collect();
        assert_eq!(headers.get("accept-encoding"), Some("gzip"));
        headers.set("ACCEPT-ENCODING", "deflate");
        assert_eq!(headers.iter().count(), 1);
        assert_eq!(headers.remove("Accept-encoding"), Some("deflate".to_string()));
        assert!(!headers.contains("Accept-Encoding"));
    }

    #[test]
    fn cookie_values_are_extracted_by_exact_name() {
        let request = Request::new("GET", "/")
            .header("Cookie", "x_session_id=nope; _session_id=abc123; logged_in=1");
        assert_eq!(request.cookie("_session_id"), Some("abc123"));
        assert_eq!(request.cookie("logged_in"), Some("1"));
        assert_eq!(request.cookie("session_id"), None);
    }
}
