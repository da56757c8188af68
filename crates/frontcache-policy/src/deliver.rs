//! `vcl_deliver` and `vcl_error`: debug tagging and synthetic responses.

use serde::Serialize;

/// Header reporting whether the response came from cache.
pub const CACHE_STATUS_HEADER: &str = "X-Cache";
/// Internal status carrying an HTTPS redirect target in its reason phrase.
pub const REDIRECT_STATUS: u16 = 750;

/// Hit or miss, as written into [`CACHE_STATUS_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheStatus {
    /// Served from cache.
    #[serde(rename = "HIT")]
    Hit,
    /// Fetched from the backend.
    #[serde(rename = "MISS")]
    Miss,
}

impl CacheStatus {
    /// Header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

/// Tag for a delivered object that has been served `hits` times before.
#[must_use]
pub const fn deliver_header(hits: u64) -> CacheStatus {
    if hits > 0 {
        CacheStatus::Hit
    } else {
        CacheStatus::Miss
    }
}

/// Response produced by `vcl_error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntheticResponse {
    /// Status sent to the client.
    pub status: u16,
    /// Reason phrase.
    pub reason: String,
    /// `Location` header, set for redirects.
    pub location: Option<String>,
}

/// Translate an internal error into what the client receives.
#[must_use]
pub fn translate_error(status: u16, reason: &str) -> SyntheticResponse {
    if status == REDIRECT_STATUS {
        SyntheticResponse {
            status: 302,
            reason: "Found".to_string(),
            location: Some(reason.to_string()),
        }
    } else {
        SyntheticResponse {
            status,
            reason: reason.to_string(),
            location: None,
        }
    }
}

pub(crate) const DELIVER_VCL: &str = r#"  if (obj.hits > 0) {
    set resp.http.X-Cache = "HIT";
  } else {
    set resp.http.X-Cache = "MISS";
  }
  return (deliver);
"#;

pub(crate) const ERROR_VCL: &str = r#"  if (obj.status == 750) {
    set obj.http.Location = obj.response;
    set obj.status = 302;
    set obj.response = "Found";
    return (deliver);
  }
"#;
