//! Header sanitization for cached responses.

use crate::http::Headers;

/// Removes a fixed disallow-list of headers from copies of a header map.
///
/// Applied before a record is stored and again before stored headers are
/// replayed, so credentials and cache diagnostics never travel through the cache
/// even if an older record carried them.
///
/// # Examples
///
/// ```
/// use pagecache::cache::HeaderSanitizer;
/// use pagecache::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("authorization", "Bearer secret");
/// headers.insert("X-Test-Header", "kept");
///
/// let clean = HeaderSanitizer::default().sanitize(&headers);
/// assert!(!clean.contains("Authorization"));
/// assert_eq!(clean.get("x-test-header"), Some("kept"));
/// assert!(headers.contains("Authorization"));
/// ```
#[derive(Debug, Clone)]
pub struct HeaderSanitizer {
    disallowed: Vec<String>,
}

impl Default for HeaderSanitizer {
    fn default() -> Self {
        super::CacheConfig::default().sanitizer()
    }
}

impl HeaderSanitizer {
    /// Creates a sanitizer removing the given header names.
    pub fn new<I, S>(disallowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            disallowed: disallowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a copy of `headers` without the disallowed names.
    ///
    /// Matching is case-insensitive and exact; `Authorization-Extra` survives a
    /// rule for `Authorization`.
    pub fn sanitize(&self, headers: &Headers) -> Headers {
        let mut clean = headers.clone();
        for name in &self.disallowed {
            clean.remove(name);
        }
        clean
    }

    /// Returns `true` if `name` is on the disallow-list.
    pub fn is_disallowed(&self, name: &str) -> bool {
        self.disallowed.iter().any(|d| d.eq_ignore_ascii_case(name))
    }
}
