//! Ordered header fields.

use serde::{Deserialize, Serialize};

/// Header fields in arrival order, looked up without regard to ASCII case.
///
/// A name may repeat (`Set-Cookie`), and the list serializes as an array of
/// `[name, value]` pairs so a cached record keeps both duplicates and order.
///
/// ```
/// use pagecache::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Set-Cookie", "a=1");
/// headers.insert("set-cookie", "b=2");
/// assert_eq!(headers.get("SET-COOKIE"), Some("a=1"));
/// assert_eq!(headers.get_all("Set-Cookie").count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, keeping any earlier value of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Drops every field called `name`, then appends `name: value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.insert(name, value);
    }

    pub fn extend(&mut self, other: &Headers) {
        self.fields.extend_from_slice(&other.fields);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.fields
            .iter()
            .filter(move |(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns `true` if at least one field was dropped.
    pub fn remove(&mut self, name: &str) -> bool {
        let count = self.fields.len();
        self.fields.retain(|(field, _)| !field.eq_ignore_ascii_case(name));
        self.fields.len() != count
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookies() -> Headers {
        let mut headers = Headers::new();
        headers.insert("Set-Cookie", "a=1");
        headers.insert("Content-Type", "text/plain");
        headers.insert("set-cookie", "b=2");
        headers
    }

    #[test]
    fn lookups_ignore_case() {
        let headers = cookies();
        assert_eq!(headers.get("CONTENT-type"), Some("text/plain"));
        assert_eq!(headers.get_all("SET-COOKIE").collect::<Vec<_>>(), ["a=1", "b=2"]);
        assert!(headers.contains("content-type"));
        assert!(!headers.contains("authorization"));
    }

    #[test]
    fn set_collapses_duplicates_to_one_value() {
        let mut headers = cookies();
        headers.set("SET-COOKIE", "c=3");
        assert_eq!(headers.get_all("set-cookie").collect::<Vec<_>>(), ["c=3"]);
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn remove_reports_whether_anything_went() {
        let mut headers = cookies();
        assert!(headers.remove("set-cookie"));
        assert!(!headers.remove("set-cookie"));
        assert_eq!(headers.iter().collect::<Vec<_>>(), [("Content-Type", "text/plain")]);
    }

    #[test]
    fn serde_round_trip_keeps_order_and_repeats() {
        let headers = cookies();
        let json = serde_json::to_string(&headers).unwrap();
        assert_eq!(
            json,
            r#"[["Set-Cookie","a=1"],["Content-Type","text/plain"],["set-cookie","b=2"]]"#
        );
        let back: Headers = serde_json::from_str(&json).unwrap();
        assert_eq!(back, headers);
    }
}
