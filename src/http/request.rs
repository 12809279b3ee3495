//! Request head parsing on top of `httparse`, plus body framing by
//! `Content-Length`.

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};

const MAX_HEADERS: usize = 64;

#[derive(Debug, Error)]
pub enum RequestError {
    /// The buffer ends before the head or the declared body does.
    #[error("request is incomplete")]
    Incomplete,

    #[error("malformed request: {0}")]
    Parse(#[from] httparse::Error),

    #[error("request line has no {0}")]
    MissingField(&'static str),

    #[error("invalid content-length {0:?}")]
    ContentLength(String),
}

/// One parsed request.
///
/// ```
/// use pagecache::Request;
///
/// let (request, used) = Request::parse(b"GET /search?q=a+b HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
/// assert_eq!(request.target(), "/search?q=a+b");
/// assert_eq!(request.query_param("q"), Some("a b"));
/// assert_eq!(used, 39);
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    minor_version: u8,
    headers: Headers,
    body: Bytes,
    query_params: HashMap<String, String>,
}

impl Request {
    /// Parses one complete request from the front of `buf`, returning it with
    /// the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// [`RequestError::Incomplete`] until the head and the full
    /// `Content-Length` body are buffered; any other variant means the bytes
    /// can never form a request.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut head = httparse::Request::new(&mut slots);
        let httparse::Status::Complete(head_len) = head.parse(buf)? else {
            return Err(RequestError::Incomplete);
        };

        let raw_method = head.method.ok_or(RequestError::MissingField("method"))?;
        let Ok(method) = raw_method.parse::<Method>();
        let raw_target = head.path.ok_or(RequestError::MissingField("target"))?;
        let minor_version = head.version.ok_or(RequestError::MissingField("version"))?;

        let mut headers = Headers::new();
        for field in head.headers.iter() {
            if let Ok(value) = std::str::from_utf8(field.value) {
                headers.insert(field.name, value);
            }
        }

        let body_len = match headers.get("content-length") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| RequestError::ContentLength(raw.to_owned()))?,
            None => 0,
        };
        let end = head_len
            .checked_add(body_len)
            .ok_or_else(|| RequestError::ContentLength(body_len.to_string()))?;
        if buf.len() < end {
            return Err(RequestError::Incomplete);
        }

        let (path, query) = match raw_target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (raw_target.to_owned(), None),
        };
        let query_params = query.as_deref().map(decode_query).unwrap_or_default();

        let request = Self {
            method,
            path,
            query,
            minor_version,
            headers,
            body: Bytes::copy_from_slice(&buf[head_len..end]),
            query_params,
        };
        Ok((request, end))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The path plus `?query`, or just the path when the query is absent or
    /// empty. This is the identity a page is cached under.
    pub fn target(&self) -> String {
        match self.query_string() {
            Some(query) if !query.is_empty() => format!("{}?{query}", self.path),
            _ => self.path.clone(),
        }
    }

    /// A decoded query value; `+` reads as a space.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// HTTP/1.1 stays open unless the client says `close`; HTTP/1.0 closes
    /// unless it asks for `keep-alive`.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(value) if value.eq_ignore_ascii_case("close") => false,
            Some(value) if value.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.minor_version >= 1,
        }
    }
}

fn decode_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(name), decode(value))
        })
        .collect()
}

fn decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Request {
        Request::parse(raw.as_bytes()).unwrap().0
    }

    #[test]
    fn splits_path_and_query() {
        let request = parse("GET /search?q=rust&page=2&flag HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(request.method(), &Method::Get);
        assert_eq!(request.path(), "/search");
        assert_eq!(request.query_string(), Some("q=rust&page=2&flag"));
        assert_eq!(request.query_param("page"), Some("2"));
        assert_eq!(request.query_param("flag"), Some(""));
        assert_eq!(request.headers().get("HOST"), Some("x"));
    }

    #[test]
    fn query_values_are_percent_decoded() {
        let request = parse("GET /s?q=caf%C3%A9+au+lait&tag=a%26b HTTP/1.1\r\n\r\n");
        assert_eq!(request.query_param("q"), Some("café au lait"));
        assert_eq!(request.query_param("tag"), Some("a&b"));
    }

    #[test]
    fn target_drops_an_empty_query() {
        assert_eq!(parse("GET /a?b=1 HTTP/1.1\r\n\r\n").target(), "/a?b=1");
        assert_eq!(parse("GET /a? HTTP/1.1\r\n\r\n").target(), "/a");
        assert_eq!(parse("GET /a HTTP/1.1\r\n\r\n").target(), "/a");
    }

    #[test]
    fn waits_for_head_and_body() {
        assert!(matches!(
            Request::parse(b"GET / HTTP/1.1\r\nHost:"),
            Err(RequestError::Incomplete)
        ));
        assert!(matches!(
            Request::parse(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel"),
            Err(RequestError::Incomplete)
        ));
    }

    #[test]
    fn body_stops_at_content_length() {
        let raw = b"POST /n HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET / HTTP/1.1\r\n\r\n";
        let (request, used) = Request::parse(raw).unwrap();
        assert_eq!(&request.body()[..], b"hello");
        assert_eq!(&raw[used..], b"GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn bad_content_length_is_rejected() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\n";
        assert!(matches!(Request::parse(raw), Err(RequestError::ContentLength(_))));
    }

    #[test]
    fn keep_alive_follows_version_and_connection() {
        assert!(parse("GET / HTTP/1.1\r\n\r\n").is_keep_alive());
        assert!(!parse("GET / HTTP/1.1\r\nConnection: close\r\n\r\n").is_keep_alive());
        assert!(!parse("GET / HTTP/1.0\r\n\r\n").is_keep_alive());
        assert!(parse("GET / HTTP/1.0\r\nConnection: Keep-Alive\r\n\r\n").is_keep_alive());
    }
}
