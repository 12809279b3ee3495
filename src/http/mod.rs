//! Wire-level HTTP/1.1 types: status codes, methods, headers, and the
//! request/response pair the router passes around.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod headers;
pub mod request;
pub mod response;
pub mod writer;

pub use headers::Headers;
pub use request::Request;
pub use response::Response;
pub use writer::ResponseWriter;

macro_rules! status_codes {
    ($($code:literal $name:ident $reason:literal;)+) => {
        /// Response status codes the server knows how to emit and a cache record
        /// may carry. Serialized as the bare number.
        ///
        /// ```
        /// use pagecache::http::StatusCode;
        ///
        /// assert_eq!(StatusCode::from_u16(207), Some(StatusCode::MultiStatus));
        /// assert_eq!(StatusCode::NotFound.to_string(), "404 Not Found");
        /// ```
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "u16", try_from = "u16")]
        #[repr(u16)]
        pub enum StatusCode {
            $($name = $code,)+
        }

        impl StatusCode {
            pub fn from_u16(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(Self::$name),)+
                    _ => None,
                }
            }

            pub fn canonical_reason(self) -> &'static str {
                match self {
                    $(Self::$name => $reason,)+
                }
            }
        }
    };
}

status_codes! {
    100 Continue "Continue";
    101 SwitchingProtocols "Switching Protocols";
    200 Ok "OK";
    201 Created "Created";
    202 Accepted "Accepted";
    203 NonAuthoritativeInformation "Non-Authoritative Information";
    204 NoContent "No Content";
    206 PartialContent "Partial Content";
    207 MultiStatus "Multi-Status";
    301 MovedPermanently "Moved Permanently";
    302 Found "Found";
    303 SeeOther "See Other";
    304 NotModified "Not Modified";
    307 TemporaryRedirect "Temporary Redirect";
    308 PermanentRedirect "Permanent Redirect";
    400 BadRequest "Bad Request";
    401 Unauthorized "Unauthorized";
    403 Forbidden "Forbidden";
    404 NotFound "Not Found";
    405 MethodNotAllowed "Method Not Allowed";
    409 Conflict "Conflict";
    413 PayloadTooLarge "Payload Too Large";
    429 TooManyRequests "Too Many Requests";
    500 InternalServerError "Internal Server Error";
    501 NotImplemented "Not Implemented";
    502 BadGateway "Bad Gateway";
    503 ServiceUnavailable "Service Unavailable";
    504 GatewayTimeout "Gateway Timeout";
    505 HttpVersionNotSupported "HTTP Version Not Supported";
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Only statuses below 300 are ever written to a cache.
    pub fn is_cacheable(self) -> bool {
        self.as_u16() < 300
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported status code {0}")]
pub struct InvalidStatusCode(pub u16);

impl TryFrom<u16> for StatusCode {
    type Error = InvalidStatusCode;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Self::from_u16(code).ok_or(InvalidStatusCode(code))
    }
}

impl From<StatusCode> for u16 {
    fn from(status: StatusCode) -> u16 {
        status.as_u16()
    }
}

/// Request method. The router registers `GET` and `POST`; anything else still
/// parses so it can be answered with a 404.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            other => Self::Other(other.to_owned()),
        })
    }
}
