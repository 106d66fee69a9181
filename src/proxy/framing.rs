//! Framing Resolver.
//!
//! Decides how the length of a forwarded body is communicated: a known
//! length becomes `Content-Length`, an unknown one `Transfer-Encoding:
//! chunked`, and a known-empty body is always sent as `Content-Length: 0`,
//! whatever the sender originally asked for.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::{Method, StatusCode};

/// Marker some gateways add to remember the caller's transfer encoding.
/// It never leaves this gateway in either direction.
pub const FORWARDED_TRANSFER_ENCODING: HeaderName =
    HeaderName::from_static("x-forwarded-transfer-encoding");

/// Length framing of one forwarded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Known to be empty.
    Empty,
    /// Known length, in bytes, before the first byte is sent.
    Length(u64),
    /// Length unknown until the stream ends.
    Chunked,
}

impl Framing {
    /// Framing for a body whose total length may have been declared.
    pub fn for_declared_len(declared_len: Option<u64>) -> Self {
        match declared_len {
            Some(0) => Framing::Empty,
            Some(len) => Framing::Length(len),
            None => Framing::Chunked,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Framing::Empty)
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self, Framing::Chunked)
    }

    /// Rewrite the framing headers of `headers` to match this decision.
    pub fn apply(&self, headers: &mut HeaderMap) {
        strip_framing_headers(headers);
        match self {
            Framing::Empty => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
            }
            Framing::Length(len) => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(*len));
            }
            Framing::Chunked => {
                headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            }
        }
    }
}

/// Remove every header that describes body length.
pub fn strip_framing_headers(headers: &mut HeaderMap) {
    headers.remove(CONTENT_LENGTH);
    headers.remove(TRANSFER_ENCODING);
    headers.remove(FORWARDED_TRANSFER_ENCODING);
}

/// True when a response to `method` with `status` carries no body at all.
pub fn is_bodyless(method: &Method, status: StatusCode) -> bool {
    method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}
