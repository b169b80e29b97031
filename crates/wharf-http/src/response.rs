//! Response object with framework defaults.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode, Version};

/// An HTTP response under construction.
///
/// A fresh response is a 404 until some handler claims it; the framework
/// middleware relies on that to detect "no route matched". `Content-Length`
/// is computed by `prepare_payload` right before the session writes the
/// message.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    keep_alive: bool,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            keep_alive: true,
        }
    }

    /// Claim the response: 200, body, content type.
    pub fn set_content(&mut self, body: impl Into<Bytes>, content_type: &str) {
        self.status = StatusCode::OK;
        self.body = body.into();
        if let Ok(value) = HeaderValue::from_str(content_type) {
            self.headers.insert(http::header::CONTENT_TYPE, value);
        }
    }

    /// Insert or replace a header. Invalid values are dropped silently; the
    /// wire format must never be corrupted by user strings.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
    }

    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive = keep_alive;
    }

    /// Stamp `Content-Length` from the current body.
    pub fn prepare_payload(&mut self) {
        let length = self.body.len().to_string();
        self.headers.insert(
            http::header::CONTENT_LENGTH,
            HeaderValue::from_str(&length).expect("usize formats as a valid header value"),
        );
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
