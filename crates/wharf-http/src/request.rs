//! Request object with derived routing fields.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method, Version};

use crate::error::Result;
use crate::query;

/// A parsed HTTP request plus the fields the router derives before handler
/// dispatch.
///
/// `path`, `query_params` and `path_params` start empty; `derive_target`
/// populates the first two when the session accepts the request, and the
/// matched route fills `path_params`. After route matching, `path_params`
/// holds exactly the placeholder names declared by the route's template.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Raw request-target as received (path plus query).
    pub target: String,

    pub path: String,
    pub query_params: Option<HashMap<String, String>>,
    pub path_params: Option<HashMap<String, String>>,
}

impl Request {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            target: target.into(),
            path: String::new(),
            query_params: None,
            path_params: None,
        }
    }

    /// Split the raw target into `path` and `query_params`.
    ///
    /// Fails on an undecodable path or a malformed query; the session maps
    /// that failure to a 400 response.
    pub fn derive_target(&mut self) -> Result<()> {
        let (path, query) = Self::split_target(&self.target);
        self.path = path.to_string();
        if !query.is_empty() {
            self.query_params = Some(query::parse_query(query)?);
        }
        Ok(())
    }

    /// Split a request-target at the first `?`.
    pub fn split_target(target: &str) -> (&str, &str) {
        match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        }
    }

    /// Header value as UTF-8, if present and decodable.
    pub fn header(&self, name: http::header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Keep-alive semantics of this request's `Connection` header, with the
    /// HTTP-version default.
    pub fn keep_alive(&self) -> bool {
        match self.header(http::header::CONNECTION) {
            Some(value) if value.eq_ignore_ascii_case("close") => false,
            Some(value) if value.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version != Version::HTTP_10,
        }
    }

    /// Whether this request asks for a WebSocket upgrade.
    pub fn is_websocket_upgrade(&self) -> bool {
        let upgraded = self
            .header(http::header::UPGRADE)
            .map(|v| v.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false);
        let connection_upgrade = self
            .header(http::header::CONNECTION)
            .map(|v| {
                v.split(',')
                    .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
            })
            .unwrap_or(false);
        upgraded && connection_upgrade
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .as_ref()
            .and_then(|map| map.get(name))
            .map(String::as_str)
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .as_ref()
            .and_then(|map| map.get(name))
            .map(String::as_str)
    }
}
