//! Query-string splitting and percent decoding.

use std::collections::HashMap;

use crate::error::{HttpError, Result};

/// Percent-decode one component. Invalid escapes or non-UTF-8 payloads are
/// rejected rather than passed through.
pub fn percent_decode(raw: &str) -> Result<String> {
    urlencoding::decode(raw)
        .map(|cow| cow.into_owned())
        .map_err(|_| HttpError::InvalidTarget)
}

/// Split a query string on `&` into decoded key/value pairs.
///
/// Every pair must carry a `=` with a non-empty value; duplicate keys
/// resolve last-wins. An empty query yields an empty map.
pub fn parse_query(query: &str) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    if query.is_empty() {
        return Ok(out);
    }
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').ok_or(HttpError::InvalidTarget)?;
        if value.is_empty() {
            return Err(HttpError::InvalidTarget);
        }
        out.insert(percent_decode(key)?, percent_decode(value)?);
    }
    Ok(out)
}
