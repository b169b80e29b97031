//! multipart/form-data encoding and decoding.

use bytes::Bytes;
use rand::distr::Alphanumeric;
use rand::Rng;

use crate::error::{HttpError, Result};

/// One part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    /// Added as `filename="…"` to `Content-Disposition` when non-empty.
    pub filename: String,
    /// Emitted as a part-level `Content-Type` when non-empty.
    pub content_type: String,
    pub data: Bytes,
}

impl FormPart {
    pub fn field(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            filename: String::new(),
            content_type: String::new(),
            data: data.into(),
        }
    }

    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// Generate a fresh `----WebKitFormBoundary` + 16 random alphanumerics.
pub fn random_boundary() -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    format!("----WebKitFormBoundary{suffix}")
}

/// Encode parts as a multipart/form-data payload with CRLF line endings and
/// a `--boundary--` closing marker.
pub fn encode_form(parts: &[FormPart], boundary: &str) -> Bytes {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(b"Content-Disposition: form-data; name=\"");
        out.extend_from_slice(part.name.as_bytes());
        out.extend_from_slice(b"\"");
        if !part.filename.is_empty() {
            out.extend_from_slice(b"; filename=\"");
            out.extend_from_slice(part.filename.as_bytes());
            out.extend_from_slice(b"\"");
        }
        out.extend_from_slice(b"\r\n");
        if !part.content_type.is_empty() {
            out.extend_from_slice(b"Content-Type: ");
            out.extend_from_slice(part.content_type.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&part.data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"--\r\n");
    Bytes::from(out)
}

fn disposition_attr(line: &str, attr: &str) -> Option<String> {
    let marker = format!("{attr}=\"");
    let start = line.find(&marker)? + marker.len();
    let end = line[start..].find('"')? + start;
    Some(line[start..end].to_string())
}

/// Decode a multipart/form-data payload produced with the given boundary.
pub fn parse_form(body: &[u8], boundary: &str) -> Result<Vec<FormPart>> {
    let text_delim = format!("--{boundary}");
    let delim = text_delim.as_bytes();
    let mut parts = Vec::new();
    let mut offset = 0;

    // locate each delimiter line, then the part head up to the blank line
    while let Some(found) = find(&body[offset..], delim) {
        let after = offset + found + delim.len();
        if body[after..].starts_with(b"--") {
            return Ok(parts);
        }
        let head_start = after + 2; // skip CRLF after the delimiter
        let head_end = find(&body[head_start..], b"\r\n\r\n")
            .map(|p| head_start + p)
            .ok_or_else(|| HttpError::parse("unterminated part head"))?;
        let head = std::str::from_utf8(&body[head_start..head_end])
            .map_err(|_| HttpError::parse("non-utf8 part head"))?;

        let mut part = FormPart::field("", Bytes::new());
        for line in head.split("\r\n") {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            if name.eq_ignore_ascii_case("content-disposition") {
                part.name = disposition_attr(value, "name")
                    .ok_or_else(|| HttpError::parse("part without a name"))?;
                part.filename = disposition_attr(value, "filename").unwrap_or_default();
            } else if name.eq_ignore_ascii_case("content-type") {
                part.content_type = value.trim().to_string();
            }
        }

        let data_start = head_end + 4;
        let data_end = find(&body[data_start..], delim)
            .map(|p| data_start + p - 2) // strip the CRLF preceding the delimiter
            .ok_or_else(|| HttpError::parse("unterminated part data"))?;
        part.data = Bytes::copy_from_slice(&body[data_start..data_end]);
        parts.push(part);
        offset = data_end;
    }

    Err(HttpError::parse("missing closing boundary"))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
