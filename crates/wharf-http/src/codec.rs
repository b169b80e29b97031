//! HTTP/1.1 wire codec over `AsyncRead`/`AsyncWrite` streams.
//!
//! Requests and responses are parsed incrementally with `httparse` over a
//! growing buffer; leftover bytes stay in the buffer so pipelined messages
//! on a keep-alive connection are not lost.

use bytes::{Buf, Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Version};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{HttpError, Result};
use crate::request::Request;
use crate::response::Response;

/// Hard cap on the size of a message head.
const MAX_HEAD_BYTES: usize = 64 * 1024;

const MAX_HEADERS: usize = 64;

async fn fill<S: AsyncRead + Unpin>(stream: &mut S, buf: &mut BytesMut) -> Result<usize> {
    let n = stream.read_buf(buf).await?;
    Ok(n)
}

fn version_from_minor(minor: u8) -> Version {
    if minor == 0 {
        Version::HTTP_10
    } else {
        Version::HTTP_11
    }
}

fn header_map(raw: &[httparse::Header<'_>]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(raw.len());
    for h in raw {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|e| HttpError::parse(format!("bad header name: {e}")))?;
        let value = HeaderValue::from_bytes(h.value)
            .map_err(|e| HttpError::parse(format!("bad header value: {e}")))?;
        headers.append(name, value);
    }
    Ok(headers)
}

fn content_length(headers: &HeaderMap) -> Result<Option<usize>> {
    match headers.get(http::header::CONTENT_LENGTH) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .map(Some)
            .ok_or_else(|| HttpError::parse("unparseable content-length")),
    }
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get(http::header::TRANSFER_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("chunked"))
        })
        .unwrap_or(false)
}

/// Read one request from the stream.
///
/// `body_limit` bounds the declared (or chunk-accumulated) body size;
/// exceeding it fails with [`HttpError::BodyTooLarge`]. A clean EOF before
/// any byte of the next request maps to [`HttpError::ConnectionClosed`].
pub async fn read_request<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut BytesMut,
    body_limit: Option<usize>,
) -> Result<Request> {
    let (mut request, head_len, body_len) = loop {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parser = httparse::Request::new(&mut headers);
        match parser.parse(&buf[..]) {
            Ok(httparse::Status::Complete(head_len)) => {
                let method = Method::from_bytes(parser.method.unwrap_or("").as_bytes())
                    .map_err(|e| HttpError::parse(format!("bad method: {e}")))?;
                let target = parser.path.unwrap_or("/").to_string();
                let version = version_from_minor(parser.version.unwrap_or(1));
                let headers = header_map(parser.headers)?;

                let body_len = if is_chunked(&headers) {
                    None
                } else {
                    Some(content_length(&headers)?.unwrap_or(0))
                };

                let mut request = Request::new(method, target);
                request.version = version;
                request.headers = headers;
                break (request, head_len, body_len);
            }
            Ok(httparse::Status::Partial) => {
                if buf.len() > MAX_HEAD_BYTES {
                    return Err(HttpError::HeadTooLarge {
                        limit: MAX_HEAD_BYTES,
                    });
                }
            }
            Err(e) => return Err(HttpError::parse(format!("invalid request head: {e}"))),
        }

        if fill(stream, buf).await? == 0 {
            if buf.is_empty() {
                return Err(HttpError::ConnectionClosed);
            }
            return Err(HttpError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
    };

    buf.advance(head_len);
    request.body = match body_len {
        Some(length) => read_sized_body(stream, buf, length, body_limit).await?,
        None => read_chunked_body(stream, buf, body_limit).await?,
    };
    tracing::trace!(
        method = %request.method,
        target = %request.target,
        body = request.body.len(),
        "read request"
    );
    Ok(request)
}

/// Read one response from the stream. Responses without `Content-Length` or
/// chunked framing are read to EOF. `head_request` marks a reply to `HEAD`,
/// whose head declares a length but carries no payload.
pub async fn read_response<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut BytesMut,
    head_request: bool,
) -> Result<Response> {
    let (mut response, head_len, framing) = loop {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parser = httparse::Response::new(&mut headers);
        match parser.parse(&buf[..]) {
            Ok(httparse::Status::Complete(head_len)) => {
                let status = StatusCode::from_u16(parser.code.unwrap_or(0))
                    .map_err(|e| HttpError::parse(format!("bad status: {e}")))?;
                let headers = header_map(parser.headers)?;

                let framing = if is_chunked(&headers) {
                    Framing::Chunked
                } else {
                    match content_length(&headers)? {
                        Some(length) => Framing::Sized(length),
                        None => Framing::Eof,
                    }
                };

                let mut response = Response::new();
                response.status = status;
                response.version = version_from_minor(parser.version.unwrap_or(1));
                response.headers = headers;
                break (response, head_len, framing);
            }
            Ok(httparse::Status::Partial) => {
                if buf.len() > MAX_HEAD_BYTES {
                    return Err(HttpError::HeadTooLarge {
                        limit: MAX_HEAD_BYTES,
                    });
                }
            }
            Err(e) => return Err(HttpError::parse(format!("invalid response head: {e}"))),
        }

        if fill(stream, buf).await? == 0 {
            if buf.is_empty() {
                return Err(HttpError::ConnectionClosed);
            }
            return Err(HttpError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
    };

    buf.advance(head_len);
    let bodyless = head_request
        || response.status.is_informational()
        || response.status == StatusCode::NO_CONTENT
        || response.status == StatusCode::NOT_MODIFIED;
    response.body = if bodyless {
        Bytes::new()
    } else {
        match framing {
            Framing::Sized(length) => read_sized_body(stream, buf, length, None).await?,
            Framing::Chunked => read_chunked_body(stream, buf, None).await?,
            Framing::Eof => {
                while fill(stream, buf).await? > 0 {}
                buf.split().freeze()
            }
        }
    };
    tracing::trace!(
        status = response.status.as_u16(),
        body = response.body.len(),
        "read response"
    );
    Ok(response)
}

enum Framing {
    Sized(usize),
    Chunked,
    Eof,
}

async fn read_sized_body<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut BytesMut,
    length: usize,
    limit: Option<usize>,
) -> Result<Bytes> {
    if let Some(limit) = limit {
        if length > limit {
            return Err(HttpError::BodyTooLarge { limit });
        }
    }
    while buf.len() < length {
        if fill(stream, buf).await? == 0 {
            return Err(HttpError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
    }
    Ok(buf.split_to(length).freeze())
}

async fn read_line<S: AsyncRead + Unpin>(stream: &mut S, buf: &mut BytesMut) -> Result<usize> {
    loop {
        if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
            return Ok(pos);
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Err(HttpError::parse("oversized chunk header"));
        }
        if fill(stream, buf).await? == 0 {
            return Err(HttpError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
    }
}

async fn read_chunked_body<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut BytesMut,
    limit: Option<usize>,
) -> Result<Bytes> {
    let mut body = BytesMut::new();
    loop {
        let line_len = read_line(stream, buf).await?;
        let size = {
            let line = std::str::from_utf8(&buf[..line_len])
                .map_err(|_| HttpError::parse("non-ascii chunk size"))?;
            let digits = line.split(';').next().unwrap_or("").trim();
            usize::from_str_radix(digits, 16)
                .map_err(|_| HttpError::parse("invalid chunk size"))?
        };
        buf.advance(line_len + 2);

        if size == 0 {
            // consume optional trailers up to the empty line
            loop {
                let trailer_len = read_line(stream, buf).await?;
                buf.advance(trailer_len + 2);
                if trailer_len == 0 {
                    return Ok(body.freeze());
                }
            }
        }

        if let Some(limit) = limit {
            if body.len() + size > limit {
                return Err(HttpError::BodyTooLarge { limit });
            }
        }
        while buf.len() < size + 2 {
            if fill(stream, buf).await? == 0 {
                return Err(HttpError::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
        }
        body.extend_from_slice(&buf[..size]);
        buf.advance(size + 2);
    }
}

fn version_line(version: Version) -> &'static str {
    if version == Version::HTTP_10 {
        "HTTP/1.0"
    } else {
        "HTTP/1.1"
    }
}

/// Serialize and write a response. `suppress_body` keeps the head (including
/// `Content-Length`) but omits the payload, as a HEAD exchange requires.
pub async fn write_response<S: AsyncWrite + Unpin>(
    stream: &mut S,
    response: &Response,
    suppress_body: bool,
) -> Result<()> {
    let mut head = Vec::with_capacity(256);
    head.extend_from_slice(version_line(response.version).as_bytes());
    head.extend_from_slice(
        format!(
            " {} {}\r\n",
            response.status.as_u16(),
            response.status.canonical_reason().unwrap_or("Unknown")
        )
        .as_bytes(),
    );
    for (name, value) in response.headers.iter() {
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    if !response.headers.contains_key(http::header::CONNECTION) {
        if response.version == Version::HTTP_10 && response.keep_alive() {
            head.extend_from_slice(b"Connection: keep-alive\r\n");
        } else if response.version != Version::HTTP_10 && !response.keep_alive() {
            head.extend_from_slice(b"Connection: close\r\n");
        }
    }
    head.extend_from_slice(b"\r\n");

    stream.write_all(&head).await?;
    if !suppress_body && !response.body.is_empty() {
        stream.write_all(&response.body).await?;
    }
    stream.flush().await?;
    Ok(())
}

/// Serialize and write a client request with explicit length framing.
pub async fn write_request<S: AsyncWrite + Unpin>(
    stream: &mut S,
    method: &Method,
    target: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<()> {
    let mut head = Vec::with_capacity(256);
    head.extend_from_slice(method.as_str().as_bytes());
    head.push(b' ');
    head.extend_from_slice(target.as_bytes());
    head.extend_from_slice(b" HTTP/1.1\r\n");
    for (name, value) in headers.iter() {
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    if !headers.contains_key(http::header::CONTENT_LENGTH) {
        head.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    head.extend_from_slice(b"\r\n");

    stream.write_all(&head).await?;
    if !body.is_empty() {
        stream.write_all(body).await?;
    }
    stream.flush().await?;
    Ok(())
}
