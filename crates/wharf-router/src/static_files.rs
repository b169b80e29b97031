//! Directory-serving middleware with range support.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use http::{Method, StatusCode};
use lazy_static::lazy_static;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use wharf_http::{Request, Response};

use crate::router::{Flow, HandlerError, HandlerFuture, Middleware, Next};

/// Open-ended ranges (`bytes=a-`) are capped to this many bytes per reply.
const RANGE_CHUNK_SIZE: u64 = 128 * 1024;

lazy_static! {
    static ref RANGE_RE: Regex = Regex::new(r"^bytes=(\d*)-(\d*)$").unwrap();
}

/// Serves a filesystem directory under a mount-point prefix.
///
/// Only `GET` and `HEAD` are handled; anything else, and any path outside
/// the mount point, passes through to the next middleware. Directories
/// prefer their `index.html` and fall back to a generated listing.
#[derive(Clone)]
pub struct StaticFileProvider {
    mount_point: String,
    doc_root: PathBuf,
}

impl StaticFileProvider {
    pub fn new(mount_point: impl Into<String>, doc_root: impl Into<PathBuf>) -> Self {
        let mut mount_point = mount_point.into();
        while mount_point.ends_with('/') {
            mount_point.pop();
        }
        Self {
            mount_point,
            doc_root: doc_root.into(),
        }
    }
}

impl Middleware for StaticFileProvider {
    fn handle(&self, req: Request, resp: Response, next: Next) -> HandlerFuture {
        let provider = self.clone();
        Box::pin(async move {
            if req.method != Method::GET && req.method != Method::HEAD {
                return next.run(req, resp).await;
            }
            if !req.path.starts_with(&provider.mount_point) {
                return next.run(req, resp).await;
            }
            let rel = req.path[provider.mount_point.len()..].to_string();
            if rel.split('/').any(|part| part == "..") {
                return next.run(req, resp).await;
            }

            let full = provider.doc_root.join(rel.trim_start_matches('/'));
            match tokio::fs::metadata(&full).await {
                Ok(meta) if meta.is_dir() => {
                    let index = full.join("index.html");
                    if tokio::fs::metadata(&index).await.is_ok() {
                        provider.serve_file(req, resp, &index).await
                    } else {
                        provider.serve_listing(req, resp, &full, &rel).await
                    }
                }
                Ok(_) => provider.serve_file(req, resp, &full).await,
                Err(_) => next.run(req, resp).await,
            }
        })
    }
}

impl StaticFileProvider {
    async fn serve_file(&self, req: Request, mut resp: Response, path: &Path) -> Flow {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let size = tokio::fs::metadata(path)
            .await
            .map_err(HandlerError::from)?
            .len();

        if req.method == Method::HEAD {
            resp.status = StatusCode::OK;
            resp.set_header(http::header::CONTENT_TYPE, mime.as_ref());
            resp.set_header(http::header::CONTENT_LENGTH, &size.to_string());
            return Ok((req, resp));
        }

        let range_header = req.header(http::header::RANGE).map(str::to_string);
        match range_header {
            None => {
                let body = tokio::fs::read(path).await.map_err(HandlerError::from)?;
                resp.set_content(body, mime.as_ref());
            }
            Some(raw) => match parse_range(&raw, size) {
                Some((start, end)) => {
                    let body = read_range(path, start, end).await?;
                    resp.status = StatusCode::PARTIAL_CONTENT;
                    resp.body = body.into();
                    resp.set_header(http::header::CONTENT_TYPE, mime.as_ref());
                    resp.set_header(
                        http::header::CONTENT_RANGE,
                        &format!("bytes {start}-{end}/{size}"),
                    );
                }
                None => {
                    resp.status = StatusCode::RANGE_NOT_SATISFIABLE;
                    resp.body = bytes::Bytes::new();
                    resp.set_header(http::header::CONTENT_RANGE, &format!("bytes */{size}"));
                }
            },
        }
        Ok((req, resp))
    }

    async fn serve_listing(
        &self,
        req: Request,
        mut resp: Response,
        dir: &Path,
        rel: &str,
    ) -> Flow {
        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(dir).await.map_err(HandlerError::from)?;
        while let Some(entry) = reader.next_entry().await.map_err(HandlerError::from)? {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
        }
        // directories first, then files, both by name ascending
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut rel = rel.to_string();
        if !rel.ends_with('/') {
            rel.push('/');
        }

        let mut html = String::from("<!DOCTYPE html> <html> <head> </head> <body>");
        html.push_str(&format!(
            "<h1>Directory: {}{}</h1> <ul>",
            self.doc_root.display(),
            rel
        ));
        for (name, is_dir) in entries {
            let suffix = if is_dir { "/" } else { "" };
            html.push_str(&format!(
                "<li><a href=\"{}{}{}{}\">{}{}</a></li>\n",
                self.mount_point, rel, name, suffix, name, suffix
            ));
        }
        html.push_str("</ul> </body> </html>");

        resp.set_content(html, "text/html");
        if req.method == Method::HEAD {
            resp.body = bytes::Bytes::new();
        }
        Ok((req, resp))
    }
}

async fn read_range(path: &Path, start: u64, end: u64) -> std::result::Result<Vec<u8>, HandlerError> {
    let mut file = tokio::fs::File::open(path).await.map_err(HandlerError::from)?;
    file.seek(SeekFrom::Start(start))
        .await
        .map_err(HandlerError::from)?;
    let len = (end - start + 1) as usize;
    let mut out = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = file
            .read(&mut out[filled..])
            .await
            .map_err(HandlerError::from)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    out.truncate(filled);
    Ok(out)
}

/// Parse a `bytes=a-b` / `bytes=a-` / `bytes=-n` range against a resource
/// of `size` bytes. `None` means unsatisfiable.
fn parse_range(raw: &str, size: u64) -> Option<(u64, u64)> {
    let captures = RANGE_RE.captures(raw.trim())?;
    let first = captures.get(1).map(|m| m.as_str()).unwrap_or("");
    let second = captures.get(2).map(|m| m.as_str()).unwrap_or("");
    if first.is_empty() && second.is_empty() {
        return None;
    }
    if size == 0 {
        return None;
    }

    let (start, end) = if first.is_empty() {
        // suffix form: the last min(n, size) bytes
        let n: u64 = second.parse().ok()?;
        if n == 0 {
            return None;
        }
        (size.saturating_sub(n), size - 1)
    } else {
        let start: u64 = first.parse().ok()?;
        let end = if second.is_empty() {
            start.saturating_add(RANGE_CHUNK_SIZE - 1)
        } else {
            second.parse().ok()?
        };
        (start, end)
    };

    let end = end.min(size - 1);
    if start > end || start >= size {
        return None;
    }
    Some((start, end))
}
