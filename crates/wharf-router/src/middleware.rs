//! Built-in middleware: framework response defaults, CORS, request logging
//! and a per-path circuit breaker.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use http::{Method, StatusCode};

use wharf_http::{Request, Response, SERVER_NAME};

use crate::router::{HandlerFuture, Middleware, Next};

/// Bodies below this size are never compressed.
const MIN_DEFLATE_SIZE: usize = 64 * 1024;

/// The framework middleware every router pre-installs.
///
/// Before the chain: 404 default, version and keep-alive mirrored from the
/// request, `Server` and `Accept-Ranges` stamps. After the chain: default
/// 404 body, default `Content-Type`, deflate compression for large
/// compressible bodies the client accepts, and the payload length
/// recompute. A compression failure fails the response.
pub fn auto_headers() -> impl Middleware {
    AutoHeaders
}

struct AutoHeaders;

impl Middleware for AutoHeaders {
    fn handle(&self, req: Request, mut resp: Response, next: Next) -> HandlerFuture {
        Box::pin(async move {
            resp.status = StatusCode::NOT_FOUND;
            resp.version = req.version;
            resp.set_keep_alive(req.keep_alive());
            resp.set_header(http::header::SERVER, SERVER_NAME);
            resp.set_header(http::header::ACCEPT_RANGES, "bytes");
            resp.body = Bytes::new();

            let (req, mut resp) = next.run(req, resp).await?;

            if resp.status == StatusCode::NOT_FOUND {
                resp.body = Bytes::from_static(b"Not found\n");
            }
            if !resp.headers.contains_key(http::header::CONTENT_TYPE) {
                resp.set_header(http::header::CONTENT_TYPE, "text/plain");
            }

            // HEAD responses keep whatever length the handler declared
            if req.method != Method::HEAD {
                if should_deflate(&req, &resp) {
                    let mut encoder = DeflateEncoder::new(
                        Vec::with_capacity(resp.body.len() / 2),
                        Compression::default(),
                    );
                    encoder.write_all(&resp.body)?;
                    resp.body = encoder.finish()?.into();
                    resp.set_header(http::header::CONTENT_ENCODING, "deflate");
                }
                resp.prepare_payload();
            }
            Ok((req, resp))
        })
    }
}

fn should_deflate(req: &Request, resp: &Response) -> bool {
    if resp.body.len() < MIN_DEFLATE_SIZE {
        return false;
    }
    let accepts = req
        .header(http::header::ACCEPT_ENCODING)
        .map(|v| v.contains("deflate"))
        .unwrap_or(false);
    if !accepts {
        return false;
    }
    let content_type = resp.header(http::header::CONTENT_TYPE).unwrap_or("");
    !(content_type.contains("audio") || content_type.contains("video"))
}

/// Permissive CORS: short-circuits `OPTIONS` with an empty 200 and stamps
/// the allow headers on every response.
pub fn cors() -> impl Middleware {
    Cors
}

struct Cors;

impl Middleware for Cors {
    fn handle(&self, req: Request, mut resp: Response, next: Next) -> HandlerFuture {
        Box::pin(async move {
            if req.method == Method::OPTIONS {
                resp.set_content("", "text/plain");
            }

            let (req, mut resp) = next.run(req, resp).await?;

            resp.set_header("access-control-allow-origin".parse().unwrap(), "*");
            resp.set_header("access-control-allow-headers".parse().unwrap(), "*");
            resp.set_header("access-control-max-age".parse().unwrap(), "86400");
            resp.set_header(
                "access-control-allow-methods".parse().unwrap(),
                "GET, POST, PUT, DELETE, OPTIONS",
            );
            Ok((req, resp))
        })
    }
}

/// Log one line per request with method, path, status and latency.
pub fn logger() -> impl Middleware {
    Logger
}

struct Logger;

impl Middleware for Logger {
    fn handle(&self, req: Request, resp: Response, next: Next) -> HandlerFuture {
        Box::pin(async move {
            let started = Instant::now();
            let method = req.method.clone();
            let path = req.path.clone();

            let (req, resp) = next.run(req, resp).await?;

            tracing::info!(
                %method,
                %path,
                status = resp.status.as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request"
            );
            Ok((req, resp))
        })
    }
}

/// Per-path sliding-window request limiter.
///
/// A path that sees more than `max_hits` requests inside `window` is
/// answered with 403 until the oldest hit ages out.
pub struct CircuitBreaker {
    window: Duration,
    max_hits: usize,
    hits: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl CircuitBreaker {
    pub fn new(window: Duration, max_hits: usize) -> Self {
        Self {
            window,
            max_hits,
            hits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn admit(&self, path: &str) -> bool {
        let mut hits = self.hits.lock().expect("circuit breaker poisoned");
        let entries = hits.entry(path.to_string()).or_default();
        let now = Instant::now();
        if entries.len() == self.max_hits {
            match entries.front() {
                Some(oldest) if now.duration_since(*oldest) < self.window => return false,
                _ => {
                    entries.pop_front();
                }
            }
        }
        entries.push_back(now);
        true
    }
}

impl Middleware for CircuitBreaker {
    fn handle(&self, req: Request, mut resp: Response, next: Next) -> HandlerFuture {
        let admitted = self.admit(&req.path);
        Box::pin(async move {
            if !admitted {
                resp.status = StatusCode::FORBIDDEN;
                return Ok((req, resp));
            }
            next.run(req, resp).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{endpoint, Router};
    use std::io::Read;

    fn request(method: Method, target: &str) -> Request {
        let mut req = Request::new(method, target);
        req.derive_target().unwrap();
        req
    }

    #[tokio::test]
    async fn default_response_carries_framework_stamps() {
        let router = Router::new();
        let resp = router.dispatch(request(Method::GET, "/missing")).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(&resp.body[..], b"Not found\n");
        assert_eq!(resp.header(http::header::SERVER), Some(SERVER_NAME));
        assert_eq!(resp.header(http::header::ACCEPT_RANGES), Some("bytes"));
        assert_eq!(resp.header(http::header::CONTENT_TYPE), Some("text/plain"));
        assert_eq!(resp.header(http::header::CONTENT_LENGTH), Some("10"));
    }

    #[tokio::test]
    async fn large_accepted_bodies_are_deflated() {
        let mut router = Router::new();
        router
            .get(
                "/big",
                endpoint(|req, mut resp| {
                    Box::pin(async move {
                        resp.set_content(vec![b'a'; 128 * 1024], "text/plain");
                        Ok((req, resp))
                    })
                }),
            )
            .unwrap();

        let mut req = request(Method::GET, "/big");
        req.headers.insert(
            http::header::ACCEPT_ENCODING,
            http::HeaderValue::from_static("gzip, deflate"),
        );
        let resp = router.dispatch(req).await;

        assert_eq!(resp.header(http::header::CONTENT_ENCODING), Some("deflate"));
        assert!(resp.body.len() < 128 * 1024);
        assert_eq!(
            resp.header(http::header::CONTENT_LENGTH),
            Some(resp.body.len().to_string().as_str())
        );

        // inflating restores the original payload
        let mut decoder = flate2::read::DeflateDecoder::new(&resp.body[..]);
        let mut restored = Vec::new();
        decoder.read_to_end(&mut restored).unwrap();
        assert_eq!(restored, vec![b'a'; 128 * 1024]);
    }

    #[tokio::test]
    async fn clients_without_deflate_get_identity_bodies() {
        let mut router = Router::new();
        router
            .get(
                "/big",
                endpoint(|req, mut resp| {
                    Box::pin(async move {
                        resp.set_content(vec![b'b'; 128 * 1024], "text/plain");
                        Ok((req, resp))
                    })
                }),
            )
            .unwrap();

        let resp = router.dispatch(request(Method::GET, "/big")).await;
        assert!(resp.header(http::header::CONTENT_ENCODING).is_none());
        assert_eq!(resp.body.len(), 128 * 1024);
    }

    #[tokio::test]
    async fn audio_bodies_are_never_deflated() {
        let mut router = Router::new();
        router
            .get(
                "/sound",
                endpoint(|req, mut resp| {
                    Box::pin(async move {
                        resp.set_content(vec![0u8; 128 * 1024], "audio/wav");
                        Ok((req, resp))
                    })
                }),
            )
            .unwrap();

        let mut req = request(Method::GET, "/sound");
        req.headers.insert(
            http::header::ACCEPT_ENCODING,
            http::HeaderValue::from_static("deflate"),
        );
        let resp = router.dispatch(req).await;
        assert!(resp.header(http::header::CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn cors_stamps_allow_headers() {
        let mut router = Router::new();
        router.with(cors());
        router
            .get(
                "/api",
                endpoint(|req, mut resp| {
                    Box::pin(async move {
                        resp.set_content("ok", "text/plain");
                        Ok((req, resp))
                    })
                }),
            )
            .unwrap();

        let resp = router.dispatch(request(Method::GET, "/api")).await;
        assert_eq!(
            resp.header("access-control-allow-origin".parse().unwrap()),
            Some("*")
        );

        let resp = router.dispatch(request(Method::OPTIONS, "/api")).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(
            resp.header("access-control-allow-methods".parse().unwrap()),
            Some("GET, POST, PUT, DELETE, OPTIONS")
        );
    }

    #[tokio::test]
    async fn circuit_breaker_rejects_past_the_limit() {
        let mut router = Router::new();
        router.with(CircuitBreaker::new(Duration::from_secs(60), 2));
        router
            .get(
                "/limited",
                endpoint(|req, mut resp| {
                    Box::pin(async move {
                        resp.set_content("ok", "text/plain");
                        Ok((req, resp))
                    })
                }),
            )
            .unwrap();

        for _ in 0..2 {
            let resp = router.dispatch(request(Method::GET, "/limited")).await;
            assert_eq!(resp.status, StatusCode::OK);
        }
        let resp = router.dispatch(request(Method::GET, "/limited")).await;
        assert_eq!(resp.status, StatusCode::FORBIDDEN);

        // other paths are unaffected
        let resp = router.dispatch(request(Method::GET, "/elsewhere")).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }
}
