//! Per-connection session state machine.
//!
//! One task drives one accepted socket: read a request under the configured
//! timeout, derive routing fields, dispatch (WebSocket table or middleware
//! chain), write the response, loop while keep-alive holds, then half-close.

use std::future::Future;
use std::time::Duration;

use bytes::BytesMut;
use http::{Method, StatusCode, Version};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use wharf_http::{codec, HttpError, Response, SERVER_NAME};

use crate::{websocket, Server};

pub(crate) async fn run(server: &Server, stream: TcpStream) -> wharf_http::Result<()> {
    let outcome = drive(server, stream).await;
    match outcome {
        Ok(()) => Ok(()),
        Err(error) if error.is_benign_close() => {
            tracing::debug!("session ended: {error}");
            Ok(())
        }
        Err(error) => {
            if let Some(callback) = &server.on_error {
                if callback(&error) {
                    return Ok(());
                }
            }
            Err(error)
        }
    }
}

async fn drive(server: &Server, mut stream: TcpStream) -> wharf_http::Result<()> {
    let mut buf = BytesMut::with_capacity(8 * 1024);
    let timeout = server.config.read_timeout;

    loop {
        let mut request = with_timeout(
            timeout,
            codec::read_request(&mut stream, &mut buf, server.config.body_limit),
        )
        .await?;

        let method = request.method.clone();
        let version = request.version;
        let keep_alive = request.keep_alive();

        let response = if request.derive_target().is_err() {
            bad_request(version, keep_alive)
        } else if request.is_websocket_upgrade() {
            match websocket::find_route(&server.ws_routes, &mut request) {
                Some(route) => {
                    // the handler owns the socket from here on
                    let leftover = buf.split().freeze();
                    return websocket::serve(route, request, stream, leftover).await;
                }
                None => {
                    let mut resp = not_found(version, keep_alive);
                    resp.prepare_payload();
                    resp
                }
            }
        } else {
            server.router.dispatch(request).await
        };

        with_timeout(
            timeout,
            codec::write_response(&mut stream, &response, method == Method::HEAD),
        )
        .await?;

        if !response.keep_alive() {
            break;
        }
    }

    // half-close the write side; the peer may already be gone
    let _ = stream.shutdown().await;
    Ok(())
}

fn bad_request(version: Version, keep_alive: bool) -> Response {
    let mut resp = Response::new();
    resp.version = version;
    resp.set_keep_alive(keep_alive);
    resp.status = StatusCode::BAD_REQUEST;
    resp.body = bytes::Bytes::from_static(b"Illegal request-target\n");
    resp.set_header(http::header::SERVER, SERVER_NAME);
    resp.set_header(http::header::CONTENT_TYPE, "text/plain");
    resp.prepare_payload();
    resp
}

fn not_found(version: Version, keep_alive: bool) -> Response {
    let mut resp = Response::new();
    resp.version = version;
    resp.set_keep_alive(keep_alive);
    resp.body = bytes::Bytes::from_static(b"Not found\n");
    resp.set_header(http::header::SERVER, SERVER_NAME);
    resp.set_header(http::header::CONTENT_TYPE, "text/plain");
    resp
}

async fn with_timeout<T, F>(seconds: i64, operation: F) -> wharf_http::Result<T>
where
    F: Future<Output = wharf_http::Result<T>>,
{
    if seconds <= 0 {
        return operation.await;
    }
    match tokio::time::timeout(Duration::from_secs(seconds as u64), operation).await {
        Ok(result) => result,
        Err(_) => Err(HttpError::Timeout),
    }
}
