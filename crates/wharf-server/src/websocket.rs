//! WebSocket route table and upgrade handling.
//!
//! An upgrade request is matched against registered templates in insertion
//! order; the first hit takes the socket out of the HTTP session and hands
//! the rebound stream to the handler, which owns it until it returns.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::WebSocketStream;

use wharf_http::{HttpError, Request};
use wharf_router::{HandlerError, PathPattern};

use crate::Result;

/// The stream a WebSocket handler owns for its lifetime.
pub type WsStream = WebSocketStream<TcpStream>;

pub type WsFuture = Pin<Box<dyn Future<Output = std::result::Result<(), HandlerError>> + Send>>;

/// A WebSocket connection handler.
pub trait WsHandler: Send + Sync + 'static {
    fn handle(&self, req: Request, stream: WsStream) -> WsFuture;
}

impl<F> WsHandler for F
where
    F: Fn(Request, WsStream) -> WsFuture + Send + Sync + 'static,
{
    fn handle(&self, req: Request, stream: WsStream) -> WsFuture {
        self(req, stream)
    }
}

pub(crate) struct WsRoute {
    pattern: PathPattern,
    handler: Arc<dyn WsHandler>,
}

impl WsRoute {
    pub(crate) fn new(template: &str, handler: impl WsHandler) -> Result<Self> {
        Ok(Self {
            pattern: PathPattern::compile(template, true)?,
            handler: Arc::new(handler),
        })
    }
}

/// First registered route whose template accepts the path wins; the match
/// installs `path_params` on the request.
pub(crate) fn find_route<'a>(routes: &'a [WsRoute], req: &mut Request) -> Option<&'a WsRoute> {
    for route in routes {
        if let Some(params) = route.pattern.match_path(&req.path) {
            req.path_params = Some(params);
            return Some(route);
        }
    }
    None
}

/// Complete the handshake, rebind the socket to a WebSocket stream and run
/// the handler to completion.
pub(crate) async fn serve(
    route: &WsRoute,
    req: Request,
    mut stream: TcpStream,
    leftover: Bytes,
) -> wharf_http::Result<()> {
    let key = req
        .header(http::header::SEC_WEBSOCKET_KEY)
        .ok_or_else(|| HttpError::Parse {
            message: "websocket upgrade without a key".to_string(),
        })?;
    let accept = derive_accept_key(key.as_bytes());

    let handshake = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\r\n"
    );
    stream.write_all(handshake.as_bytes()).await?;
    stream.flush().await?;

    // frames the peer pipelined behind the upgrade must not be dropped
    let ws = if leftover.is_empty() {
        WebSocketStream::from_raw_socket(stream, Role::Server, None).await
    } else {
        WebSocketStream::from_partially_read(stream, leftover.to_vec(), Role::Server, None).await
    };

    tracing::debug!(path = %req.path, "websocket session started");
    match route.handler.handle(req, ws).await {
        Ok(()) => Ok(()),
        Err(error) if is_benign_ws_close(&error) => {
            tracing::debug!("websocket session closed: {error}");
            Ok(())
        }
        Err(error) => Err(HttpError::Io(std::io::Error::other(error.to_string()))),
    }
}

fn is_benign_ws_close(error: &HandlerError) -> bool {
    match error.downcast_ref::<WsError>() {
        Some(WsError::ConnectionClosed | WsError::AlreadyClosed) => true,
        Some(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)) => true,
        Some(WsError::Io(io)) => matches!(
            io.kind(),
            std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}
