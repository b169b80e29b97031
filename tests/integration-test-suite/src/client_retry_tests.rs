//! Keep-alive reuse and retry against a real server that times idle
//! connections out.

use std::time::Duration;

use wharf_client::{Client, FetchOptions};
use wharf_router::endpoint;
use wharf_server::{Server, ServerConfig};

async fn impatient_server() -> wharf_server::ServerHandle {
    let mut server = Server::new(ServerConfig {
        read_timeout: 1,
        ..ServerConfig::default()
    });
    server
        .router()
        .get(
            "/ping",
            endpoint(|req, mut resp| {
                Box::pin(async move {
                    resp.set_content("pong", "text/plain");
                    Ok((req, resp))
                })
            }),
        )
        .unwrap();
    server.start("127.0.0.1", 0).await.unwrap()
}

#[tokio::test]
async fn stale_keepalive_connection_is_discarded_and_retried() {
    crate::init_tracing();
    let handle = impatient_server().await;
    let addr = handle.local_addr();
    let url = format!("http://{addr}/ping");
    let (host, port) = (addr.ip().to_string(), addr.port());

    let client = Client::new();
    let options = FetchOptions::default().with_keepalive(true);

    let first = client.fetch(&url, options.clone()).await.unwrap();
    assert_eq!(first.status, http::StatusCode::OK);
    assert_eq!(client.pool().idle_count(&host, port), 1);

    // let the server's read timeout close the idle session under us
    tokio::time::sleep(Duration::from_millis(1600)).await;

    let second = client.fetch(&url, options).await.unwrap();
    assert_eq!(second.status, http::StatusCode::OK);
    assert_eq!(&second.body[..], b"pong");
    assert_eq!(client.pool().idle_count(&host, port), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn keepalive_false_never_populates_the_pool() {
    let handle = impatient_server().await;
    let addr = handle.local_addr();
    let url = format!("http://{addr}/ping");
    let (host, port) = (addr.ip().to_string(), addr.port());

    let client = Client::new();
    let response = client.fetch(&url, FetchOptions::default()).await.unwrap();
    assert_eq!(response.status, http::StatusCode::OK);
    assert_eq!(client.pool().idle_count(&host, port), 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn cleanup_drops_idle_connections() {
    let handle = impatient_server().await;
    let addr = handle.local_addr();
    let url = format!("http://{addr}/ping");
    let (host, port) = (addr.ip().to_string(), addr.port());

    let client = Client::new();
    client
        .fetch(&url, FetchOptions::default().with_keepalive(true))
        .await
        .unwrap();
    assert_eq!(client.pool().idle_count(&host, port), 1);

    client.pool().cleanup();
    assert_eq!(client.pool().idle_count(&host, port), 0);

    handle.shutdown().await;
}
