//! Static file serving over the full stack, including range requests.

use std::io::Write;

use wharf_client::{Client, FetchOptions};
use wharf_server::{Server, ServerConfig};

struct Fixture {
    handle: wharf_server::ServerHandle,
    _root: tempfile::TempDir,
}

async fn static_server() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(root.path().join("a.bin")).unwrap();
    file.write_all(&vec![7u8; 1000]).unwrap();
    std::fs::write(root.path().join("hello.txt"), "hello file").unwrap();

    let mut server = Server::new(ServerConfig::default());
    server.serve_static("/static", root.path().to_str().unwrap());
    let handle = server.start("127.0.0.1", 0).await.unwrap();
    Fixture {
        handle,
        _root: root,
    }
}

#[tokio::test]
async fn whole_file_roundtrip() {
    let fixture = static_server().await;
    let url = format!("http://{}/static/hello.txt", fixture.handle.local_addr());

    let response = Client::new().fetch(&url, FetchOptions::default()).await.unwrap();
    assert_eq!(response.status, http::StatusCode::OK);
    assert_eq!(&response.body[..], b"hello file");
    assert_eq!(
        response.header(http::header::CONTENT_TYPE),
        Some("text/plain")
    );

    fixture.handle.shutdown().await;
}

#[tokio::test]
async fn closed_range_returns_206_with_content_range() {
    let fixture = static_server().await;
    let url = format!("http://{}/static/a.bin", fixture.handle.local_addr());

    let options = FetchOptions::default().with_header(http::header::RANGE, "bytes=100-199");
    let response = Client::new().fetch(&url, options).await.unwrap();

    assert_eq!(response.status, http::StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.body.len(), 100);
    assert_eq!(
        response.header(http::header::CONTENT_RANGE),
        Some("bytes 100-199/1000")
    );

    fixture.handle.shutdown().await;
}

#[tokio::test]
async fn suffix_and_unsatisfiable_ranges() {
    let fixture = static_server().await;
    let url = format!("http://{}/static/a.bin", fixture.handle.local_addr());
    let client = Client::new();

    let tail = client
        .fetch(
            &url,
            FetchOptions::default().with_header(http::header::RANGE, "bytes=-25"),
        )
        .await
        .unwrap();
    assert_eq!(tail.status, http::StatusCode::PARTIAL_CONTENT);
    assert_eq!(tail.body.len(), 25);
    assert_eq!(
        tail.header(http::header::CONTENT_RANGE),
        Some("bytes 975-999/1000")
    );

    let out_of_bounds = client
        .fetch(
            &url,
            FetchOptions::default().with_header(http::header::RANGE, "bytes=5000-6000"),
        )
        .await
        .unwrap();
    assert_eq!(out_of_bounds.status, http::StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        out_of_bounds.header(http::header::CONTENT_RANGE),
        Some("bytes */1000")
    );

    fixture.handle.shutdown().await;
}

#[tokio::test]
async fn head_reports_size_without_payload() {
    let fixture = static_server().await;
    let url = format!("http://{}/static/a.bin", fixture.handle.local_addr());

    let response = Client::new()
        .fetch(&url, FetchOptions::default().with_method(http::Method::HEAD))
        .await
        .unwrap();
    assert_eq!(response.status, http::StatusCode::OK);
    assert_eq!(
        response.header(http::header::CONTENT_LENGTH),
        Some("1000")
    );

    fixture.handle.shutdown().await;
}

#[tokio::test]
async fn listing_is_served_for_directories_without_index() {
    let fixture = static_server().await;
    let url = format!("http://{}/static/", fixture.handle.local_addr());

    let response = Client::new().fetch(&url, FetchOptions::default()).await.unwrap();
    assert_eq!(response.status, http::StatusCode::OK);
    assert_eq!(response.header(http::header::CONTENT_TYPE), Some("text/html"));
    let html = String::from_utf8(response.body.to_vec()).unwrap();
    assert!(html.contains("href=\"/static/a.bin\""));
    assert!(html.contains("href=\"/static/hello.txt\""));

    fixture.handle.shutdown().await;
}
