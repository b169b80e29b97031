//! Full-stack routing: CORS + parameterized routes served over TCP and
//! fetched with the Wharf client.

use wharf_client::{Client, FetchOptions};
use wharf_router::{cors, endpoint};
use wharf_server::{Server, ServerConfig};

async fn routed_server() -> wharf_server::ServerHandle {
    let mut server = Server::new(ServerConfig::default());
    server.router().with(cors());
    server
        .router()
        .get(
            "/api/:service/:method",
            endpoint(|req, mut resp| {
                Box::pin(async move {
                    let body = format!(
                        "{}/{}/x={}",
                        req.path_param("service").unwrap_or("-"),
                        req.path_param("method").unwrap_or("-"),
                        req.query_param("x").unwrap_or("-"),
                    );
                    resp.set_content(body, "text/plain");
                    Ok((req, resp))
                })
            }),
        )
        .unwrap();
    server
        .router()
        .get(
            "/",
            endpoint(|req, mut resp| {
                Box::pin(async move {
                    resp.set_content("index", "text/plain");
                    Ok((req, resp))
                })
            }),
        )
        .unwrap();

    server.start("127.0.0.1", 0).await.unwrap()
}

#[tokio::test]
async fn parameterized_route_with_cors_post_stage() {
    crate::init_tracing();
    let handle = routed_server().await;
    let url = format!("http://{}/api/users/list?x=1", handle.local_addr());

    let response = Client::new().fetch(&url, FetchOptions::default()).await.unwrap();

    assert_eq!(response.status, http::StatusCode::OK);
    assert_eq!(&response.body[..], b"users/list/x=1");
    assert_eq!(
        response.header("access-control-allow-origin".parse().unwrap()),
        Some("*")
    );
    assert!(response
        .header(http::header::SERVER)
        .unwrap()
        .starts_with("wharf/"));

    handle.shutdown().await;
}

#[tokio::test]
async fn root_route_and_not_found_fallback() {
    let handle = routed_server().await;
    let base = format!("http://{}", handle.local_addr());
    let client = Client::new();

    let index = client
        .fetch(&format!("{base}/"), FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(&index.body[..], b"index");

    let missing = client
        .fetch(&format!("{base}/api/only/two/segments/nope"), FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(missing.status, http::StatusCode::NOT_FOUND);
    assert_eq!(&missing.body[..], b"Not found\n");

    handle.shutdown().await;
}

#[tokio::test]
async fn options_short_circuits_through_cors() {
    let handle = routed_server().await;
    let url = format!("http://{}/api/users/list", handle.local_addr());

    let response = Client::new()
        .fetch(&url, FetchOptions::default().with_method(http::Method::OPTIONS))
        .await
        .unwrap();

    assert_eq!(response.status, http::StatusCode::OK);
    assert!(response.body.is_empty());
    assert_eq!(
        response.header("access-control-allow-methods".parse().unwrap()),
        Some("GET, POST, PUT, DELETE, OPTIONS")
    );

    handle.shutdown().await;
}
