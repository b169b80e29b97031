//! Multipart form upload helper.

use http::Method;

use wharf_http::{encode_form, random_boundary, FormPart, Response};

use crate::fetch::{Client, FetchOptions};
use crate::Result;

pub(crate) async fn upload(client: &Client, url: &str, parts: &[FormPart]) -> Result<Response> {
    let boundary = random_boundary();
    let body = encode_form(parts, &boundary);
    let options = FetchOptions::default()
        .with_method(Method::POST)
        .with_header(
            http::header::CONTENT_TYPE,
            &format!("multipart/form-data; boundary={boundary}"),
        )
        .with_body(body);
    client.fetch(url, options).await
}
