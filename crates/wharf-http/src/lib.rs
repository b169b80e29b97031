//! # Wharf HTTP
//!
//! The HTTP/1.1 object model and wire codec shared by the Wharf server and
//! client: request/response types with derived routing fields, an
//! incremental head parser with body-size limits, query-string decoding and
//! a multipart/form-data encoder.
//!
//! This crate knows nothing about routing or sockets beyond
//! `AsyncRead`/`AsyncWrite`; the server and client crates own connection
//! lifetimes and drive the codec.

pub mod codec;
pub mod error;
pub mod multipart;
pub mod query;
pub mod request;
pub mod response;

pub use error::{HttpError, Result};
pub use multipart::{encode_form, parse_form, random_boundary, FormPart};
pub use request::Request;
pub use response::Response;

/// `Server` header stamped on every response.
pub const SERVER_NAME: &str = concat!("wharf/", env!("CARGO_PKG_VERSION"));

/// `User-Agent` header sent by the client.
pub const USER_AGENT: &str = concat!("wharf-client/", env!("CARGO_PKG_VERSION"));
