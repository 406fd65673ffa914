//! HTTP transport for the wikiapi client.
//!
//! The client core only needs "send one request, get a status, headers and a
//! body back". [`Transport`] is that seam; [`HttpClient`] is the reqwest-backed
//! implementation used outside of tests.

pub mod client;
pub mod request;
pub mod response;
pub mod transport;

pub use client::{build_client, HttpClient, HttpConfig, HttpError};
pub use request::{headers, HttpRequest, Method, Payload};
pub use response::{parse_json, HttpResponse, ResponseError};
pub use transport::Transport;

/// Header types shared with callers so they don't need a direct reqwest dependency.
pub use reqwest::header;
