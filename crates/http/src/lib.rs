//! HTTP transport for the resup uploader.
//!
//! Resume queries are sent as `GET` with query parameters, chunk writes as
//! `multipart/form-data` `POST` whose binary part is streamed so that upload
//! progress can be reported while it is sent.

pub mod client;

pub use client::{HttpError, HttpTransport};
