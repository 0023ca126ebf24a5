//! `reqwest` implementation of [`Transport`].

use futures_util::stream::{self, StreamExt};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Body;
use reqwest::multipart::{Form, Part};
use resup_protocol::constants::{CHUNK_PART_CONTENT_TYPE, CHUNK_PART_FILE_NAME};
use resup_uploader::{
    ProgressFn, QueryRequest, Transport, TransportError, TransportFuture, TransportResponse,
    WriteRequest,
};
use tracing::trace;

const USER_AGENT: &str = concat!("resup/", env!("CARGO_PKG_VERSION"));

/// Size of the pieces the chunk body is streamed in. Progress is reported
/// once per piece.
const STREAM_PIECE: usize = 64 * 1024;

/// Bytes left as-is in query components: `[A-Za-z0-9]` and `-_.!~*'()`.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Errors from the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<HttpError> for TransportError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Http(e) if e.is_timeout() => TransportError::Timeout,
            other => TransportError::Network(other.to_string()),
        }
    }
}

/// Transport backed by a shared `reqwest` connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, HttpError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http })
    }

    /// Wraps a preconfigured client (proxies, custom TLS roots, headers).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn query(&self, request: QueryRequest) -> Result<TransportResponse, HttpError> {
        let resp = self
            .http
            .get(query_url(&request.url, &request.params))
            .timeout(request.timeout)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        trace!(url = %request.url, status, "resume query answered");
        Ok(TransportResponse::new(status, body))
    }

    async fn write(
        &self,
        request: WriteRequest,
        progress: ProgressFn,
    ) -> Result<TransportResponse, HttpError> {
        let mut form = Form::new();
        for (name, value) in request.fields {
            form = form.text(name, value);
        }
        let part = chunk_part(request.data, progress)?;
        form = form.part(request.field_name, part);

        let resp = self.http.post(&request.url).multipart(form).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        trace!(url = %request.url, status, "chunk write answered");
        Ok(TransportResponse::new(status, body))
    }
}

/// Appends `params` to `url` with `?`, or `&` when `url` already has a
/// query string. Spaces are sent as `%20`.
fn query_url(url: &str, params: &[(String, String)]) -> String {
    let pairs: Vec<String> = params
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(name, QUERY_COMPONENT),
                utf8_percent_encode(value, QUERY_COMPONENT)
            )
        })
        .collect();
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{}", pairs.join("&"))
}

/// Builds the binary part, streamed in pieces that report
/// `(bytes_sent, total)` as the body is pulled.
fn chunk_part(data: Vec<u8>, progress: ProgressFn) -> Result<Part, HttpError> {
    let total = data.len() as u64;
    let pieces: Vec<Vec<u8>> = data.chunks(STREAM_PIECE).map(<[u8]>::to_vec).collect();

    let mut sent = 0u64;
    let body = stream::iter(pieces).map(move |piece| {
        sent += piece.len() as u64;
        progress(sent, total);
        Ok::<_, std::io::Error>(piece)
    });

    let part = Part::stream_with_length(Body::wrap_stream(body), total)
        .file_name(CHUNK_PART_FILE_NAME)
        .mime_str(CHUNK_PART_CONTENT_TYPE)?;
    Ok(part)
}

impl Transport for HttpTransport {
    fn get(&self, request: QueryRequest) -> TransportFuture<'_> {
        Box::pin(async move { self.query(request).await.map_err(TransportError::from) })
    }

    fn post_multipart(&self, request: WriteRequest, progress: ProgressFn) -> TransportFuture<'_> {
        Box::pin(async move {
            self.write(request, progress)
                .await
                .map_err(TransportError::from)
        })
    }
}
