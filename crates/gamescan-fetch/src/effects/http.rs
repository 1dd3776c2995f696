use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Answer to a capped ranged `GET`, used to detect range support.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Probe {
    pub status:         u16,
    /// Value of `Accept-Ranges`, if present.
    pub accept_ranges:  Option<String>,
    /// Value of `Content-Length` of the probe response.
    pub content_length: Option<u64>,
    /// Total size taken from `Content-Range: bytes a-b/<total>`.
    pub total_size:     Option<u64>,
}

/// Asynchronous HTTP client abstraction.
///
/// Implementations handle their own redirect following, timeout
/// configuration, and error mapping.
///
/// # Implementations
///
/// - [`ReqwestClient`](crate::ReqwestClient): production implementation using `reqwest`
/// - [`MemoryClient`](crate::MemoryClient): in-memory blobs for tests
pub trait HttpClient: Send + Sync {
    /// Error type for HTTP operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a streaming `GET` and return the response body as a stream.
    ///
    /// When `headers` carries a `Range`, an answer other than
    /// `206 Partial Content` must be reported as an error so the caller
    /// never appends a full body to a partial file.
    fn stream(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error>> + Send;

    /// Query the Content-Length header without downloading the body.
    ///
    /// `Ok(None)` if absent or using chunked encoding.
    fn head(&self, url: &str) -> impl Future<Output = Result<Option<u64>, Self::Error>> + Send;

    /// Issue `GET` with `Range: bytes=0-<range_end>` and report the response
    /// metadata without reading the body.
    fn probe(&self, url: &str, range_end: u64) -> impl Future<Output = Result<Probe, Self::Error>> + Send;
}

/// Parses the total size out of a `Content-Range: bytes a-b/total` value.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

/// Parses a `Range: bytes=a-b` or `bytes=a-` header into inclusive bounds.
pub fn parse_range_header(value: &str) -> Option<(u64, Option<u64>)> {
    let spec = value.trim().strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => None,
        end => Some(end.parse().ok()?),
    };
    Some((start, end))
}

pub(crate) fn range_header(headers: &[(String, String)]) -> Option<&str> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("range"))
        .map(|(_, value)| value.as_str())
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use futures_util::StreamExt;
    use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, HeaderMap, HeaderName, RANGE};
    use reqwest::{Client, StatusCode};

    use super::*;

    fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
        headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Errors raised by [`ReqwestClient`].
    #[derive(Debug, thiserror::Error)]
    pub enum HttpError {
        #[error(transparent)]
        Request(#[from] reqwest::Error),

        #[error("unexpected HTTP status {0}")]
        Status(u16),

        #[error("server ignored the range request (status {0})")]
        RangeIgnored(u16),
    }

    /// Production HTTP client implementation using reqwest.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestClient {
        client: Client,
    }

    impl ReqwestClient {
        /// Create a new ReqwestClient with default configuration.
        pub fn new() -> Self { Self::default() }

        /// Wrap an already configured reqwest client.
        pub fn with_client(client: Client) -> Self { Self { client } }
    }

    impl HttpClient for ReqwestClient {
        type Error = HttpError;

        async fn stream(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error> {
            let mut request = self.client.get(url);
            for (key, value) in headers {
                request = request.header(key, value);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(HttpError::Status(status.as_u16()));
            }
            if range_header(headers).is_some() && status != StatusCode::PARTIAL_CONTENT {
                return Err(HttpError::RangeIgnored(status.as_u16()));
            }

            let stream = response.bytes_stream().map(|result| result.map_err(HttpError::from));
            Ok(Box::pin(stream))
        }

        async fn head(&self, url: &str) -> Result<Option<u64>, Self::Error> {
            let response = self.client.head(url).send().await?;
            if !response.status().is_success() {
                return Ok(None);
            }
            Ok(header_str(response.headers(), CONTENT_LENGTH).and_then(|s| s.parse::<u64>().ok()))
        }

        async fn probe(&self, url: &str, range_end: u64) -> Result<Probe, Self::Error> {
            let response = self.client.get(url).header(RANGE, format!("bytes=0-{range_end}")).send().await?;
            let headers = response.headers();

            // dropping the response closes the body without reading it
            Ok(Probe {
                status:         response.status().as_u16(),
                accept_ranges:  header_str(headers, ACCEPT_RANGES).map(str::to_owned),
                content_length: header_str(headers, CONTENT_LENGTH).and_then(|s| s.parse().ok()),
                total_size:     header_str(headers, CONTENT_RANGE).and_then(parse_content_range_total),
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::{HttpError, ReqwestClient};
