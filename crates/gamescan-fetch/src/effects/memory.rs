use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{StreamExt, stream};

use super::http::{BoxStream, HttpClient, Probe, parse_range_header, range_header};

/// Errors raised by [`MemoryClient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("no blob registered for {0}")]
    NotFound(String),

    #[error("unsatisfiable range {0}")]
    InvalidRange(String),

    #[error("injected failure for {0}")]
    Injected(String),
}

/// A `GET` observed by a [`MemoryClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url:   String,
    pub range: Option<String>,
}

#[derive(Debug)]
struct MemoryState {
    blobs:          HashMap<String, Bytes>,
    range_support:  bool,
    report_length:  bool,
    failing:        usize,
    interrupted:    usize,
    interrupt_at:   usize,
    truncate:       bool,
    piece_size:     usize,
    read_delay:     Duration,
    requests:       Vec<RecordedRequest>,
}

/// In-memory [`HttpClient`] serving registered blobs.
///
/// Honours `Range` headers, and can be told to ignore ranges, fail or cut
/// off responses, and slow down reads. Clones share state, so a test can
/// keep a handle for inspection after moving one into a downloader.
#[derive(Debug, Clone)]
pub struct MemoryClient {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryClient {
    fn default() -> Self { Self::new() }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                blobs:         HashMap::new(),
                range_support: true,
                report_length: true,
                failing:       0,
                interrupted:   0,
                interrupt_at:  0,
                truncate:      false,
                piece_size:    4096,
                read_delay:    Duration::ZERO,
                requests:      Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> { self.state.lock().unwrap_or_else(PoisonError::into_inner) }

    /// Registers `data` under `url`.
    pub fn with_blob(self, url: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(url, data);
        self
    }

    pub fn insert(&self, url: impl Into<String>, data: impl Into<Bytes>) {
        self.lock().blobs.insert(url.into(), data.into());
    }

    /// Serve whole bodies with status 200 and no `Accept-Ranges`.
    pub fn without_range_support(self) -> Self {
        self.lock().range_support = false;
        self
    }

    /// Answer `HEAD` without a `Content-Length`.
    pub fn without_content_length(self) -> Self {
        self.lock().report_length = false;
        self
    }

    /// Bytes per body piece.
    pub fn piece_size(self, size: usize) -> Self {
        self.lock().piece_size = size.max(1);
        self
    }

    /// Delay before every body piece.
    pub fn read_delay(self, delay: Duration) -> Self {
        self.lock().read_delay = delay;
        self
    }

    /// Reject the next `count` body requests.
    pub fn fail_next(&self, count: usize) { self.lock().failing = count; }

    /// Cut the next `count` bodies off with an error after `after` bytes.
    pub fn interrupt_next(&self, count: usize, after: usize) {
        let mut state = self.lock();
        state.interrupted = count;
        state.interrupt_at = after;
    }

    /// End every body one byte early.
    pub fn truncate_bodies(&self, truncate: bool) { self.lock().truncate = truncate; }

    /// Body requests seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> { self.lock().requests.clone() }
}

impl HttpClient for MemoryClient {
    type Error = MemoryError;

    async fn stream(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error> {
        let (body, piece_size, delay, interrupt_at) = {
            let mut state = self.lock();
            let range = range_header(headers).map(str::to_owned);
            state.requests.push(RecordedRequest {
                url:   url.to_owned(),
                range: range.clone(),
            });

            if state.failing > 0 {
                state.failing -= 1;
                return Err(MemoryError::Injected(url.to_owned()));
            }
            let blob = state.blobs.get(url).cloned().ok_or_else(|| MemoryError::NotFound(url.to_owned()))?;

            let mut body = match range {
                Some(range) if state.range_support => {
                    let (start, end) = parse_range_header(&range).ok_or_else(|| MemoryError::InvalidRange(range.clone()))?;
                    let len = blob.len() as u64;
                    let end = end.unwrap_or(u64::MAX);
                    if start >= len || start > end {
                        return Err(MemoryError::InvalidRange(range));
                    }
                    blob.slice(start as usize..=end.min(len - 1) as usize)
                }
                _ => blob,
            };
            if state.truncate && !body.is_empty() {
                body.truncate(body.len() - 1);
            }

            let interrupt_at = if state.interrupted > 0 {
                state.interrupted -= 1;
                Some(state.interrupt_at)
            } else {
                None
            };
            (body, state.piece_size, state.read_delay, interrupt_at)
        };

        let mut pieces = Vec::new();
        let mut offset = 0;
        let limit = interrupt_at.map_or(body.len(), |at| at.min(body.len()));
        while offset < limit {
            let end = (offset + piece_size).min(limit);
            pieces.push(Ok(body.slice(offset..end)));
            offset = end;
        }
        if interrupt_at.is_some() {
            pieces.push(Err(MemoryError::Injected(url.to_owned())));
        }

        let body = stream::iter(pieces).then(move |piece| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            piece
        });
        Ok(Box::pin(body))
    }

    async fn head(&self, url: &str) -> Result<Option<u64>, Self::Error> {
        let state = self.lock();
        let blob = state.blobs.get(url).ok_or_else(|| MemoryError::NotFound(url.to_owned()))?;
        Ok(state.report_length.then_some(blob.len() as u64))
    }

    async fn probe(&self, url: &str, range_end: u64) -> Result<Probe, Self::Error> {
        let state = self.lock();
        let Some(blob) = state.blobs.get(url) else {
            return Ok(Probe {
                status: 404,
                ..Probe::default()
            });
        };
        let len = blob.len() as u64;

        let probe = if state.range_support && len > 0 {
            Probe {
                status:         206,
                accept_ranges:  Some("bytes".into()),
                content_length: Some(range_end.saturating_add(1).min(len)),
                total_size:     Some(len),
            }
        } else {
            Probe {
                status:         200,
                accept_ranges:  None,
                content_length: state.report_length.then_some(len),
                total_size:     None,
            }
        };
        Ok(probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(client: &MemoryClient, url: &str, range: Option<&str>) -> Result<Vec<u8>, MemoryError> {
        let headers: Vec<_> = range.map(|r| ("Range".to_string(), r.to_string())).into_iter().collect();
        let mut body = client.stream(url, &headers).await?;
        let mut out = Vec::new();
        while let Some(piece) = body.next().await {
            out.extend_from_slice(&piece?);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn test_serves_ranges() {
        let client = MemoryClient::new().with_blob("m://a", &b"0123456789"[..]).piece_size(3);
        assert_eq!(collect(&client, "m://a", None).await.unwrap(), b"0123456789");
        assert_eq!(collect(&client, "m://a", Some("bytes=2-5")).await.unwrap(), b"2345");
        assert_eq!(collect(&client, "m://a", Some("bytes=7-")).await.unwrap(), b"789");
        assert!(collect(&client, "m://a", Some("bytes=20-30")).await.is_err());
        assert_eq!(client.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_ignores_ranges_when_disabled() {
        let client = MemoryClient::new().with_blob("m://a", &b"abcdef"[..]).without_range_support();
        assert_eq!(collect(&client, "m://a", Some("bytes=2-3")).await.unwrap(), b"abcdef");
        let probe = client.probe("m://a", 1).await.unwrap();
        assert_eq!(probe.status, 200);
        assert_eq!(probe.content_length, Some(6));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let client = MemoryClient::new().with_blob("m://a", &b"abcdef"[..]).piece_size(2);
        client.fail_next(1);
        assert!(matches!(collect(&client, "m://a", None).await, Err(MemoryError::Injected(_))));

        client.interrupt_next(1, 3);
        assert!(collect(&client, "m://a", None).await.is_err());
        assert_eq!(collect(&client, "m://a", None).await.unwrap(), b"abcdef");

        client.truncate_bodies(true);
        assert_eq!(collect(&client, "m://a", None).await.unwrap(), b"abcde");
    }

    #[tokio::test]
    async fn test_probe_and_head() {
        let client = MemoryClient::new().with_blob("m://a", vec![0u8; 100]);
        let probe = client.probe("m://a", 9).await.unwrap();
        assert_eq!(probe.status, 206);
        assert_eq!(probe.content_length, Some(10));
        assert_eq!(probe.total_size, Some(100));
        assert_eq!(client.head("m://a").await.unwrap(), Some(100));
        assert_eq!(client.probe("m://missing", 9).await.unwrap().status, 404);
    }
}
