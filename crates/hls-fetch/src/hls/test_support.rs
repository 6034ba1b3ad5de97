use crate::HlsError;
use crate::transport::{SegmentBody, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

#[inline]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// In-memory transport serving fixed bodies, split into fixed-size chunks.
pub(crate) struct MemoryTransport {
    resources: Mutex<HashMap<String, Bytes>>,
    requests: Mutex<Vec<String>>,
    chunk_size: usize,
    send_content_length: bool,
    truncate_by: usize,
}

impl MemoryTransport {
    pub(crate) fn new() -> Self {
        Self {
            resources: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            chunk_size: 1024,
            send_content_length: true,
            truncate_by: 0,
        }
    }

    pub(crate) fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub(crate) fn without_content_length(mut self) -> Self {
        self.send_content_length = false;
        self
    }

    /// Cut `bytes` off every streamed body while still declaring the full length.
    pub(crate) fn with_truncated_bodies(mut self, bytes: usize) -> Self {
        self.truncate_by = bytes;
        self
    }

    pub(crate) fn insert(&self, url: &str, body: impl Into<Bytes>) {
        self.resources
            .lock()
            .unwrap()
            .insert(url.to_string(), body.into());
    }

    /// Every URL requested so far, in order.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn lookup(&self, url: &Url) -> Result<Bytes, HlsError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.resources
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| HlsError::HttpStatus {
                status: StatusCode::NOT_FOUND,
                url: url.to_string(),
            })
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn fetch_text(&self, url: &Url) -> Result<String, HlsError> {
        let body = self.lookup(url)?;
        String::from_utf8(body.to_vec()).map_err(|e| HlsError::invalid_format(e.to_string()))
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes, HlsError> {
        self.lookup(url)
    }

    async fn open_stream(&self, url: &Url) -> Result<SegmentBody, HlsError> {
        let body = self.lookup(url)?;
        let content_length = self.send_content_length.then_some(body.len() as u64);
        let served = body.len().saturating_sub(self.truncate_by);
        let chunks: Vec<Result<Bytes, HlsError>> = body[..served]
            .chunks(self.chunk_size)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Ok(SegmentBody {
            content_length,
            body: futures::stream::iter(chunks).boxed(),
        })
    }
}
