// Transport: the HTTP(S) GET seam used for manifests, keys and segment bodies.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::HlsError;
use crate::hls::config::HlsFetcherConfig;

/// A boxed stream of body chunks, in the order the transport delivers them.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HlsError>> + Send>>;

/// An opened segment response.
///
/// The segment is complete exactly when `body` yields `None`; a short or
/// empty read is not an end-of-segment signal.
pub struct SegmentBody {
    /// Declared `Content-Length`, when the server sent one.
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a text resource (a playlist).
    async fn fetch_text(&self, url: &Url) -> Result<String, HlsError>;

    /// Fetch a small binary resource in one piece (a key).
    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes, HlsError>;

    /// Open a streaming read of a segment.
    async fn open_stream(&self, url: &Url) -> Result<SegmentBody, HlsError>;
}

/// Parse a caller-supplied URL, assuming `https://` when no scheme is given.
///
/// This runs once, before anything is fetched.
pub fn normalize_url(input: &str) -> Result<Url, HlsError> {
    let trimmed = input.trim();
    match Url::parse(trimmed) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let with_scheme = format!("https://{trimmed}");
            Url::parse(&with_scheme).map_err(|e| HlsError::InvalidUrl {
                input: input.to_string(),
                reason: e.to_string(),
            })
        }
        Err(e) => Err(HlsError::InvalidUrl {
            input: input.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// reqwest-backed transport. Any non-success status is a transport failure.
#[derive(Clone)]
pub struct HttpTransport {
    http_client: Client,
    config: HlsFetcherConfig,
}

impl HttpTransport {
    pub fn new(http_client: Client, config: HlsFetcherConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    async fn get(&self, url: &Url, timeout: Duration) -> Result<reqwest::Response, HlsError> {
        let mut request = self.http_client.get(url.clone());
        if !timeout.is_zero() {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HlsError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_text(&self, url: &Url) -> Result<String, HlsError> {
        let response = self.get(url, self.config.playlist_fetch_timeout).await?;
        let bytes = response.bytes().await?;
        debug!(url = %url, len = bytes.len(), "Fetched playlist");
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            HlsError::invalid_format(format!("playlist at {url} is not valid UTF-8: {e}"))
        })
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes, HlsError> {
        let response = self.get(url, self.config.key_download_timeout).await?;
        Ok(response.bytes().await?)
    }

    async fn open_stream(&self, url: &Url) -> Result<SegmentBody, HlsError> {
        let response = self.get(url, self.config.segment_download_timeout).await?;
        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(HlsError::from))
            .boxed();
        Ok(SegmentBody {
            content_length,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DownloaderConfig, create_client};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer a single request on a loopback port with a canned response.
    async fn serve_once(response: &'static [u8]) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        Url::parse(&format!("http://{addr}/vod/seg0.ts")).unwrap()
    }

    fn loopback_transport() -> HttpTransport {
        let config = DownloaderConfig {
            danger_accept_invalid_certs: true,
            use_system_proxy: false,
            ..DownloaderConfig::default()
        };
        HttpTransport::new(create_client(&config).unwrap(), HlsFetcherConfig::default())
    }

    #[tokio::test]
    async fn test_open_stream_passes_content_length_and_body() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        )
        .await;
        let SegmentBody {
            content_length,
            body,
        } = loopback_transport().open_stream(&url).await.unwrap();

        assert_eq!(content_length, Some(5));
        let chunks: Vec<Bytes> = body.map(|chunk| chunk.unwrap()).collect().await;
        assert_eq!(chunks.concat(), b"hello");
    }

    #[tokio::test]
    async fn test_error_status_is_http_status() {
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let err = loopback_transport().open_stream(&url).await.err().unwrap();

        match err {
            HlsError::HttpStatus { status, url: failed } => {
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
                assert_eq!(failed, url.to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_text_reads_playlist() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 8\r\nConnection: close\r\n\r\n#EXTM3U\n",
        )
        .await;
        let text = loopback_transport().fetch_text(&url).await.unwrap();
        assert_eq!(text, "#EXTM3U\n");
    }

    #[test]
    fn test_normalize_adds_missing_scheme() {
        let url = normalize_url("cdn.example.com/vod/master.m3u8").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/vod/master.m3u8");
    }

    #[test]
    fn test_normalize_keeps_explicit_scheme() {
        let url = normalize_url(" http://cdn.example.com/a.m3u8 ").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.path(), "/a.m3u8");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        let err = normalize_url("http://[::1").unwrap_err();
        assert!(matches!(err, HlsError::InvalidUrl { .. }));
    }
}
