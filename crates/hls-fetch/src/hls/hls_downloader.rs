use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::hls::output::{DumpOptions, DumpOutcome, dump_to_file};
use crate::hls::playlist::{PlaylistKind, classify, parse_master};
use crate::hls::variant::select_variant;
use crate::transport::{HttpTransport, Transport, normalize_url};
use crate::{HlsError, create_client};

use super::{HlsConfig, MediaStream};

/// Entry point: resolves a manifest URL into a ready-to-produce [`MediaStream`].
pub struct HlsDownloader {
    transport: Arc<dyn Transport>,
    config: HlsConfig,
}

impl HlsDownloader {
    /// Create a downloader backed by an HTTP client built from `config.base`.
    pub fn new(config: HlsConfig) -> Result<Self, HlsError> {
        let client = create_client(&config.base)?;
        let transport = HttpTransport::new(client, config.fetcher_config.clone());
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a downloader over a caller-supplied transport.
    pub fn with_transport(config: HlsConfig, transport: Arc<dyn Transport>) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &HlsConfig {
        &self.config
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Open `url` using the configured bandwidth cap.
    pub async fn open(&self, url: &str) -> Result<MediaStream, HlsError> {
        self.open_with_bandwidth(url, self.config.variant_config.max_bandwidth)
            .await
    }

    /// Open `url`, resolving a master playlist to the best variant within `max_bandwidth`.
    ///
    /// At most three requests are made before this returns: the manifest,
    /// the selected variant's media playlist, and the key of an encrypted stream.
    pub async fn open_with_bandwidth(
        &self,
        url: &str,
        max_bandwidth: Option<u64>,
    ) -> Result<MediaStream, HlsError> {
        let manifest_url = normalize_url(url)?;
        debug!(url = %manifest_url, "Fetching manifest");
        let manifest = self.transport.fetch_text(&manifest_url).await?;

        match classify(&manifest)? {
            PlaylistKind::Media => {
                MediaStream::from_playlist(self.transport(), manifest_url, &manifest).await
            }
            PlaylistKind::Master => {
                let variants = parse_master(&manifest, &manifest_url)?;
                let selected = select_variant(&variants, max_bandwidth)?;
                info!(
                    url = %selected.url,
                    bandwidth = selected.bandwidth,
                    max_bandwidth = ?max_bandwidth,
                    available = variants.len(),
                    "Selected variant"
                );
                MediaStream::fetch(self.transport(), selected.url.clone()).await
            }
        }
    }

    /// Open `url` and write the whole stream to `path`.
    pub async fn dump(
        &self,
        url: &str,
        path: impl AsRef<Path>,
        options: DumpOptions,
    ) -> Result<DumpOutcome, HlsError> {
        let stream = self.open(url).await?;
        dump_to_file(stream, path.as_ref(), options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::test_support::MemoryTransport;

    const MASTER: &str = "#EXTM3U\n\
        #EXT-X-STREAM-INF:BANDWIDTH=500,RESOLUTION=640x360\n\
        low/index.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=1200,CODECS=\"avc1.64001f,mp4a.40.2\"\n\
        high/index.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=800\n\
        mid/index.m3u8\n";

    fn media(prefix: &str) -> String {
        format!("#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\n{prefix}-0.ts\n#EXTINF:6.0,\n{prefix}-1.ts\n#EXT-X-ENDLIST\n")
    }

    fn downloader(transport: Arc<MemoryTransport>) -> HlsDownloader {
        HlsDownloader::with_transport(HlsConfig::default(), transport)
    }

    fn with_master() -> Arc<MemoryTransport> {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert("https://tv.example.com/show/master.m3u8", MASTER);
        for name in ["low", "mid", "high"] {
            transport.insert(
                &format!("https://tv.example.com/show/{name}/index.m3u8"),
                media(name),
            );
        }
        transport
    }

    #[tokio::test]
    async fn test_master_selects_variant_under_cap() {
        let transport = with_master();
        let stream = downloader(transport.clone())
            .open_with_bandwidth("https://tv.example.com/show/master.m3u8", Some(1000))
            .await
            .unwrap();

        assert_eq!(
            stream.playlist_url().as_str(),
            "https://tv.example.com/show/mid/index.m3u8"
        );
        assert_eq!(
            stream.segment_urls()[0].as_str(),
            "https://tv.example.com/show/mid/mid-0.ts"
        );
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_configured_cap_is_used_by_open() {
        let transport = with_master();
        let config = HlsConfig::default().with_max_bandwidth(600);
        let stream = HlsDownloader::with_transport(config, transport)
            .open("https://tv.example.com/show/master.m3u8")
            .await
            .unwrap();
        assert!(stream.playlist_url().path().starts_with("/show/low/"));
    }

    #[tokio::test]
    async fn test_scheme_is_added_when_missing() {
        let transport = with_master();
        let stream = downloader(transport.clone())
            .open_with_bandwidth("tv.example.com/show/master.m3u8", None)
            .await
            .unwrap();
        assert!(stream.playlist_url().path().starts_with("/show/high/"));
        assert_eq!(
            transport.requests()[0],
            "https://tv.example.com/show/master.m3u8"
        );
    }

    #[tokio::test]
    async fn test_media_playlist_used_directly() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert("https://tv.example.com/clip.m3u8", media("clip"));
        let stream = downloader(transport.clone())
            .open_with_bandwidth("https://tv.example.com/clip.m3u8", Some(1))
            .await
            .unwrap();
        assert_eq!(stream.segment_urls().len(), 2);
        assert_eq!(transport.requests(), vec!["https://tv.example.com/clip.m3u8"]);
    }

    #[tokio::test]
    async fn test_non_playlist_is_invalid_format() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert("https://tv.example.com/page", "<html>not a playlist</html>");
        let result = downloader(transport)
            .open("https://tv.example.com/page")
            .await;
        assert!(matches!(result, Err(HlsError::InvalidFormat(_))));
    }

    #[tokio::test]
    async fn test_variant_without_uri_is_invalid() {
        let transport = Arc::new(MemoryTransport::new());
        transport.insert(
            "https://tv.example.com/empty.m3u8",
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-STREAM-INF:BANDWIDTH=100\n",
        );
        let result = downloader(transport)
            .open("https://tv.example.com/empty.m3u8")
            .await;
        assert!(matches!(result, Err(HlsError::InvalidFormat(_))));
    }

    #[tokio::test]
    async fn test_manifest_http_error_is_transport_failure() {
        let transport = Arc::new(MemoryTransport::new());
        let err = downloader(transport)
            .open("https://tv.example.com/missing.m3u8")
            .await
            .err()
            .unwrap();
        assert!(err.is_transport());
    }
}
