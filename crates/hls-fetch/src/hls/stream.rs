// HLS Media Stream: a resolved media playlist and its pull-based segment producer.

use crate::HlsError;
use crate::bytes_stream::MediaReader;
use crate::hls::decryption::{AES_128_METHOD, EncryptionParams, KeyFetcher, SegmentPipeline};
use crate::hls::estimator::{SizeEstimator, SizeProbe};
use crate::hls::playlist::{MediaInfo, PlaylistKind, classify, parse_media};
use crate::transport::{ByteStream, SegmentBody, Transport};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use url::Url;

/// A boxed stream of plaintext chunks.
pub type BoxChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, HlsError>> + Send>>;

/// One download session over a media playlist.
///
/// Holds the absolute segment URLs and, for encrypted streams, the key,
/// which is fetched while the stream is built. [`MediaStream::produce`]
/// consumes the stream, so a session can only be produced once.
pub struct MediaStream {
    transport: Arc<dyn Transport>,
    playlist_url: Url,
    info: MediaInfo,
    segment_urls: Vec<Url>,
    encryption: Option<EncryptionParams>,
    size: SizeProbe,
}

impl MediaStream {
    /// Fetch a media playlist and build a stream from it.
    pub async fn fetch(transport: Arc<dyn Transport>, url: Url) -> Result<Self, HlsError> {
        let body = transport.fetch_text(&url).await?;
        Self::from_playlist(transport, url, &body).await
    }

    /// Build a stream from an already-fetched media playlist body.
    ///
    /// `url` is the playlist's own location and the base for relative URIs.
    /// For encrypted playlists the key is fetched before this returns.
    pub async fn from_playlist(
        transport: Arc<dyn Transport>,
        url: Url,
        body: &str,
    ) -> Result<Self, HlsError> {
        if classify(body)? == PlaylistKind::Master {
            return Err(HlsError::invalid_format(format!(
                "expected a media playlist at {url}, found a master playlist"
            )));
        }
        let (info, segment_urls) = parse_media(body, &url)?;

        let key = match (&info.method, &info.key_url) {
            (Some(method), _) if method != AES_128_METHOD => {
                return Err(HlsError::UnsupportedEncryption(method.clone()));
            }
            (Some(_), Some(key_url)) => {
                Some(KeyFetcher::new(Arc::clone(&transport)).fetch_key(key_url).await?)
            }
            _ => None,
        };

        info!(
            url = %url,
            segments = segment_urls.len(),
            media_sequence = info.sequence,
            target_duration = info.target_duration,
            encrypted = info.is_encrypted,
            "Media playlist loaded"
        );
        Ok(Self::from_parts(transport, url, info, segment_urls, key))
    }

    /// Assemble a stream from parsed parts, e.g. when the key was obtained out of band.
    pub fn from_parts(
        transport: Arc<dyn Transport>,
        playlist_url: Url,
        info: MediaInfo,
        segment_urls: Vec<Url>,
        key: Option<[u8; 16]>,
    ) -> Self {
        let encryption = info.is_encrypted.then(|| EncryptionParams {
            key,
            iv: info.iv,
            sequence: info.sequence,
        });
        Self {
            transport,
            playlist_url,
            info,
            segment_urls,
            encryption,
            size: SizeProbe::new(),
        }
    }

    pub fn playlist_url(&self) -> &Url {
        &self.playlist_url
    }

    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    pub fn segment_urls(&self) -> &[Url] {
        &self.segment_urls
    }

    pub fn media_sequence(&self) -> u64 {
        self.info.sequence
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    /// Handle for reading the size estimate while the stream is produced.
    pub fn size_probe(&self) -> SizeProbe {
        self.size.clone()
    }

    pub fn estimated_size(&self) -> u64 {
        self.size.get()
    }

    /// Start producing plaintext, segment by segment, in playlist order.
    pub fn produce(self) -> MediaChunks {
        let estimator = SizeEstimator::new(self.segment_urls.len(), self.size.clone());
        MediaChunks {
            transport: self.transport,
            segment_urls: self.segment_urls,
            encryption: self.encryption,
            estimator,
            size: self.size,
            next_index: 0,
            current: None,
            finished: false,
        }
    }
}

struct ActiveSegment {
    index: usize,
    body: ByteStream,
    pipeline: SegmentPipeline,
    declared_length: Option<u64>,
    received: u64,
}

/// Pull-based producer of a stream's plaintext.
///
/// Each [`MediaChunks::next_chunk`] call reads at most what is needed to
/// release the next non-empty chunk. Segment bodies are read strictly one
/// after another; nothing is prefetched. After the last chunk, or after any
/// error, the producer is exhausted and keeps returning `Ok(None)`.
pub struct MediaChunks {
    transport: Arc<dyn Transport>,
    segment_urls: Vec<Url>,
    encryption: Option<EncryptionParams>,
    estimator: SizeEstimator,
    size: SizeProbe,
    next_index: usize,
    current: Option<ActiveSegment>,
    finished: bool,
}

impl MediaChunks {
    /// Next plaintext chunk, or `None` once every segment has been produced.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, HlsError> {
        if self.finished {
            return Ok(None);
        }
        match self.advance().await {
            Ok(Some(chunk)) => Ok(Some(chunk)),
            Ok(None) => {
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                warn!(
                    segment = self.next_index.saturating_sub(1),
                    error = %e,
                    "Stopping media production"
                );
                self.finished = true;
                self.current = None;
                Err(e)
            }
        }
    }

    async fn advance(&mut self) -> Result<Option<Bytes>, HlsError> {
        loop {
            let Some(active) = self.current.as_mut() else {
                if self.next_index >= self.segment_urls.len() {
                    self.estimator.finalize();
                    debug!(
                        segments = self.segment_urls.len(),
                        bytes = self.estimator.fetched(),
                        "All segments produced"
                    );
                    return Ok(None);
                }
                let segment = self.open_segment(self.next_index).await?;
                self.current = Some(segment);
                self.next_index += 1;
                continue;
            };

            match active.body.next().await {
                Some(chunk) => {
                    let chunk = chunk?;
                    active.received += chunk.len() as u64;
                    let plaintext = active.pipeline.push(chunk)?;
                    if !plaintext.is_empty() {
                        return Ok(Some(plaintext));
                    }
                }
                None => {
                    if let Some(done) = self.current.take() {
                        let tail = self.close_segment(done)?;
                        if !tail.is_empty() {
                            return Ok(Some(tail));
                        }
                    }
                }
            }
        }
    }

    async fn open_segment(&mut self, index: usize) -> Result<ActiveSegment, HlsError> {
        // Built before the request so a missing key fails without touching the network.
        let pipeline = SegmentPipeline::for_segment(self.encryption.as_ref(), index)?;
        let url = &self.segment_urls[index];
        let SegmentBody {
            content_length,
            body,
        } = self.transport.open_stream(url).await?;

        if let Some(len) = content_length {
            self.estimator.observe(len);
        }
        debug!(
            index,
            url = %url,
            content_length = ?content_length,
            estimated_total = self.size.get(),
            "Opened segment"
        );

        Ok(ActiveSegment {
            index,
            body,
            pipeline,
            declared_length: content_length,
            received: 0,
        })
    }

    fn close_segment(&mut self, segment: ActiveSegment) -> Result<Bytes, HlsError> {
        match segment.declared_length {
            None => self.estimator.observe(segment.received),
            Some(declared) if declared != segment.received => {
                return Err(HlsError::Transport(format!(
                    "segment {} body ended after {} of {declared} declared bytes",
                    segment.index, segment.received
                )));
            }
            Some(_) => {}
        }
        trace!(
            index = segment.index,
            received = segment.received,
            "Segment body exhausted"
        );
        segment.pipeline.finish()
    }

    /// Current best-effort estimate of the total size, in bytes.
    pub fn estimated_size(&self) -> u64 {
        self.size.get()
    }

    pub fn size_probe(&self) -> SizeProbe {
        self.size.clone()
    }

    /// Number of segments opened so far.
    pub fn segments_started(&self) -> usize {
        self.next_index
    }

    pub fn segment_count(&self) -> usize {
        self.segment_urls.len()
    }

    /// Adapt the producer into a `futures::Stream` of plaintext chunks.
    pub fn into_stream(self) -> BoxChunkStream {
        futures::stream::try_unfold(self, |mut chunks| async move {
            Ok::<_, HlsError>(chunks.next_chunk().await?.map(|chunk| (chunk, chunks)))
        })
        .boxed()
    }

    /// Adapt the producer into an `AsyncRead`.
    pub fn into_reader(self) -> MediaReader {
        MediaReader::new(self.into_stream())
    }
}
