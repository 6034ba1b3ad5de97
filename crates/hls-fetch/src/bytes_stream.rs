use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufRead, AsyncRead, ReadBuf};
use tokio_util::io::StreamReader;

use crate::HlsError;

type IoChunkStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// `AsyncRead` view of a plaintext chunk stream.
///
/// Chunk boundaries are invisible to the reader; empty chunks are skipped.
/// A producer error is returned once as an `io::Error` whose inner error is
/// the original [`HlsError`], recoverable with `get_ref()` and `downcast_ref`.
pub struct MediaReader {
    inner: StreamReader<IoChunkStream, Bytes>,
}

impl MediaReader {
    pub fn new(stream: impl Stream<Item = Result<Bytes, HlsError>> + Send + 'static) -> Self {
        let stream: IoChunkStream = stream.map(|chunk| chunk.map_err(io::Error::other)).boxed();
        Self {
            inner: StreamReader::new(stream),
        }
    }
}

impl AsyncRead for MediaReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncBufRead for MediaReader {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        Pin::new(&mut self.get_mut().inner).poll_fill_buf(cx)
    }

    fn consume(mut self: Pin<&mut Self>, amt: usize) {
        Pin::new(&mut self.inner).consume(amt);
    }
}
