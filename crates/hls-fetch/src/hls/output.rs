// HLS Output: drives a media producer into a sink, reporting progress and honouring aborts.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::HlsError;
use crate::hls::stream::{MediaChunks, MediaStream};

pub type ProgressCallback = Box<dyn FnMut(u8) + Send>;
pub type AbortCallback = Box<dyn Fn() -> bool + Send + Sync>;

/// Hooks consulted while a stream is dumped.
#[derive(Default)]
pub struct DumpOptions {
    progress: Option<ProgressCallback>,
    abort: Option<AbortCallback>,
}

impl DumpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with a percentage in `0..=100` after every written chunk.
    pub fn on_progress(mut self, callback: impl FnMut(u8) + Send + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Polled before each chunk is pulled; returning `true` stops the dump.
    pub fn abort_when(mut self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.abort = Some(Box::new(predicate));
        self
    }

    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        self.abort_when(move || token.is_cancelled())
    }

    fn should_abort(&self) -> bool {
        self.abort.as_ref().is_some_and(|abort| abort())
    }

    fn report(&mut self, percent: u8) {
        if let Some(progress) = self.progress.as_mut() {
            progress(percent);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpOutcome {
    /// Every segment was written.
    Completed { bytes: u64 },
    /// The abort hook fired; `bytes` had been written by then.
    Cancelled { bytes: u64 },
}

/// Percentage of `estimated` covered by `written`, clamped to 100.
///
/// The estimate is an extrapolation and can lag behind what has actually
/// been written, hence the clamp.
pub fn progress_percent(written: u64, estimated: u64) -> u8 {
    if estimated == 0 {
        return 0;
    }
    let percent = u128::from(written) * 100 / u128::from(estimated);
    percent.min(100) as u8
}

/// Write every chunk of `chunks` to `writer`, in order.
pub async fn dump_to_writer<W>(
    chunks: &mut MediaChunks,
    writer: &mut W,
    options: &mut DumpOptions,
) -> Result<DumpOutcome, HlsError>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    loop {
        if options.should_abort() {
            info!(bytes = written, "Dump cancelled");
            writer.flush().await?;
            return Ok(DumpOutcome::Cancelled { bytes: written });
        }
        let Some(chunk) = chunks.next_chunk().await? else {
            break;
        };
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
        options.report(progress_percent(written, chunks.estimated_size()));
    }
    writer.flush().await?;
    debug!(bytes = written, "Dump completed");
    Ok(DumpOutcome::Completed { bytes: written })
}

/// Dump `stream` into the file at `path`.
///
/// Data goes to a `.part` sibling first; it is renamed to `path` on
/// completion and removed if the dump is cancelled or fails, so `path`
/// only ever holds a complete stream.
pub async fn dump_to_file(
    stream: MediaStream,
    path: &Path,
    mut options: DumpOptions,
) -> Result<DumpOutcome, HlsError> {
    let part_path = part_path(path);
    let file = File::create(&part_path).await?;
    let mut writer = BufWriter::new(file);
    let mut chunks = stream.produce();

    let result = dump_to_writer(&mut chunks, &mut writer, &mut options).await;
    let result = match result {
        Ok(DumpOutcome::Completed { bytes }) => {
            persist(writer.into_inner(), &part_path, path)
                .await
                .map(|()| DumpOutcome::Completed { bytes })
        }
        other => {
            drop(writer);
            other
        }
    };

    match &result {
        Ok(DumpOutcome::Completed { bytes }) => {
            info!(path = %path.display(), bytes, "Stream written");
        }
        _ => discard(&part_path).await,
    }
    result
}

async fn persist(file: File, part_path: &Path, path: &Path) -> Result<(), HlsError> {
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(part_path, path).await?;
    Ok(())
}

async fn discard(part_path: &Path) {
    match tokio::fs::remove_file(part_path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            warn!(path = %part_path.display(), error = %e, "Failed to remove partial output");
        }
        _ => {}
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}
