// HLS support: playlist parsing, variant selection, decryption and segment production.

pub mod config;
pub mod decryption;
pub mod estimator;
pub mod hls_downloader;
pub mod output;
pub mod playlist;
pub mod stream;
pub mod variant;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for easier access
pub use config::{HlsConfig, HlsFetcherConfig, HlsVariantConfig};
pub use estimator::SizeProbe;
pub use hls_downloader::HlsDownloader;
pub use output::{DumpOptions, DumpOutcome, dump_to_file, dump_to_writer};
pub use playlist::{MediaInfo, PlaylistKind, VariantInfo};
pub use stream::{BoxChunkStream, MediaChunks, MediaStream};
pub use variant::select_variant;
