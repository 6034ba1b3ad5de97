//! # hls-fetch
//!
//! Fetches a complete HLS stream from a manifest URL and produces it as one
//! continuous byte stream.
//!
//! ## Features
//!
//! - Master playlist resolution with a bandwidth cap
//! - AES-128-CBC segment decryption, streamed chunk by chunk
//! - Pull-based production with a running total-size estimate
//! - File dumping with progress reporting and cancellation
//!
//! ```no_run
//! # async fn run() -> Result<(), hls_fetch::HlsError> {
//! use hls_fetch::{DumpOptions, HlsConfig, HlsDownloader};
//!
//! let downloader = HlsDownloader::new(HlsConfig::default().with_max_bandwidth(2_000_000))?;
//! let options = DumpOptions::new().on_progress(|percent| println!("{percent}%"));
//! downloader
//!     .dump("https://example.com/show/master.m3u8", "show.ts", options)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod bytes_stream;
pub mod config;
pub mod downloader;
pub mod error;
pub mod hls;
pub mod proxy;
pub mod transport;

pub use builder::HlsConfigBuilder;
pub use bytes_stream::MediaReader;
pub use config::DownloaderConfig;
pub use error::HlsError;

pub use hls::{
    DumpOptions, DumpOutcome, HlsConfig, HlsDownloader, MediaChunks, MediaStream, SizeProbe,
};

pub use transport::{HttpTransport, SegmentBody, Transport};

// Re-export downloader utilities
pub use downloader::{create_client, ensure_crypto_provider};

// Re-export proxy utilities
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
