use std::time::Duration;

use crate::DownloaderConfig;

// --- Top-Level Configuration ---
#[derive(Debug, Clone, Default)]
pub struct HlsConfig {
    /// Base downloader configuration
    pub base: DownloaderConfig,
    pub fetcher_config: HlsFetcherConfig,
    pub variant_config: HlsVariantConfig,
}

impl HlsConfig {
    pub fn builder() -> crate::builder::HlsConfigBuilder {
        crate::builder::HlsConfigBuilder::new()
    }

    /// Cap the bandwidth used when picking a variant from a master playlist.
    pub fn with_max_bandwidth(mut self, max_bandwidth: u64) -> Self {
        self.variant_config.max_bandwidth = Some(max_bandwidth);
        self
    }
}

// --- Fetcher Configuration ---
#[derive(Debug, Clone)]
pub struct HlsFetcherConfig {
    pub playlist_fetch_timeout: Duration,
    /// Applies to the whole streamed body of one segment. Zero disables it.
    pub segment_download_timeout: Duration,
    pub key_download_timeout: Duration,
}

impl Default for HlsFetcherConfig {
    fn default() -> Self {
        Self {
            playlist_fetch_timeout: Duration::from_secs(15),
            segment_download_timeout: Duration::from_secs(60),
            key_download_timeout: Duration::from_secs(5),
        }
    }
}

// --- Variant Configuration ---
#[derive(Debug, Clone, Default)]
pub struct HlsVariantConfig {
    /// Highest acceptable variant bandwidth in bits/s. `None` means unbounded.
    pub max_bandwidth: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_unbounded() {
        let config = HlsConfig::default();
        assert_eq!(config.variant_config.max_bandwidth, None);
        assert_eq!(
            config.fetcher_config.playlist_fetch_timeout,
            Duration::from_secs(15)
        );

        let capped = HlsConfig::default().with_max_bandwidth(1_000_000);
        assert_eq!(capped.variant_config.max_bandwidth, Some(1_000_000));
    }
}
