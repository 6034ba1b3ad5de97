//! # Builder for HlsConfig
//!
//! Fluent construction of [`HlsConfig`] values, covering the shared HTTP
//! options as well as the HLS-specific fetch timeouts and bandwidth cap.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use hls_fetch::HlsConfig;
//! use hls_fetch::proxy::{ProxyConfig, ProxyType};
//!
//! let config = HlsConfig::builder()
//!     .with_max_bandwidth(3_000_000)
//!     .with_segment_timeout(Duration::from_secs(30))
//!     .with_referer("https://tv.example.com/")
//!     .with_proxy(ProxyConfig {
//!         url: "http://proxy.example.com:8080".to_string(),
//!         proxy_type: ProxyType::Http,
//!         auth: None,
//!     })
//!     .build();
//!
//! assert_eq!(config.variant_config.max_bandwidth, Some(3_000_000));
//! assert!(!config.base.use_system_proxy);
//! ```

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::{DownloaderConfig, HlsConfig, proxy::ProxyConfig};

#[derive(Debug, Clone, Default)]
pub struct HlsConfigBuilder {
    config: HlsConfig,
}

impl HlsConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing HTTP configuration; custom headers are merged
    /// over the default header set.
    pub fn with_base(mut self, base: DownloaderConfig) -> Self {
        self.config.base = DownloaderConfig::with_config(base);
        self
    }

    /// Highest acceptable variant bandwidth in bits/s.
    pub fn with_max_bandwidth(mut self, bits_per_second: u64) -> Self {
        self.config.variant_config.max_bandwidth = Some(bits_per_second);
        self
    }

    pub fn with_unbounded_bandwidth(mut self) -> Self {
        self.config.variant_config.max_bandwidth = None;
        self
    }

    pub fn with_playlist_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher_config.playlist_fetch_timeout = timeout;
        self
    }

    /// Bounds the whole body of one segment, not just the response headers.
    pub fn with_segment_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher_config.segment_download_timeout = timeout;
        self
    }

    pub fn with_key_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher_config.key_download_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.base.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.base.read_timeout = timeout;
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.base.follow_redirects = follow;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.base.user_agent = user_agent.into();
        self
    }

    /// Add a request header. Invalid names or values are skipped.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.base.headers.insert(name, value);
        }
        self
    }

    /// Many CDNs refuse segment requests without the page they are embedded in.
    pub fn with_referer(self, referer: impl AsRef<str>) -> Self {
        self.with_header(header::REFERER, referer)
    }

    /// Replace the whole header set, defaults included.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.base.headers = headers;
        self
    }

    /// An explicit proxy disables the system proxy.
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.base.proxy = Some(proxy);
        self.config.base.use_system_proxy = false;
        self
    }

    /// Ignored once an explicit proxy is set.
    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        if self.config.base.proxy.is_none() {
            self.config.base.use_system_proxy = enabled;
        }
        self
    }

    /// Skip TLS certificate validation. Only meant for test endpoints.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.base.danger_accept_invalid_certs = accept;
        self
    }

    pub fn build(self) -> HlsConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{ProxyAuth, ProxyType};

    #[test]
    fn test_builder_defaults() {
        let config = HlsConfigBuilder::new().build();
        assert_eq!(config.base.timeout, Duration::from_secs(120));
        assert_eq!(config.fetcher_config.key_download_timeout, Duration::from_secs(5));
        assert_eq!(config.variant_config.max_bandwidth, None);
        assert!(config.base.use_system_proxy);
        assert!(!config.base.danger_accept_invalid_certs);
    }

    #[test]
    fn test_builder_customization() {
        let config = HlsConfigBuilder::new()
            .with_max_bandwidth(800_000)
            .with_playlist_timeout(Duration::from_secs(3))
            .with_connect_timeout(Duration::from_secs(20))
            .with_follow_redirects(false)
            .with_user_agent("hls-fetch-test/1.0")
            .with_referer("https://tv.example.com/watch")
            .with_header("bad header", "ignored")
            .with_system_proxy(false)
            .build();

        assert_eq!(config.variant_config.max_bandwidth, Some(800_000));
        assert_eq!(
            config.fetcher_config.playlist_fetch_timeout,
            Duration::from_secs(3)
        );
        assert_eq!(config.base.connect_timeout, Duration::from_secs(20));
        assert!(!config.base.follow_redirects);
        assert_eq!(config.base.user_agent, "hls-fetch-test/1.0");
        assert!(!config.base.use_system_proxy);
        assert_eq!(
            config.base.headers.get(header::REFERER).unwrap(),
            "https://tv.example.com/watch"
        );
        assert_eq!(config.base.headers.len(), 4);
    }

    #[test]
    fn test_unbounded_bandwidth_clears_cap() {
        let config = HlsConfigBuilder::new()
            .with_max_bandwidth(1)
            .with_unbounded_bandwidth()
            .build();
        assert_eq!(config.variant_config.max_bandwidth, None);
    }

    #[test]
    fn test_base_keeps_default_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-token", HeaderValue::from_static("abc"));
        let config = HlsConfigBuilder::new()
            .with_base(DownloaderConfig {
                headers,
                ..DownloaderConfig::default()
            })
            .build();
        assert_eq!(config.base.headers.get("x-token").unwrap(), "abc");
        assert!(config.base.headers.contains_key(header::ACCEPT));
    }

    #[test]
    fn test_explicit_proxy_wins_over_system_proxy() {
        let proxy_config = ProxyConfig {
            url: "socks5://127.0.0.1:1080".to_string(),
            proxy_type: ProxyType::Socks5,
            auth: Some(ProxyAuth {
                username: "user".to_string(),
                password: "pass".to_string(),
            }),
        };

        let config = HlsConfigBuilder::new()
            .with_proxy(proxy_config)
            .with_system_proxy(true)
            .build();

        assert!(!config.base.use_system_proxy);
        let stored = config.base.proxy.unwrap();
        assert_eq!(stored.proxy_type, ProxyType::Socks5);
        assert_eq!(stored.auth.unwrap().username, "user");
    }
}
