use reqwest::Client;
use rustls::ClientConfig;
use rustls::crypto::{CryptoProvider, ring};
use rustls_platform_verifier::BuilderVerifierExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{DownloaderConfig, HlsError, proxy::build_proxy_from_config};

/// Install ring as the process-wide rustls crypto provider unless one is set.
///
/// reqwest's built-in rustls setup, used when certificate validation is
/// disabled, looks the provider up globally. Applications that install their
/// own provider should do so before creating a client; it is left in place.
pub fn ensure_crypto_provider() {
    if CryptoProvider::get_default().is_some() {
        return;
    }
    if ring::default_provider().install_default().is_err() {
        debug!("Another rustls crypto provider was installed concurrently; keeping it");
    }
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &DownloaderConfig) -> Result<Client, HlsError> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(2)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if config.danger_accept_invalid_certs {
        ensure_crypto_provider();
        warn!("TLS certificate validation is disabled for downloads");
        client_builder = client_builder.danger_accept_invalid_certs(true);
    } else {
        let provider = Arc::new(ring::default_provider());
        let tls_config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| HlsError::ClientBuild(format!("TLS protocol versions: {e}")))?
            .with_platform_verifier()
            .map_err(|e| HlsError::ClientBuild(format!("platform certificate verifier: {e}")))?
            .with_no_client_auth();
        client_builder = client_builder.use_preconfigured_tls(tls_config);
    }

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.read_timeout.is_zero() {
        client_builder = client_builder.read_timeout(config.read_timeout);
    }

    if let Some(proxy_config) = &config.proxy {
        let proxy = build_proxy_from_config(proxy_config)?;
        client_builder = client_builder.proxy(proxy);
        info!(proxy_url = %proxy_config.url, "Using explicitly configured proxy for downloads");
    } else if config.use_system_proxy {
        // reqwest picks up system proxy settings unless no_proxy() is called
        debug!("Using system proxy settings for downloads");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for downloads");
    }

    client_builder.build().map_err(HlsError::from)
}
