use reqwest::StatusCode;

/// Errors surfaced by the fetch engine.
///
/// Transport failures are never retried internally; the caller decides
/// whether to re-open the whole stream.
#[derive(Debug, thiserror::Error)]
pub enum HlsError {
    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request for {url} failed with HTTP {status}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid playlist format: {0}")]
    InvalidFormat(String),

    #[error("master playlist advertises no variants")]
    NoVariants,

    #[error("stream is encrypted but no key bytes are available")]
    CipherKeyMissing,

    #[error("invalid decryption key: {0}")]
    InvalidKey(String),

    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("unsupported encryption method `{0}`")]
    UnsupportedEncryption(String),

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl HlsError {
    pub(crate) fn invalid_format(reason: impl Into<String>) -> Self {
        HlsError::InvalidFormat(reason.into())
    }

    /// Whether the failure came from fetching a resource (manifest, key or segment).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HlsError::Network { .. } | HlsError::HttpStatus { .. } | HlsError::Transport(_)
        )
    }

    /// Whether the failure happened while decrypting segment data.
    pub fn is_cipher(&self) -> bool {
        matches!(
            self,
            HlsError::CipherKeyMissing | HlsError::InvalidKey(_) | HlsError::MalformedCiphertext(_)
        )
    }
}
