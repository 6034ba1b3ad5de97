// HLS Decryption: key fetching and streaming AES-128-CBC segment decryption.

use crate::HlsError;
use crate::transport::Transport;
use aes::Aes128;
use bytes::{Bytes, BytesMut};
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

/// The only `METHOD` this engine can decrypt.
pub const AES_128_METHOD: &str = "AES-128";

const AES_BLOCK_SIZE: usize = 16;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// IV used when the playlist does not declare one: the segment's media
/// sequence number as a 16-byte big-endian integer.
pub fn derive_iv(sequence: u64, index: usize) -> [u8; 16] {
    (u128::from(sequence) + index as u128).to_be_bytes()
}

/// Validate raw key bytes as an AES-128 key.
pub fn key_from_bytes(bytes: &[u8]) -> Result<[u8; 16], HlsError> {
    if bytes.is_empty() {
        return Err(HlsError::CipherKeyMissing);
    }
    bytes.try_into().map_err(|_| {
        HlsError::InvalidKey(format!(
            "key has {} bytes, expected {AES_BLOCK_SIZE}",
            bytes.len()
        ))
    })
}

// --- KeyFetcher Struct ---
// Fetches the key once; there is no key rotation for a finite playlist.
pub struct KeyFetcher {
    transport: Arc<dyn Transport>,
}

impl KeyFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn fetch_key(&self, key_url: &Url) -> Result<[u8; 16], HlsError> {
        let bytes = self.transport.fetch_bytes(key_url).await?;
        debug!(url = %key_url, len = bytes.len(), "Fetched decryption key");
        key_from_bytes(&bytes)
    }
}

/// Key material of an encrypted stream.
#[derive(Clone)]
pub struct EncryptionParams {
    /// `None` until the key has been fetched.
    pub key: Option<[u8; 16]>,
    /// Explicit IV from the playlist, shared by every segment.
    pub iv: Option<[u8; 16]>,
    /// Media sequence number of the first segment.
    pub sequence: u64,
}

impl EncryptionParams {
    pub fn iv_for(&self, index: usize) -> [u8; 16] {
        self.iv.unwrap_or_else(|| derive_iv(self.sequence, index))
    }
}

impl fmt::Debug for EncryptionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionParams")
            .field("key", &self.key.map(|_| "<redacted>"))
            .field("iv", &self.iv.map(hex::encode))
            .field("sequence", &self.sequence)
            .finish()
    }
}

// --- SegmentDecryptor Struct ---

/// Incremental AES-128-CBC decryption of one segment.
///
/// Chunks may split cipher blocks anywhere. Plaintext is released in whole
/// blocks, and the last complete block is always held back until
/// [`SegmentDecryptor::finish`], since only then is it known to carry the
/// PKCS#7 padding.
pub struct SegmentDecryptor {
    key: [u8; 16],
    /// Chaining value for the next block: the IV, then the last ciphertext block.
    iv: [u8; 16],
    pending: BytesMut,
    received: u64,
}

impl SegmentDecryptor {
    pub fn new(key: [u8; 16], iv: [u8; 16]) -> Self {
        Self {
            key,
            iv,
            pending: BytesMut::new(),
            received: 0,
        }
    }

    /// Feed ciphertext; returns whatever plaintext is safe to release.
    pub fn update(&mut self, chunk: &[u8]) -> Result<Bytes, HlsError> {
        self.pending.extend_from_slice(chunk);
        self.received += chunk.len() as u64;

        let whole = self.pending.len() - self.pending.len() % AES_BLOCK_SIZE;
        // A trailing partial block proves the whole blocks before it are not final.
        let ready = if whole == self.pending.len() {
            whole.saturating_sub(AES_BLOCK_SIZE)
        } else {
            whole
        };
        if ready == 0 {
            return Ok(Bytes::new());
        }

        let mut run = self.pending.split_to(ready);
        let mut next_iv = [0u8; AES_BLOCK_SIZE];
        next_iv.copy_from_slice(&run[ready - AES_BLOCK_SIZE..]);

        Aes128CbcDec::new((&self.key).into(), (&self.iv).into())
            .decrypt_padded_mut::<NoPadding>(&mut run[..])
            .map_err(|e| HlsError::MalformedCiphertext(format!("CBC decrypt failed: {e}")))?;
        self.iv = next_iv;

        trace!(decrypted = ready, held = self.pending.len(), "Decrypted ciphertext run");
        Ok(run.freeze())
    }

    /// Signal end of segment: decrypt the held-back block and strip its padding.
    pub fn finish(self) -> Result<Bytes, HlsError> {
        if self.received == 0 || self.received % AES_BLOCK_SIZE as u64 != 0 {
            return Err(HlsError::MalformedCiphertext(format!(
                "segment ciphertext is {} bytes, not a positive multiple of {AES_BLOCK_SIZE}",
                self.received
            )));
        }

        let mut last = self.pending;
        let plain_len = Aes128CbcDec::new((&self.key).into(), (&self.iv).into())
            .decrypt_padded_mut::<Pkcs7>(&mut last[..])
            .map_err(|e| HlsError::MalformedCiphertext(format!("invalid PKCS#7 padding: {e}")))?
            .len();
        last.truncate(plain_len);
        Ok(last.freeze())
    }
}

// --- SegmentPipeline Enum ---

/// Per-segment transform: a pass-through, or a fresh decryptor.
pub enum SegmentPipeline {
    Passthrough,
    Aes128Cbc(SegmentDecryptor),
}

impl SegmentPipeline {
    /// Build the pipeline for the segment at `index` (0-based position in the playlist).
    pub fn for_segment(
        encryption: Option<&EncryptionParams>,
        index: usize,
    ) -> Result<Self, HlsError> {
        match encryption {
            None => Ok(SegmentPipeline::Passthrough),
            Some(params) => {
                let key = params.key.ok_or(HlsError::CipherKeyMissing)?;
                Ok(SegmentPipeline::Aes128Cbc(SegmentDecryptor::new(
                    key,
                    params.iv_for(index),
                )))
            }
        }
    }

    pub fn push(&mut self, chunk: Bytes) -> Result<Bytes, HlsError> {
        match self {
            SegmentPipeline::Passthrough => Ok(chunk),
            SegmentPipeline::Aes128Cbc(decryptor) => decryptor.update(&chunk),
        }
    }

    /// Called once the segment body is exhausted.
    pub fn finish(self) -> Result<Bytes, HlsError> {
        match self {
            SegmentPipeline::Passthrough => Ok(Bytes::new()),
            SegmentPipeline::Aes128Cbc(decryptor) => decryptor.finish(),
        }
    }
}
