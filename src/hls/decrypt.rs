//! AES-128-CBC segment decryption
//!
//! Segments are decrypted in place on disk after download. The cipher work
//! is CPU-bound, so it runs on tokio's blocking thread pool rather than the
//! orchestration loop.
//!
//! Key material may be supplied as 32 hex characters (with optional `0x`
//! prefix) or as 16 raw bytes. When no IV is supplied, the segment index is
//! used as the IV per the HLS spec: the 128-bit big-endian representation
//! of the media sequence number.

use crate::error::DecryptError;
use aes::Aes128;
use aes::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};
use std::path::Path;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Parse AES-128 key material into its 16-byte form.
pub fn parse_key(key: &str) -> Result<[u8; 16], DecryptError> {
    let trimmed = key.trim();
    let hex_body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_body.len() == 32
        && let Ok(bytes) = hex::decode(hex_body)
    {
        let mut out = [0u8; 16];
        out.copy_from_slice(&bytes);
        return Ok(out);
    }

    let raw = trimmed.as_bytes();
    if raw.len() == 16 {
        let mut out = [0u8; 16];
        out.copy_from_slice(raw);
        return Ok(out);
    }

    Err(DecryptError::InvalidKey(format!(
        "expected 32 hex characters or 16 raw bytes, got {} bytes",
        raw.len()
    )))
}

/// Derive the IV for a segment.
///
/// An explicit IV must be 32 hex characters (optional `0x` prefix). With no
/// IV supplied, the segment index fills the low-order bytes big-endian.
pub fn derive_iv(iv: Option<&str>, segment_index: u64) -> Result<[u8; 16], DecryptError> {
    match iv {
        Some(iv) => {
            let trimmed = iv.trim();
            let hex_body = trimmed
                .strip_prefix("0x")
                .or_else(|| trimmed.strip_prefix("0X"))
                .unwrap_or(trimmed);
            let bytes = hex::decode(hex_body)
                .map_err(|e| DecryptError::InvalidIv(e.to_string()))?;
            if bytes.len() != 16 {
                return Err(DecryptError::InvalidIv(format!(
                    "expected 16 bytes, got {}",
                    bytes.len()
                )));
            }
            let mut out = [0u8; 16];
            out.copy_from_slice(&bytes);
            Ok(out)
        }
        None => {
            let mut out = [0u8; 16];
            out[8..].copy_from_slice(&segment_index.to_be_bytes());
            Ok(out)
        }
    }
}

/// Decrypt a buffer in place, truncating to the unpadded length.
pub fn decrypt_in_place(
    data: &mut Vec<u8>,
    key: &[u8; 16],
    iv: &[u8; 16],
) -> Result<(), DecryptError> {
    let cipher = Aes128CbcDec::new(key.into(), iv.into());
    let len = cipher
        .decrypt_padded_mut::<Pkcs7>(data)
        .map_err(|e| DecryptError::Cipher(e.to_string()))?
        .len();
    data.truncate(len);
    Ok(())
}

/// Decrypt a downloaded segment file in place.
///
/// Reads the whole segment, decrypts it on the blocking thread pool, and
/// rewrites the file. Segments are short MPEG-TS chunks, so buffering one
/// entirely is fine.
pub async fn decrypt_segment_file(
    path: &Path,
    key: &str,
    iv: Option<&str>,
    segment_index: u64,
) -> Result<(), DecryptError> {
    let key = parse_key(key)?;
    let iv = derive_iv(iv, segment_index)?;

    let mut data = tokio::fs::read(path).await.map_err(|e| DecryptError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let decrypted = tokio::task::spawn_blocking(move || {
        decrypt_in_place(&mut data, &key, &iv).map(|()| data)
    })
    .await
    .map_err(|e| DecryptError::Cipher(format!("decryption offload task failed: {e}")))??;

    tokio::fs::write(path, &decrypted)
        .await
        .map_err(|e| DecryptError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(())
}
