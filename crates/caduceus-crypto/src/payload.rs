//! The `nonce.ciphertext` payload wire format.
//!
//! All ciphertext stored or transmitted by this system uses one textual
//! format: `"<base64 nonce>.<base64 ciphertext>"`. Exactly one `.`
//! separator, both segments non-empty and independently base64-decodable,
//! decoded nonce exactly 24 bytes (XChaCha20).

use std::{fmt, str::FromStr};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::error::CryptoError;

/// XChaCha20 nonce size in bytes.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size in bytes.
const POLY1305_TAG_SIZE: usize = 16;

/// A parsed encrypted payload: 24-byte nonce plus ciphertext with tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    /// The 24-byte XChaCha20 nonce.
    pub nonce: [u8; NONCE_SIZE],
    /// The ciphertext including the 16-byte Poly1305 tag.
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Parse the `"<base64 nonce>.<base64 ciphertext>"` wire format.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` if the separator count is wrong, either segment
    /// is empty or not valid base64, or the nonce is not 24 bytes.
    pub fn parse(input: &str) -> Result<Self, CryptoError> {
        let mut parts = input.split('.');
        let (Some(nonce_b64), Some(ciphertext_b64), None) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("expected exactly one '.' separator"));
        };

        if nonce_b64.is_empty() {
            return Err(malformed("empty nonce segment"));
        }
        if ciphertext_b64.is_empty() {
            return Err(malformed("empty ciphertext segment"));
        }

        let nonce_bytes =
            BASE64.decode(nonce_b64).map_err(|_| malformed("nonce segment is not valid base64"))?;
        let ciphertext = BASE64
            .decode(ciphertext_b64)
            .map_err(|_| malformed("ciphertext segment is not valid base64"))?;

        let nonce: [u8; NONCE_SIZE] = nonce_bytes
            .try_into()
            .map_err(|_| malformed("nonce must decode to exactly 24 bytes"))?;

        Ok(Self { nonce, ciphertext })
    }

    /// Encode as the `"<base64 nonce>.<base64 ciphertext>"` wire format.
    pub fn encode(&self) -> String {
        format!("{}.{}", BASE64.encode(self.nonce), BASE64.encode(&self.ciphertext))
    }

    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(POLY1305_TAG_SIZE)
    }
}

impl fmt::Display for EncryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for EncryptedPayload {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Check whether a string is a well-formed encrypted payload.
///
/// Convenience for callers that only need a yes/no answer (e.g. validating
/// a row before attempting decryption).
pub fn validate_encrypted_format(input: &str) -> bool {
    EncryptedPayload::parse(input).is_ok()
}

fn malformed(reason: &str) -> CryptoError {
    CryptoError::MalformedPayload { reason: reason.to_string() }
}
