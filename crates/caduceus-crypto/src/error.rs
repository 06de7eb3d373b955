//! Error types for the crypto layer.
//!
//! Strongly-typed errors, one variant per failure class. Decryption and
//! format failures are deliberately distinct: a malformed payload points at
//! data corruption or a writer bug, while an authentication failure points
//! at a key mismatch.

use thiserror::Error;

/// Errors from key derivation, payload parsing, and AEAD operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Password-based key derivation failed.
    #[error("key derivation failed: {reason}")]
    Derivation {
        /// Underlying KDF failure description.
        reason: String,
    },

    /// Input does not match the `nonce.ciphertext` wire format.
    #[error("malformed encrypted payload: {reason}")]
    MalformedPayload {
        /// Which format rule was violated.
        reason: String,
    },

    /// AEAD authentication failed: wrong key or tampered ciphertext.
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Failure description (no key material).
        reason: String,
    },

    /// Exported key material could not be serialized or parsed.
    #[error("invalid key format: {reason}")]
    KeyFormat {
        /// What was wrong with the key representation.
        reason: String,
    },
}
