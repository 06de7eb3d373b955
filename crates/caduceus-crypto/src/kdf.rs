//! Key derivation.
//!
//! `derive_personal_key` — Argon2id, derives the per-session personal key
//! from the user's password and their fixed profile salt.
//!
//! `derive_conversation_key` — HKDF-SHA256, derives a per-conversation
//! message key from the account master key.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

use crate::{error::CryptoError, master_key::MasterKey};

/// Label for conversation key derivation (domain separation).
const CONVERSATION_KEY_LABEL: &[u8] = b"caduceus-conversation-v1";

/// Salt length in bytes.
const SALT_SIZE: usize = 16;

/// A 32-byte symmetric key. Zeroized on drop, redacted in `Debug`.
///
/// Used both for the password-derived personal key (which only wraps and
/// unwraps the master key) and for derived conversation keys.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    /// Build a key from raw bytes. The caller's copy should be zeroized.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes, for use by the cipher only.
    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// A 16-byte per-account salt.
///
/// Generated once at account creation and persisted on the profile record
/// as base64. Never regenerated for an existing account: the same
/// (password, salt) pair must keep deriving the same personal key across
/// sessions. Not secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    /// Generate a fresh random salt from OS entropy.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Decode a salt from its base64 profile representation.
    ///
    /// # Errors
    ///
    /// `KeyFormat` if the input is not base64 or not 16 decoded bytes.
    pub fn from_base64(input: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64.decode(input).map_err(|_| CryptoError::KeyFormat {
            reason: "salt is not valid base64".to_string(),
        })?;
        let bytes: [u8; SALT_SIZE] = bytes.try_into().map_err(|_| CryptoError::KeyFormat {
            reason: "salt must decode to exactly 16 bytes".to_string(),
        })?;
        Ok(Self(bytes))
    }

    /// Encode for profile persistence.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

/// Argon2id parameters, fixed so derivation stays deterministic across
/// sessions and releases: 19 MiB memory, 2 iterations, 1 lane.
fn argon2_params() -> Result<Params, CryptoError> {
    Params::new(19 * 1024, 2, 1, Some(32))
        .map_err(|e| CryptoError::Derivation { reason: e.to_string() })
}

/// Derive the personal key from a password and the profile salt.
///
/// Deterministic: the same (password, salt) pair always yields the same
/// key. The personal key exists only in memory for the session and is used
/// exclusively to wrap and unwrap the master key.
///
/// # Errors
///
/// `Derivation` if Argon2 rejects the inputs.
pub fn derive_personal_key(password: &str, salt: &Salt) -> Result<SymmetricKey, CryptoError> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params()?);
    let mut output = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), &salt.0, &mut output)
        .map_err(|e| CryptoError::Derivation { reason: e.to_string() })?;
    Ok(SymmetricKey(output))
}

/// Derive the message key for one conversation from the master key.
///
/// Deterministic per (master key, conversation id), so both participants
/// holding the shared master key material derive the same conversation key.
/// Different conversations get unrelated keys.
pub fn derive_conversation_key(master: &MasterKey, conversation_id: &str) -> SymmetricKey {
    let hkdf = Hkdf::<Sha256>::new(None, master.as_bytes());

    let mut info = Vec::with_capacity(CONVERSATION_KEY_LABEL.len() + conversation_id.len());
    info.extend_from_slice(CONVERSATION_KEY_LABEL);
    info.extend_from_slice(conversation_id.as_bytes());

    let mut key = [0u8; 32];
    let Ok(()) = hkdf.expand(&info, &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    SymmetricKey(key)
}
