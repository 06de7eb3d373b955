//! Error types for session key management.
//!
//! Strongly-typed errors for the keyring and rotation flows. The split
//! matters for the UI: an unwrap failure is recoverable (re-enter the
//! password), a missing salt is a fatal configuration error, and an
//! inconsistent rotation needs support intervention.

use thiserror::Error;

use caduceus_crypto::CryptoError;

/// A failure reported by the remote store.
///
/// Network failures, permission rejections, and row-level-security
/// denials all surface here. The core does not retry; retry policy is the
/// caller's concern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("backend error: {reason}")]
pub struct BackendError {
    /// Backend-reported failure description.
    pub reason: String,
}

impl BackendError {
    /// Build a backend error from any displayable cause.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Errors from keyring unlock, key access, and password rotation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyringError {
    /// Profile has a wrapped master key but no `encryption_salt`.
    ///
    /// Without the salt the personal key cannot be re-derived, so every
    /// operation that depends on it must abort. Blocks password reset.
    #[error("profile is missing the encryption salt")]
    MissingSalt,

    /// No unlocked key material for this session.
    #[error("session keyring is locked")]
    Locked,

    /// Key derivation failed.
    #[error("key derivation failed: {reason}")]
    Derivation {
        /// Underlying KDF failure description.
        reason: String,
    },

    /// The stored master key could not be unwrapped.
    ///
    /// Wrong password or corrupted key material. Recoverable: the user
    /// can retry. Never silently replaced with a fresh key — that would
    /// orphan all previously encrypted content.
    #[error("could not unwrap master key: {reason}")]
    UnwrapFailed {
        /// Underlying decryption or key-format failure description.
        reason: String,
    },

    /// Remote store failure.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The auth password was changed but the wrapped-key write failed.
    ///
    /// The account is now in a state the user cannot repair alone: the
    /// stored wrapped key no longer matches the login password. Must be
    /// surfaced as requiring support intervention.
    #[error("password rotation left the account inconsistent: {reason}")]
    InconsistentState {
        /// What succeeded and what failed.
        reason: String,
    },
}

impl KeyringError {
    /// Returns true if the user can recover by retrying with different
    /// input (typically the password).
    ///
    /// Configuration errors and inconsistent rotation states are never
    /// recoverable from the client alone.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnwrapFailed { .. } | Self::Backend(_) | Self::Locked)
    }
}

impl From<CryptoError> for KeyringError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Derivation { reason } => Self::Derivation { reason },
            CryptoError::MalformedPayload { reason }
            | CryptoError::DecryptionFailed { reason }
            | CryptoError::KeyFormat { reason } => Self::UnwrapFailed { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_failures_are_recoverable() {
        assert!(KeyringError::UnwrapFailed { reason: "authentication failed".into() }
            .is_recoverable());
        assert!(KeyringError::Backend(BackendError::new("timeout")).is_recoverable());
    }

    #[test]
    fn configuration_errors_are_fatal() {
        assert!(!KeyringError::MissingSalt.is_recoverable());
        assert!(!KeyringError::Derivation { reason: "bad params".into() }.is_recoverable());
        assert!(
            !KeyringError::InconsistentState { reason: "wrapped-key write failed".into() }
                .is_recoverable()
        );
    }

    #[test]
    fn crypto_errors_map_to_keyring_layers() {
        let derivation = CryptoError::Derivation { reason: "x".into() };
        assert!(matches!(KeyringError::from(derivation), KeyringError::Derivation { .. }));

        let auth = CryptoError::DecryptionFailed { reason: "x".into() };
        assert!(matches!(KeyringError::from(auth), KeyringError::UnwrapFailed { .. }));
    }
}
