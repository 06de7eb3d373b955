//! Error types for the client services.

use thiserror::Error;

use caduceus_core::{BackendError, KeyringError};
use caduceus_crypto::CryptoError;

/// Errors from the counters service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CountersError {
    /// Remote store failure (subscription or count query).
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A mark-read update was rejected; the optimistic decrement was
    /// rolled back.
    #[error("mark-read rejected for notification {id}: {source}")]
    MarkReadRejected {
        /// Notification that stayed unread.
        id: u64,
        /// Backend rejection.
        source: BackendError,
    },
}

/// Errors from the messaging service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    /// Keyring failure (locked session, unwrap failure).
    #[error(transparent)]
    Keyring(#[from] KeyringError),

    /// Remote store failure.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Payload parsing or decryption failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
