//! Backend collaborator traits.
//!
//! The remote store behind these traits is opaque: SQL, RPC, or REST is
//! an implementation detail. The core needs exactly five capabilities —
//! profile key fields, encrypted message rows, authoritative counts, a
//! change feed, and a notification trigger — and nothing else.
//!
//! All methods are async and fallible. Implementations inherit whatever
//! timeout and retry policy their client library provides; the core never
//! retries on its own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{error::BackendError, event::ChangeEvent};

/// Encryption-related fields of a user's profile record.
///
/// Both fields are absent for accounts that have never unlocked the
/// encrypted messaging layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionProfile {
    /// Base64 salt, generated once at provisioning, immutable afterwards.
    pub encryption_salt: Option<String>,
    /// Wrapped master key in `nonce.ciphertext` form. Replaced wholesale
    /// on password reset.
    pub encrypted_user_master_key: Option<String>,
}

/// A persisted message row. The body is always an encrypted payload
/// string; plaintext never reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Conversation/thread the message belongs to.
    pub conversation_id: String,
    /// Sender's user id.
    pub sender_id: u64,
    /// Encrypted body in `nonce.ciphertext` form.
    pub body: String,
}

/// Read/write access to the profile's encryption fields.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load the encryption fields of a user's profile.
    async fn fetch_encryption_profile(&self, user_id: u64)
    -> Result<EncryptionProfile, BackendError>;

    /// Persist the salt. Called exactly once, at provisioning.
    async fn store_encryption_salt(&self, user_id: u64, salt: &str) -> Result<(), BackendError>;

    /// Replace the wrapped master key.
    async fn store_wrapped_master_key(
        &self,
        user_id: u64,
        wrapped: &str,
    ) -> Result<(), BackendError>;

    /// Change the authentication password.
    ///
    /// This only updates the auth layer. Rotating the wrapped master key
    /// to match is the rotation state machine's responsibility.
    async fn update_auth_password(
        &self,
        user_id: u64,
        new_password: &str,
    ) -> Result<(), BackendError>;
}

/// Persistence for encrypted message bodies, keyed by conversation.
///
/// Ordering within a conversation is the backend's concern (timestamp or
/// sequence column); the encryption layer guarantees nothing about order.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append an encrypted message body to a conversation.
    async fn store_message(&self, message: &StoredMessage) -> Result<(), BackendError>;

    /// Load a conversation's messages in backend order.
    async fn load_messages(&self, conversation_id: &str)
    -> Result<Vec<StoredMessage>, BackendError>;
}

/// Authoritative count queries and the one mutator the counters use.
#[async_trait]
pub trait CountStore: Send + Sync {
    /// Pending connection requests directed at the user.
    async fn pending_request_count(&self, user_id: u64) -> Result<u64, BackendError>;

    /// Unread direct messages for the user.
    async fn unread_message_count(&self, user_id: u64) -> Result<u64, BackendError>;

    /// Unread notifications for the user.
    async fn unread_notification_count(&self, user_id: u64) -> Result<u64, BackendError>;

    /// Mark one notification read.
    async fn mark_notification_read(
        &self,
        user_id: u64,
        notification_id: u64,
    ) -> Result<(), BackendError>;
}

/// Row-change subscription on the watched tables.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Subscribe to changes scoped to `user_id`.
    ///
    /// The subscription ends when the receiver is dropped; implementations
    /// must not keep user-scoped listeners alive past that point.
    async fn subscribe(&self, user_id: u64)
    -> Result<broadcast::Receiver<ChangeEvent>, BackendError>;
}

/// Fire-and-forget downstream notification trigger (e.g. email).
///
/// Failures here must never block or fail the action that triggered the
/// dispatch; callers log and move on.
#[async_trait]
pub trait NotificationDispatch: Send + Sync {
    /// Trigger a downstream notification for `user_id`.
    async fn dispatch(&self, user_id: u64, subject: &str) -> Result<(), BackendError>;
}
