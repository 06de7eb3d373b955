//! Message send and render paths.
//!
//! Compose path: derive the conversation key from the session keyring,
//! encrypt, persist the payload string, then fire-and-forget a downstream
//! notification. Render path: decrypt for display, falling back to a
//! placeholder on any failure so one bad row never takes down the
//! message list.

use std::sync::Arc;

use caduceus_core::{
    MessageStore, NotificationDispatch, ProfileStore, SessionKeyring, StoredMessage,
};
use caduceus_crypto::EncryptedPayload;

use crate::error::MessagingError;

/// Rendered in place of a body that failed to decrypt. Logged for
/// diagnosis: it usually means a key mismatch or data corruption.
pub const DECRYPT_PLACEHOLDER: &str = "[unable to decrypt]";

/// A decrypted (or placeholder) message ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Sender's user id.
    pub sender_id: u64,
    /// Plaintext body, or [`DECRYPT_PLACEHOLDER`].
    pub body: String,
}

/// Encrypting message service for one user session.
pub struct MessageService<B, P> {
    store: Arc<B>,
    keyring: SessionKeyring<P>,
}

impl<B, P> MessageService<B, P>
where
    B: MessageStore + NotificationDispatch + Send + Sync + 'static,
    P: ProfileStore,
{
    /// Create a service over the given store and session keyring.
    pub fn new(store: Arc<B>, keyring: SessionKeyring<P>) -> Self {
        Self { store, keyring }
    }

    /// Encrypt and persist a message, then trigger a downstream
    /// notification for the recipient.
    ///
    /// The dispatch is fire-and-forget: it runs on a detached task and a
    /// failure there is logged, never propagated — the message was
    /// already persisted.
    ///
    /// # Errors
    ///
    /// - `Keyring` if the session is locked.
    /// - `Backend` if persisting the encrypted body fails.
    pub async fn send(
        &self,
        conversation_id: &str,
        recipient_id: u64,
        plaintext: &str,
    ) -> Result<(), MessagingError> {
        let key = self.keyring.conversation_key(conversation_id).await?;
        let payload = caduceus_crypto::encrypt(plaintext.as_bytes(), &key);

        let message = StoredMessage {
            conversation_id: conversation_id.to_string(),
            sender_id: self.keyring.user_id(),
            body: payload.encode(),
        };
        self.store.store_message(&message).await.map_err(MessagingError::Backend)?;

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(err) = store.dispatch(recipient_id, "new encrypted message").await {
                tracing::warn!(recipient_id, error = %err, "notification dispatch failed");
            }
        });

        Ok(())
    }

    /// Decrypt one stored body for display.
    ///
    /// Never fails: malformed payloads and authentication failures render
    /// as [`DECRYPT_PLACEHOLDER`] and are logged.
    pub async fn render_body(&self, conversation_id: &str, body: &str) -> String {
        match self.decrypt_body(conversation_id, body).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(conversation_id, error = %err, "rendering decrypt placeholder");
                DECRYPT_PLACEHOLDER.to_string()
            },
        }
    }

    /// Load and decrypt a conversation's history.
    ///
    /// # Errors
    ///
    /// `Backend` if the history query fails. Individual undecryptable
    /// rows do not fail the load; they render as the placeholder.
    pub async fn load_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<RenderedMessage>, MessagingError> {
        let rows = self.store.load_messages(conversation_id).await?;

        let mut rendered = Vec::with_capacity(rows.len());
        for row in rows {
            rendered.push(RenderedMessage {
                sender_id: row.sender_id,
                body: self.render_body(conversation_id, &row.body).await,
            });
        }
        Ok(rendered)
    }

    async fn decrypt_body(
        &self,
        conversation_id: &str,
        body: &str,
    ) -> Result<String, MessagingError> {
        let payload = EncryptedPayload::parse(body)?;
        let key = self.keyring.conversation_key(conversation_id).await?;
        Ok(caduceus_crypto::decrypt_utf8(&payload, &key)?)
    }
}
