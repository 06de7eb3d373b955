//! Session keyring: in-memory key material for the authenticated session.
//!
//! Holds the password-derived personal key and the unwrapped master key
//! behind a shared handle. Unlocked on login, locked (and zeroized via the
//! key types' drop impls) on logout. No other component touches key bytes
//! directly; everything goes through [`SessionKeyring::conversation_key`].

use std::sync::Arc;

use tokio::sync::RwLock;

use caduceus_crypto::{
    EncryptedPayload, MasterKey, Salt, SymmetricKey, derive_conversation_key,
    derive_personal_key,
};

use crate::{backend::ProfileStore, error::KeyringError};

/// Key material for one unlocked session.
struct KeyMaterial {
    /// Derived from (password, salt); wraps and unwraps the master key.
    #[allow(dead_code)]
    personal: SymmetricKey,
    /// Unwrapped account master key; source of all conversation keys.
    master: MasterKey,
}

/// Shared keyring handle for one user's session. Clone to share across
/// services; all clones see the same lock state.
pub struct SessionKeyring<P> {
    profiles: Arc<P>,
    user_id: u64,
    inner: Arc<RwLock<Option<KeyMaterial>>>,
}

impl<P> Clone for SessionKeyring<P> {
    fn clone(&self) -> Self {
        Self {
            profiles: Arc::clone(&self.profiles),
            user_id: self.user_id,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: ProfileStore> SessionKeyring<P> {
    /// Create a locked keyring for `user_id`.
    pub fn new(profiles: Arc<P>, user_id: u64) -> Self {
        Self { profiles, user_id, inner: Arc::new(RwLock::new(None)) }
    }

    /// User this keyring is scoped to.
    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Unlock the keyring with the login password.
    ///
    /// Three profile shapes are handled:
    ///
    /// - **No salt, no wrapped key**: first unlock. Generates and persists
    ///   a salt, generates a master key, wraps it under the derived
    ///   personal key, persists the wrapped form.
    /// - **Salt, no wrapped key**: account predates encrypted messaging.
    ///   Generates and persists a fresh wrapped master key.
    /// - **Salt and wrapped key**: normal login. Derives the personal key
    ///   and unwraps the stored master key.
    ///
    /// # Errors
    ///
    /// - [`KeyringError::MissingSalt`] if a wrapped key exists without a
    ///   salt — the personal key namespace is unrecoverable (fatal).
    /// - [`KeyringError::UnwrapFailed`] if the stored key does not unwrap
    ///   under this password (recoverable; the user can retry). A fresh
    ///   key is never generated on this path.
    /// - [`KeyringError::Backend`] for store failures.
    pub async fn unlock(&self, password: &str) -> Result<(), KeyringError> {
        let profile = self.profiles.fetch_encryption_profile(self.user_id).await?;

        let material = match (profile.encryption_salt, profile.encrypted_user_master_key) {
            (None, Some(_)) => return Err(KeyringError::MissingSalt),
            (None, None) => {
                let salt = Salt::generate();
                self.profiles.store_encryption_salt(self.user_id, &salt.to_base64()).await?;
                self.provision_master_key(password, &salt).await?
            },
            (Some(salt), None) => {
                let salt = Salt::from_base64(&salt)?;
                self.provision_master_key(password, &salt).await?
            },
            (Some(salt), Some(wrapped)) => {
                let salt = Salt::from_base64(&salt)?;
                let personal = derive_personal_key(password, &salt)?;
                let payload = EncryptedPayload::parse(&wrapped)?;
                let master = MasterKey::unwrap_with(&payload, &personal)?;
                KeyMaterial { personal, master }
            },
        };

        let mut guard = self.inner.write().await;
        *guard = Some(material);
        Ok(())
    }

    /// Lock the keyring. Key material is dropped and zeroized.
    pub async fn lock(&self) {
        let mut guard = self.inner.write().await;
        *guard = None;
    }

    /// Whether key material is currently held.
    pub async fn is_unlocked(&self) -> bool {
        self.inner.read().await.is_some()
    }

    /// Derive the message key for a conversation.
    ///
    /// # Errors
    ///
    /// [`KeyringError::Locked`] if the keyring has no key material.
    pub async fn conversation_key(
        &self,
        conversation_id: &str,
    ) -> Result<SymmetricKey, KeyringError> {
        let guard = self.inner.read().await;
        let material = guard.as_ref().ok_or(KeyringError::Locked)?;
        Ok(derive_conversation_key(&material.master, conversation_id))
    }

    /// Generate, wrap, and persist a master key for an account that has
    /// none yet.
    async fn provision_master_key(
        &self,
        password: &str,
        salt: &Salt,
    ) -> Result<KeyMaterial, KeyringError> {
        let personal = derive_personal_key(password, salt)?;
        let master = MasterKey::generate();
        let wrapped = master.wrap(&personal);
        self.profiles.store_wrapped_master_key(self.user_id, &wrapped.encode()).await?;
        tracing::debug!(user_id = self.user_id, "provisioned master key");
        Ok(KeyMaterial { personal, master })
    }
}
