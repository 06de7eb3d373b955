//! Password-reset key rotation state machine.
//!
//! Rotating the password rotates the personal key (same salt, new
//! password) and generates a brand-new master key. The old master key is
//! not recoverable without the old personal key, so previously encrypted
//! content becomes unreachable. This is deliberate; callers must warn the
//! user before starting a rotation.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐    ┌───────────┐    ┌──────────────┐    ┌────────────┐    ┌───────────┐
//! │ Idle │───>│ Verifying │───>│ RotatingKeys │───>│ Persisting │───>│ SignedOut │
//! └──────┘    └───────────┘    └──────────────┘    └────────────┘    └───────────┘
//!                  │                  │                  │
//!                  └──────── any failure aborts ────────┘
//!                                (back to Idle)
//! ```

use std::sync::Arc;

use tokio::sync::watch;

use caduceus_crypto::{MasterKey, Salt, derive_personal_key};

use crate::{backend::ProfileStore, error::KeyringError, session::SessionKeyring};

/// Observable rotation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationState {
    /// No rotation in progress.
    #[default]
    Idle,
    /// Checking session and profile preconditions.
    Verifying,
    /// Deriving the new personal key and generating the new master key.
    RotatingKeys,
    /// Writing the new auth password and wrapped master key.
    Persisting,
    /// Rotation complete; the session was signed out and the user must
    /// re-authenticate.
    SignedOut,
}

/// Runs password-reset rotations and publishes progress.
pub struct PasswordRotation<P> {
    profiles: Arc<P>,
    state_tx: watch::Sender<RotationState>,
}

impl<P: ProfileStore> PasswordRotation<P> {
    /// Create a rotation runner against the given profile store.
    pub fn new(profiles: Arc<P>) -> Self {
        let (state_tx, _) = watch::channel(RotationState::Idle);
        Self { profiles, state_tx }
    }

    /// Subscribe to rotation progress (for UI).
    pub fn state(&self) -> watch::Receiver<RotationState> {
        self.state_tx.subscribe()
    }

    /// Rotate the password and key material for the keyring's user.
    ///
    /// Preconditions: the keyring must be unlocked (authenticated session)
    /// and the profile must already carry a salt. The salt is deliberately
    /// NOT regenerated — future logins must re-derive the same personal
    /// key namespace from (new password, existing salt).
    ///
    /// On success the keyring is locked and the state is `SignedOut`.
    ///
    /// # Errors
    ///
    /// - [`KeyringError::Locked`] without an authenticated session.
    /// - [`KeyringError::MissingSalt`] if the profile has no salt; the
    ///   reset is blocked, nothing is written.
    /// - [`KeyringError::Backend`] if the auth password update fails;
    ///   nothing was committed.
    /// - [`KeyringError::InconsistentState`] if the wrapped-key write
    ///   fails after the password change succeeded. The account now needs
    ///   support intervention and the error says so.
    pub async fn rotate(
        &self,
        keyring: &SessionKeyring<P>,
        new_password: &str,
    ) -> Result<(), KeyringError> {
        let user_id = keyring.user_id();

        self.state_tx.send_replace(RotationState::Verifying);
        if !keyring.is_unlocked().await {
            return Err(self.abort(KeyringError::Locked));
        }
        let profile = match self.profiles.fetch_encryption_profile(user_id).await {
            Ok(profile) => profile,
            Err(err) => return Err(self.abort(err.into())),
        };
        let Some(salt) = profile.encryption_salt else {
            return Err(self.abort(KeyringError::MissingSalt));
        };

        self.state_tx.send_replace(RotationState::RotatingKeys);
        let wrapped = match rotate_key_material(new_password, &salt) {
            Ok(wrapped) => wrapped,
            Err(err) => return Err(self.abort(err)),
        };

        self.state_tx.send_replace(RotationState::Persisting);
        if let Err(err) = self.profiles.update_auth_password(user_id, new_password).await {
            // Password unchanged, wrapped key unchanged: clean abort
            return Err(self.abort(err.into()));
        }
        if let Err(err) = self.profiles.store_wrapped_master_key(user_id, &wrapped).await {
            // The auth password already changed; the stored wrapped key
            // no longer matches it. Nothing the client can do alone.
            tracing::error!(user_id, error = %err, "wrapped-key write failed after password change");
            return Err(self.abort(KeyringError::InconsistentState {
                reason: format!("auth password updated but wrapped-key write failed: {err}"),
            }));
        }

        keyring.lock().await;
        self.state_tx.send_replace(RotationState::SignedOut);
        tracing::info!(user_id, "password rotation complete, session signed out");
        Ok(())
    }

    /// Abort the flow: reset observable state and pass the error through.
    fn abort(&self, err: KeyringError) -> KeyringError {
        self.state_tx.send_replace(RotationState::Idle);
        err
    }
}

/// Derive the new personal key and produce a freshly wrapped master key.
///
/// Pure key work, no I/O. The new master key never leaves this function
/// unwrapped.
fn rotate_key_material(new_password: &str, salt_b64: &str) -> Result<String, KeyringError> {
    let salt = Salt::from_base64(salt_b64)?;
    let new_personal = derive_personal_key(new_password, &salt)?;
    let new_master = MasterKey::generate();
    Ok(new_master.wrap(&new_personal).encode())
}
