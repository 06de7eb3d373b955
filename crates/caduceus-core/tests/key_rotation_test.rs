//! End-to-end key rotation scenario.
//!
//! Verifies the documented password-reset tradeoff: rotating the password
//! (same salt) produces a personal key that cannot unwrap the old stored
//! master key, and content encrypted before the rotation becomes
//! unreachable, while a freshly wrapped key works under the new password.

use std::sync::Arc;

use caduceus_core::{
    KeyringError, MemoryBackend, PasswordRotation, ProfileStore, SessionKeyring,
};
use caduceus_crypto::{CryptoError, EncryptedPayload, MasterKey, Salt, derive_personal_key};

const USER: u64 = 42;
const OLD_PASSWORD: &str = "OldPass1!";
const NEW_PASSWORD: &str = "NewPass2!";

#[tokio::test]
async fn rotation_invalidates_the_old_wrapped_master_key() {
    let backend = Arc::new(MemoryBackend::new());
    let keyring = SessionKeyring::new(Arc::clone(&backend), USER);

    keyring.unlock(OLD_PASSWORD).await.unwrap();
    let profile = backend.fetch_encryption_profile(USER).await.unwrap();
    let salt = Salt::from_base64(&profile.encryption_salt.unwrap()).unwrap();
    let old_wrapped =
        EncryptedPayload::parse(&profile.encrypted_user_master_key.unwrap()).unwrap();

    let rotation = PasswordRotation::new(Arc::clone(&backend));
    rotation.rotate(&keyring, NEW_PASSWORD).await.unwrap();

    // The newly derived personal key cannot unwrap the OLD blob
    let new_personal = derive_personal_key(NEW_PASSWORD, &salt).unwrap();
    assert!(matches!(
        MasterKey::unwrap_with(&old_wrapped, &new_personal),
        Err(CryptoError::DecryptionFailed { .. })
    ));

    // ...but it does unwrap the freshly stored one
    let profile = backend.fetch_encryption_profile(USER).await.unwrap();
    let new_wrapped =
        EncryptedPayload::parse(&profile.encrypted_user_master_key.unwrap()).unwrap();
    assert!(MasterKey::unwrap_with(&new_wrapped, &new_personal).is_ok());
}

#[tokio::test]
async fn content_from_before_the_rotation_is_unreachable() {
    let backend = Arc::new(MemoryBackend::new());
    let keyring = SessionKeyring::new(Arc::clone(&backend), USER);

    keyring.unlock(OLD_PASSWORD).await.unwrap();
    let old_key = keyring.conversation_key("thread-1").await.unwrap();
    let old_payload = caduceus_crypto::encrypt("pre-rotation message".as_bytes(), &old_key);

    let rotation = PasswordRotation::new(Arc::clone(&backend));
    rotation.rotate(&keyring, NEW_PASSWORD).await.unwrap();

    // Log back in with the new password: new master key, new conversation keys
    keyring.unlock(NEW_PASSWORD).await.unwrap();
    let new_key = keyring.conversation_key("thread-1").await.unwrap();

    assert!(caduceus_crypto::decrypt(&old_payload, &new_key).is_err());

    // New content round-trips normally
    let new_payload = caduceus_crypto::encrypt("post-rotation message".as_bytes(), &new_key);
    assert_eq!(
        caduceus_crypto::decrypt_utf8(&new_payload, &new_key).unwrap(),
        "post-rotation message"
    );
}

#[tokio::test]
async fn old_password_stops_unlocking_after_rotation() {
    let backend = Arc::new(MemoryBackend::new());
    let keyring = SessionKeyring::new(Arc::clone(&backend), USER);
    keyring.unlock(OLD_PASSWORD).await.unwrap();

    let rotation = PasswordRotation::new(Arc::clone(&backend));
    rotation.rotate(&keyring, NEW_PASSWORD).await.unwrap();

    let err = keyring.unlock(OLD_PASSWORD).await.unwrap_err();
    assert!(matches!(err, KeyringError::UnwrapFailed { .. }));
    assert!(err.is_recoverable(), "user can retry with the correct new password");
}
