//! Message encryption using XChaCha20-Poly1305.
//!
//! Key size: 32 bytes. Nonce: 24 bytes, random per call. Tag: 16 bytes.
//! Output is an [`EncryptedPayload`] carrying the nonce alongside the
//! ciphertext, encoded on the wire as `"<base64 nonce>.<base64 ciphertext>"`.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng},
};
use zeroize::Zeroizing;

use crate::{error::CryptoError, kdf::SymmetricKey, payload::EncryptedPayload};

/// Encrypt `plaintext` under `key` with a fresh random 24-byte nonce.
///
/// Every call samples new nonce bytes from OS entropy. Two calls with
/// identical inputs never produce the same payload.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> EncryptedPayload {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);

    let Ok(ciphertext) = cipher.encrypt(&nonce, plaintext) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    EncryptedPayload { nonce: nonce.into(), ciphertext }
}

/// Decrypt a payload under `key`.
///
/// The plaintext is returned in a [`Zeroizing`] buffer so message bodies
/// are wiped once the caller drops them.
///
/// # Errors
///
/// `DecryptionFailed` if the authentication tag does not verify (wrong key
/// or tampered ciphertext).
pub fn decrypt(
    payload: &EncryptedPayload,
    key: &SymmetricKey,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = XNonce::from(payload.nonce);

    let plaintext = cipher.decrypt(&nonce, payload.ciphertext.as_slice()).map_err(|_| {
        CryptoError::DecryptionFailed { reason: "authentication failed".to_string() }
    })?;

    Ok(Zeroizing::new(plaintext))
}

/// Decrypt a payload and return the plaintext as a `String`.
///
/// # Errors
///
/// `DecryptionFailed` if authentication fails or the plaintext is not
/// valid UTF-8.
pub fn decrypt_utf8(payload: &EncryptedPayload, key: &SymmetricKey) -> Result<String, CryptoError> {
    let plaintext = decrypt(payload, key)?;
    String::from_utf8(plaintext.to_vec()).map_err(|_| CryptoError::DecryptionFailed {
        reason: "plaintext is not valid UTF-8".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(seed: u8) -> SymmetricKey {
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = seed.wrapping_add(i as u8);
        }
        SymmetricKey::from_bytes(bytes)
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key(1);
        let plaintext = b"Hello, World!";

        let payload = encrypt(plaintext, &key);
        let decrypted = decrypt(&payload, &key).unwrap();

        assert_eq!(decrypted.as_slice(), plaintext);
    }

    #[test]
    fn encrypt_decrypt_empty_message() {
        let key = test_key(2);

        let payload = encrypt(b"", &key);
        let decrypted = decrypt(&payload, &key).unwrap();

        assert!(decrypted.is_empty());
    }

    #[test]
    fn encrypt_decrypt_multibyte_utf8() {
        let key = test_key(3);
        let plaintext = "café ☕ — 診療 🩺🧬";

        let payload = encrypt(plaintext.as_bytes(), &key);
        let decrypted = decrypt_utf8(&payload, &key).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn encrypt_decrypt_large_message() {
        let key = test_key(4);
        let plaintext = vec![0x42u8; 64 * 1024]; // 64KB

        let payload = encrypt(&plaintext, &key);
        let decrypted = decrypt(&payload, &key).unwrap();

        assert_eq!(decrypted.as_slice(), plaintext.as_slice());
    }

    #[test]
    fn repeated_encryption_uses_fresh_nonces() {
        let key = test_key(5);
        let plaintext = b"same message";

        let first = encrypt(plaintext, &key);
        let second = encrypt(plaintext, &key);

        assert_ne!(first.nonce, second.nonce, "nonce must be fresh per call");
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let payload = encrypt(b"secret message", &test_key(6));

        let result = decrypt(&payload, &test_key(7));

        assert!(matches!(
            result,
            Err(CryptoError::DecryptionFailed { reason }) if reason.contains("authentication")
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_decryption() {
        let key = test_key(8);
        let mut payload = encrypt(b"original message", &key);

        payload.ciphertext[0] ^= 0xFF;

        assert!(decrypt(&payload, &key).is_err());
    }

    #[test]
    fn tampered_nonce_fails_decryption() {
        let key = test_key(9);
        let mut payload = encrypt(b"original message", &key);

        payload.nonce[0] ^= 0xFF;

        assert!(decrypt(&payload, &key).is_err());
    }

    #[test]
    fn non_utf8_plaintext_fails_string_decryption() {
        let key = test_key(10);
        let payload = encrypt(&[0xFF, 0xFE, 0x00, 0x01], &key);

        assert!(matches!(
            decrypt_utf8(&payload, &key),
            Err(CryptoError::DecryptionFailed { reason }) if reason.contains("UTF-8")
        ));
    }

    #[test]
    fn wire_format_roundtrip_through_encoding() {
        let key = test_key(11);
        let payload = encrypt(b"over the wire", &key);

        let parsed = EncryptedPayload::parse(&payload.encode()).unwrap();
        let decrypted = decrypt(&parsed, &key).unwrap();

        assert_eq!(decrypted.as_slice(), b"over the wire");
    }
}
