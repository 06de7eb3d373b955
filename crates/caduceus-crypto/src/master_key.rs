//! The per-account master key and its wrapped persistence form.
//!
//! Generated once per account from OS entropy. The plaintext key exists
//! only in memory; the profile record stores it wrapped (encrypted under
//! the personal key) in the standard payload wire format.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroizing, ZeroizeOnDrop};

use crate::{
    cipher::{decrypt, encrypt},
    error::CryptoError,
    kdf::SymmetricKey,
    payload::EncryptedPayload,
};

/// Serialized key representation used inside the wrapped blob.
///
/// JWK-style octet key: `{"kty":"oct","k":"<base64 key bytes>"}`.
#[derive(Serialize, Deserialize)]
struct ExportedKey {
    kty: String,
    k: String,
}

/// The per-account random symmetric master key. Zeroized on drop,
/// redacted in `Debug`.
///
/// All conversation keys derive from this key. It is persisted only in
/// wrapped form; losing the personal key that wrapped it (password reset)
/// makes previously encrypted content unreachable.
#[derive(Clone, ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Generate a fresh random master key. Call once per account.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw key bytes, for conversation-key derivation only.
    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Serialize to the transportable JWK-style textual form.
    ///
    /// The result is sensitive: callers must only feed it into [`wrap`]
    /// and let the [`Zeroizing`] wrapper clear it.
    ///
    /// [`wrap`]: MasterKey::wrap
    pub fn export(&self) -> Zeroizing<String> {
        let exported = ExportedKey { kty: "oct".to_string(), k: BASE64.encode(self.0) };
        let Ok(json) = serde_json::to_string(&exported) else {
            unreachable!("a two-string-field struct always serializes to JSON");
        };
        Zeroizing::new(json)
    }

    /// Wrap (encrypt) the exported key under the personal key.
    ///
    /// The returned payload is what gets persisted as
    /// `encrypted_user_master_key` on the profile record.
    pub fn wrap(&self, personal_key: &SymmetricKey) -> EncryptedPayload {
        let exported = self.export();
        encrypt(exported.as_bytes(), personal_key)
    }

    /// Unwrap a stored master key with the current personal key.
    ///
    /// # Errors
    ///
    /// - `DecryptionFailed` if the personal key does not match the one the
    ///   blob was wrapped under (wrong password) or the blob was tampered
    ///   with. This must surface to the user; silently generating a fresh
    ///   key here would permanently orphan all existing content.
    /// - `KeyFormat` if the decrypted blob is not a valid exported key.
    pub fn unwrap_with(
        wrapped: &EncryptedPayload,
        personal_key: &SymmetricKey,
    ) -> Result<Self, CryptoError> {
        let plaintext = decrypt(wrapped, personal_key)?;

        let exported: ExportedKey = serde_json::from_slice(&plaintext).map_err(|_| {
            CryptoError::KeyFormat { reason: "wrapped blob is not an exported key".to_string() }
        })?;
        if exported.kty != "oct" {
            return Err(CryptoError::KeyFormat {
                reason: format!("unsupported key type {:?}", exported.kty),
            });
        }

        let key_bytes = Zeroizing::new(BASE64.decode(&exported.k).map_err(|_| {
            CryptoError::KeyFormat { reason: "key bytes are not valid base64".to_string() }
        })?);
        let bytes: [u8; 32] = key_bytes.as_slice().try_into().map_err(|_| {
            CryptoError::KeyFormat { reason: "master key must be exactly 32 bytes".to_string() }
        })?;

        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::{Salt, derive_personal_key};

    #[test]
    fn wrap_unwrap_roundtrip() {
        let master = MasterKey::generate();
        let personal = derive_personal_key("pw", &Salt::generate()).unwrap();

        let wrapped = master.wrap(&personal);
        let unwrapped = MasterKey::unwrap_with(&wrapped, &personal).unwrap();

        assert_eq!(unwrapped.as_bytes(), master.as_bytes());
    }

    #[test]
    fn unwrap_with_wrong_personal_key_fails() {
        let master = MasterKey::generate();
        let salt = Salt::generate();
        let right = derive_personal_key("OldPass1!", &salt).unwrap();
        let wrong = derive_personal_key("NewPass2!", &salt).unwrap();

        let wrapped = master.wrap(&right);

        assert!(matches!(
            MasterKey::unwrap_with(&wrapped, &wrong),
            Err(CryptoError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn generated_keys_are_unique() {
        let a = MasterKey::generate();
        let b = MasterKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn export_is_jwk_octet_form() {
        let master = MasterKey::generate();
        let exported = master.export();

        let parsed: ExportedKey = serde_json::from_str(&exported).unwrap();
        assert_eq!(parsed.kty, "oct");
        assert_eq!(BASE64.decode(&parsed.k).unwrap().len(), 32);
    }

    #[test]
    fn unwrap_rejects_non_key_plaintext() {
        let personal = SymmetricKey::from_bytes([1; 32]);
        let wrapped = crate::cipher::encrypt(b"{\"not\":\"a key\"}", &personal);

        assert!(matches!(
            MasterKey::unwrap_with(&wrapped, &personal),
            Err(CryptoError::KeyFormat { .. })
        ));
    }

    #[test]
    fn unwrap_rejects_wrong_key_length() {
        let personal = SymmetricKey::from_bytes([2; 32]);
        let short = ExportedKey { kty: "oct".to_string(), k: BASE64.encode([0u8; 16]) };
        let wrapped =
            crate::cipher::encrypt(serde_json::to_string(&short).unwrap().as_bytes(), &personal);

        assert!(matches!(
            MasterKey::unwrap_with(&wrapped, &personal),
            Err(CryptoError::KeyFormat { .. })
        ));
    }

    #[test]
    fn debug_output_redacts_key_bytes() {
        let master = MasterKey::generate();
        assert_eq!(format!("{master:?}"), "MasterKey(..)");
    }
}
