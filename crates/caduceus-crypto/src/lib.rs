//! Caduceus Cryptographic Primitives
//!
//! Building blocks for the end-to-end encrypted direct-messaging layer.
//! Pure functions and value types only: no I/O, no async, no backend calls.
//!
//! # Key Lifecycle
//!
//! Each account owns a random master key. The master key is never persisted
//! in plaintext: it is wrapped (encrypted) under a personal key derived from
//! the user's password and a fixed per-account salt, and only the wrapped
//! form is stored on the profile record. Message bodies are encrypted with
//! per-conversation keys derived from the master key.
//!
//! ```text
//! Password + Salt
//!        │
//!        ▼
//! Argon2id → Personal Key (in-memory only)
//!        │
//!        ▼ wrap / unwrap
//! Master Key (random, per account; persisted only wrapped)
//!        │
//!        ▼
//! HKDF → Conversation Keys
//!        │
//!        ▼
//! AEAD Encryption → "nonce.ciphertext" payload
//! ```
//!
//! # Security
//!
//! - The personal key is used for exactly one purpose: wrapping and
//!   unwrapping the master key. It never encrypts message content.
//! - Every encryption samples a fresh random 24-byte XChaCha20 nonce from
//!   OS entropy. Nonce reuse under one key is a hard invariant violation.
//! - XChaCha20-Poly1305 authenticates ciphertexts: decryption under the
//!   wrong key or of tampered data fails, it never yields garbage.
//! - Key material is zeroized on drop and excluded from `Debug` output.
//! - Rotating the password generates a fresh master key. Content encrypted
//!   under the previous master key becomes unreachable, by design.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod master_key;
pub mod payload;

pub use cipher::{decrypt, decrypt_utf8, encrypt};
pub use error::CryptoError;
pub use kdf::{Salt, SymmetricKey, derive_conversation_key, derive_personal_key};
pub use master_key::MasterKey;
pub use payload::{EncryptedPayload, NONCE_SIZE, validate_encrypted_format};
