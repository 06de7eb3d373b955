//! Caduceus Session Core
//!
//! Key management for the end-to-end encrypted messaging layer: the
//! session keyring (personal key + master key held in memory for the
//! authenticated session), the password-reset key rotation state machine,
//! and the collaborator traits the core calls into.
//!
//! The remote store is a black box. This crate defines exactly the
//! capabilities the encryption and counters layers need from it — profile
//! fields, encrypted message rows, authoritative counts, a change feed,
//! and a fire-and-forget notification trigger — and ships an in-memory
//! implementation for tests and simulation.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backend;
pub mod error;
pub mod event;
pub mod memory;
pub mod rotation;
pub mod session;

pub use backend::{
    ChangeFeed, CountStore, EncryptionProfile, MessageStore, NotificationDispatch, ProfileStore,
    StoredMessage,
};
pub use error::{BackendError, KeyringError};
pub use event::{ChangeEvent, ChangeKind, ChangeTable};
pub use memory::MemoryBackend;
pub use rotation::{PasswordRotation, RotationState};
pub use session::SessionKeyring;
