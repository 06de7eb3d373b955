//! Caduceus Client Services
//!
//! The application-facing layer of the encrypted messaging core: the live
//! social counters service (pending connection requests, unread messages,
//! unread notifications) and the message send/render service.
//!
//! Both services take their collaborators explicitly — a backend handle
//! and a session keyring — rather than reading ambient context, so each
//! is testable in isolation against the in-memory backend.
//!
//! Counters are published through a `tokio::sync::watch` channel: the UI
//! holds a receiver and re-renders badges on change. Counter values are
//! never patched incrementally from events; every relevant change event
//! triggers a refetch of the authoritative count.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod counters;
pub mod error;
pub mod messaging;
pub mod optimistic;

pub use counters::{CountersService, SocialCounters};
pub use error::{CountersError, MessagingError};
pub use messaging::{DECRYPT_PLACEHOLDER, MessageService, RenderedMessage};
pub use optimistic::Optimistic;
