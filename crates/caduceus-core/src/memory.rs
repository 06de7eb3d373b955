//! In-memory backend for tests and simulation.
//!
//! Implements every collaborator trait over shared maps plus a broadcast
//! change feed. Clones share one store via `Arc`, so multiple services
//! can be wired against the same instance. Fault-injection switches make
//! rollback and inconsistent-state paths testable.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};

use crate::{
    backend::{
        ChangeFeed, CountStore, EncryptionProfile, MessageStore, NotificationDispatch,
        ProfileStore, StoredMessage,
    },
    error::BackendError,
    event::{ChangeEvent, ChangeKind, ChangeTable},
};

/// Change feed buffer size.
const FEED_CAPACITY: usize = 64;

#[derive(Default, Clone)]
struct ProfileRow {
    encryption_salt: Option<String>,
    encrypted_user_master_key: Option<String>,
    auth_password: Option<String>,
}

struct NotificationRow {
    id: u64,
    read: bool,
}

#[derive(Default)]
struct Tables {
    profiles: HashMap<u64, ProfileRow>,
    messages: Vec<StoredMessage>,
    pending_requests: HashMap<u64, u64>,
    unread_messages: HashMap<u64, u64>,
    notifications: HashMap<u64, Vec<NotificationRow>>,
    dispatched: Vec<(u64, String)>,
}

struct Inner {
    tables: Mutex<Tables>,
    changes: broadcast::Sender<ChangeEvent>,
    fail_password_update: AtomicBool,
    fail_wrapped_key_write: AtomicBool,
    fail_mark_read: AtomicBool,
    fail_dispatch: AtomicBool,
}

/// Shared in-memory backend. Clone to hand the same store to several
/// services.
///
/// The change feed is a single broadcast channel; events carry the user
/// they are scoped to and consumers filter on it, mirroring a backend
/// without server-side filtering.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                changes,
                fail_password_update: AtomicBool::new(false),
                fail_wrapped_key_write: AtomicBool::new(false),
                fail_mark_read: AtomicBool::new(false),
                fail_dispatch: AtomicBool::new(false),
            }),
        }
    }

    /// Fail the next `update_auth_password` call.
    pub fn fail_next_password_update(&self) {
        self.inner.fail_password_update.store(true, Ordering::SeqCst);
    }

    /// Fail the next `store_wrapped_master_key` call.
    pub fn fail_next_wrapped_key_write(&self) {
        self.inner.fail_wrapped_key_write.store(true, Ordering::SeqCst);
    }

    /// Fail the next `mark_notification_read` call.
    pub fn fail_next_mark_read(&self) {
        self.inner.fail_mark_read.store(true, Ordering::SeqCst);
    }

    /// Fail the next `dispatch` call.
    pub fn fail_next_dispatch(&self) {
        self.inner.fail_dispatch.store(true, Ordering::SeqCst);
    }

    /// Remove a user's salt (corrupt-profile scenarios).
    pub async fn clear_encryption_salt(&self, user_id: u64) {
        let mut tables = self.inner.tables.lock().await;
        if let Some(row) = tables.profiles.get_mut(&user_id) {
            row.encryption_salt = None;
        }
    }

    /// Set the authoritative pending-request count for a user.
    pub async fn set_pending_requests(&self, user_id: u64, count: u64) {
        let mut tables = self.inner.tables.lock().await;
        tables.pending_requests.insert(user_id, count);
    }

    /// Set the authoritative unread-message count for a user.
    pub async fn set_unread_messages(&self, user_id: u64, count: u64) {
        let mut tables = self.inner.tables.lock().await;
        tables.unread_messages.insert(user_id, count);
    }

    /// Deliver a message to `user_id`: bumps the authoritative unread
    /// count and emits an insert event on the messages table.
    pub async fn simulate_incoming_message(&self, user_id: u64) {
        {
            let mut tables = self.inner.tables.lock().await;
            *tables.unread_messages.entry(user_id).or_insert(0) += 1;
        }
        self.emit(ChangeTable::Messages, ChangeKind::Insert, user_id);
    }

    /// Insert an unread notification row and emit an insert event.
    pub async fn insert_notification(&self, user_id: u64, id: u64) {
        {
            let mut tables = self.inner.tables.lock().await;
            tables
                .notifications
                .entry(user_id)
                .or_default()
                .push(NotificationRow { id, read: false });
        }
        self.emit(ChangeTable::Notifications, ChangeKind::Insert, user_id);
    }

    /// Emit a raw change event (scenario plumbing).
    pub fn emit(&self, table: ChangeTable, kind: ChangeKind, user_id: u64) {
        // No receivers is fine; the feed just drops the event
        let _ = self.inner.changes.send(ChangeEvent { table, kind, user_id });
    }

    /// Notifications dispatched so far, in order.
    pub async fn dispatched(&self) -> Vec<(u64, String)> {
        self.inner.tables.lock().await.dispatched.clone()
    }

    /// Number of live change-feed subscriptions (teardown checks).
    pub fn feed_subscribers(&self) -> usize {
        self.inner.changes.receiver_count()
    }

    /// Current auth password for a user, if one was ever stored.
    pub async fn auth_password(&self, user_id: u64) -> Option<String> {
        let tables = self.inner.tables.lock().await;
        tables.profiles.get(&user_id).and_then(|row| row.auth_password.clone())
    }

    fn take_flag(flag: &AtomicBool, what: &str) -> Result<(), BackendError> {
        if flag.swap(false, Ordering::SeqCst) {
            return Err(BackendError::new(format!("injected {what} failure")));
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn fetch_encryption_profile(
        &self,
        user_id: u64,
    ) -> Result<EncryptionProfile, BackendError> {
        let tables = self.inner.tables.lock().await;
        let row = tables.profiles.get(&user_id).cloned().unwrap_or_default();
        Ok(EncryptionProfile {
            encryption_salt: row.encryption_salt,
            encrypted_user_master_key: row.encrypted_user_master_key,
        })
    }

    async fn store_encryption_salt(&self, user_id: u64, salt: &str) -> Result<(), BackendError> {
        let mut tables = self.inner.tables.lock().await;
        tables.profiles.entry(user_id).or_default().encryption_salt = Some(salt.to_string());
        Ok(())
    }

    async fn store_wrapped_master_key(
        &self,
        user_id: u64,
        wrapped: &str,
    ) -> Result<(), BackendError> {
        Self::take_flag(&self.inner.fail_wrapped_key_write, "wrapped-key write")?;
        let mut tables = self.inner.tables.lock().await;
        tables.profiles.entry(user_id).or_default().encrypted_user_master_key =
            Some(wrapped.to_string());
        Ok(())
    }

    async fn update_auth_password(
        &self,
        user_id: u64,
        new_password: &str,
    ) -> Result<(), BackendError> {
        Self::take_flag(&self.inner.fail_password_update, "password update")?;
        let mut tables = self.inner.tables.lock().await;
        tables.profiles.entry(user_id).or_default().auth_password =
            Some(new_password.to_string());
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryBackend {
    async fn store_message(&self, message: &StoredMessage) -> Result<(), BackendError> {
        let mut tables = self.inner.tables.lock().await;
        tables.messages.push(message.clone());
        Ok(())
    }

    async fn load_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<StoredMessage>, BackendError> {
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CountStore for MemoryBackend {
    async fn pending_request_count(&self, user_id: u64) -> Result<u64, BackendError> {
        let tables = self.inner.tables.lock().await;
        Ok(tables.pending_requests.get(&user_id).copied().unwrap_or(0))
    }

    async fn unread_message_count(&self, user_id: u64) -> Result<u64, BackendError> {
        let tables = self.inner.tables.lock().await;
        Ok(tables.unread_messages.get(&user_id).copied().unwrap_or(0))
    }

    async fn unread_notification_count(&self, user_id: u64) -> Result<u64, BackendError> {
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .notifications
            .get(&user_id)
            .map(|rows| rows.iter().filter(|row| !row.read).count() as u64)
            .unwrap_or(0))
    }

    async fn mark_notification_read(
        &self,
        user_id: u64,
        notification_id: u64,
    ) -> Result<(), BackendError> {
        Self::take_flag(&self.inner.fail_mark_read, "mark-read")?;
        {
            let mut tables = self.inner.tables.lock().await;
            let row = tables
                .notifications
                .get_mut(&user_id)
                .and_then(|rows| rows.iter_mut().find(|row| row.id == notification_id))
                .ok_or_else(|| BackendError::new("notification not found"))?;
            row.read = true;
        }
        self.emit(ChangeTable::Notifications, ChangeKind::Update, user_id);
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for MemoryBackend {
    async fn subscribe(
        &self,
        _user_id: u64,
    ) -> Result<broadcast::Receiver<ChangeEvent>, BackendError> {
        Ok(self.inner.changes.subscribe())
    }
}

#[async_trait]
impl NotificationDispatch for MemoryBackend {
    async fn dispatch(&self, user_id: u64, subject: &str) -> Result<(), BackendError> {
        Self::take_flag(&self.inner.fail_dispatch, "dispatch")?;
        let mut tables = self.inner.tables.lock().await;
        tables.dispatched.push((user_id, subject.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn profiles_default_to_empty() {
        let backend = MemoryBackend::new();
        let profile = backend.fetch_encryption_profile(1).await.unwrap();
        assert_eq!(profile, EncryptionProfile::default());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let backend = MemoryBackend::new();
        let other = backend.clone();

        backend.store_encryption_salt(1, "c2FsdA==").await.unwrap();

        let profile = other.fetch_encryption_profile(1).await.unwrap();
        assert_eq!(profile.encryption_salt.as_deref(), Some("c2FsdA=="));
    }

    #[tokio::test]
    async fn messages_are_scoped_to_their_conversation() {
        let backend = MemoryBackend::new();
        let message = StoredMessage {
            conversation_id: "thread-1".to_string(),
            sender_id: 1,
            body: "AAAA.AAAA".to_string(),
        };
        backend.store_message(&message).await.unwrap();

        assert_eq!(backend.load_messages("thread-1").await.unwrap(), vec![message]);
        assert!(backend.load_messages("thread-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_read_updates_the_authoritative_count() {
        let backend = MemoryBackend::new();
        backend.insert_notification(1, 10).await;
        backend.insert_notification(1, 11).await;

        backend.mark_notification_read(1, 10).await.unwrap();

        assert_eq!(backend.unread_notification_count(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn injected_failures_fire_once() {
        let backend = MemoryBackend::new();
        backend.insert_notification(1, 10).await;
        backend.fail_next_mark_read();

        assert!(backend.mark_notification_read(1, 10).await.is_err());
        assert!(backend.mark_notification_read(1, 10).await.is_ok());
    }

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let backend = MemoryBackend::new();
        let mut feed = backend.subscribe(1).await.unwrap();

        backend.simulate_incoming_message(1).await;

        let event = feed.recv().await.unwrap();
        assert_eq!(event.table, ChangeTable::Messages);
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.user_id, 1);
    }
}
