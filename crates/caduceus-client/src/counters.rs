//! Live social counters.
//!
//! Combines one authoritative fetch at startup with a change-feed
//! subscription. Every relevant change event triggers a refetch of the
//! touched counter; the service never increments a local guess (one
//! exception: the optimistic mark-read path, which rolls back on
//! rejection). Refetch results carry a monotonically increasing token so
//! a slow in-flight refetch can never overwrite a fresher value.
//!
//! Refetch failures fail soft: the badge keeps its last value and the
//! failure is logged. Counts are non-authoritative UI state; the rows in
//! the backend are the truth.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::{
    sync::{broadcast::error::RecvError, watch},
    task::JoinHandle,
};

use caduceus_core::{ChangeFeed, ChangeTable, CountStore};

use crate::{error::CountersError, optimistic::Optimistic};

/// The three live badge counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SocialCounters {
    /// Pending connection requests directed at the user.
    pub pending_requests: u64,
    /// Unread direct messages.
    pub unread_messages: u64,
    /// Unread notifications.
    pub unread_notifications: u64,
}

/// Per-counter freshness tokens. A refetch result is applied only if its
/// token is newer than the last one applied to that counter.
#[derive(Default)]
struct Freshness {
    pending_requests: AtomicU64,
    unread_messages: AtomicU64,
    unread_notifications: AtomicU64,
}

impl Freshness {
    fn cell(&self, table: ChangeTable) -> &AtomicU64 {
        match table {
            ChangeTable::ConnectionRequests => &self.pending_requests,
            ChangeTable::Messages => &self.unread_messages,
            ChangeTable::Notifications => &self.unread_notifications,
        }
    }
}

struct Shared<B> {
    backend: Arc<B>,
    user_id: u64,
    counts: watch::Sender<SocialCounters>,
    seq: AtomicU64,
    applied: Freshness,
}

impl<B: CountStore> Shared<B> {
    /// Refetch one counter's authoritative value, guarded by token.
    async fn refetch(&self, table: ChangeTable) {
        let token = self.seq.fetch_add(1, Ordering::SeqCst) + 1;

        let result = match table {
            ChangeTable::ConnectionRequests => {
                self.backend.pending_request_count(self.user_id).await
            },
            ChangeTable::Messages => self.backend.unread_message_count(self.user_id).await,
            ChangeTable::Notifications => {
                self.backend.unread_notification_count(self.user_id).await
            },
        };

        match result {
            Ok(value) => self.apply_if_fresh(table, token, value),
            Err(err) => {
                tracing::warn!(?table, error = %err, "count refetch failed; keeping last value");
            },
        }
    }

    async fn refetch_all(&self) {
        self.refetch(ChangeTable::ConnectionRequests).await;
        self.refetch(ChangeTable::Messages).await;
        self.refetch(ChangeTable::Notifications).await;
    }

    /// Apply a refetched value unless a fresher refetch already landed.
    fn apply_if_fresh(&self, table: ChangeTable, token: u64, value: u64) {
        let cell = self.applied.cell(table);
        loop {
            let current = cell.load(Ordering::SeqCst);
            if token <= current {
                return; // a fresher refetch already applied its value
            }
            if cell
                .compare_exchange(current, token, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                self.counts.send_modify(|counts| match table {
                    ChangeTable::ConnectionRequests => counts.pending_requests = value,
                    ChangeTable::Messages => counts.unread_messages = value,
                    ChangeTable::Notifications => counts.unread_notifications = value,
                });
                return;
            }
        }
    }
}

/// Live counters for one user session.
///
/// Dropping the service aborts the feed task and releases the
/// subscription; no user-scoped listener outlives the owning session.
pub struct CountersService<B> {
    shared: Arc<Shared<B>>,
    task: JoinHandle<()>,
}

impl<B> CountersService<B>
where
    B: CountStore + ChangeFeed + Send + Sync + 'static,
{
    /// Subscribe to the change feed, perform the initial authoritative
    /// fetch, and start the refetch task.
    ///
    /// # Errors
    ///
    /// `Backend` if the change-feed subscription cannot be established.
    /// Count fetch failures do not fail startup; they are logged and the
    /// affected counter stays at zero until the next successful refetch.
    pub async fn start(backend: Arc<B>, user_id: u64) -> Result<Self, CountersError> {
        let mut feed = backend.subscribe(user_id).await?;

        let (counts, _) = watch::channel(SocialCounters::default());
        let shared = Arc::new(Shared {
            backend,
            user_id,
            counts,
            seq: AtomicU64::new(0),
            applied: Freshness::default(),
        });

        shared.refetch_all().await;

        let task_shared = Arc::clone(&shared);
        let task = tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(event) => {
                        if event.user_id != task_shared.user_id {
                            continue;
                        }
                        task_shared.refetch(event.table).await;
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "change feed lagged; refetching all counters");
                        task_shared.refetch_all().await;
                    },
                    Err(RecvError::Closed) => {
                        tracing::debug!("change feed closed; counters task exiting");
                        break;
                    },
                }
            }
        });

        Ok(Self { shared, task })
    }

    /// Subscribe to counter updates (for badge rendering).
    pub fn counters(&self) -> watch::Receiver<SocialCounters> {
        self.shared.counts.subscribe()
    }

    /// Current counter values.
    pub fn snapshot(&self) -> SocialCounters {
        *self.shared.counts.borrow()
    }

    /// Mark a notification read, optimistically.
    ///
    /// The unread count drops immediately; if the backend rejects the
    /// update the count is rolled back and the rejection surfaced. This is
    /// the only place the service mutates a count without a refetch.
    ///
    /// # Errors
    ///
    /// `MarkReadRejected` with the backend's rejection; the local count
    /// has already been restored when this returns.
    pub async fn mark_notification_read(&self, id: u64) -> Result<(), CountersError> {
        let guard = Optimistic::apply(&self.shared.counts, |counts| {
            counts.unread_notifications = counts.unread_notifications.saturating_sub(1);
        });

        match self.shared.backend.mark_notification_read(self.shared.user_id, id).await {
            Ok(()) => {
                guard.commit();
                Ok(())
            },
            Err(source) => {
                guard.revert();
                tracing::warn!(id, error = %source, "mark-read rejected; rolled back");
                Err(CountersError::MarkReadRejected { id, source })
            },
        }
    }

    /// Stop the refetch task and release the feed subscription.
    pub fn shutdown(self) {
        // Drop impl aborts the task
    }
}

impl<B> Drop for CountersService<B> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
