//! Change-feed events.
//!
//! The backend delivers row-level change notifications for the three
//! tables the social counters watch. Events carry only coordinates (table,
//! kind, user), never row contents: consumers recompute from authoritative
//! queries rather than patching local state from event payloads.

use serde::{Deserialize, Serialize};

/// Watched backend table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeTable {
    /// Pending connection requests directed at a user.
    ConnectionRequests,
    /// Direct messages.
    Messages,
    /// User notifications.
    Notifications,
}

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Row inserted.
    Insert,
    /// Row updated.
    Update,
    /// Row deleted.
    Delete,
}

/// A single row change on a watched table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Table the change happened on.
    pub table: ChangeTable,
    /// Insert, update, or delete.
    pub kind: ChangeKind,
    /// User the changed row is scoped to.
    pub user_id: u64,
}
