//! Tentative local mutation with confirm-or-revert semantics.
//!
//! Snapshot the current value, apply the tentative update, await the
//! remote call, and revert to the snapshot if it fails. The guard reverts
//! on drop unless [`Optimistic::commit`] was called, so early returns and
//! error paths roll back automatically.

use tokio::sync::watch;

/// An uncommitted optimistic update against a watch channel.
///
/// Revert restores the entire snapshot, not just the touched field: a
/// write landing on the channel between apply and revert is overwritten.
/// Callers whose values reconverge from an authoritative source (badge
/// counts do, via refetch) can accept that window.
pub struct Optimistic<'a, T: Clone> {
    tx: &'a watch::Sender<T>,
    snapshot: T,
    committed: bool,
}

impl<'a, T: Clone> Optimistic<'a, T> {
    /// Snapshot the current value and apply `update` tentatively.
    pub fn apply(tx: &'a watch::Sender<T>, update: impl FnOnce(&mut T)) -> Self {
        let snapshot = tx.borrow().clone();
        tx.send_modify(update);
        Self { tx, snapshot, committed: false }
    }

    /// Keep the tentative value: the remote call succeeded.
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Restore the snapshot: the remote call failed.
    ///
    /// Equivalent to dropping the guard; provided for explicit call sites.
    pub fn revert(self) {
        // Drop impl performs the rollback
    }
}

impl<T: Clone> Drop for Optimistic<'_, T> {
    fn drop(&mut self) {
        if !self.committed {
            self.tx.send_replace(self.snapshot.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_update_sticks() {
        let (tx, rx) = watch::channel(5u64);

        let guard = Optimistic::apply(&tx, |v| *v -= 1);
        guard.commit();

        assert_eq!(*rx.borrow(), 4);
    }

    #[test]
    fn reverted_update_restores_the_snapshot() {
        let (tx, rx) = watch::channel(5u64);

        let guard = Optimistic::apply(&tx, |v| *v -= 1);
        assert_eq!(*rx.borrow(), 4, "tentative value visible immediately");
        guard.revert();

        assert_eq!(*rx.borrow(), 5);
    }

    #[test]
    fn revert_restores_the_full_snapshot() {
        let (tx, rx) = watch::channel(5u64);

        let guard = Optimistic::apply(&tx, |v| *v -= 1);
        // A write from elsewhere during the pending remote call
        tx.send_replace(42);
        guard.revert();

        // The snapshot wins; intervening writes are overwritten
        assert_eq!(*rx.borrow(), 5);
    }

    #[test]
    fn dropped_guard_reverts() {
        let (tx, rx) = watch::channel(5u64);

        {
            let _guard = Optimistic::apply(&tx, |v| *v -= 1);
            // error path: guard dropped without commit
        }

        assert_eq!(*rx.borrow(), 5);
    }
}
