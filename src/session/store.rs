//! Per-user session slots.
//!
//! Each user gets their own async mutex. Holding the guard for the whole of an
//! engine operation serializes events of the same user, while different users
//! never wait on each other. The outer map lock is only held to find or create a slot.

use crate::models::{ReviewSession, UserId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub type SessionSlot = Arc<AsyncMutex<Option<ReviewSession>>>;
pub type SessionGuard = OwnedMutexGuard<Option<ReviewSession>>;

#[derive(Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<UserId, SessionSlot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, user: UserId) -> SessionSlot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(user).or_default())
    }

    /// Locks the user's slot, waiting for any operation already in flight for them.
    pub async fn lock(&self, user: UserId) -> SessionGuard {
        self.slot(user).lock_owned().await
    }

    /// Users with a live session whose last activity is before `cutoff`.
    /// Slots busy with another operation are skipped, they are clearly not idle.
    pub fn idle_users(&self, cutoff: DateTime<Utc>) -> Vec<UserId> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .iter()
            .filter(|(_, slot)| match slot.try_lock() {
                Ok(guard) => guard
                    .as_ref()
                    .is_some_and(|session| session.last_activity() < cutoff),
                Err(_) => false,
            })
            .map(|(user, _)| *user)
            .collect()
    }

    /// Number of users with a live session.
    pub fn active_count(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .values()
            .filter(|slot| slot.try_lock().map(|g| g.is_some()).unwrap_or(true))
            .count()
    }

    /// Number of users with a slot, live session or not.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops empty slots nobody else holds.
    pub fn prune(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.retain(|_, slot| {
            Arc::strong_count(slot) > 1 || slot.try_lock().map(|g| g.is_some()).unwrap_or(true)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Card, SessionKind};
    use chrono::{Duration, NaiveDate, TimeZone};
    use std::time::Duration as StdDuration;

    fn session(user: UserId, now: DateTime<Utc>) -> ReviewSession {
        ReviewSession::new(
            user,
            SessionKind::Due,
            vec![Card::new("cześć", "hello")],
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_lock_returns_same_slot() {
        let store = SessionStore::new();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        {
            let mut guard = store.lock(1).await;
            *guard = Some(session(1, now));
        }

        let guard = store.lock(1).await;
        assert_eq!(guard.as_ref().unwrap().user, 1);
        drop(guard);

        assert!(store.lock(2).await.is_none());
        assert_eq!(store.active_count(), 1);
    }

    #[tokio::test]
    async fn test_same_user_is_serialized() {
        let store = Arc::new(SessionStore::new());
        let guard = store.lock(5).await;

        let other = Arc::clone(&store);
        let waiter = tokio::spawn(async move {
            let _guard = other.lock(5).await;
        });

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // A different user is not blocked
        let _unrelated = store.lock(6).await;

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_users_and_prune() {
        let store = SessionStore::new();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        *store.lock(1).await = Some(session(1, now - Duration::hours(2)));
        *store.lock(2).await = Some(session(2, now));
        let _ = store.lock(3).await;

        assert_eq!(store.idle_users(now - Duration::hours(1)), vec![1]);

        store.prune();
        assert_eq!(store.active_count(), 2);
        assert_eq!(store.slots.lock().unwrap().len(), 2);
    }
}
