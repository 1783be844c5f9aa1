//! Session Store
//!
//! Maps conversation identifiers to sessions. Each identifier owns one slot,
//! an `Arc<tokio::sync::Mutex<Option<Session>>>`, and that mutex is the
//! per-conversation mutual-exclusion scope: a request holds it from session
//! lookup until its turns are committed. The map itself is only locked for
//! slot lookup and insertion, never across an `.await` on a collaborator, so
//! different conversations proceed in parallel.
//!
//! Lock order is always slot, then map. Eviction takes the slot lock before
//! removing the slot from the map, so a session is never evicted mid-turn,
//! and a request that waited on an evicted slot notices and retries with a
//! fresh one.

use super::{Session, SessionSnapshot};
use crate::db::SessionBackend;
use chrono::{DateTime, Utc};
use sdk::errors::BotError;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Slot = Arc<Mutex<Option<Session>>>;

fn store_error(err: anyhow::Error) -> BotError {
    BotError::StoreUnavailable(crate::secrets::scrub(&format!("{:#}", err)))
}

/// Exclusive access to one session for the duration of a request
pub struct SessionGuard {
    session: OwnedMappedMutexGuard<Option<Session>, Session>,
    backend: Option<Arc<dyn SessionBackend>>,
}

impl SessionGuard {
    /// Write the session through to the durable backend, if any
    pub async fn persist(&self) -> Result<(), BotError> {
        match &self.backend {
            Some(backend) => backend.save(&self.session).await.map_err(store_error),
            None => Ok(()),
        }
    }

    /// Persist, undoing every change since `snapshot` if the write fails
    ///
    /// Memory then matches what the backend last stored.
    pub async fn persist_or_rollback(&mut self, snapshot: SessionSnapshot) -> Result<(), BotError> {
        if let Err(e) = self.persist().await {
            self.session.rollback(snapshot);
            return Err(e);
        }
        Ok(())
    }
}

impl Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

/// Owner of all sessions
pub struct SessionStore {
    slots: RwLock<HashMap<String, Slot>>,
    backend: Option<Arc<dyn SessionBackend>>,
    created: AtomicU64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SessionStore {
    /// Store without durable backing
    pub fn in_memory() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            backend: None,
            created: AtomicU64::new(0),
        }
    }

    /// Store that loads missing sessions from, and persists to, `backend`
    pub fn with_backend(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            backend: Some(backend),
            created: AtomicU64::new(0),
        }
    }

    /// Return the slot for `id`, inserting an empty one if absent
    async fn slot(&self, id: &str) -> Slot {
        if let Some(slot) = self.slots.read().await.get(id) {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write().await;
        Arc::clone(
            slots
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(None))),
        )
    }

    async fn is_current(&self, id: &str, slot: &Slot) -> bool {
        self.slots
            .read()
            .await
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Return the session for `id`, creating it if it doesn't exist
    ///
    /// The returned guard holds the per-conversation lock; a second caller
    /// for the same `id` waits until it is dropped. Concurrent first
    /// contacts create exactly one session.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the backend fails to load the session.
    pub async fn get_or_create(&self, id: &str) -> Result<SessionGuard, BotError> {
        loop {
            let slot = self.slot(id).await;
            let mut guard = Arc::clone(&slot).lock_owned().await;

            // Evicted while we were waiting for the lock
            if !self.is_current(id, &slot).await {
                debug!(conversation_id = %id, "slot evicted while waiting, retrying");
                continue;
            }

            if guard.is_none() {
                *guard = Some(self.load_or_new(id).await?);
            }

            let session = OwnedMutexGuard::try_map(guard, |slot| slot.as_mut()).map_err(|_| {
                BotError::StoreUnavailable(format!("session slot for {} is empty", id))
            })?;

            return Ok(SessionGuard {
                session,
                backend: self.backend.clone(),
            });
        }
    }

    async fn load_or_new(&self, id: &str) -> Result<Session, BotError> {
        if let Some(backend) = &self.backend {
            if let Some(session) = backend.load(id).await.map_err(store_error)? {
                debug!(conversation_id = %id, turns = session.history().len(), "session loaded");
                return Ok(session);
            }
        }

        self.created.fetch_add(1, Ordering::SeqCst);
        info!(conversation_id = %id, "created session");
        Ok(Session::new(id))
    }

    /// Update `last_active_at` of a resident session
    ///
    /// Waits for the conversation's lock, so it must not be called while
    /// holding a guard for the same `id`; use [`Session::touch`] on the
    /// guard instead.
    pub async fn touch(&self, id: &str) -> bool {
        let slot = match self.slots.read().await.get(id) {
            Some(slot) => Arc::clone(slot),
            None => return false,
        };

        let mut guard = slot.lock().await;
        match guard.as_mut() {
            Some(session) => {
                session.touch();
                true
            }
            None => false,
        }
    }

    /// Remove a session and its document, in memory and in the backend
    ///
    /// Waits for any in-flight turn on the conversation to finish first.
    /// Returns whether a resident session was removed.
    pub async fn evict(&self, id: &str) -> Result<bool, BotError> {
        let slot = self.slots.read().await.get(id).map(Arc::clone);

        let existed = match slot {
            Some(slot) => {
                let mut guard = Arc::clone(&slot).lock_owned().await;
                self.remove_slot(id, &slot).await;
                guard.take().is_some()
            }
            None => false,
        };

        if let Some(backend) = &self.backend {
            backend.delete(id).await.map_err(store_error)?;
        }

        if existed {
            info!(conversation_id = %id, "session evicted");
        }
        Ok(existed)
    }

    async fn remove_slot(&self, id: &str, slot: &Slot) {
        let mut slots = self.slots.write().await;
        if slots
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            slots.remove(id);
        }
    }

    /// Evict every session last active before `cutoff`
    ///
    /// Sessions whose lock is held are busy and therefore not idle; they are
    /// skipped. Idleness is re-checked under the lock.
    pub async fn evict_idle(&self, cutoff: DateTime<Utc>) -> usize {
        let snapshot: Vec<(String, Slot)> = self
            .slots
            .read()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();

        let mut evicted = 0;
        for (id, slot) in snapshot {
            let Ok(mut guard) = Arc::clone(&slot).try_lock_owned() else {
                continue;
            };

            let idle = guard
                .as_ref()
                .map_or(true, |session| session.is_idle_since(cutoff));
            if !idle {
                continue;
            }

            self.remove_slot(&id, &slot).await;
            if guard.take().is_some() {
                evicted += 1;
                if let Some(backend) = &self.backend {
                    if let Err(e) = backend.delete(&id).await {
                        warn!(conversation_id = %id, "Failed to delete evicted session: {}", store_error(e));
                    }
                }
            }
        }

        if let Some(backend) = &self.backend {
            match backend.delete_idle(cutoff).await {
                Ok(0) => {}
                Ok(n) => debug!("Deleted {} idle persisted sessions", n),
                Err(e) => warn!("Failed to delete idle persisted sessions: {}", store_error(e)),
            }
        }

        evicted
    }

    /// Number of resident sessions
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of sessions created (not loaded) since startup
    pub fn sessions_created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }
}

/// Periodically evict sessions idle for longer than `ttl`
pub fn spawn_eviction_task(
    store: Arc<SessionStore>,
    ttl: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = store.evict_idle(Utc::now() - ttl).await;
            if evicted > 0 {
                info!("Evicted {} idle sessions", evicted);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Modality, Turn};

    #[tokio::test]
    async fn test_get_or_create_returns_same_session() {
        let store = SessionStore::in_memory();

        {
            let mut session = store.get_or_create("C1").await.unwrap();
            session.history.push(Turn::user("Hello", Modality::Text));
        }

        let session = store.get_or_create("C1").await.unwrap();
        assert_eq!(session.history().len(), 1);
        assert_eq!(store.sessions_created(), 1);
        drop(session);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::in_memory();

        store
            .get_or_create("C1")
            .await
            .unwrap()
            .history
            .push(Turn::user("one", Modality::Text));

        let other = store.get_or_create("C2").await.unwrap();
        assert!(other.history().is_empty());
        assert_eq!(store.sessions_created(), 2);
    }

    #[tokio::test]
    async fn test_evict_removes_session() {
        let store = SessionStore::in_memory();
        store
            .get_or_create("C1")
            .await
            .unwrap()
            .history
            .push(Turn::user("one", Modality::Text));

        assert!(store.evict("C1").await.unwrap());
        assert!(!store.evict("C1").await.unwrap());
        assert!(store.is_empty().await);

        let fresh = store.get_or_create("C1").await.unwrap();
        assert!(fresh.history().is_empty());
        assert_eq!(store.sessions_created(), 2);
    }

    #[tokio::test]
    async fn test_evict_waits_for_in_flight_turn() {
        let store = Arc::new(SessionStore::in_memory());
        let guard = store.get_or_create("C1").await.unwrap();

        let evicting = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.evict("C1").await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!evicting.is_finished());

        drop(guard);
        assert!(evicting.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_evict_idle_skips_busy_and_fresh_sessions() {
        let store = SessionStore::in_memory();
        drop(store.get_or_create("idle").await.unwrap());
        drop(store.get_or_create("fresh").await.unwrap());
        let busy = store.get_or_create("busy").await.unwrap();

        {
            let mut idle = store.get_or_create("idle").await.unwrap();
            idle.last_active_at = Utc::now() - chrono::Duration::hours(48);
        }

        let evicted = store.evict_idle(Utc::now() - chrono::Duration::hours(24)).await;
        assert_eq!(evicted, 1);
        assert_eq!(store.len().await, 2);
        drop(busy);
    }

    #[tokio::test]
    async fn test_touch_updates_last_active() {
        let store = SessionStore::in_memory();
        let before = {
            let mut session = store.get_or_create("C1").await.unwrap();
            session.last_active_at = Utc::now() - chrono::Duration::hours(1);
            session.last_active_at
        };

        assert!(store.touch("C1").await);
        assert!(!store.touch("missing").await);

        let session = store.get_or_create("C1").await.unwrap();
        assert!(session.last_active_at > before);
    }
}
