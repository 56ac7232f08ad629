//! Per-installation continuation state for the paginated feeds.
//!
//! Each `(kind, installation)` key owns one slot guarded by an async mutex. Callers that need
//! a read → fetch → advance sequence take a [`SessionLease`] and hold it for the whole
//! sequence, so two concurrent "more" requests from one installation are served one after
//! the other instead of racing on the same cursor. Expiry is passive: an entry past its
//! deadline reads exactly like one that was never created.
//!
//! Only first-page requests allocate a slot. A slot left empty when its last lease is released
//! is removed from the map, and idle expired slots are swept every [`SWEEP_EVERY`] new keys.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use metrics::counter;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

use crate::application::pagination::Cursor;
use crate::domain::types::{FeedKind, InstallationId};

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// New keys allocated between two sweeps of expired slots.
pub const SWEEP_EVERY: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no live {kind} session for installation `{installation}`")]
    NotFound {
        kind: FeedKind,
        installation: InstallationId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    /// Page number the next response will carry.
    pub page: u32,
    pub cursor: Cursor,
    /// Only present on search entries; fixed for the life of the entry.
    pub query: Option<String>,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SessionKey {
    kind: FeedKind,
    installation: InstallationId,
}

type Slot = Arc<Mutex<Option<SessionEntry>>>;
type Slots = Arc<DashMap<SessionKey, Slot>>;

pub struct SessionCache {
    ttl: Duration,
    slots: Slots,
    allocated: AtomicUsize,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Arc::new(DashMap::new()),
            allocated: AtomicUsize::new(0),
        }
    }

    /// Exclusive access to one key until the lease is dropped, allocating the slot if needed.
    ///
    /// Used by first-page requests, which always (re)create the entry.
    pub async fn lease(&self, kind: FeedKind, installation: &InstallationId) -> SessionLease {
        let key = SessionKey {
            kind,
            installation: installation.clone(),
        };
        // Clone the slot out so the map shard is not held across the await.
        let existing = self.slots.get(&key).map(|slot| slot.value().clone());
        let slot = match existing {
            Some(slot) => slot,
            None => {
                self.note_allocation();
                self.slots.entry(key.clone()).or_default().value().clone()
            }
        };
        self.lock(key, slot).await
    }

    /// Like [`lease`](Self::lease) but never allocates: an unknown key is a session miss.
    pub async fn lease_existing(
        &self,
        kind: FeedKind,
        installation: &InstallationId,
    ) -> Result<SessionLease, SessionError> {
        let key = SessionKey {
            kind,
            installation: installation.clone(),
        };
        let existing = self.slots.get(&key).map(|slot| slot.value().clone());
        match existing {
            Some(slot) => Ok(self.lock(key, slot).await),
            None => Err(miss(&key)),
        }
    }

    async fn lock(&self, key: SessionKey, slot: Slot) -> SessionLease {
        let guard = slot.lock_owned().await;
        SessionLease {
            key,
            ttl: self.ttl,
            slots: self.slots.clone(),
            guard,
        }
    }

    fn note_allocation(&self) {
        let allocated = self.allocated.fetch_add(1, Ordering::Relaxed);
        if allocated % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep_expired();
        }
    }

    /// Drops slots nobody holds whose entry is empty or past its deadline.
    fn sweep_expired(&self) {
        let now = Instant::now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(entry) => entry.as_ref().is_some_and(|entry| entry.expires_at > now),
                Err(_) => true,
            }
        });
        debug!(
            removed = before.saturating_sub(self.slots.len()),
            "expired sessions swept"
        );
    }

    pub async fn reset_first_page(&self, kind: FeedKind, installation: &InstallationId) {
        self.lease(kind, installation).await.reset_first_page();
    }

    pub async fn begin_search(&self, installation: &InstallationId, query: &str) {
        self.lease(FeedKind::Search, installation)
            .await
            .begin_search(query);
    }

    pub async fn advance(
        &self,
        kind: FeedKind,
        installation: &InstallationId,
        cursor: Cursor,
    ) -> Result<SessionEntry, SessionError> {
        self.lease_existing(kind, installation)
            .await?
            .advance(cursor)
    }

    pub async fn read(
        &self,
        kind: FeedKind,
        installation: &InstallationId,
    ) -> Result<SessionEntry, SessionError> {
        self.lease_existing(kind, installation).await?.read()
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

/// Exclusive handle on one session slot.
pub struct SessionLease {
    key: SessionKey,
    ttl: Duration,
    slots: Slots,
    guard: OwnedMutexGuard<Option<SessionEntry>>,
}

impl SessionLease {
    /// Starts the feed over at page 1 with no cursor, discarding any previous state.
    pub fn reset_first_page(&mut self) {
        *self.guard = Some(SessionEntry {
            page: 1,
            cursor: Cursor::Head,
            query: None,
            expires_at: Instant::now() + self.ttl,
        });
        debug!(
            kind = %self.key.kind,
            installation = %self.key.installation,
            "session reset to first page"
        );
    }

    /// Like [`reset_first_page`](Self::reset_first_page) but pins `query` for the entry's life.
    pub fn begin_search(&mut self, query: &str) {
        self.reset_first_page();
        if let Some(entry) = self.guard.as_mut() {
            entry.query = Some(query.to_string());
        }
    }

    pub fn read(&mut self) -> Result<SessionEntry, SessionError> {
        self.live_entry().cloned()
    }

    /// Stores `cursor`, bumps the page counter and refreshes the TTL.
    ///
    /// The page counter moves on every call, including after an empty fetch.
    pub fn advance(&mut self, cursor: Cursor) -> Result<SessionEntry, SessionError> {
        let ttl = self.ttl;
        let entry = self.live_entry_mut()?;
        entry.cursor = cursor;
        entry.page = entry.page.saturating_add(1);
        entry.expires_at = Instant::now() + ttl;
        Ok(entry.clone())
    }

    fn live_entry(&mut self) -> Result<&SessionEntry, SessionError> {
        self.live_entry_mut().map(|entry| &*entry)
    }

    fn live_entry_mut(&mut self) -> Result<&mut SessionEntry, SessionError> {
        let expired = matches!(&*self.guard, Some(entry) if entry.expires_at <= Instant::now());
        if expired {
            *self.guard = None;
        }

        match self.guard.as_mut() {
            Some(entry) => Ok(entry),
            None => Err(miss(&self.key)),
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if self.guard.is_some() {
            return;
        }
        // Only the map and this guard hold the slot: nobody is waiting on it.
        let slot = OwnedMutexGuard::mutex(&self.guard);
        self.slots.remove_if(&self.key, |_, current| {
            Arc::ptr_eq(current, slot) && Arc::strong_count(current) == 2
        });
    }
}

fn miss(key: &SessionKey) -> SessionError {
    counter!("photostream_session_miss_total", "kind" => key.kind.as_str()).increment(1);
    SessionError::NotFound {
        kind: key.kind,
        installation: key.installation.clone(),
    }
}
