//! Sessions and the per-session lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info};
use weft_model::SessionId;

use crate::page_map::PageStore;

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    pub pages: PageStore,
    original_destination: Option<String>,
}

impl Session {
    pub fn new(id: SessionId, max_pages_per_map: usize) -> Self {
        Self {
            id,
            pages: PageStore::new(max_pages_per_map),
            original_destination: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Remember where to go back to after an intercept page.
    pub fn set_original_destination(&mut self, url: String) {
        self.original_destination = Some(url);
    }

    pub fn take_original_destination(&mut self) -> Option<String> {
        self.original_destination.take()
    }
}

/// A session behind its lock. Everything that mutates pages holds the lock
/// for the whole request.
pub type SessionHandle = Arc<Mutex<Session>>;

pub fn lock_session(handle: &SessionHandle) -> MutexGuard<'_, Session> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug)]
struct Entry {
    handle: SessionHandle,
    last_access: Instant,
}

/// Result of [`SessionStore::get_or_create`].
#[derive(Debug)]
pub struct SessionAccess {
    pub handle: SessionHandle,
    pub created: bool,
    /// Sessions dropped by the sweep that ran with this access.
    pub evicted: Vec<SessionId>,
}

/// The session table.
///
/// Sessions idle for longer than the timeout are dropped on the next
/// access, and when the table is full the least recently used session
/// makes room for a new one.
#[derive(Debug)]
pub struct SessionStore {
    max_pages_per_map: usize,
    idle_timeout: Duration,
    max_sessions: usize,
    sessions: Mutex<HashMap<SessionId, Entry>>,
}

impl SessionStore {
    pub fn new(max_pages_per_map: usize) -> Self {
        Self {
            max_pages_per_map,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_sessions: DEFAULT_MAX_SESSIONS,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max.max(1);
        self
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions().get(id).map(|entry| Arc::clone(&entry.handle))
    }

    /// The session for `requested`, or a new one when it is absent, unknown
    /// or expired.
    pub fn get_or_create(&self, requested: Option<&SessionId>) -> SessionAccess {
        self.get_or_create_at(requested, Instant::now())
    }

    pub fn get_or_create_at(&self, requested: Option<&SessionId>, now: Instant) -> SessionAccess {
        let mut sessions = self.sessions();
        let mut evicted: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_access) > self.idle_timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &evicted {
            sessions.remove(id);
            debug!(session = %id, "expired idle session");
        }

        if let Some(entry) = requested.and_then(|id| sessions.get_mut(id)) {
            entry.last_access = now;
            return SessionAccess {
                handle: Arc::clone(&entry.handle),
                created: false,
                evicted,
            };
        }

        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!(session = %oldest, "evicted least recently used session");
            evicted.push(oldest);
        }

        let id = SessionId::generate();
        if let Some(unknown) = requested {
            debug!(requested = %unknown, "unknown session id, starting a new session");
        }
        info!(session = %id, "created session");
        let handle = Arc::new(Mutex::new(Session::new(id.clone(), self.max_pages_per_map)));
        sessions.insert(
            id,
            Entry {
                handle: Arc::clone(&handle),
                last_access: now,
            },
        );
        SessionAccess {
            handle,
            created: true,
            evicted,
        }
    }

    pub fn invalidate(&self, id: &SessionId) -> bool {
        let removed = self.sessions().remove(id).is_some();
        if removed {
            info!(session = %id, "invalidated session");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
