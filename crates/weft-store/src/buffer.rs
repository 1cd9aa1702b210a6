//! Rendered responses waiting for their redirect GET.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;
use weft_model::{BufferId, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedResponse {
    pub content_type: String,
    pub body: Vec<u8>,
}

type Buffers = HashMap<SessionId, VecDeque<(BufferId, BufferedResponse)>>;

/// Per-session MRU cache of buffered responses.
///
/// Each entry is served at most once. When a session holds more than
/// `capacity` entries the least recently stored one is dropped; a miss is
/// never an error.
#[derive(Debug)]
pub struct BufferedResponseStore {
    capacity: usize,
    buffers: Mutex<Buffers>,
}

impl BufferedResponseStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffers: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put(&self, session: &SessionId, response: BufferedResponse) -> BufferId {
        let id = BufferId::generate();
        if self.capacity == 0 {
            return id;
        }
        let mut buffers = self.lock();
        let queue = buffers.entry(session.clone()).or_default();
        queue.push_front((id.clone(), response));
        while queue.len() > self.capacity {
            if let Some((dropped, _)) = queue.pop_back() {
                debug!(session = %session, buffer = %dropped, "evicted buffered response");
            }
        }
        id
    }

    /// Remove and return a buffered response.
    pub fn take(&self, session: &SessionId, id: &BufferId) -> Option<BufferedResponse> {
        let mut buffers = self.lock();
        let queue = buffers.get_mut(session)?;
        let position = queue.iter().position(|(buffered, _)| buffered == id)?;
        let (_, response) = queue.remove(position)?;
        if queue.is_empty() {
            buffers.remove(session);
        }
        Some(response)
    }

    pub fn remove_session(&self, session: &SessionId) {
        self.lock().remove(session);
    }

    pub fn len(&self, session: &SessionId) -> usize {
        self.lock().get(session).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> BufferedResponse {
        BufferedResponse {
            content_type: "text/html".into(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn served_once() {
        let store = BufferedResponseStore::new(4);
        let session = SessionId::new("s1");
        let id = store.put(&session, response("page"));
        assert_eq!(store.take(&session, &id), Some(response("page")));
        assert_eq!(store.take(&session, &id), None);
    }

    #[test]
    fn keyed_by_session() {
        let store = BufferedResponseStore::new(4);
        let id = store.put(&SessionId::new("s1"), response("page"));
        assert_eq!(store.take(&SessionId::new("s2"), &id), None);
        assert!(store.take(&SessionId::new("s1"), &id).is_some());
    }

    #[test]
    fn evicts_least_recent_beyond_capacity() {
        let store = BufferedResponseStore::new(2);
        let session = SessionId::new("s1");
        let first = store.put(&session, response("1"));
        let second = store.put(&session, response("2"));
        let third = store.put(&session, response("3"));
        assert_eq!(store.len(&session), 2);
        assert_eq!(store.take(&session, &first), None);
        assert!(store.take(&session, &second).is_some());
        assert!(store.take(&session, &third).is_some());
    }
}
