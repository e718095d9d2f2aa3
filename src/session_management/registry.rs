use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::debug;
use uuid::Uuid;

use crate::session_management::session::Session;

/// Concurrency-safe, identity-indexed store of live sessions.
///
/// Pure bookkeeping: no lifecycle logic lives here. A `get` racing a
/// concurrent `remove` observes either the full entry or nothing — never a
/// partially-removed one. No ordering is implied across entries.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn add(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.write().unwrap();
        debug!("registry: added session {}", session.id);
        sessions.insert(session.id, session);
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.read().unwrap().get(id).cloned()
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<Session>> {
        let removed = self.sessions.write().unwrap().remove(id);
        if removed.is_some() {
            debug!("registry: removed session {}", id);
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
