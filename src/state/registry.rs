use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::state::session::QuizSession;

/// Shared handle to one room's session, serialized by its mutex.
///
/// Every event for a room (answer, timer expiry, deferred phase change) locks
/// this mutex for the whole of its handling, awaited I/O included. That is
/// what gives the engine its per-room event serialization; cross-room events
/// only contend on the registry map itself.
pub type SessionHandle = Arc<Mutex<QuizSession>>;

/// Error returned when a session cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A session already exists for the room.
    #[error("room `{room_id}` already has an active session")]
    AlreadyActive {
        /// Room whose slot is taken.
        room_id: Uuid,
    },
}

/// Process-wide mapping from room id to its active quiz session.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
}

impl SessionRegistry {
    /// Build an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for a room, failing when one is already active.
    pub fn create(
        &self,
        room_id: Uuid,
        session: QuizSession,
    ) -> Result<SessionHandle, RegistryError> {
        match self.sessions.entry(room_id) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyActive { room_id }),
            Entry::Vacant(slot) => {
                let handle = Arc::new(Mutex::new(session));
                slot.insert(Arc::clone(&handle));
                Ok(handle)
            }
        }
    }

    /// Look up the active session for a room.
    pub fn get(&self, room_id: Uuid) -> Option<SessionHandle> {
        self.sessions.get(&room_id).map(|entry| Arc::clone(&entry))
    }

    /// Whether a room currently has an active session.
    pub fn contains(&self, room_id: Uuid) -> bool {
        self.sessions.contains_key(&room_id)
    }

    /// Drop the session for a room. Idempotent; removing an absent room is a no-op.
    pub fn remove(&self, room_id: Uuid) {
        self.sessions.remove(&room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::Question;

    fn sample_session(room_id: Uuid) -> QuizSession {
        let question = Question {
            id: Uuid::new_v4(),
            text: "q".into(),
            options: vec!["a".into(), "b".into()],
            correct_answer: 0,
            time_limit_secs: None,
            points: 100,
        };
        QuizSession::new(room_id, Uuid::new_v4(), vec![question])
    }

    #[test]
    fn create_rejects_overlapping_sessions() {
        let registry = SessionRegistry::new();
        let room_id = Uuid::new_v4();

        registry.create(room_id, sample_session(room_id)).unwrap();
        let err = registry
            .create(room_id, sample_session(room_id))
            .unwrap_err();
        assert_eq!(err, RegistryError::AlreadyActive { room_id });
    }

    #[test]
    fn get_returns_the_registered_handle() {
        let registry = SessionRegistry::new();
        let room_id = Uuid::new_v4();
        assert!(registry.get(room_id).is_none());

        let handle = registry.create(room_id, sample_session(room_id)).unwrap();
        let found = registry.get(room_id).unwrap();
        assert!(Arc::ptr_eq(&handle, &found));
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = SessionRegistry::new();
        let room_id = Uuid::new_v4();
        registry.create(room_id, sample_session(room_id)).unwrap();

        registry.remove(room_id);
        assert!(!registry.contains(room_id));
        // A second removal of the same room must not panic or error.
        registry.remove(room_id);
    }
}
