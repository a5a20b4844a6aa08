pub mod hub;
pub mod registry;
pub mod session;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::quiz_store::QuizStore,
    error::ServiceError,
    state::{hub::RoomChannels, registry::SessionRegistry},
};

pub use self::hub::RoomHub;

/// Shared reference to the central application state.
pub type SharedState = Arc<AppState>;

/// Per-room broadcast channel buffer.
const ROOM_CHANNEL_CAPACITY: usize = 64;

/// Central application state storing sessions, room channels, and the storage handle.
pub struct AppState {
    quiz_store: RwLock<Option<Arc<dyn QuizStore>>>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
    sessions: SessionRegistry,
    rooms: RoomChannels,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            quiz_store: RwLock::new(None),
            degraded: degraded_tx,
            config,
            sessions: SessionRegistry::new(),
            rooms: RoomChannels::new(ROOM_CHANNEL_CAPACITY),
        })
    }

    /// Engine configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current quiz store, if one is installed.
    pub async fn quiz_store(&self) -> Option<Arc<dyn QuizStore>> {
        let guard = self.quiz_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the quiz store or fail with a degraded-mode error.
    pub async fn require_quiz_store(&self) -> Result<Arc<dyn QuizStore>, ServiceError> {
        self.quiz_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn set_quiz_store(&self, store: Arc<dyn QuizStore>) {
        {
            let mut guard = self.quiz_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    ///
    /// Tracks backend health as reported by the storage supervisor, not just
    /// whether a store is installed: an installed store with failing health
    /// probes still counts as degraded.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Registry of active quiz sessions keyed by room.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Per-room broadcast channels.
    pub fn rooms(&self) -> &RoomChannels {
        &self.rooms
    }

    /// Number of connections currently subscribed to a room's channel.
    pub fn connected_participants(&self, room_id: Uuid) -> usize {
        self.rooms.connected(room_id)
    }
}
