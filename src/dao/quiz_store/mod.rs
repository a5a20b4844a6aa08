#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{ParticipantEntity, QuestionEntity, RoomEntity, ScoreEntity};
use crate::dao::storage::StorageResult;

/// One scored answer to fold into a participant's ledger row.
///
/// Creates the row on first use, increments it afterwards. Counters only ever
/// go up; `reset_scores` is the sole destructive operation.
#[derive(Debug, Clone)]
pub struct ScoreUpsert {
    /// Membership record keying the ledger row.
    pub participant_id: Uuid,
    /// Global identity of the user.
    pub user_id: Uuid,
    /// Room scope for reset and leaderboard queries.
    pub room_id: Uuid,
    /// Display name captured for leaderboard rendering.
    pub username: String,
    /// Points awarded by this answer (zero when incorrect).
    pub points: u64,
    /// Whether the answer matched the correct option.
    pub correct: bool,
}

/// Abstraction over the persistence layer consumed by the session engine.
///
/// The engine never sees the database driver; everything it reads or writes
/// goes through this trait so tests can substitute an in-memory double.
pub trait QuizStore: Send + Sync {
    /// Fetch a room by id.
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Mark a room `IN_PROGRESS` with a start timestamp, returning the updated record.
    fn mark_room_started(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Questions of a quiz ordered by their `order` field, ascending.
    fn ordered_questions(
        &self,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    /// Registered participants of a room (the persisted roster).
    fn participants(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    /// Delete every score row scoped to the room. Returns the number removed.
    fn reset_scores(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<u64>>;
    /// Create-or-increment a participant's score row atomically.
    fn upsert_score(&self, update: ScoreUpsert) -> BoxFuture<'static, StorageResult<()>>;
    /// Top score rows for a room ordered by score descending, then participant
    /// id ascending as the deterministic tie-break.
    fn top_scores(
        &self,
        room_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>>;
    /// Cheap connectivity probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
