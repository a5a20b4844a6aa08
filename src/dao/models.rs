use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Lifecycle of a room as tracked by the CRUD layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
pub enum RoomStatus {
    /// Participants can still join; no quiz has started.
    #[serde(rename = "WAITING")]
    Waiting,
    /// A quiz session is live for this room.
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    /// The quiz has finished.
    #[serde(rename = "COMPLETED")]
    Completed,
}

/// Room record persisted by the CRUD layer and read by the session engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: Uuid,
    /// Short join code shown to participants.
    pub code: String,
    /// Quiz played in this room.
    pub quiz_id: Uuid,
    /// User who created the room.
    pub creator_id: Uuid,
    /// Current lifecycle status.
    pub status: RoomStatus,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Set when the quiz session starts.
    pub started_at: Option<SystemTime>,
}

/// A user's membership in a specific room. Unique per (user, room) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Primary key of the membership record.
    pub id: Uuid,
    /// Global identity of the user.
    pub user_id: Uuid,
    /// Room the user joined.
    pub room_id: Uuid,
    /// Display name shown on leaderboards.
    pub username: String,
    /// When the user joined the room.
    pub joined_at: SystemTime,
}

/// Question definition, immutable once a session has loaded it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Primary key of the question.
    pub id: Uuid,
    /// Quiz this question belongs to.
    pub quiz_id: Uuid,
    /// Prompt shown to participants.
    pub text: String,
    /// Answer options, at least two.
    pub options: Vec<String>,
    /// 0-based index into `options`.
    pub correct_answer: u32,
    /// Answer window in seconds; the engine default applies when absent.
    pub time_limit_secs: Option<u32>,
    /// Points awarded for a correct answer.
    pub points: u32,
    /// Position within the quiz, served ascending.
    pub order: u32,
}

/// Accumulated score row, one per participant, updated by `$inc`-style upserts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntity {
    /// Membership record this score belongs to (unique key).
    pub participant_id: Uuid,
    /// Global identity of the user, denormalized for reporting.
    pub user_id: Uuid,
    /// Room scope used by reset and leaderboard queries.
    pub room_id: Uuid,
    /// Display name captured at upsert time.
    pub username: String,
    /// Total points, monotonically non-decreasing within a session.
    pub score: u64,
    /// Number of questions this participant answered.
    pub answered_count: u32,
    /// Number of correct answers.
    pub correct_count: u32,
}
