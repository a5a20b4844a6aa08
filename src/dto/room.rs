use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{ParticipantEntity, RoomEntity, RoomStatus},
    dto::{format_system_time, quiz::QuestionHostView},
};

/// Participant projection embedded in room responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    /// Membership record identifier.
    pub id: Uuid,
    /// Global identity of the user.
    pub user_id: Uuid,
    /// Display name.
    pub username: String,
}

impl From<ParticipantEntity> for ParticipantSummary {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            username: value.username,
        }
    }
}

/// Room projection returned by the start endpoint.
///
/// Carries the host view of the first question so the host display can render
/// it (including the correct answer) without waiting for the broadcast.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// Room identifier.
    pub id: Uuid,
    /// Join code.
    pub code: String,
    /// Lifecycle status after the operation.
    pub status: RoomStatus,
    /// RFC 3339 timestamp of the quiz start, when set.
    pub started_at: Option<String>,
    /// Registered participants.
    pub participants: Vec<ParticipantSummary>,
    /// First question of the quiz, host projection.
    pub first_question: QuestionHostView,
}

impl RoomSummary {
    /// Assemble the projection from the updated room record and roster.
    pub fn new(
        room: RoomEntity,
        participants: Vec<ParticipantEntity>,
        first_question: QuestionHostView,
    ) -> Self {
        Self {
            id: room.id,
            code: room.code,
            status: room.status,
            started_at: room.started_at.map(format_system_time),
            participants: participants.into_iter().map(Into::into).collect(),
            first_question,
        }
    }
}
