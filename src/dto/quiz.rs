use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dao::models::ScoreEntity, state::session::Question};

/// Host-facing projection of a question, correct answer included.
///
/// Only ever returned to the caller of the start endpoint; the broadcast
/// variant in [`crate::dto::ws::ServerMessage`] withholds the answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionHostView {
    /// Question identifier.
    pub id: Uuid,
    /// Prompt shown to participants.
    pub text: String,
    /// Answer options.
    pub options: Vec<String>,
    /// 0-based index of the correct option.
    pub correct_answer: u32,
    /// Effective answer window in seconds.
    pub time_limit: u32,
    /// Points awarded for a correct answer.
    pub points: u32,
}

impl QuestionHostView {
    /// Project a runtime question with its effective time limit resolved.
    pub fn new(question: &Question, effective_time_limit: u32) -> Self {
        Self {
            id: question.id,
            text: question.text.clone(),
            options: question.options.clone(),
            correct_answer: question.correct_answer,
            time_limit: effective_time_limit,
            points: question.points,
        }
    }
}

/// One row of a leaderboard broadcast.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// Display name of the participant.
    pub username: String,
    /// Accumulated points.
    pub score: u64,
    /// Number of correct answers.
    pub correct_count: u32,
    /// Number of questions answered.
    pub answered_count: u32,
}

impl From<ScoreEntity> for LeaderboardEntry {
    fn from(value: ScoreEntity) -> Self {
        Self {
            username: value.username,
            score: value.score,
            correct_count: value.correct_count,
            answered_count: value.answered_count,
        }
    }
}
