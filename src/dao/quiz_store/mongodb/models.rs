use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{ParticipantEntity, QuestionEntity, RoomEntity, RoomStatus, ScoreEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    code: String,
    quiz_id: Uuid,
    creator_id: Uuid,
    status: RoomStatus,
    created_at: DateTime,
    started_at: Option<DateTime>,
}

impl From<MongoRoomDocument> for RoomEntity {
    fn from(value: MongoRoomDocument) -> Self {
        Self {
            id: value.id,
            code: value.code,
            quiz_id: value.quiz_id,
            creator_id: value.creator_id,
            status: value.status,
            created_at: value.created_at.to_system_time(),
            started_at: value.started_at.map(|at| at.to_system_time()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoParticipantDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    user_id: Uuid,
    room_id: Uuid,
    username: String,
    joined_at: DateTime,
}

impl From<MongoParticipantDocument> for ParticipantEntity {
    fn from(value: MongoParticipantDocument) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            room_id: value.room_id,
            username: value.username,
            joined_at: value.joined_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    quiz_id: Uuid,
    text: String,
    options: Vec<String>,
    correct_answer: u32,
    time_limit_secs: Option<u32>,
    points: u32,
    order: u32,
}

impl From<MongoQuestionDocument> for QuestionEntity {
    fn from(value: MongoQuestionDocument) -> Self {
        Self {
            id: value.id,
            quiz_id: value.quiz_id,
            text: value.text,
            options: value.options,
            correct_answer: value.correct_answer,
            time_limit_secs: value.time_limit_secs,
            points: value.points,
            order: value.order,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoScoreDocument {
    #[serde(rename = "_id")]
    participant_id: Uuid,
    user_id: Uuid,
    room_id: Uuid,
    username: String,
    score: i64,
    answered_count: i32,
    correct_count: i32,
}

impl From<MongoScoreDocument> for ScoreEntity {
    fn from(value: MongoScoreDocument) -> Self {
        Self {
            participant_id: value.participant_id,
            user_id: value.user_id,
            room_id: value.room_id,
            username: value.username,
            score: value.score.max(0) as u64,
            answered_count: value.answered_count.max(0) as u32,
            correct_count: value.correct_count.max(0) as u32,
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
