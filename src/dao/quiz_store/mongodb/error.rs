use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Errors produced by the MongoDB quiz store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to load room `{id}`")]
    LoadRoom {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to mark room `{id}` as started")]
    StartRoom {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load questions for quiz `{quiz_id}`")]
    LoadQuestions {
        quiz_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load participants for room `{room_id}`")]
    LoadParticipants {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to reset scores for room `{room_id}`")]
    ResetScores {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to upsert score for participant `{participant_id}`")]
    UpsertScore {
        participant_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to query top scores for room `{room_id}`")]
    TopScores {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
}
