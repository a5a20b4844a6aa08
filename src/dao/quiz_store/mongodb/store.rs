use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoParticipantDocument, MongoQuestionDocument, MongoRoomDocument, MongoScoreDocument,
        doc_id, uuid_as_binary,
    },
};
use crate::dao::{
    models::{ParticipantEntity, QuestionEntity, RoomEntity, ScoreEntity},
    quiz_store::{QuizStore, ScoreUpsert},
    storage::StorageResult,
};

const ROOM_COLLECTION_NAME: &str = "rooms";
const PARTICIPANT_COLLECTION_NAME: &str = "participants";
const QUESTION_COLLECTION_NAME: &str = "questions";
const SCORE_COLLECTION_NAME: &str = "scores";

/// MongoDB-backed implementation of [`QuizStore`].
#[derive(Clone)]
pub struct MongoQuizStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoQuizStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let questions = database.collection::<MongoQuestionDocument>(QUESTION_COLLECTION_NAME);
        let question_index = mongodb::IndexModel::builder()
            .keys(doc! {"quiz_id": 1, "order": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("question_quiz_order_idx".to_owned()))
                    .build(),
            )
            .build();
        questions
            .create_index(question_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: QUESTION_COLLECTION_NAME,
                index: "quiz_id,order",
                source,
            })?;

        let participants =
            database.collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION_NAME);
        let participant_index = mongodb::IndexModel::builder()
            .keys(doc! {"room_id": 1, "user_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("participant_room_user_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        participants
            .create_index(participant_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PARTICIPANT_COLLECTION_NAME,
                index: "room_id,user_id",
                source,
            })?;

        // Leaderboard queries filter on room and sort on score.
        let scores = database.collection::<MongoScoreDocument>(SCORE_COLLECTION_NAME);
        let score_index = mongodb::IndexModel::builder()
            .keys(doc! {"room_id": 1, "score": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("score_room_rank_idx".to_owned()))
                    .build(),
            )
            .build();
        scores
            .create_index(score_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SCORE_COLLECTION_NAME,
                index: "room_id,score",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn room_collection(&self) -> Collection<MongoRoomDocument> {
        self.database()
            .await
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn participant_collection(&self) -> Collection<MongoParticipantDocument> {
        self.database()
            .await
            .collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION_NAME)
    }

    async fn question_collection(&self) -> Collection<MongoQuestionDocument> {
        self.database()
            .await
            .collection::<MongoQuestionDocument>(QUESTION_COLLECTION_NAME)
    }

    async fn score_collection(&self) -> Collection<MongoScoreDocument> {
        self.database()
            .await
            .collection::<MongoScoreDocument>(SCORE_COLLECTION_NAME)
    }

    async fn find_room(&self, id: Uuid) -> MongoResult<Option<RoomEntity>> {
        let collection = self.room_collection().await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn mark_room_started(&self, id: Uuid) -> MongoResult<Option<RoomEntity>> {
        let collection = self.room_collection().await;
        let document = collection
            .find_one_and_update(
                doc_id(id),
                doc! {"$set": {
                    "status": "IN_PROGRESS",
                    "started_at": mongodb::bson::DateTime::now(),
                }},
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::StartRoom { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn ordered_questions(&self, quiz_id: Uuid) -> MongoResult<Vec<QuestionEntity>> {
        let collection = self.question_collection().await;
        let documents: Vec<MongoQuestionDocument> = collection
            .find(doc! {"quiz_id": uuid_as_binary(quiz_id)})
            .sort(doc! {"order": 1})
            .await
            .map_err(|source| MongoDaoError::LoadQuestions { quiz_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadQuestions { quiz_id, source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn participants(&self, room_id: Uuid) -> MongoResult<Vec<ParticipantEntity>> {
        let collection = self.participant_collection().await;
        let documents: Vec<MongoParticipantDocument> = collection
            .find(doc! {"room_id": uuid_as_binary(room_id)})
            .await
            .map_err(|source| MongoDaoError::LoadParticipants { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadParticipants { room_id, source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn reset_scores(&self, room_id: Uuid) -> MongoResult<u64> {
        let collection = self.score_collection().await;
        let result = collection
            .delete_many(doc! {"room_id": uuid_as_binary(room_id)})
            .await
            .map_err(|source| MongoDaoError::ResetScores { room_id, source })?;
        Ok(result.deleted_count)
    }

    async fn upsert_score(&self, update: ScoreUpsert) -> MongoResult<()> {
        let collection = self.score_collection().await;
        let participant_id = update.participant_id;

        // $inc creates missing counters from zero, so a single upsert covers
        // both the insert and the increment path atomically.
        collection
            .update_one(
                doc_id(participant_id),
                doc! {
                    "$setOnInsert": {
                        "user_id": uuid_as_binary(update.user_id),
                        "room_id": uuid_as_binary(update.room_id),
                        "username": update.username,
                    },
                    "$inc": {
                        "score": update.points as i64,
                        "answered_count": 1_i32,
                        "correct_count": if update.correct { 1_i32 } else { 0_i32 },
                    },
                },
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::UpsertScore {
                participant_id,
                source,
            })?;

        Ok(())
    }

    async fn top_scores(&self, room_id: Uuid, limit: usize) -> MongoResult<Vec<ScoreEntity>> {
        let collection = self.score_collection().await;
        let documents: Vec<MongoScoreDocument> = collection
            .find(doc! {"room_id": uuid_as_binary(room_id)})
            .sort(doc! {"score": -1, "_id": 1})
            .limit(limit as i64)
            .await
            .map_err(|source| MongoDaoError::TopScores { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::TopScores { room_id, source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl QuizStore for MongoQuizStore {
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room(id).await.map_err(Into::into) })
    }

    fn mark_room_started(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.mark_room_started(id).await.map_err(Into::into) })
    }

    fn ordered_questions(
        &self,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.ordered_questions(quiz_id).await.map_err(Into::into) })
    }

    fn participants(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.participants(room_id).await.map_err(Into::into) })
    }

    fn reset_scores(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.reset_scores(room_id).await.map_err(Into::into) })
    }

    fn upsert_score(&self, update: ScoreUpsert) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_score(update).await.map_err(Into::into) })
    }

    fn top_scores(
        &self,
        room_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.top_scores(room_id, limit).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
