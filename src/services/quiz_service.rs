//! Session engine operations: starting a quiz, scoring answers, and driving
//! the question/leaderboard loop to completion.
//!
//! Every operation for a room runs under that room's session mutex, awaited
//! I/O included, so handling is serialized per room while distinct rooms
//! proceed in parallel.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{RoomEntity, RoomStatus},
        quiz_store::{QuizStore, ScoreUpsert},
    },
    dto::{
        quiz::{LeaderboardEntry, QuestionHostView},
        room::RoomSummary,
    },
    error::ServiceError,
    services::{question_timer, room_events},
    state::{
        SharedState,
        session::{AdvanceTrigger, Question, QuizSession, SessionPhase},
    },
};

/// Start the quiz for a waiting room.
///
/// Validates the room, loads the question set, registers the in-memory
/// session, then wipes any score rows left over from a previous run and marks
/// the room `IN_PROGRESS`. The begin signal goes out immediately; the first
/// question follows after the configured start delay.
pub async fn start_quiz(state: &SharedState, room_id: Uuid) -> Result<RoomSummary, ServiceError> {
    let store = state.require_quiz_store().await?;

    let room = store
        .find_room(room_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` does not exist")))?;
    if room.status != RoomStatus::Waiting {
        return Err(ServiceError::InvalidState(format!(
            "room `{room_id}` has already started"
        )));
    }
    if state.connected_participants(room_id) == 0 {
        return Err(ServiceError::InvalidState(format!(
            "room `{room_id}` has no connected participants"
        )));
    }

    let questions: Vec<Question> = store
        .ordered_questions(room.quiz_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    if questions.is_empty() {
        return Err(ServiceError::InvalidState(format!(
            "quiz `{}` has no questions",
            room.quiz_id
        )));
    }

    let participants = store.participants(room_id).await?;

    let first_question = QuestionHostView::new(
        &questions[0],
        questions[0].effective_time_limit(state.config().default_time_limit_secs()),
    );

    // Registering the session reserves the room's slot, so of two racing
    // starts only one reaches the storage mutations below.
    state
        .sessions()
        .create(room_id, QuizSession::new(room_id, room.quiz_id, questions))?;

    let updated = match persist_start(store.as_ref(), room_id).await {
        Ok(room) => room,
        Err(err) => {
            state.sessions().remove(room_id);
            return Err(err);
        }
    };

    info!(%room_id, quiz_id = %room.quiz_id, "quiz session started");
    room_events::broadcast_quiz_started(state, room_id);
    schedule_first_question(Arc::clone(state), room_id);

    Ok(RoomSummary::new(updated, participants, first_question))
}

/// Storage mutations of a quiz start: wipe leftover score rows, then flip the
/// room to `IN_PROGRESS`. The caller unwinds the session slot on failure.
async fn persist_start(store: &dyn QuizStore, room_id: Uuid) -> Result<RoomEntity, ServiceError> {
    let removed = store.reset_scores(room_id).await?;
    if removed > 0 {
        debug!(%room_id, removed, "cleared score rows from a previous run");
    }

    store
        .mark_room_started(room_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` disappeared")))
}

/// Score one participant's answer to the active question.
///
/// Feedback goes back on `tx` before any storage round trip so the submitter
/// is never left waiting on the database. Submissions without an active
/// question (or an active session) are stale and dropped without a reply;
/// submitters outside the persisted roster get their feedback but are never
/// scored. A repeated submission for the same question gets feedback again
/// but is never scored twice. When the last roster member answers, the
/// question advances immediately.
pub async fn submit_answer(
    state: &SharedState,
    room_id: Uuid,
    user_id: Uuid,
    answer: u32,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), ServiceError> {
    let Some(handle) = state.sessions().get(room_id) else {
        debug!(%room_id, %user_id, "answer for a room without a session ignored");
        return Ok(());
    };
    let mut session = handle.lock().await;
    if session.phase() != SessionPhase::QuestionActive {
        debug!(%room_id, phase = ?session.phase(), "answer outside an active question ignored");
        return Ok(());
    }

    let question = session.current_question();
    let correct = answer == question.correct_answer;
    let correct_answer = question.correct_answer;
    let points = if correct { question.points } else { 0 };
    room_events::send_answer_result(tx, correct, correct_answer, points);

    let store = state.require_quiz_store().await?;
    let participants = store.participants(room_id).await?;
    let Some(participant) = participants.iter().find(|p| p.user_id == user_id) else {
        debug!(%room_id, %user_id, "answer from a user outside the roster dropped");
        return Ok(());
    };

    if session.has_answered(participant.id) {
        debug!(%room_id, participant_id = %participant.id, "duplicate answer not scored");
        return Ok(());
    }

    store
        .upsert_score(ScoreUpsert {
            participant_id: participant.id,
            user_id: participant.user_id,
            room_id,
            username: participant.username.clone(),
            points: u64::from(points),
            correct,
        })
        .await?;
    session.record_answer(participant.id);

    if session.all_answered(participants.iter().map(|p| &p.id)) {
        advance(state, &mut session, AdvanceTrigger::AllAnswered).await?;
    }
    Ok(())
}

/// Entry point for the countdown task once a question's window elapses.
///
/// Runs in its own task so the session can cancel the countdown handle
/// without aborting the advancement itself. An expiry that raced with an
/// advance (or with a newer countdown) is stale and does nothing.
pub async fn handle_timer_expired(state: SharedState, room_id: Uuid, question_index: usize) {
    let Some(handle) = state.sessions().get(room_id) else {
        return;
    };
    let mut session = handle.lock().await;
    if !session.timer_is_current(question_index) {
        debug!(%room_id, question_index, "stale countdown expiry ignored");
        return;
    }
    if let Err(err) = advance(&state, &mut session, AdvanceTrigger::TimerExpired).await {
        // The question stays active; a client timeout signal retries this.
        warn!(%room_id, question_index, error = %err, "advance after countdown expiry failed");
    }
}

/// Handle the client-side fallback signal that a question's time is up.
///
/// Clients run their own countdown and report expiry in case the server-side
/// one was lost. Without a session, or outside an active question, the
/// signal is stale and ignored.
pub async fn handle_client_timeout(state: &SharedState, room_id: Uuid) -> Result<(), ServiceError> {
    let Some(handle) = state.sessions().get(room_id) else {
        debug!(%room_id, "timeout signal for a room without a session ignored");
        return Ok(());
    };
    let mut session = handle.lock().await;
    if session.phase() != SessionPhase::QuestionActive {
        debug!(%room_id, phase = ?session.phase(), "timeout signal outside an active question ignored");
        return Ok(());
    }
    advance(state, &mut session, AdvanceTrigger::ClientTimeout).await
}

/// Close the active question: broadcast the standings and schedule what
/// follows the interstitial, the next question or the quiz end.
///
/// The standings are fetched before the countdown is cancelled: when the
/// fetch fails the question stays live and the countdown (or the client
/// fallback) forces a retry instead of the session silently stalling.
async fn advance(
    state: &SharedState,
    session: &mut QuizSession,
    trigger: AdvanceTrigger,
) -> Result<(), ServiceError> {
    debug_assert_eq!(session.phase(), SessionPhase::QuestionActive);
    let room_id = session.room_id();
    let store = state.require_quiz_store().await?;

    let rows = store
        .top_scores(room_id, state.config().leaderboard_size())
        .await?;
    let standings: Vec<LeaderboardEntry> = rows.into_iter().map(Into::into).collect();

    session.cancel_timer();
    session.show_leaderboard();
    info!(
        %room_id,
        question_index = session.current_index(),
        ?trigger,
        "question closed"
    );

    // The standings always go out first, even after the last question; the
    // terminal event follows once the interstitial has run its course.
    room_events::broadcast_leaderboard(state, room_id, standings.clone());
    schedule_continuation(Arc::clone(state), room_id, session.current_index(), standings);
    Ok(())
}

/// Make the current question live: broadcast it and arm its countdown.
fn begin_question(state: &SharedState, session: &mut QuizSession) {
    session.activate_question();
    let question = session.current_question().clone();
    let limit = question.effective_time_limit(state.config().default_time_limit_secs());
    room_events::broadcast_new_question(
        state,
        session.room_id(),
        &question,
        session.current_index(),
        limit,
    );
    let timer = question_timer::arm(
        Arc::clone(state),
        session.room_id(),
        session.current_index(),
        limit,
    );
    session.replace_timer(timer);
}

fn schedule_first_question(state: SharedState, room_id: Uuid) {
    let delay = state.config().start_delay();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(handle) = state.sessions().get(room_id) else {
            return;
        };
        let mut session = handle.lock().await;
        if session.phase() != SessionPhase::Starting {
            return;
        }
        begin_question(&state, &mut session);
    });
}

/// After the leaderboard interstitial, start the next question or end the
/// quiz with the standings captured when the question closed.
fn schedule_continuation(
    state: SharedState,
    room_id: Uuid,
    closed_index: usize,
    standings: Vec<LeaderboardEntry>,
) {
    let delay = state.config().leaderboard_delay();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(handle) = state.sessions().get(room_id) else {
            return;
        };
        let mut session = handle.lock().await;
        // Anything other than the leaderboard we scheduled from is stale.
        if session.phase() != SessionPhase::Leaderboard || session.current_index() != closed_index {
            return;
        }
        if session.on_last_question() {
            session.finish();
            room_events::broadcast_quiz_ended(
                &state,
                room_id,
                session.total_questions(),
                standings,
            );
            schedule_eviction(Arc::clone(&state), room_id);
        } else {
            session.step_to_next_question();
            begin_question(&state, &mut session);
        }
    });
}

fn schedule_eviction(state: SharedState, room_id: Uuid) {
    let retention = state.config().completed_retention();
    tokio::spawn(async move {
        tokio::time::sleep(retention).await;
        let Some(handle) = state.sessions().get(room_id) else {
            return;
        };
        {
            let session = handle.lock().await;
            if session.phase() != SessionPhase::Ended {
                return;
            }
        }
        state.sessions().remove(room_id);
        state.rooms().remove(room_id);
        debug!(%room_id, "finished session evicted");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        sync::{
            Mutex as StdMutex,
            atomic::{AtomicBool, Ordering},
        },
        time::{Duration, SystemTime},
    };

    use futures::future::{BoxFuture, ready};
    use serde_json::Value;
    use tokio::sync::broadcast;

    use crate::{
        config::test_support::fast_config,
        dao::{
            models::{ParticipantEntity, QuestionEntity, RoomEntity, ScoreEntity},
            quiz_store::QuizStore,
            storage::{StorageError, StorageResult},
        },
        dto::ws::RoomEvent,
        state::AppState,
    };

    fn test_error() -> StorageError {
        StorageError::unavailable("backend down".into(), std::io::Error::other("boom"))
    }

    struct MemoryStore {
        room: StdMutex<RoomEntity>,
        questions: Vec<QuestionEntity>,
        roster: Vec<ParticipantEntity>,
        scores: StdMutex<HashMap<Uuid, ScoreEntity>>,
        fail_top_scores: AtomicBool,
    }

    impl MemoryStore {
        fn score_of(&self, participant_id: Uuid) -> Option<ScoreEntity> {
            self.scores.lock().unwrap().get(&participant_id).cloned()
        }
    }

    impl QuizStore for MemoryStore {
        fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
            let room = self.room.lock().unwrap().clone();
            Box::pin(ready(Ok((room.id == id).then_some(room))))
        }

        fn mark_room_started(
            &self,
            id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
            let mut room = self.room.lock().unwrap();
            let updated = (room.id == id).then(|| {
                room.status = RoomStatus::InProgress;
                room.started_at = Some(SystemTime::now());
                room.clone()
            });
            Box::pin(ready(Ok(updated)))
        }

        fn ordered_questions(
            &self,
            _quiz_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
            Box::pin(ready(Ok(self.questions.clone())))
        }

        fn participants(
            &self,
            _room_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
            Box::pin(ready(Ok(self.roster.clone())))
        }

        fn reset_scores(&self, _room_id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
            let mut scores = self.scores.lock().unwrap();
            let removed = scores.len() as u64;
            scores.clear();
            Box::pin(ready(Ok(removed)))
        }

        fn upsert_score(&self, update: ScoreUpsert) -> BoxFuture<'static, StorageResult<()>> {
            let mut scores = self.scores.lock().unwrap();
            let row = scores
                .entry(update.participant_id)
                .or_insert_with(|| ScoreEntity {
                    participant_id: update.participant_id,
                    user_id: update.user_id,
                    room_id: update.room_id,
                    username: update.username.clone(),
                    score: 0,
                    answered_count: 0,
                    correct_count: 0,
                });
            row.score += update.points;
            row.answered_count += 1;
            if update.correct {
                row.correct_count += 1;
            }
            Box::pin(ready(Ok(())))
        }

        fn top_scores(
            &self,
            _room_id: Uuid,
            limit: usize,
        ) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
            if self.fail_top_scores.load(Ordering::SeqCst) {
                return Box::pin(ready(Err(test_error())));
            }
            let mut rows: Vec<ScoreEntity> =
                self.scores.lock().unwrap().values().cloned().collect();
            rows.sort_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then(a.participant_id.cmp(&b.participant_id))
            });
            rows.truncate(limit);
            Box::pin(ready(Ok(rows)))
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(ready(Ok(())))
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(ready(Ok(())))
        }
    }

    struct Fixture {
        state: SharedState,
        store: Arc<MemoryStore>,
        room_id: Uuid,
        users: Vec<Uuid>,
        participant_ids: Vec<Uuid>,
    }

    async fn fixture(question_count: usize, participant_count: usize) -> Fixture {
        let room_id = Uuid::new_v4();
        let quiz_id = Uuid::new_v4();
        let room = RoomEntity {
            id: room_id,
            code: "ROOM42".into(),
            quiz_id,
            creator_id: Uuid::new_v4(),
            status: RoomStatus::Waiting,
            created_at: SystemTime::now(),
            started_at: None,
        };
        let questions = (0..question_count)
            .map(|i| QuestionEntity {
                id: Uuid::new_v4(),
                quiz_id,
                text: format!("question {i}"),
                options: vec!["a".into(), "b".into(), "c".into()],
                correct_answer: 0,
                time_limit_secs: None,
                points: 100,
                order: i as u32,
            })
            .collect();
        let roster: Vec<ParticipantEntity> = (0..participant_count)
            .map(|i| ParticipantEntity {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                room_id,
                username: format!("player-{i}"),
                joined_at: SystemTime::now(),
            })
            .collect();

        let store = Arc::new(MemoryStore {
            room: StdMutex::new(room),
            questions,
            roster: roster.clone(),
            scores: StdMutex::new(HashMap::new()),
            fail_top_scores: AtomicBool::new(false),
        });
        let state = AppState::new(fast_config());
        state
            .set_quiz_store(Arc::clone(&store) as Arc<dyn QuizStore>)
            .await;

        Fixture {
            state,
            store,
            room_id,
            users: roster.iter().map(|p| p.user_id).collect(),
            participant_ids: roster.iter().map(|p| p.id).collect(),
        }
    }

    /// Receive broadcast frames until one of the wanted type arrives,
    /// tolerating interleaved countdown frames.
    async fn expect_event(rx: &mut broadcast::Receiver<RoomEvent>, kind: &str) -> Value {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(120), rx.recv())
                .await
                .expect("no event before timeout")
                .expect("channel closed");
            let value: Value = serde_json::from_str(&event.data).unwrap();
            if value["type"] == kind {
                return value;
            }
            assert_eq!(value["type"], "time_update", "unexpected event: {value}");
        }
    }

    fn addressed(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
        match rx.try_recv().expect("no addressed frame") {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_quiz_driven_by_early_advances() {
        let fx = fixture(2, 2).await;
        let mut rx = fx.state.rooms().hub(fx.room_id).subscribe();

        let summary = start_quiz(&fx.state, fx.room_id).await.unwrap();
        assert_eq!(summary.status, RoomStatus::InProgress);
        assert_eq!(summary.first_question.correct_answer, 0);
        assert_eq!(summary.participants.len(), 2);

        expect_event(&mut rx, "quizStarted").await;
        let question = expect_event(&mut rx, "new_question").await;
        assert_eq!(question["questionIndex"], 0);
        assert!(question.get("correctAnswer").is_none());

        let (tx_a, mut fb_a) = mpsc::unbounded_channel();
        let (tx_b, mut fb_b) = mpsc::unbounded_channel();
        submit_answer(&fx.state, fx.room_id, fx.users[0], 0, &tx_a)
            .await
            .unwrap();
        let result = addressed(&mut fb_a);
        assert_eq!(result["correct"], true);
        assert_eq!(result["points"], 100);

        submit_answer(&fx.state, fx.room_id, fx.users[1], 1, &tx_b)
            .await
            .unwrap();
        let result = addressed(&mut fb_b);
        assert_eq!(result["correct"], false);
        assert_eq!(result["points"], 0);
        assert_eq!(result["correctAnswer"], 0);

        // The second roster answer closed the question immediately.
        let leaderboard = expect_event(&mut rx, "leaderboard_update").await;
        assert_eq!(leaderboard["scores"][0]["username"], "player-0");
        assert_eq!(leaderboard["scores"][0]["score"], 100);
        assert_eq!(leaderboard["scores"][1]["score"], 0);
        assert_eq!(leaderboard["scores"][1]["answeredCount"], 1);

        let question = expect_event(&mut rx, "new_question").await;
        assert_eq!(question["questionIndex"], 1);

        submit_answer(&fx.state, fx.room_id, fx.users[0], 0, &tx_a)
            .await
            .unwrap();
        submit_answer(&fx.state, fx.room_id, fx.users[1], 0, &tx_b)
            .await
            .unwrap();

        // The last question still shows its leaderboard before the end.
        let final_board = expect_event(&mut rx, "leaderboard_update").await;
        assert_eq!(final_board["scores"][0]["score"], 200);

        let ended = expect_event(&mut rx, "quiz_ended").await;
        assert_eq!(ended["totalQuestions"], 2);
        assert_eq!(ended["finalScores"][0]["score"], 200);
        assert_eq!(ended["finalScores"][1]["score"], 100);

        // The finished session lingers, then gets evicted.
        assert!(fx.state.sessions().contains(fx.room_id));
        tokio::time::sleep(fx.state.config().completed_retention() * 2).await;
        assert!(!fx.state.sessions().contains(fx.room_id));
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_forces_the_advance() {
        let fx = fixture(1, 2).await;
        let mut rx = fx.state.rooms().hub(fx.room_id).subscribe();

        start_quiz(&fx.state, fx.room_id).await.unwrap();
        expect_event(&mut rx, "quizStarted").await;
        expect_event(&mut rx, "new_question").await;

        // Only one of two participants answers; the countdown must close it.
        let (tx, _fb) = mpsc::unbounded_channel();
        submit_answer(&fx.state, fx.room_id, fx.users[0], 0, &tx)
            .await
            .unwrap();

        expect_event(&mut rx, "leaderboard_update").await;
        let ended = expect_event(&mut rx, "quiz_ended").await;
        assert_eq!(ended["totalQuestions"], 1);
        assert_eq!(ended["finalScores"][0]["username"], "player-0");
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_answer_gets_feedback_but_no_score() {
        let fx = fixture(1, 2).await;
        let _rx = fx.state.rooms().hub(fx.room_id).subscribe();

        start_quiz(&fx.state, fx.room_id).await.unwrap();
        tokio::time::sleep(fx.state.config().start_delay() * 2).await;

        let (tx, mut fb) = mpsc::unbounded_channel();
        submit_answer(&fx.state, fx.room_id, fx.users[0], 0, &tx)
            .await
            .unwrap();
        submit_answer(&fx.state, fx.room_id, fx.users[0], 0, &tx)
            .await
            .unwrap();

        assert_eq!(addressed(&mut fb)["correct"], true);
        assert_eq!(addressed(&mut fb)["correct"], true);

        let row = fx.store.score_of(fx.participant_ids[0]).unwrap();
        assert_eq!(row.score, 100);
        assert_eq!(row.answered_count, 1);

        // One distinct answer of two roster members: still an open question.
        let handle = fx.state.sessions().get(fx.room_id).unwrap();
        assert_eq!(handle.lock().await.phase(), SessionPhase::QuestionActive);
    }

    #[tokio::test(start_paused = true)]
    async fn start_requires_a_connected_participant() {
        let fx = fixture(1, 1).await;

        let err = start_quiz(&fx.state, fx.room_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert!(!fx.state.sessions().contains(fx.room_id));
        assert_eq!(
            fx.store.room.lock().unwrap().status,
            RoomStatus::Waiting,
            "a rejected start must not mark the room in progress"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn start_rejects_missing_and_busy_rooms() {
        let fx = fixture(1, 1).await;
        let _rx = fx.state.rooms().hub(fx.room_id).subscribe();

        let err = start_quiz(&fx.state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        start_quiz(&fx.state, fx.room_id).await.unwrap();
        let err = start_quiz(&fx.state, fx.room_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_standings_fetch_leaves_the_question_open() {
        let fx = fixture(1, 1).await;
        let mut rx = fx.state.rooms().hub(fx.room_id).subscribe();

        start_quiz(&fx.state, fx.room_id).await.unwrap();
        expect_event(&mut rx, "quizStarted").await;
        expect_event(&mut rx, "new_question").await;

        fx.store.fail_top_scores.store(true, Ordering::SeqCst);
        let (tx, mut fb) = mpsc::unbounded_channel();
        let err = submit_answer(&fx.state, fx.room_id, fx.users[0], 0, &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        // Feedback already went out; the answer itself was scored.
        assert_eq!(addressed(&mut fb)["correct"], true);

        let handle = fx.state.sessions().get(fx.room_id).unwrap();
        assert_eq!(handle.lock().await.phase(), SessionPhase::QuestionActive);

        // Once the backend recovers, the countdown closes the question.
        fx.store.fail_top_scores.store(false, Ordering::SeqCst);
        expect_event(&mut rx, "leaderboard_update").await;
        let ended = expect_event(&mut rx, "quiz_ended").await;
        assert_eq!(ended["finalScores"][0]["score"], 100);
    }

    #[tokio::test(start_paused = true)]
    async fn client_timeout_closes_the_question() {
        let fx = fixture(2, 2).await;
        let mut rx = fx.state.rooms().hub(fx.room_id).subscribe();

        start_quiz(&fx.state, fx.room_id).await.unwrap();
        expect_event(&mut rx, "quizStarted").await;
        expect_event(&mut rx, "new_question").await;

        handle_client_timeout(&fx.state, fx.room_id).await.unwrap();
        expect_event(&mut rx, "leaderboard_update").await;

        // A second signal lands during the interstitial and is ignored.
        handle_client_timeout(&fx.state, fx.room_id).await.unwrap();
        let question = expect_event(&mut rx, "new_question").await;
        assert_eq!(question["questionIndex"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn final_leaderboard_precedes_quiz_ended() {
        let fx = fixture(1, 1).await;
        let mut rx = fx.state.rooms().hub(fx.room_id).subscribe();

        start_quiz(&fx.state, fx.room_id).await.unwrap();
        expect_event(&mut rx, "quizStarted").await;
        expect_event(&mut rx, "new_question").await;

        let (tx, _fb) = mpsc::unbounded_channel();
        submit_answer(&fx.state, fx.room_id, fx.users[0], 0, &tx)
            .await
            .unwrap();

        // expect_event rejects anything but countdown frames on the way, so
        // an early quiz_ended would fail this lookup.
        let board = expect_event(&mut rx, "leaderboard_update").await;
        assert_eq!(board["scores"][0]["score"], 100);
        let ended = expect_event(&mut rx, "quiz_ended").await;
        assert_eq!(ended["totalQuestions"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn answers_without_a_session_are_dropped() {
        let fx = fixture(1, 1).await;
        let (tx, mut fb) = mpsc::unbounded_channel();

        submit_answer(&fx.state, fx.room_id, fx.users[0], 0, &tx)
            .await
            .unwrap();
        handle_client_timeout(&fx.state, fx.room_id).await.unwrap();

        // No session, no reply: not even an error frame.
        assert!(fb.try_recv().is_err());
        assert!(fx.store.scores.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn non_roster_submitter_gets_feedback_but_no_score() {
        let fx = fixture(1, 1).await;
        let _rx = fx.state.rooms().hub(fx.room_id).subscribe();

        start_quiz(&fx.state, fx.room_id).await.unwrap();
        tokio::time::sleep(fx.state.config().start_delay() * 2).await;

        let (tx, mut fb) = mpsc::unbounded_channel();
        submit_answer(&fx.state, fx.room_id, Uuid::new_v4(), 0, &tx)
            .await
            .unwrap();

        assert_eq!(addressed(&mut fb)["correct"], true);
        assert!(fb.try_recv().is_err());
        assert!(fx.store.scores.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_duplicate_start_leaves_storage_untouched() {
        let fx = fixture(1, 1).await;
        fx.store.scores.lock().unwrap().insert(
            fx.participant_ids[0],
            ScoreEntity {
                participant_id: fx.participant_ids[0],
                user_id: fx.users[0],
                room_id: fx.room_id,
                username: "player-0".into(),
                score: 50,
                answered_count: 1,
                correct_count: 0,
            },
        );
        let question = Question {
            id: Uuid::new_v4(),
            text: "q".into(),
            options: vec!["a".into(), "b".into()],
            correct_answer: 0,
            time_limit_secs: None,
            points: 100,
        };
        fx.state
            .sessions()
            .create(
                fx.room_id,
                QuizSession::new(fx.room_id, Uuid::new_v4(), vec![question]),
            )
            .unwrap();

        let _rx = fx.state.rooms().hub(fx.room_id).subscribe();
        let err = start_quiz(&fx.state, fx.room_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        // The losing start must not have wiped scores or flipped the room.
        assert_eq!(fx.store.scores.lock().unwrap().len(), 1);
        assert_eq!(fx.store.room.lock().unwrap().status, RoomStatus::Waiting);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_wipes_scores_from_the_previous_run() {
        let fx = fixture(1, 1).await;
        fx.store.scores.lock().unwrap().insert(
            fx.participant_ids[0],
            ScoreEntity {
                participant_id: fx.participant_ids[0],
                user_id: fx.users[0],
                room_id: fx.room_id,
                username: "player-0".into(),
                score: 999,
                answered_count: 9,
                correct_count: 9,
            },
        );

        let _rx = fx.state.rooms().hub(fx.room_id).subscribe();
        start_quiz(&fx.state, fx.room_id).await.unwrap();
        assert!(fx.store.scores.lock().unwrap().is_empty());
    }
}
