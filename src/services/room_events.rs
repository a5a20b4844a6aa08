use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        quiz::LeaderboardEntry,
        ws::{RoomEvent, ServerMessage},
    },
    state::{SharedState, session::Question},
};

/// Broadcast the quiz begin signal to a room.
pub fn broadcast_quiz_started(state: &SharedState, room_id: Uuid) {
    send_room_event(
        state,
        room_id,
        &ServerMessage::QuizStarted {
            room_id,
            message: "Quiz is starting".into(),
        },
    );
}

/// Broadcast a freshly activated question. The correct answer stays server-side.
pub fn broadcast_new_question(
    state: &SharedState,
    room_id: Uuid,
    question: &Question,
    question_index: usize,
    time_limit: u32,
) {
    send_room_event(
        state,
        room_id,
        &ServerMessage::NewQuestion {
            id: question.id,
            text: question.text.clone(),
            options: question.options.clone(),
            time_limit,
            start_time: unix_millis(),
            question_index,
        },
    );
}

/// Broadcast a whole-second countdown change for the active question.
pub fn broadcast_time_update(
    state: &SharedState,
    room_id: Uuid,
    time_remaining: i64,
    question_index: usize,
) {
    send_room_event(
        state,
        room_id,
        &ServerMessage::TimeUpdate {
            time_remaining,
            question_index,
        },
    );
}

/// Broadcast the current standings during the leaderboard interstitial.
pub fn broadcast_leaderboard(state: &SharedState, room_id: Uuid, scores: Vec<LeaderboardEntry>) {
    send_room_event(state, room_id, &ServerMessage::LeaderboardUpdate { scores });
}

/// Broadcast the terminal quiz event with the final standings.
pub fn broadcast_quiz_ended(
    state: &SharedState,
    room_id: Uuid,
    total_questions: usize,
    final_scores: Vec<LeaderboardEntry>,
) {
    send_room_event(
        state,
        room_id,
        &ServerMessage::QuizEnded {
            message: "Quiz completed".into(),
            total_questions,
            final_scores,
        },
    );
}

/// Send answer feedback to the submitting connection only.
pub fn send_answer_result(
    tx: &mpsc::UnboundedSender<Message>,
    correct: bool,
    correct_answer: u32,
    points: u32,
) {
    send_to_connection(
        tx,
        &ServerMessage::AnswerResult {
            correct,
            correct_answer,
            points,
        },
    );
}

/// Send an addressed error notification to one connection.
pub fn send_error(tx: &mpsc::UnboundedSender<Message>, message: &str) {
    send_to_connection(
        tx,
        &ServerMessage::Error {
            message: message.to_string(),
        },
    );
}

/// Serialize a message and push it onto a single connection's writer queue.
///
/// A closed writer means the connection is gone; the caller finds out through
/// its own receive loop, so the send error is dropped here.
pub fn send_to_connection(tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(payload) => {
            let _ = tx.send(Message::Text(payload.into()));
        }
        Err(err) => warn!(error = %err, "failed to serialize addressed message"),
    }
}

fn send_room_event(state: &SharedState, room_id: Uuid, message: &ServerMessage) {
    match RoomEvent::json(message) {
        Ok(event) => state.rooms().hub(room_id).broadcast(event),
        Err(err) => warn!(%room_id, error = %err, "failed to serialize room event"),
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
