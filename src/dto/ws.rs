use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::quiz::LeaderboardEntry;

/// Messages accepted from quiz WebSocket clients.
///
/// The first frame on a connection must be `identification`; the user id it
/// carries is the only identity the server trusts for the rest of the
/// connection. Room commands never carry a user id of their own.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Bind the connection to a verified user identity.
    #[serde(rename = "identification", rename_all = "camelCase")]
    Identification {
        /// Verified identity of the connecting user.
        user_id: Uuid,
    },
    /// Subscribe the connection to a room's broadcast channel.
    #[serde(rename = "join_room", rename_all = "camelCase")]
    JoinRoom {
        /// Room to subscribe to.
        room_id: Uuid,
    },
    /// Answer the currently active question.
    #[serde(rename = "submitAnswer", rename_all = "camelCase")]
    SubmitAnswer {
        /// Room whose active question is being answered.
        room_id: Uuid,
        /// 0-based index of the chosen option.
        answer: u32,
    },
    /// Client-side fallback signal that the question timer elapsed.
    #[serde(rename = "question_timeout", rename_all = "camelCase")]
    QuestionTimeout {
        /// Room whose question should be advanced.
        room_id: Uuid,
    },
    /// Any unrecognized message type; ignored with a warning.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a raw text frame into a client message.
    pub fn from_json_str(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

/// Events produced by the session engine.
///
/// Most variants are broadcast to a room channel; `answer_result` and `error`
/// are addressed to a single connection.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Quiz begin signal, broadcast when the room transitions to in-progress.
    #[serde(rename = "quizStarted", rename_all = "camelCase")]
    QuizStarted {
        /// Room the quiz started in.
        room_id: Uuid,
        /// Human-readable confirmation.
        message: String,
    },
    /// A question became active. The correct answer is withheld.
    #[serde(rename = "new_question", rename_all = "camelCase")]
    NewQuestion {
        /// Question identifier.
        id: Uuid,
        /// Prompt shown to participants.
        text: String,
        /// Answer options.
        options: Vec<String>,
        /// Effective answer window in seconds.
        time_limit: u32,
        /// Wall-clock emission time in milliseconds since the Unix epoch.
        start_time: u64,
        /// 0-based position within the quiz.
        question_index: usize,
    },
    /// Periodic countdown update, coalesced to whole-second changes.
    #[serde(rename = "time_update", rename_all = "camelCase")]
    TimeUpdate {
        /// Seconds left on the active question.
        time_remaining: i64,
        /// Question the countdown belongs to.
        question_index: usize,
    },
    /// Addressed feedback for a submitted answer.
    #[serde(rename = "answer_result", rename_all = "camelCase")]
    AnswerResult {
        /// Whether the submitted index matched the correct one.
        correct: bool,
        /// 0-based index of the correct option.
        correct_answer: u32,
        /// Points awarded (zero when incorrect).
        points: u32,
    },
    /// Current standings, top-N by score.
    #[serde(rename = "leaderboard_update")]
    LeaderboardUpdate {
        /// Ranked rows, highest score first.
        scores: Vec<LeaderboardEntry>,
    },
    /// Terminal event carrying the final standings.
    #[serde(rename = "quiz_ended", rename_all = "camelCase")]
    QuizEnded {
        /// Human-readable completion message.
        message: String,
        /// Number of questions the quiz contained.
        total_questions: usize,
        /// Final standings, top-N by score.
        final_scores: Vec<LeaderboardEntry>,
    },
    /// Addressed failure notification (persistence errors and the like).
    #[serde(rename = "error")]
    Error {
        /// Human-readable description.
        message: String,
    },
}

/// Pre-serialized frame carried across a room's broadcast channel.
///
/// Serializing once at emission keeps fan-out cheap no matter how many
/// connections are subscribed.
#[derive(Clone, Debug)]
pub struct RoomEvent {
    /// JSON payload forwarded verbatim as a text frame.
    pub data: String,
}

impl RoomEvent {
    /// Serialize a server message into a broadcast-ready frame.
    pub fn json(message: &ServerMessage) -> serde_json::Result<Self> {
        Ok(Self {
            data: serde_json::to_string(message)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn inbound_messages_parse_wire_names() {
        let room_id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"submitAnswer","roomId":"{room_id}","answer":2}}"#);
        match ClientMessage::from_json_str(&raw).unwrap() {
            ClientMessage::SubmitAnswer {
                room_id: parsed,
                answer,
            } => {
                assert_eq!(parsed, room_id);
                assert_eq!(answer, 2);
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let raw = format!(r#"{{"type":"question_timeout","roomId":"{room_id}"}}"#);
        assert!(matches!(
            ClientMessage::from_json_str(&raw).unwrap(),
            ClientMessage::QuestionTimeout { .. }
        ));
    }

    #[test]
    fn unknown_inbound_type_is_tolerated() {
        let parsed = ClientMessage::from_json_str(r#"{"type":"dance"}"#).unwrap();
        assert!(matches!(parsed, ClientMessage::Unknown));
    }

    #[test]
    fn new_question_withholds_correct_answer() {
        let message = ServerMessage::NewQuestion {
            id: Uuid::new_v4(),
            text: "capital of France?".into(),
            options: vec!["Lyon".into(), "Paris".into()],
            time_limit: 30,
            start_time: 1_700_000_000_000,
            question_index: 0,
        };

        let value: Value = serde_json::from_str(&RoomEvent::json(&message).unwrap().data).unwrap();
        assert_eq!(value["type"], "new_question");
        assert_eq!(value["timeLimit"], 30);
        assert!(value.get("correctAnswer").is_none());
    }

    #[test]
    fn answer_result_uses_camel_case_fields() {
        let message = ServerMessage::AnswerResult {
            correct: true,
            correct_answer: 1,
            points: 100,
        };
        let value: Value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({"type": "answer_result", "correct": true, "correctAnswer": 1, "points": 100})
        );
    }

    #[test]
    fn leaderboard_rows_serialize_counters() {
        let message = ServerMessage::LeaderboardUpdate {
            scores: vec![LeaderboardEntry {
                username: "ada".into(),
                score: 100,
                correct_count: 1,
                answered_count: 1,
            }],
        };
        let value: Value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["scores"][0]["correctCount"], 1);
        assert_eq!(value["scores"][0]["answeredCount"], 1);
    }
}
