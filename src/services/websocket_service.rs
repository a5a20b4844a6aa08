use std::{collections::HashMap, time::Duration};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::ClientMessage,
    services::{quiz_service, room_events},
    state::SharedState,
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle of one quiz WebSocket connection.
///
/// The first frame must be an `identification` message; the user id it
/// carries is the connection's identity for everything that follows. After
/// that the connection can join room channels and submit answers.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let inbound = match ClientMessage::from_json_str(&initial_message) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "failed to parse client message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let ClientMessage::Identification { user_id } = inbound else {
        warn!("first message was not identification");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    info!(%user_id, "client connected");

    // One forwarder task per joined room bridges that room's broadcast
    // channel onto this connection's writer queue.
    let mut forwarders: HashMap<Uuid, JoinHandle<()>> = HashMap::new();

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(ClientMessage::JoinRoom { room_id }) => {
                    if forwarders.contains_key(&room_id) {
                        debug!(%user_id, %room_id, "ignoring duplicate room join");
                        continue;
                    }
                    let task = spawn_room_forwarder(&state, room_id, outbound_tx.clone());
                    forwarders.insert(room_id, task);
                    info!(%user_id, %room_id, "client joined room channel");
                }
                Ok(ClientMessage::SubmitAnswer { room_id, answer }) => {
                    if let Err(err) =
                        quiz_service::submit_answer(&state, room_id, user_id, answer, &outbound_tx)
                            .await
                    {
                        warn!(%user_id, %room_id, error = %err, "answer submission failed");
                        room_events::send_error(&outbound_tx, &err.to_string());
                    }
                }
                Ok(ClientMessage::QuestionTimeout { room_id }) => {
                    if let Err(err) = quiz_service::handle_client_timeout(&state, room_id).await {
                        warn!(%user_id, %room_id, error = %err, "timeout signal failed");
                        room_events::send_error(&outbound_tx, &err.to_string());
                    }
                }
                Ok(ClientMessage::Identification { .. }) => {
                    warn!(%user_id, "ignoring duplicate identification message");
                }
                Ok(ClientMessage::Unknown) => {
                    warn!(%user_id, "ignoring unknown message type");
                }
                Err(err) => {
                    warn!(%user_id, error = %err, "failed to parse client message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%user_id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%user_id, error = %err, "websocket error");
                break;
            }
        }
    }

    for (_, task) in forwarders {
        task.abort();
    }
    info!(%user_id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Bridge a room's broadcast channel onto one connection's writer queue.
///
/// The task ends when the writer closes, the hub is dropped, or the forwarder
/// is aborted at disconnect; in every case its broadcast receiver is dropped,
/// which keeps the room's connected-participant count honest.
fn spawn_room_forwarder(
    state: &SharedState,
    room_id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    let mut events = state.rooms().hub(room_id).subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                event = events.recv() => match event {
                    Ok(event) => {
                        if tx.send(Message::Text(event.data.into())).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%room_id, skipped, "slow room subscriber dropped frames");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::test_support::fast_config, dto::ws::RoomEvent, state::AppState};

    #[tokio::test]
    async fn forwarder_relays_room_frames_to_the_writer() {
        let state = AppState::new(fast_config());
        let room_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let task = spawn_room_forwarder(&state, room_id, tx);
        // The forwarder's subscription registers as a connected participant.
        tokio::task::yield_now().await;
        assert_eq!(state.connected_participants(room_id), 1);

        state.rooms().hub(room_id).broadcast(RoomEvent {
            data: r#"{"type":"time_update"}"#.into(),
        });
        match rx.recv().await.unwrap() {
            Message::Text(text) => assert!(text.as_str().contains("time_update")),
            other => panic!("unexpected frame: {other:?}"),
        }
        task.abort();
    }

    #[tokio::test]
    async fn forwarder_stops_when_the_writer_closes() {
        let state = AppState::new(fast_config());
        let room_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let task = spawn_room_forwarder(&state, room_id, tx);
        tokio::task::yield_now().await;
        assert_eq!(state.connected_participants(room_id), 1);

        drop(rx);
        let _ = task.await;
        assert_eq!(state.connected_participants(room_id), 0);
    }
}
