//! Server-side countdown for the active question.
//!
//! The countdown polls at a sub-second tick but only broadcasts `time_update`
//! when the whole-second remainder changes, so clients see one frame per
//! second regardless of the tick rate.

use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::{
    services::{quiz_service, room_events},
    state::{SharedState, session::TimerHandle},
};

/// Spawn the countdown task for the question at `question_index`.
///
/// On expiry the task hands off to [`quiz_service::handle_timer_expired`] in a
/// freshly spawned task and exits. The handoff matters: the expiry handler
/// cancels the session's timer handle, and a task must not abort itself while
/// it still has work in flight.
pub fn arm(
    state: SharedState,
    room_id: Uuid,
    question_index: usize,
    time_limit_secs: u32,
) -> TimerHandle {
    let tick = state.config().timer_tick();
    let task = tokio::spawn(run_countdown(
        state,
        room_id,
        question_index,
        time_limit_secs,
        tick,
    ));
    TimerHandle::new(question_index, task)
}

async fn run_countdown(
    state: SharedState,
    room_id: Uuid,
    question_index: usize,
    time_limit_secs: u32,
    tick: Duration,
) {
    let deadline = Instant::now() + Duration::from_secs(u64::from(time_limit_secs));
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Nothing has been broadcast yet, so any whole-second value below this
    // sentinel triggers the first frame.
    let mut last_broadcast = i64::from(time_limit_secs) + 1;

    loop {
        ticker.tick().await;
        let remaining_ms = deadline
            .saturating_duration_since(Instant::now())
            .as_millis() as i64;

        if remaining_ms == 0 {
            debug!(%room_id, question_index, "question countdown elapsed");
            tokio::spawn(quiz_service::handle_timer_expired(
                Arc::clone(&state),
                room_id,
                question_index,
            ));
            return;
        }

        // Ceiling keeps the first frame at the full window and the last at 1.
        let remaining_secs = (remaining_ms + 999) / 1000;
        if remaining_secs < last_broadcast {
            last_broadcast = remaining_secs;
            room_events::broadcast_time_update(&state, room_id, remaining_secs, question_index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::test_support::fast_config,
        dto::ws::RoomEvent,
        state::AppState,
    };
    use serde_json::Value;

    fn countdown_value(event: &RoomEvent) -> Option<i64> {
        let value: Value = serde_json::from_str(&event.data).ok()?;
        (value["type"] == "time_update").then(|| value["timeRemaining"].as_i64().unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_broadcasts_whole_seconds_once() {
        let state = AppState::new(fast_config());
        let room_id = Uuid::new_v4();
        let mut receiver = state.rooms().hub(room_id).subscribe();

        let handle = arm(Arc::clone(&state), room_id, 0, 3);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let event = receiver.recv().await.unwrap();
            if let Some(secs) = countdown_value(&event) {
                seen.push(secs);
            }
        }
        assert_eq!(seen, vec![3, 2, 1]);
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_countdown_stops_broadcasting() {
        let state = AppState::new(fast_config());
        let room_id = Uuid::new_v4();
        let mut receiver = state.rooms().hub(room_id).subscribe();

        let handle = arm(Arc::clone(&state), room_id, 0, 10);
        let first = receiver.recv().await.unwrap();
        assert_eq!(countdown_value(&first), Some(10));

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(2)).await;
        // Anything still buffered must predate the cancellation.
        while let Ok(event) = receiver.try_recv() {
            assert_eq!(countdown_value(&event), Some(10));
        }
    }
}
