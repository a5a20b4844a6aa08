use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::ws::RoomEvent;

/// Broadcast hub for a single room's channel.
#[derive(Clone)]
pub struct RoomHub {
    sender: broadcast::Sender<RoomEvent>,
}

impl RoomHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: RoomEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers, used as the connected-participant count.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Registry of per-room broadcast channels.
///
/// Hubs are created lazily on first subscription or emission. A hub with zero
/// receivers simply drops broadcasts, so emitting to an empty room is safe.
pub struct RoomChannels {
    hubs: DashMap<Uuid, RoomHub>,
    capacity: usize,
}

impl RoomChannels {
    /// Build the channel registry with a per-room buffer capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
        }
    }

    /// Get or create the hub for a room.
    pub fn hub(&self, room_id: Uuid) -> RoomHub {
        self.hubs
            .entry(room_id)
            .or_insert_with(|| RoomHub::new(self.capacity))
            .clone()
    }

    /// Drop a room's hub. Live subscribers keep their receivers; they notice
    /// the channel closing once the last sender clone is gone.
    pub fn remove(&self, room_id: Uuid) {
        self.hubs.remove(&room_id);
    }

    /// Number of connections currently subscribed to a room.
    pub fn connected(&self, room_id: Uuid) -> usize {
        self.hubs
            .get(&room_id)
            .map(|hub| hub.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::ws::ServerMessage;

    #[tokio::test]
    async fn subscribers_receive_broadcasts() {
        let channels = RoomChannels::new(16);
        let room_id = Uuid::new_v4();

        let mut receiver = channels.hub(room_id).subscribe();
        let event = RoomEvent::json(&ServerMessage::Error {
            message: "boom".into(),
        })
        .unwrap();
        channels.hub(room_id).broadcast(event);

        let received = receiver.recv().await.unwrap();
        assert!(received.data.contains("boom"));
    }

    #[tokio::test]
    async fn connected_tracks_live_subscribers() {
        let channels = RoomChannels::new(16);
        let room_id = Uuid::new_v4();
        assert_eq!(channels.connected(room_id), 0);

        let first = channels.hub(room_id).subscribe();
        let second = channels.hub(room_id).subscribe();
        assert_eq!(channels.connected(room_id), 2);

        drop(first);
        drop(second);
        assert_eq!(channels.connected(room_id), 0);
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let channels = RoomChannels::new(16);
        let quiet_room = Uuid::new_v4();
        let noisy_room = Uuid::new_v4();

        let mut quiet = channels.hub(quiet_room).subscribe();
        channels.hub(noisy_room).broadcast(
            RoomEvent::json(&ServerMessage::Error {
                message: "elsewhere".into(),
            })
            .unwrap(),
        );

        assert!(matches!(
            quiet.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
