use tokio::sync::broadcast;
use tracing::trace;

use crate::dto::sse::ServerEvent;

/// Fan-out of club events to the open `/sse/bookings` connections.
pub struct BookingFeed {
    sender: broadcast::Sender<ServerEvent>,
}

impl BookingFeed {
    /// Build a feed buffering up to `capacity` events for slow subscribers.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Open subscriptions.
    pub fn subscribers(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish `event`; returns how many subscribers received it.
    pub fn publish(&self, event: ServerEvent) -> usize {
        match self.sender.send(event) {
            Ok(delivered) => delivered,
            Err(broadcast::error::SendError(event)) => {
                trace!(event = ?event.event, "no booking feed subscriber");
                0
            }
        }
    }
}
