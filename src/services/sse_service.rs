use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    state::SharedState,
};

/// Subscribe to the bookings stream, queueing the handshake as its first message.
///
/// With `slot_filter` set, the slot must exist; the handshake then names it.
pub async fn subscribe(
    state: &SharedState,
    slot_filter: Option<Uuid>,
) -> Result<(broadcast::Receiver<ServerEvent>, Option<ServerEvent>), ServiceError> {
    let message = match slot_filter {
        Some(slot_id) => {
            if state.ledger().await.slot(slot_id).is_none() {
                return Err(ServiceError::NotFound(format!(
                    "time slot `{slot_id}` not found"
                )));
            }
            format!("subscribed to time slot {slot_id}")
        }
        None => format!("subscribed to {} bookings", state.config().club_name),
    };

    let receiver = state.events().subscribe();
    let handshake = Handshake {
        message,
        degraded: state.is_degraded().await,
    };
    let first = match ServerEvent::json(Some("handshake".to_string()), &handshake) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialize SSE handshake");
            None
        }
    };
    Ok((receiver, first))
}

/// Convert a broadcast receiver into an SSE response, forwarding the events that pass
/// `slot_filter` until the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    first: Option<ServerEvent>,
    slot_filter: Option<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(payload) = first {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) if !payload.matches(slot_filter) => continue,
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "SSE subscriber lagged; skipping events");
                            continue;
                        }
                    }
                }
            }
        }

        info!("bookings SSE stream disconnected");
    });

    // when the client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}
