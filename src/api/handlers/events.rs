//! `/api/events`: task notifications as Server-Sent Events.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::api::middleware::Authz;
use crate::api::routes::AppState;
use crate::events::TaskEvent;

/// Only the caller's own task events are forwarded.
pub async fn stream(
    State(state): State<AppState>,
    Authz(identity): Authz,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let owner = identity.user_id;
    tracing::debug!(user = %owner, "Event stream opened");

    let events = owned_events(state.events.subscribe(), owner).map(|event| {
        Ok(Event::default()
            .event(event.name())
            .data(event.payload().to_string()))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Events from `rx` that concern `owner`'s tasks. A lagging receiver silently
/// misses events; the stream is advisory.
fn owned_events(rx: broadcast::Receiver<TaskEvent>, owner: Uuid) -> impl Stream<Item = TaskEvent> {
    BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(event) if event.owner() == owner => Some(event),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(user = %owner, error = %err, "Event stream lagged");
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BroadcastSink, EventSink};

    #[tokio::test]
    async fn other_owners_are_filtered_out() {
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let sink = BroadcastSink::new(8);
        let stream = owned_events(sink.subscribe(), bob);

        let alices = Uuid::new_v4();
        let bobs = Uuid::new_v4();
        sink.emit(TaskEvent::Deleted { id: alices, owner: alice });
        sink.emit(TaskEvent::Deleted { id: bobs, owner: bob });
        drop(sink);

        let seen: Vec<TaskEvent> = stream.collect().await;
        assert_eq!(seen, vec![TaskEvent::Deleted { id: bobs, owner: bob }]);
    }
}
