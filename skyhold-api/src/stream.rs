use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::state::AppState;

/// Seat events for one flight as server-sent events. Lagging subscribers
/// skip the events they missed; the seat map is the source of truth.
pub async fn seat_events(
    State(state): State<AppState>,
    Path(flight_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.engine.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.flight_id() == flight_id => match serde_json::to_string(&event) {
                Ok(data) => Some(Ok(Event::default().event(event.name()).data(data))),
                Err(e) => {
                    tracing::error!("Failed to serialize seat event: {}", e);
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Seat stream for flight {} lagged: {}", flight_id, e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
