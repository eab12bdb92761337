use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tradelink_core::Identity;

use crate::state::AppState;

/// GET /events/stream
/// Live marketplace events for the caller's orders; admins see all of them
pub async fn stream_events(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("Event stream opened by {}", identity.user_id);

    let stream = BroadcastStream::new(state.events.subscribe())
        .filter_map(move |result| async move {
            match result {
                Ok(event) if identity.is_admin() || event.involves(identity.user_id) => {
                    match Event::default().event(event.kind()).json_data(&event) {
                        Ok(sse) => Some(Ok::<_, Infallible>(sse)),
                        Err(e) => {
                            tracing::error!("Failed to encode event {}: {}", event.id, e);
                            None
                        }
                    }
                }
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!("Event stream for {} lagged, skipped {} events", identity.user_id, skipped);
                    None
                }
            }
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
