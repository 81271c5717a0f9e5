//! Server-sent event stream of log frames, one poll loop per subscriber.

use crate::error::ApiError;
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{error, info};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

pub async fn stream_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let frames = state.poller.open(&id).await?;
    info!(container_id = %id, "Streaming logs");

    let events = frames.filter_map(move |frame| {
        let event = match Event::default().json_data(&frame) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                error!(index = frame.index, error = %e, "Failed to encode log frame");
                None
            }
        };
        futures::future::ready(event)
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}
