//! Live change feed over server-sent events.
//!
//! Each committed write arrives as an `event: change` carrying
//! `{ collection, id, kind }`. Events carry ids only, so the stream is open
//! to anyone; clients re-read records through the authorized routes. A
//! client that falls behind gets `event: lagged` with the number of missed
//! changes and should reload its view.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::state::AppState;

pub async fn stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Change feed subscriber connected");

    let changes = BroadcastStream::new(state.db.subscribe()).filter_map(|message| match message {
        Ok(change) => match Event::default().event("change").json_data(&change) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!(error = %e, "Failed to encode change event");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(missed)) => {
            warn!(missed, "Change feed subscriber lagged");
            Some(Ok(Event::default().event("lagged").data(missed.to_string())))
        }
    });

    Sse::new(changes).keep_alive(KeepAlive::default())
}
