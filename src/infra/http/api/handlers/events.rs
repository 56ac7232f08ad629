//! Server-sent push events for one installation.

use std::convert::Infallible;

use async_stream::stream;
use axum::extract::{Extension, State};
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use metrics::counter;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::domain::types::InstallationId;
use crate::infra::http::api::state::ApiState;

/// Streams events targeted at the caller plus every broadcast, until the client disconnects.
pub async fn events(
    State(state): State<ApiState>,
    Extension(installation): Extension<InstallationId>,
) -> impl IntoResponse {
    let mut receiver = state.events.subscribe();
    debug!(installation = %installation, "push subscriber connected");

    let stream = stream! {
        loop {
            let envelope = match receiver.recv().await {
                Ok(envelope) => envelope,
                Err(RecvError::Lagged(skipped)) => {
                    counter!("photostream_push_failed_total", "event" => "lagged")
                        .increment(skipped);
                    warn!(installation = %installation, skipped, "push subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if !envelope.is_visible_to(&installation) {
                continue;
            }

            let name = envelope.event.name();
            let event = envelope
                .event
                .payload()
                .map_err(axum::Error::new)
                .and_then(|payload| Event::default().event(name).json_data(payload));
            match event {
                Ok(event) => yield Ok::<Event, Infallible>(event),
                Err(err) => warn!(event = name, error = %err, "failed to encode push event"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
