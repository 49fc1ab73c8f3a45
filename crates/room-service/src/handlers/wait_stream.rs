//! Waiting-room event stream.
//!
//! `GET /api/wait/:slug/stream` is a `text/event-stream`. An unusable slug
//! or an already-active meeting produces a single terminal event; otherwise
//! the request becomes a waiter on the room's channel until the `active`
//! broadcast arrives or the client goes away.

use crate::errors::RoomError;
use crate::routes::AppState;
use crate::services::notification_bus::{WaitEvent, WAITER_BUFFER};
use crate::services::WaitAdmission;
use axum::{
    extract::{Path, State},
    http::{header, HeaderName},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, instrument, warn};

type EventStream = BoxStream<'static, Result<Event, axum::Error>>;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Handler for GET /api/wait/:slug/stream
#[instrument(skip_all, fields(slug = %slug))]
pub async fn wait_stream(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Response {
    let (tx, rx) = mpsc::channel(WAITER_BUFFER);
    let disconnect = CancellationToken::new();

    let stream = match state.rooms.admit_waiter(&slug, tx, disconnect.clone()).await {
        Ok(WaitAdmission::Subscribed(waiter_id)) => {
            debug!(target: "room.handlers.wait", waiter_id, "Waiter connected");
            waiter_events(rx, disconnect.drop_guard())
        }
        Ok(WaitAdmission::AlreadyActive(join_url)) => single_event(WaitEvent::active(join_url)),
        Err(e) => {
            if !matches!(e, RoomError::InvalidSlug(_) | RoomError::NotFound(_)) {
                warn!(target: "room.handlers.wait", error = %e, "Failed to admit waiter");
            }
            single_event(WaitEvent::error(stream_error_message(&e)))
        }
    };

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Sse::new(stream),
    )
        .into_response()
}

/// Reason carried by the terminal `error` event.
fn stream_error_message(err: &RoomError) -> &'static str {
    match err {
        RoomError::InvalidSlug(_) => "invalid-slug",
        RoomError::NotFound(_) => "not-found",
        _ => "internal",
    }
}

fn single_event(event: WaitEvent) -> EventStream {
    stream::once(async move { event.to_sse() }).boxed()
}

/// Forward bus events until a terminal one or until the bus closes the
/// waiter. Dropping the stream drops `guard`, which fires the disconnect
/// signal.
fn waiter_events(rx: mpsc::Receiver<WaitEvent>, guard: DropGuard) -> EventStream {
    stream::unfold(
        (rx, guard, false),
        |(mut rx, guard, finished)| async move {
            if finished {
                return None;
            }
            let event = rx.recv().await?;
            let terminal = event.is_terminal();
            Some((event.to_sse(), (rx, guard, terminal)))
        },
    )
    .boxed()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_messages() {
        assert_eq!(
            stream_error_message(&RoomError::InvalidSlug("X".to_string())),
            "invalid-slug"
        );
        assert_eq!(
            stream_error_message(&RoomError::NotFound("x".to_string())),
            "not-found"
        );
        assert_eq!(
            stream_error_message(&RoomError::Database("down".to_string())),
            "internal"
        );
    }

    #[tokio::test]
    async fn test_waiter_stream_ends_after_terminal_event() {
        let (tx, rx) = mpsc::channel(WAITER_BUFFER);
        let disconnect = CancellationToken::new();
        let mut events = waiter_events(rx, disconnect.clone().drop_guard());

        tx.send(WaitEvent::KeepAlive { at_ms: 1 }).await.unwrap();
        tx.send(WaitEvent::active("https://meet/abc")).await.unwrap();
        tx.send(WaitEvent::KeepAlive { at_ms: 2 }).await.unwrap();

        assert!(events.next().await.unwrap().is_ok());
        assert!(events.next().await.unwrap().is_ok());
        assert!(events.next().await.is_none());
        assert!(disconnect.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropping_waiter_stream_fires_disconnect() {
        let (_tx, rx) = mpsc::channel(WAITER_BUFFER);
        let disconnect = CancellationToken::new();
        let events = waiter_events(rx, disconnect.clone().drop_guard());

        assert!(!disconnect.is_cancelled());
        drop(events);
        assert!(disconnect.is_cancelled());
    }
}
