//! Server-sent status change stream.
//!
//! Each `/events` connection registers its own listener on the status
//! change bus and deregisters it when the stream is dropped. The listener
//! enriches the raw transition with a full status snapshot, so subscribers
//! get the same shape `/status` returns.

use crate::AppState;
use async_trait::async_trait;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use futures_util::StreamExt;
use serde::Serialize;
use shiftbox_core::machine::{ClusterState, ClusterStatusResult};
use shiftbox_core::{Notifiable, StatusChannel, StatusChangedEvent, Synchronized};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Event name used on the SSE wire.
const STATUS_CHANGE_EVENT: &str = "status_change";

/// Per-connection buffer; a subscriber that falls this far behind starts
/// losing events rather than stalling delivery.
const SUBSCRIBER_BUFFER: usize = 16;

/// Payload serialized for each status change.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SerializableEvent {
    status: ClusterStatusResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

struct StatusChangeListener {
    machine: Arc<Synchronized>,
    tx: mpsc::Sender<Event>,
}

#[async_trait]
impl Notifiable<StatusChangedEvent> for StatusChangeListener {
    async fn notify(&self, changed: StatusChangedEvent) {
        tracing::debug!(state = %changed.state, "state changed event");

        let payload = match self.machine.status().await {
            Ok(mut status) => {
                // The event can outrun the state write that triggered it, so
                // the snapshot may still carry the old state. The event's
                // state is authoritative.
                status.cluster_status = changed.state;
                SerializableEvent {
                    status,
                    error: changed.error,
                }
            }
            Err(err) => SerializableEvent {
                status: ClusterStatusResult::transitional(ClusterState::Error),
                error: Some(err.to_string()),
            },
        };

        match serde_json::to_string(&payload) {
            Ok(json) => {
                if self
                    .tx
                    .try_send(Event::default().event(STATUS_CHANGE_EVENT).data(json))
                    .is_err()
                {
                    tracing::debug!("dropping status change event for slow subscriber");
                }
            }
            Err(err) => {
                tracing::error!("could not serialize status changed event to JSON: {err}");
            }
        }
    }
}

/// Removes the listener from the bus when the connection's stream is
/// dropped.
struct ListenerGuard {
    bus: StatusChannel,
    listener: Arc<dyn Notifiable<StatusChangedEvent>>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.bus.remove_listener(&self.listener);
        tracing::debug!("status change subscriber disconnected");
    }
}

/// `GET /events`: stream status changes as server-sent events.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
    let listener: Arc<dyn Notifiable<StatusChangedEvent>> = Arc::new(StatusChangeListener {
        machine: state.machine.clone(),
        tx,
    });
    state.status_events.add_listener(listener.clone());
    tracing::debug!("status change subscriber connected");

    let guard = ListenerGuard {
        bus: state.status_events.clone(),
        listener,
    };
    let stream = ReceiverStream::new(rx).map(move |event| {
        let _ = &guard;
        Ok(event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
