//! WebSocket cluster load stream.
//!
//! `/status_ws` pushes a resource usage sample every two seconds until the
//! client goes away. This feeds the GUI tray gauges; one connection costs
//! one `cluster_load()` poll per tick, nothing is shared across clients.

use crate::AppState;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;

/// Interval between load samples.
const TICK_PERIOD: Duration = Duration::from_millis(2000);

/// `GET /status_ws`: upgrade and stream cluster load samples.
pub async fn status_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| stream_cluster_load(socket, state))
}

async fn stream_cluster_load(socket: WebSocket, state: AppState) {
    tracing::debug!("cluster load subscriber connected");
    let (mut sender, mut receiver) = socket.split();
    let mut ticker = tokio::time::interval(TICK_PERIOD);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let load = match state.machine.cluster_load().await {
                    Ok(load) => load,
                    Err(err) => {
                        tracing::error!("unexpected error while sampling cluster load: {err}");
                        continue;
                    }
                };

                let json = match serde_json::to_string(&load) {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::error!("could not serialize cluster load to JSON: {err}");
                        continue;
                    }
                };

                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                // Any error or close frame ends the stream; pings are
                // answered by axum itself.
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!("cluster load subscriber disconnected");
}
