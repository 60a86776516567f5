//! Live tank feed over WebSocket.
//!
//! On connect the observer receives `{"type":"snapshot","items":[...]}`,
//! then a stream of `item_added` / `item_removed` events. Observers may
//! also report a fish over the same socket.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use domains::{Fish, FishId};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Snapshot {
        items: Vec<Fish>,
    },
    ReportResult {
        id: FishId,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reports: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Report { id: FishId },
}

/// `GET /ws`
pub async fn fish_feed(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_observer(socket, state))
}

async fn serve_observer(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();
    run_observer(sink, stream, state).await;
}

/// Drives one observer over any message transport: snapshot first, then live
/// events interleaved with replies to the observer's own reports.
pub(crate) async fn run_observer<S, R, E>(mut sink: S, mut stream: R, state: AppState)
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    let mut subscription = match state.service.subscribe().await {
        Ok(subscription) => subscription,
        Err(err) => {
            tracing::error!(error = %err, "could not open live feed");
            return;
        }
    };
    let subscription_id = subscription.id();
    tracing::info!(subscription = subscription_id, "observer connected");

    let snapshot = ServerMessage::Snapshot {
        items: subscription.take_snapshot(),
    };

    if send_json(&mut sink, &snapshot).await {
        loop {
            tokio::select! {
                event = subscription.next_event() => {
                    let Some(event) = event else { break };
                    if !send_json(&mut sink, &event).await {
                        break;
                    }
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let Some(reply) = handle_client_message(&state, text.as_str()).await else {
                            continue;
                        };
                        if !send_json(&mut sink, &reply).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    subscription.unsubscribe();
    tracing::info!(subscription = subscription_id, "observer disconnected");
}

async fn handle_client_message(state: &AppState, text: &str) -> Option<ServerMessage> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(err) => {
            tracing::debug!(error = %err, "ignoring malformed observer message");
            return None;
        }
    };

    match message {
        ClientMessage::Report { id } => Some(match state.service.report(&id).await {
            Ok(reports) => {
                state.metrics.record_report();
                ServerMessage::ReportResult {
                    id,
                    success: true,
                    reports: Some(reports),
                    error: None,
                }
            }
            Err(err) => ServerMessage::ReportResult {
                id,
                success: false,
                reports: None,
                error: Some(err.kind().to_string()),
            },
        }),
    }
}

/// Returns `false` once the observer can no longer be written to.
async fn send_json<S, T>(sink: &mut S, value: &T) -> bool
where
    S: Sink<Message> + Unpin,
    T: Serialize,
{
    let text = match serde_json::to_string(value) {
        Ok(text) => text,
        Err(err) => {
            tracing::error!(error = %err, "could not encode feed message");
            return false;
        }
    };
    sink.send(Message::Text(text.into())).await.is_ok()
}
