//! WebSocket handler for real-time snapshots.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Create the WebSocket router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/ws", get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the current snapshot so none is missed in between.
    let mut rx = state.snapshot_tx.subscribe();

    info!("WebSocket client connected");

    let current = state.snapshot.read().await.clone();
    if let Some(snapshot) = current
        && let Ok(json) = serde_json::to_string(&snapshot)
        && sender.send(Message::Text(json.into())).await.is_err()
    {
        info!("WebSocket client disconnected during initial snapshot");
        return;
    }

    debug!("Sent initial snapshot to WebSocket client");

    let mut send_task = tokio::spawn(async move {
        loop {
            let snapshot = match rx.recv().await {
                Ok(snapshot) => snapshot,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("WebSocket client lagged, skipped {} snapshot(s)", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let json = match serde_json::to_string(&snapshot) {
                Ok(j) => j,
                Err(e) => {
                    warn!("Failed to serialize snapshot: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        },
        _ = &mut recv_task => {
            send_task.abort();
        },
    }

    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use aeroguard_core::Snapshot;
    use time::OffsetDateTime;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

    use crate::collector;
    use crate::test_support::test_state;

    type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    async fn serve(state: Arc<AppState>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router().with_state(state)).await.unwrap();
        });
        format!("ws://{addr}/api/ws")
    }

    async fn next_json(client: &mut Client) -> serde_json::Value {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("no frame within 5s")
            .unwrap()
            .unwrap();
        serde_json::from_str(message.to_text().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_client_gets_current_then_new_snapshots() {
        let state = test_state();
        let current = collector::run_cycle(&state).await;
        let url = serve(Arc::clone(&state)).await;

        let (mut client, _) = connect_async(url.as_str()).await.unwrap();
        let first = next_json(&mut client).await;
        assert_eq!(first, serde_json::to_value(&current).unwrap());
        assert_eq!(first["entries"].as_array().unwrap().len(), 2);

        let next = Snapshot {
            generated_at: OffsetDateTime::now_utc(),
            entries: current.entries[..1].to_vec(),
        };
        state.publish(next.clone()).await;

        let second = next_json(&mut client).await;
        assert_eq!(second, serde_json::to_value(&next).unwrap());
    }

    #[tokio::test]
    async fn test_no_initial_frame_before_first_cycle() {
        let state = test_state();
        let url = serve(Arc::clone(&state)).await;

        let (mut client, _) = connect_async(url.as_str()).await.unwrap();
        let nothing = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
        assert!(nothing.is_err());

        let snapshot = collector::run_cycle(&state).await;
        let frame = next_json(&mut client).await;
        assert_eq!(frame, serde_json::to_value(&snapshot).unwrap());
    }
}
