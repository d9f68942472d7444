//! Live alert subscriber channel.
//!
//! Each WebSocket connection is registered with the broadcast hub for its
//! lifetime. Alerts arrive as JSON text frames shaped like `AlertMessage`;
//! anything the client sends is treated as keep-alive.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use vigil_models::AlertMessage;

use crate::metrics;
use crate::state::AppState;

/// Global counter for active WebSocket connections.
static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const ENDPOINT: &str = "alerts";

/// Subscriber WebSocket endpoint.
pub async fn ws_alerts(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_ws_active_connections(count);
    metrics::record_ws_connection(ENDPOINT);

    ws.on_upgrade(|socket| async move {
        handle_alert_socket(socket, state).await;
        let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    })
}

/// Serialize an alert into a text frame.
pub fn alert_frame(alert: &AlertMessage) -> Option<Message> {
    match serde_json::to_string(alert) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            warn!("Failed to serialize alert: {}", e);
            None
        }
    }
}

/// Result of writing one frame to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendOutcome {
    Sent,
    Closed,
    TimedOut,
}

/// Write one frame, giving up after `limit` so a stalled peer cannot park
/// the socket task.
async fn send_frame<S>(sender: &mut S, frame: Message, limit: Duration) -> SendOutcome
where
    S: Sink<Message> + Unpin,
{
    match timeout(limit, sender.send(frame)).await {
        Ok(Ok(())) => SendOutcome::Sent,
        Ok(Err(_)) => SendOutcome::Closed,
        Err(_) => SendOutcome::TimedOut,
    }
}

async fn handle_alert_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let hub = Arc::clone(state.hub());
    let send_timeout = hub.send_timeout();
    let mut subscription = hub.register();
    let subscriber_id = subscription.id();

    let mut heartbeat = interval(WS_HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            alert = subscription.recv() => {
                match alert {
                    Some(alert) => {
                        let Some(frame) = alert_frame(&alert) else { continue };
                        match send_frame(&mut sender, frame, send_timeout).await {
                            SendOutcome::Sent => {}
                            SendOutcome::Closed => {
                                warn!(subscriber_id = %subscriber_id, "Alert send failed, client disconnected");
                                break;
                            }
                            SendOutcome::TimedOut => {
                                warn!(
                                    subscriber_id = %subscriber_id,
                                    timeout_ms = send_timeout.as_millis() as u64,
                                    "Alert send stalled, dropping client"
                                );
                                break;
                            }
                        }
                        metrics::record_ws_message_sent(ENDPOINT, "alert");
                        last_activity = Instant::now();
                    }
                    // The hub dropped this subscriber (stalled or closed)
                    None => {
                        info!(subscriber_id = %subscriber_id, "Subscriber removed by hub");
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                if last_activity.elapsed() > WS_HEARTBEAT_INTERVAL / 2
                    && send_frame(&mut sender, Message::Ping(Vec::new()), send_timeout).await != SendOutcome::Sent
                {
                    warn!(subscriber_id = %subscriber_id, "Heartbeat failed, client disconnected");
                    break;
                }
            }
            client_msg = receiver.next() => {
                match client_msg {
                    Some(Ok(Message::Close(_))) | None => {
                        info!(subscriber_id = %subscriber_id, "Client closed connection");
                        break;
                    }
                    Some(Ok(_)) => {
                        metrics::record_ws_message_received(ENDPOINT);
                        last_activity = Instant::now();
                    }
                    Some(Err(e)) => {
                        debug!(subscriber_id = %subscriber_id, "WebSocket read error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    hub.unregister(subscriber_id);
    let _ = timeout(send_timeout, sender.close()).await;
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use super::*;

    /// A client whose socket buffer never drains.
    struct StalledSink;

    impl Sink<Message> for StalledSink {
        type Error = Infallible;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _item: Message) -> Result<(), Self::Error> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }
    }

    #[tokio::test]
    async fn test_send_to_stalled_client_times_out() {
        let started = Instant::now();
        let outcome = send_frame(&mut StalledSink, Message::Text("{}".to_string()), Duration::from_millis(20)).await;

        assert_eq!(outcome, SendOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_send_to_live_client() {
        let mut sink = futures_util::sink::drain();
        let outcome = send_frame(&mut sink, Message::Text("{}".to_string()), Duration::from_millis(20)).await;
        assert_eq!(outcome, SendOutcome::Sent);
    }

    #[test]
    fn test_alert_frame_shape() {
        let alert = AlertMessage::new("URGENT Pistol (conf: 0.90) | 0.10s", "data:image/jpeg;base64,AA==", &[], 42);

        let Some(Message::Text(text)) = alert_frame(&alert) else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["log"], "URGENT Pistol (conf: 0.90) | 0.10s");
        assert_eq!(value["image"], "data:image/jpeg;base64,AA==");
        assert_eq!(value["counts"], serde_json::json!({}));
        assert_eq!(value["timestamp"], 42);
    }
}
