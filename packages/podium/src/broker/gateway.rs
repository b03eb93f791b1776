//! WebSocket gateway.
//!
//! Splits the socket into a writer task draining the connection's outbound
//! queue and a reader loop feeding frames to the [`Connection`] actor.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::connection::{BrokerContext, Connection};
use super::protocol::{ClientEvent, ServerEvent};
use crate::config::WebSocketConfig;

/// Serve one broker connection until the client leaves, goes silent for two
/// ping periods, or the server shuts down.
pub async fn handle_broker_ws(
    socket: WebSocket,
    ctx: Arc<BrokerContext>,
    origin: String,
    config: WebSocketConfig,
    shutdown: CancellationToken,
) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, origin = %origin, "New broker WebSocket connection");
    ctx.metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(config.send_channel_capacity);

    let mut ping = config.ping_interval.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    // Task to send messages to WebSocket
    let mut sender_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    let json = match serde_json::to_string(&event) {
                        Ok(j) => j,
                        Err(e) => {
                            error!("Failed to serialize event: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                _ = next_tick(&mut ping) => {
                    if ws_sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut connection = Connection::new(conn_id, origin, tx, ctx.clone());
    let idle_timeout = config.ping_interval.map(|period| period * 2);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(conn_id = %conn_id, "Server shutting down, closing connection");
                break;
            }
            _ = &mut sender_task => {
                debug!(conn_id = %conn_id, "Sender task ended");
                break;
            }
            _ = idle(idle_timeout, last_seen) => {
                info!(conn_id = %conn_id, "No traffic from client, closing connection");
                break;
            }
            frame = ws_receiver.next() => {
                let Some(frame) = frame else { break };
                last_seen = Instant::now();
                match frame {
                    Ok(Message::Text(text)) => match ClientEvent::parse(text.as_str()) {
                        // Presenter initiation waits on image encoding; shutdown
                        // must not wait behind it.
                        Some(event) => tokio::select! {
                            _ = connection.handle(event) => {}
                            _ = shutdown.cancelled() => {
                                debug!(conn_id = %conn_id, "Server shutting down mid-event, closing connection");
                                break;
                            }
                        },
                        None => debug!(conn_id = %conn_id, "Ignoring unparseable frame"),
                    },
                    Ok(Message::Close(_)) => {
                        debug!(conn_id = %conn_id, "Client closed connection");
                        break;
                    }
                    // Pongs only refresh liveness
                    Ok(_) => {}
                    Err(e) => {
                        error!(conn_id = %conn_id, "WebSocket error: {}", e);
                        ctx.metrics.websocket_error();
                        break;
                    }
                }
            }
        }
    }

    let role = connection.role().name();
    connection.close().await;
    sender_task.abort();
    ctx.metrics.connection_closed();
    info!(conn_id = %conn_id, role, "Broker WebSocket connection closed");
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn idle(timeout: Option<Duration>, last_seen: Instant) {
    match timeout {
        Some(timeout) => tokio::time::sleep_until(last_seen + timeout).await,
        None => std::future::pending().await,
    }
}
