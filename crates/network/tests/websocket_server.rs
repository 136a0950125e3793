// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Integration tests for the realtime channel against a local Axum WebSocket server.
//!
//! The server mimics the monitoring backend: it greets with `connected`, acknowledges
//! `subscribe`/`unsubscribe`, answers `ping` with `pong`, and pushes an `alert` after each
//! subscription. The first connection is closed by the server to exercise reconnects.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures_util::StreamExt;
use owlrd_common::testing::wait_until_async;
use owlrd_network::{
    ChannelState, InboundMessage, MessageKind, RealtimeChannel, RealtimeConfig, RealtimeError,
    transport::TungsteniteTransport,
    types::{ChannelHandlers, channel_error_handler, channel_message_handler},
};
use rstest::rstest;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc::UnboundedReceiver};
use ustr::Ustr;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Default)]
struct ServerState {
    connections: Arc<AtomicUsize>,
    tenants: Arc<Mutex<Vec<String>>>,
    subscribes: Arc<Mutex<Vec<String>>>,
}

async fn handle_ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<ServerState>,
) -> Response {
    let tenant = params.get("tenant_id").cloned().unwrap_or_default();
    ws.on_upgrade(move |socket| handle_ws(socket, tenant, state))
}

async fn send_json(socket: &mut WebSocket, value: Value) -> bool {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .is_ok()
}

async fn handle_ws(mut socket: WebSocket, tenant: String, state: ServerState) {
    let connection = state.connections.fetch_add(1, Ordering::SeqCst) + 1;
    state.tenants.lock().await.push(tenant.clone());

    let greeting = json!({
        "type": "connected",
        "message": format!("Connected to tenant {tenant}"),
        "timestamp": "2025-06-01T12:00:00.000000",
    });
    if !send_json(&mut socket, greeting).await {
        return;
    }

    while let Some(Ok(message)) = socket.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let payload: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) => continue,
        };
        let topic = payload.get("topic").cloned().unwrap_or(Value::Null);

        match payload.get("type").and_then(Value::as_str) {
            Some("subscribe") => {
                state
                    .subscribes
                    .lock()
                    .await
                    .push(topic.as_str().unwrap_or_default().to_string());

                let ack = json!({"type": "subscribed", "topic": topic});
                let alert = json!({
                    "type": "alert",
                    "data": {"alert_id": format!("a{connection}"), "severity": "high"},
                    "timestamp": "2025-06-01T12:00:01.000000",
                });
                if !send_json(&mut socket, ack).await || !send_json(&mut socket, alert).await {
                    break;
                }

                if connection == 1 {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
            Some("unsubscribe") => {
                let ack = json!({"type": "unsubscribed", "topic": topic});
                if !send_json(&mut socket, ack).await {
                    break;
                }
            }
            Some("ping") => {
                let pong = json!({"type": "pong", "timestamp": "2025-06-01T12:00:02.000000"});
                if !send_json(&mut socket, pong).await {
                    break;
                }
            }
            _ => {}
        }
    }
}

async fn start_ws_server(state: ServerState) -> SocketAddr {
    let router = Router::new()
        .route("/api/v1/realtime/ws", get(handle_ws_upgrade))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind ws listener");
    let addr = listener.local_addr().expect("missing local addr");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("websocket server failed");
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

fn test_config(addr: SocketAddr) -> RealtimeConfig {
    RealtimeConfig {
        reconnect_interval_ms: 100,
        heartbeat_interval_secs: None,
        ..RealtimeConfig::new(format!("ws://{addr}/api/v1/realtime/ws"))
            .with_tenant("tenant-7")
            .with_topics(["alerts"])
    }
}

async fn next_of_kind(
    rx: &mut UnboundedReceiver<InboundMessage>,
    kind: MessageKind,
) -> InboundMessage {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for message")
            .expect("message channel closed");
        if msg.kind() == kind {
            return msg;
        }
    }
}

#[rstest]
#[tokio::test]
async fn test_reconnects_and_resubscribes_against_server() {
    let state = ServerState::default();
    let addr = start_ws_server(state.clone()).await;
    let (handler, mut rx) = channel_message_handler();

    let channel = RealtimeChannel::open(
        test_config(addr),
        ChannelHandlers::new(handler),
        TungsteniteTransport::new(),
    )
    .unwrap();

    let greeting = next_of_kind(&mut rx, MessageKind::Connected).await;
    assert_eq!(greeting.message.as_deref(), Some("Connected to tenant tenant-7"));
    assert!(greeting.timestamp().is_some());

    let first = next_of_kind(&mut rx, MessageKind::Alert).await;
    assert_eq!(first.data, Some(json!({"alert_id": "a1", "severity": "high"})));

    let second = next_of_kind(&mut rx, MessageKind::Alert).await;
    assert_eq!(second.data, Some(json!({"alert_id": "a2", "severity": "high"})));

    let channel_ref = &channel;
    wait_until_async(
        || async move { channel_ref.confirmed_topics() == vec![Ustr::from("alerts")] },
        RECV_TIMEOUT,
    )
    .await;

    assert_eq!(state.connections.load(Ordering::SeqCst), 2);
    assert_eq!(*state.tenants.lock().await, vec!["tenant-7", "tenant-7"]);
    assert_eq!(*state.subscribes.lock().await, vec!["alerts", "alerts"]);

    channel.ping().unwrap();
    let pong = next_of_kind(&mut rx, MessageKind::Pong).await;
    assert!(pong.timestamp().is_some());

    assert!(channel.unsubscribe("alerts"));
    let ack = next_of_kind(&mut rx, MessageKind::Unsubscribed).await;
    assert_eq!(ack.topic.as_deref(), Some("alerts"));

    channel.close().await;
    assert_eq!(channel.state(), ChannelState::Disconnected);
}

#[rstest]
#[tokio::test]
async fn test_connect_failures_are_reported_and_retried() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (error_handler, mut errors) = channel_error_handler();
    let channel = RealtimeChannel::open(
        test_config(addr),
        ChannelHandlers::default().with_error_handler(error_handler),
        TungsteniteTransport::new(),
    )
    .unwrap();

    for _ in 0..2 {
        let error = tokio::time::timeout(RECV_TIMEOUT, errors.recv())
            .await
            .expect("timed out waiting for error")
            .expect("error channel closed");
        assert!(matches!(error, RealtimeError::Connect(_)), "{error:?}");
    }
    assert!(!channel.is_connected());

    channel.close().await;
    assert!(channel.is_closed());
}
