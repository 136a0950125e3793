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

//! An in-memory transport for exercising realtime channels without a network.
//!
//! [`MockTransport::new`] returns the transport to hand to
//! [`crate::channel::RealtimeChannel::open`] together with a [`MockPeers`] receiver. Each
//! successful connect yields a [`MockPeer`], the server side of that connection, through which a
//! test pushes frames, reads what the channel sent, and drops the link.

use std::{
    fmt::Debug,
    future::Future,
    io,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::{
    FutureExt, SinkExt, StreamExt,
    channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded},
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::transport::{Transport, TransportLink};

/// How long [`MockPeers::next`] and [`MockPeer::next_sent`] wait before giving up.
pub const MOCK_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct MockTransportInner {
    attempts: AtomicUsize,
    fail_remaining: AtomicUsize,
    connect_delay_ms: AtomicU64,
    urls: Mutex<Vec<String>>,
    headers: Mutex<Vec<(String, String)>>,
    peer_tx: mpsc::UnboundedSender<MockPeer>,
}

/// A scripted [`Transport`] which connects to in-memory peers.
#[derive(Clone, Debug)]
pub struct MockTransport {
    inner: Arc<MockTransportInner>,
}

impl MockTransport {
    /// Creates a new [`MockTransport`] and the receiver of its accepted peers.
    #[must_use]
    pub fn new() -> (Self, MockPeers) {
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let transport = Self {
            inner: Arc::new(MockTransportInner {
                attempts: AtomicUsize::new(0),
                fail_remaining: AtomicUsize::new(0),
                connect_delay_ms: AtomicU64::new(0),
                urls: Mutex::new(Vec::new()),
                headers: Mutex::new(Vec::new()),
                peer_tx,
            }),
        };
        (transport, MockPeers { rx: peer_rx })
    }

    /// Makes the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        self.inner.fail_remaining.store(count, Ordering::SeqCst);
    }

    /// Delays every subsequent connection attempt by `delay`.
    pub fn set_connect_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.inner.connect_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Returns the number of connection attempts so far, failed ones included.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Returns the URL of every connection attempt, in order.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.inner
            .urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the handshake headers of the most recent connection attempt.
    #[must_use]
    pub fn last_headers(&self) -> Vec<(String, String)> {
        self.inner
            .headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for MockTransport {
    fn connect(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<TransportLink, tungstenite::Error>> + Send {
        let inner = self.inner.clone();
        let url = url.to_string();
        let headers = headers.to_vec();

        async move {
            let attempt = inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            inner
                .urls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(url);
            *inner.headers.lock().unwrap_or_else(PoisonError::into_inner) = headers;

            let delay_ms = inner.connect_delay_ms.load(Ordering::SeqCst);
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let fail = inner
                .fail_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if fail {
                return Err(tungstenite::Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "mock connection refused",
                )));
            }

            let (client_tx, server_rx) = unbounded::<Message>();
            let (server_tx, client_rx) = unbounded::<Result<Message, tungstenite::Error>>();

            let peer = MockPeer {
                attempt,
                incoming: server_tx,
                outgoing: server_rx,
            };
            if inner.peer_tx.send(peer).is_err() {
                tracing::debug!("No receiver for mock peer {attempt}");
            }

            let writer = client_tx.sink_map_err(|_| tungstenite::Error::ConnectionClosed);
            Ok(TransportLink::new(writer, client_rx))
        }
    }
}

/// Receives the server side of every connection a [`MockTransport`] accepts.
#[derive(Debug)]
pub struct MockPeers {
    rx: mpsc::UnboundedReceiver<MockPeer>,
}

impl MockPeers {
    /// Waits for the next accepted connection, up to [`MOCK_WAIT_TIMEOUT`].
    pub async fn next(&mut self) -> Option<MockPeer> {
        tokio::time::timeout(MOCK_WAIT_TIMEOUT, self.rx.recv())
            .await
            .ok()
            .flatten()
    }
}

/// The server side of one mock connection.
pub struct MockPeer {
    attempt: usize,
    incoming: UnboundedSender<Result<Message, tungstenite::Error>>,
    outgoing: UnboundedReceiver<Message>,
}

impl Debug for MockPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(MockPeer))
            .field("attempt", &self.attempt)
            .field("open", &!self.incoming.is_closed())
            .finish()
    }
}

impl MockPeer {
    /// Returns the connection attempt number (starting at 1) which produced this peer.
    #[must_use]
    pub const fn attempt(&self) -> usize {
        self.attempt
    }

    /// Pushes a frame to the channel. Returns `false` if the channel side is gone.
    pub fn push_message(&self, message: Message) -> bool {
        self.incoming.unbounded_send(Ok(message)).is_ok()
    }

    /// Pushes a text frame to the channel.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.push_message(Message::Text(text.into().into()))
    }

    /// Pushes a JSON text frame to the channel.
    pub fn push_json(&self, value: &Value) -> bool {
        self.push_text(value.to_string())
    }

    /// Fails the connection with `error`.
    pub fn push_error(&self, error: tungstenite::Error) -> bool {
        self.incoming.unbounded_send(Err(error)).is_ok()
    }

    /// Ends the channel's read stream, as if the server dropped the connection.
    pub fn close(&self) {
        self.incoming.close_channel();
    }

    /// Waits for the next frame the channel sent, up to [`MOCK_WAIT_TIMEOUT`].
    ///
    /// Returns `None` on timeout or once the channel closed its side.
    pub async fn next_sent(&mut self) -> Option<Message> {
        tokio::time::timeout(MOCK_WAIT_TIMEOUT, self.outgoing.next())
            .await
            .ok()
            .flatten()
    }

    /// Waits for the next text frame the channel sent and decodes it as JSON.
    pub async fn next_sent_json(&mut self) -> Option<Value> {
        loop {
            match self.next_sent().await? {
                Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
                other => tracing::trace!("Skipping non-text frame {other:?}"),
            }
        }
    }

    /// Returns every frame sent so far without waiting.
    pub fn drain_sent(&mut self) -> Vec<Message> {
        let mut sent = Vec::new();
        while let Some(Some(message)) = self.outgoing.next().now_or_never() {
            sent.push(message);
        }
        sent
    }

    /// Returns every JSON text frame sent so far without waiting.
    pub fn drain_sent_json(&mut self) -> Vec<Value> {
        self.drain_sent()
            .into_iter()
            .filter_map(|message| match message {
                Message::Text(text) => serde_json::from_str(text.as_str()).ok(),
                _ => None,
            })
            .collect()
    }

    /// Returns true once the channel closed its side of the connection.
    ///
    /// Frames still pending are discarded.
    pub fn is_closed_by_client(&mut self) -> bool {
        loop {
            match self.outgoing.next().now_or_never() {
                Some(Some(_)) => {}
                Some(None) => return true,
                None => return false,
            }
        }
    }
}
