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

//! The realtime channel: one resilient connection to a tenant's event stream.
//!
//! A [`RealtimeChannel`] is a cheap, cloneable handle onto a single driver task. The driver owns
//! the transport link and the reconnect timer and walks an explicit state machine:
//!
//! - `Disconnected` -> `Connecting` when the channel opens or the reconnect timer fires.
//! - `Connecting` -> `Connected` on a successful handshake, after which every desired topic is
//!   subscribed again.
//! - `Connecting`/`Connected` -> `Disconnected` on failure, scheduling exactly one reconnect
//!   attempt unless the channel was closed or reconnecting is disabled.
//!
//! Inbound envelopes are delivered from the driver task in arrival order, so consumer callbacks
//! for one channel never run concurrently. After [`RealtimeChannel::close`] returns, no callback
//! runs again.

use std::{
    fmt::Debug,
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use owlrd_common::logging::{
    RECV, SEND, log_task_aborted, log_task_awaiting, log_task_error, log_task_started,
    log_task_stopped,
};
use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        watch,
    },
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior},
};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use ustr::Ustr;

use crate::{
    backoff::ReconnectBackoff,
    config::RealtimeConfig,
    endpoint::RealtimeEndpoint,
    error::RealtimeError,
    fanout::{ConsumerId, ConsumerRegistry},
    messages::{InboundMessage, MessageKind, OutboundCommand},
    mode::ChannelState,
    subscription::SubscriptionState,
    transport::{FrameSink, Transport, TransportLink},
    types::{ChannelHandlers, ErrorHandler, MessageHandler, StateHandler},
};

const DRIVER_TASK: &str = "realtime-driver";

/// A command from a channel handle to its driver task.
#[derive(Debug)]
enum ChannelCommand {
    /// Write a text frame, if the connection it was accepted on is still live.
    Send { text: String, epoch: u64 },
    /// Bring the wire subscription for a topic in line with the desired set.
    SyncTopic(Ustr),
}

/// State shared between the channel handles and the driver task.
struct ChannelShared {
    state: AtomicU8,
    state_tx: watch::Sender<ChannelState>,
    tracker: SubscriptionState,
    consumers: ConsumerRegistry,
    on_error: Option<ErrorHandler>,
    on_state: Option<StateHandler>,
    last_message: Mutex<Option<InboundMessage>>,
    reconnect_pending: AtomicBool,
    /// Incremented on every successful connection.
    epoch: AtomicU64,
    stopped: watch::Sender<bool>,
    cancel: CancellationToken,
}

impl ChannelShared {
    fn state(&self) -> ChannelState {
        ChannelState::from_atomic(&self.state)
    }

    fn set_state(&self, state: ChannelState) {
        let previous = ChannelState::from_u8(self.state.swap(state.as_u8(), Ordering::SeqCst));
        if previous == state {
            return;
        }

        self.state_tx.send_replace(state);
        tracing::debug!("Channel state {previous} -> {state}");

        if self.cancel.is_cancelled() {
            return;
        }
        if let Some(handler) = &self.on_state {
            handler(state);
        }
    }

    fn emit_error(&self, error: &RealtimeError) {
        if self.cancel.is_cancelled() {
            return;
        }
        tracing::warn!("{error}");
        if let Some(handler) = &self.on_error {
            handler(error);
        }
    }

    fn deliver(&self, msg: InboundMessage) {
        if self.cancel.is_cancelled() {
            return;
        }
        *self
            .last_message
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(msg.clone());
        self.consumers.dispatch(&msg);
    }

    fn handle_text(&self, text: &str) {
        tracing::trace!("{RECV} {text}");

        let msg = match InboundMessage::from_json(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("Dropping message: {e}");
                return;
            }
        };

        match msg.kind() {
            MessageKind::Subscribed => {
                if let Some(topic) = &msg.topic {
                    self.tracker.confirm_subscribe(topic);
                }
            }
            MessageKind::Unsubscribed => {
                if let Some(topic) = &msg.topic {
                    self.tracker.confirm_unsubscribe(topic);
                }
            }
            MessageKind::Error => {
                tracing::warn!(
                    "Server reported error: {}",
                    msg.message.as_deref().unwrap_or("<no message>")
                );
            }
            MessageKind::Unknown => {
                tracing::debug!("Received message with unknown type '{}'", msg.msg_type);
            }
            _ => {}
        }

        self.deliver(msg);
    }
}

/// The single pending reconnect attempt of a channel.
#[derive(Debug, Default)]
struct ReconnectTimer {
    deadline: Option<Instant>,
}

impl ReconnectTimer {
    /// Schedules a reconnect after `delay`.
    ///
    /// Returns `false`, leaving the existing deadline untouched, if one is already pending.
    fn schedule(&mut self, delay: Duration) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(Instant::now() + delay);
        true
    }

    const fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Waits for the pending deadline and clears it. Returns immediately if none is pending.
    async fn wait(&mut self) {
        if let Some(deadline) = self.deadline {
            tokio::time::sleep_until(deadline).await;
        }
        self.deadline = None;
    }
}

/// How a connected session ended.
enum SessionEnd {
    Cancelled,
    Disconnected(Option<RealtimeError>),
}

/// The task which owns the transport link and the reconnect timer of one channel.
struct ChannelDriver<T: Transport> {
    shared: Arc<ChannelShared>,
    transport: T,
    url: String,
    headers: Vec<(String, String)>,
    cmd_rx: UnboundedReceiver<ChannelCommand>,
    backoff: ReconnectBackoff,
    reconnect_timer: ReconnectTimer,
    auto_reconnect: bool,
    connect_timeout: Option<Duration>,
    heartbeat: Option<Duration>,
}

impl<T: Transport> ChannelDriver<T> {
    async fn run(mut self) {
        log_task_started(DRIVER_TASK);

        while !self.shared.cancel.is_cancelled() {
            self.shared.set_state(ChannelState::Connecting);

            let error = match self.connect().await {
                Ok(None) => break,
                Ok(Some(link)) => {
                    tracing::info!("Connected to {}", self.url);
                    self.backoff.reset();
                    let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
                    self.shared.set_state(ChannelState::Connected);

                    let end = self.run_session(link, epoch).await;
                    self.shared.tracker.reset_connection();

                    match end {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Disconnected(error) => error,
                    }
                }
                Err(e) => Some(e),
            };

            self.shared.set_state(ChannelState::Disconnected);
            if let Some(error) = error {
                self.shared.emit_error(&error);
            }

            if !self.auto_reconnect {
                tracing::info!("Disconnected from {}, reconnect disabled", self.url);
                break;
            }

            let delay = self.backoff.next_duration();
            if !self.wait_reconnect(delay).await {
                break;
            }
        }

        self.reconnect_timer.cancel();
        self.shared.reconnect_pending.store(false, Ordering::SeqCst);
        self.shared.tracker.reset_connection();
        self.shared.set_state(ChannelState::Disconnected);
        self.shared.stopped.send_replace(true);

        log_task_stopped(DRIVER_TASK);
    }

    /// Attempts one connection. Returns `Ok(None)` if the channel was closed meanwhile.
    async fn connect(&self) -> Result<Option<TransportLink>, RealtimeError> {
        tracing::debug!("Connecting to {}", self.url);

        let attempt = async {
            let connect = self.transport.connect(&self.url, &self.headers);
            match self.connect_timeout {
                Some(timeout) => tokio::time::timeout(timeout, connect)
                    .await
                    .map_err(|_| {
                        RealtimeError::Timeout(format!("connecting to {} after {timeout:?}", self.url))
                    })?
                    .map_err(|e| RealtimeError::Connect(e.to_string())),
                None => connect
                    .await
                    .map_err(|e| RealtimeError::Connect(e.to_string())),
            }
        };

        tokio::select! {
            biased;
            () = self.shared.cancel.cancelled() => Ok(None),
            result = attempt => result.map(Some),
        }
    }

    /// Waits out the reconnect delay, dropping commands which need a connection.
    ///
    /// Returns `false` if the channel was closed while waiting.
    async fn wait_reconnect(&mut self, delay: Duration) -> bool {
        if !self.reconnect_timer.schedule(delay) {
            tracing::warn!("Reconnect already pending, not scheduling another");
        }
        self.shared.reconnect_pending.store(true, Ordering::SeqCst);
        tracing::info!("Reconnecting to {} in {delay:?}", self.url);

        let cancel = self.shared.cancel.clone();
        let fired = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break false,
                () = self.reconnect_timer.wait() => break true,
                Some(cmd) = self.cmd_rx.recv() => drop_disconnected_command(cmd),
            }
        };

        if !fired {
            self.reconnect_timer.cancel();
        }
        self.shared.reconnect_pending.store(false, Ordering::SeqCst);
        fired
    }

    async fn run_session(&mut self, link: TransportLink, epoch: u64) -> SessionEnd {
        let TransportLink {
            mut writer,
            mut reader,
        } = link;
        let shared = self.shared.clone();

        for topic in shared.tracker.replay_topics() {
            if let Err(e) = subscribe_topic(&shared.tracker, &mut writer, topic).await {
                return SessionEnd::Disconnected(Some(e));
            }
        }

        let mut heartbeat = self.heartbeat.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                biased;
                () = shared.cancel.cancelled() => {
                    tracing::debug!("Closing connection to {}", self.url);
                    if let Err(e) = writer.close().await {
                        tracing::debug!("Error closing connection: {e}");
                    }
                    return SessionEnd::Cancelled;
                }
                frame = reader.next() => match frame {
                    Some(Ok(Message::Text(text))) => shared.handle_text(text.as_str()),
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => shared.handle_text(text),
                        Err(e) => tracing::warn!("Dropping non UTF-8 binary message: {e}"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!("Received close frame: {frame:?}");
                        return SessionEnd::Disconnected(None);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Disconnected(Some(e.into())),
                    None => {
                        tracing::debug!("Stream from {} ended", self.url);
                        return SessionEnd::Disconnected(None);
                    }
                },
                Some(cmd) = self.cmd_rx.recv() => {
                    if let Err(e) = apply_command(&shared.tracker, &mut writer, cmd, epoch).await {
                        return SessionEnd::Disconnected(Some(e));
                    }
                }
                () = next_heartbeat(heartbeat.as_mut()) => {
                    tracing::trace!("Sending heartbeat ping");
                    if let Err(e) = write_command(&mut writer, &OutboundCommand::Ping).await {
                        return SessionEnd::Disconnected(Some(e));
                    }
                }
            }
        }
    }
}

async fn next_heartbeat(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn drop_disconnected_command(cmd: ChannelCommand) {
    match cmd {
        ChannelCommand::Send { text, .. } => {
            tracing::warn!("Not connected, dropping message: {text}");
        }
        // Replayed from the desired set on the next connection
        ChannelCommand::SyncTopic(_) => {}
    }
}

async fn apply_command(
    tracker: &SubscriptionState,
    writer: &mut FrameSink,
    cmd: ChannelCommand,
    epoch: u64,
) -> Result<(), RealtimeError> {
    match cmd {
        ChannelCommand::Send {
            text,
            epoch: sent_epoch,
        } => {
            if sent_epoch != epoch {
                tracing::warn!("Dropping message accepted on a previous connection: {text}");
                return Ok(());
            }
            write_text(writer, text).await
        }
        ChannelCommand::SyncTopic(topic) => {
            if tracker.needs_subscribe(&topic) {
                subscribe_topic(tracker, writer, topic).await
            } else if tracker.needs_unsubscribe(&topic) {
                write_command(writer, &OutboundCommand::Unsubscribe { topic }).await?;
                tracker.mark_unsubscribe(&topic);
                Ok(())
            } else {
                Ok(())
            }
        }
    }
}

async fn subscribe_topic(
    tracker: &SubscriptionState,
    writer: &mut FrameSink,
    topic: Ustr,
) -> Result<(), RealtimeError> {
    write_command(writer, &OutboundCommand::Subscribe { topic }).await?;
    tracker.mark_subscribe(&topic);
    Ok(())
}

async fn write_command(
    writer: &mut FrameSink,
    command: &OutboundCommand,
) -> Result<(), RealtimeError> {
    write_text(writer, command.to_json()?).await
}

async fn write_text(writer: &mut FrameSink, text: String) -> Result<(), RealtimeError> {
    tracing::trace!("{SEND} {text}");
    writer.send(Message::Text(text.into())).await?;
    Ok(())
}

struct ChannelInner {
    shared: Arc<ChannelShared>,
    cmd_tx: UnboundedSender<ChannelCommand>,
    task: Mutex<Option<JoinHandle<()>>>,
    endpoint: RealtimeEndpoint,
    close_timeout: Duration,
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        // Last handle gone, the driver stops on its own
        self.shared.cancel.cancel();
    }
}

/// A persistent, auto-reconnecting, topic-subscribing realtime channel.
///
/// Clones share the same connection. Dropping the last clone closes the channel without
/// waiting for the driver task. Consumers registered on the channel should hold a
/// [`WeakRealtimeChannel`] rather than a clone, otherwise the channel keeps itself alive
/// until [`RealtimeChannel::close`] is called.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

impl Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(RealtimeChannel))
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("state", &self.state())
            .field("desired_topics", &self.desired_topics())
            .field("consumers", &self.inner.shared.consumers.len())
            .finish()
    }
}

/// A handle which does not keep its [`RealtimeChannel`] open.
#[derive(Clone, Debug)]
pub struct WeakRealtimeChannel {
    inner: Weak<ChannelInner>,
}

impl WeakRealtimeChannel {
    /// Returns the channel if any strong handle to it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<RealtimeChannel> {
        self.inner.upgrade().map(|inner| RealtimeChannel { inner })
    }
}

impl RealtimeChannel {
    /// Opens a channel and begins connecting in the background.
    ///
    /// Returns immediately; connection progress is reported through `handlers` and
    /// [`RealtimeChannel::watch_state`]. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or reconnect settings in `config` are invalid, or if
    /// there is no tokio runtime to run the driver on.
    pub fn open<T: Transport>(
        config: RealtimeConfig,
        handlers: ChannelHandlers,
        transport: T,
    ) -> Result<Self, RealtimeError> {
        let endpoint = config.validate()?;
        let backoff = config.backoff()?;
        let runtime = Handle::try_current().map_err(|e| RealtimeError::Runtime(e.to_string()))?;

        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        let (stopped, _) = watch::channel(false);
        let shared = Arc::new(ChannelShared {
            state: AtomicU8::new(ChannelState::Disconnected.as_u8()),
            state_tx,
            tracker: SubscriptionState::new(&config.topics),
            consumers: ConsumerRegistry::new(),
            on_error: handlers.on_error,
            on_state: handlers.on_state,
            last_message: Mutex::new(None),
            reconnect_pending: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            stopped,
            cancel: CancellationToken::new(),
        });

        if let Some(handler) = handlers.on_message {
            shared.consumers.add(handler);
        }

        let close_timeout = config.close_timeout();
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let driver = ChannelDriver {
            shared: shared.clone(),
            transport,
            url: endpoint.as_str().to_string(),
            heartbeat: config.heartbeat_interval(),
            connect_timeout: config.connect_timeout(),
            headers: config.headers,
            cmd_rx,
            backoff,
            reconnect_timer: ReconnectTimer::default(),
            auto_reconnect: config.auto_reconnect,
        };

        tracing::debug!("Opening realtime channel to {endpoint}");
        let task = runtime.spawn(driver.run());

        Ok(Self {
            inner: Arc::new(ChannelInner {
                shared,
                cmd_tx,
                task: Mutex::new(Some(task)),
                endpoint,
                close_timeout,
            }),
        })
    }

    /// Returns a handle which can be captured by consumers without keeping the channel open.
    #[must_use]
    pub fn downgrade(&self) -> WeakRealtimeChannel {
        WeakRealtimeChannel {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns the endpoint this channel connects to.
    #[must_use]
    pub fn endpoint(&self) -> &RealtimeEndpoint {
        &self.inner.endpoint
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.inner.shared.state()
    }

    /// Returns true only while the channel is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Returns true once the channel was closed or its last handle dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.shared.cancel.is_cancelled()
    }

    /// Returns true while a reconnect attempt is scheduled.
    #[must_use]
    pub fn is_reconnect_pending(&self) -> bool {
        self.inner.shared.reconnect_pending.load(Ordering::SeqCst)
    }

    /// Returns a receiver which observes every state transition.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.shared.state_tx.subscribe()
    }

    /// Waits until the channel is connected.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Timeout`] if the channel does not connect within `timeout`.
    pub async fn wait_until_connected(&self, timeout: Duration) -> Result<(), RealtimeError> {
        let mut rx = self.watch_state();
        match tokio::time::timeout(timeout, rx.wait_for(ChannelState::is_connected)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(RealtimeError::Closed),
            Err(_) => Err(RealtimeError::Timeout(format!(
                "waiting for connection to {}",
                self.inner.endpoint
            ))),
        }
    }

    /// Adds `topic` to the desired set and subscribes if connected.
    ///
    /// Returns `false` without any wire traffic if the topic was already desired.
    pub fn subscribe(&self, topic: &str) -> bool {
        let shared = &self.inner.shared;
        if topic.is_empty() {
            tracing::warn!("Ignoring subscribe to empty topic");
            return false;
        }
        if !shared.tracker.add_desired(topic) {
            tracing::debug!("Topic '{topic}' already subscribed");
            return false;
        }
        self.sync_topic(topic);
        true
    }

    /// Removes `topic` from the desired set and unsubscribes if connected.
    ///
    /// Returns `false` without any wire traffic if the topic was not desired.
    pub fn unsubscribe(&self, topic: &str) -> bool {
        let shared = &self.inner.shared;
        if !shared.tracker.remove_desired(topic) {
            tracing::debug!("Topic '{topic}' not subscribed");
            return false;
        }
        self.sync_topic(topic);
        true
    }

    fn sync_topic(&self, topic: &str) {
        if let Err(e) = self
            .inner
            .cmd_tx
            .send(ChannelCommand::SyncTopic(Ustr::from(topic)))
        {
            tracing::debug!("Driver stopped, topic kept for bookkeeping only: {e}");
        }
    }

    /// Returns the desired topics in the order they were first requested.
    #[must_use]
    pub fn desired_topics(&self) -> Vec<Ustr> {
        self.inner.shared.tracker.desired_topics()
    }

    /// Returns the topics the server confirmed on the current connection.
    #[must_use]
    pub fn confirmed_topics(&self) -> Vec<Ustr> {
        self.inner.shared.tracker.confirmed_topics()
    }

    /// Sends a text frame if connected.
    ///
    /// Messages are never queued: outside `Connected` the message is dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::NotConnected`] if the channel is not connected.
    pub fn send(&self, text: impl Into<String>) -> Result<(), RealtimeError> {
        let text = text.into();
        // Read before the state so a reconnect in between drops the message
        let epoch = self.inner.shared.epoch.load(Ordering::SeqCst);
        if !self.is_connected() {
            tracing::warn!("Not connected, dropping message: {text}");
            return Err(RealtimeError::NotConnected);
        }

        self.inner
            .cmd_tx
            .send(ChannelCommand::Send { text, epoch })
            .map_err(|_| RealtimeError::Closed)
    }

    /// Encodes and sends a command if connected.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the channel is not connected.
    pub fn send_command(&self, command: &OutboundCommand) -> Result<(), RealtimeError> {
        self.send(command.to_json()?)
    }

    /// Sends a ping if connected.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::NotConnected`] if the channel is not connected.
    pub fn ping(&self) -> Result<(), RealtimeError> {
        self.send_command(&OutboundCommand::Ping)
    }

    /// Registers an additional message consumer on this channel.
    pub fn add_consumer(&self, handler: MessageHandler) -> ConsumerId {
        self.inner.shared.consumers.add(handler)
    }

    /// Removes a consumer, returning whether it was registered.
    pub fn remove_consumer(&self, id: ConsumerId) -> bool {
        self.inner.shared.consumers.remove(id)
    }

    /// Returns the most recently delivered envelope.
    #[must_use]
    pub fn last_message(&self) -> Option<InboundMessage> {
        self.inner
            .shared
            .last_message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Closes the channel.
    ///
    /// Cancels any pending reconnect and closes the live connection, then waits for the driver
    /// task to stop, aborting it after the configured close timeout. No callback runs after
    /// this returns, including when several handles close concurrently. Registered consumers
    /// are released.
    pub async fn close(&self) {
        let shared = &self.inner.shared;
        shared.cancel.cancel();

        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(mut task) = task {
            log_task_awaiting(DRIVER_TASK);
            match tokio::time::timeout(self.inner.close_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log_task_error(DRIVER_TASK, &anyhow::anyhow!(e)),
                Err(_) => {
                    task.abort();
                    let _ = task.await;
                    log_task_aborted(DRIVER_TASK);
                }
            }
            shared.stopped.send_replace(true);
        } else {
            // Another handle is closing, wait for its driver to stop
            let mut stopped = shared.stopped.subscribe();
            if stopped.wait_for(|stopped| *stopped).await.is_err() {
                tracing::debug!("Driver stop signal dropped");
            }
        }

        shared.consumers.clear();
        shared.reconnect_pending.store(false, Ordering::SeqCst);
        shared.set_state(ChannelState::Disconnected);
        tracing::debug!("Closed realtime channel to {}", self.inner.endpoint);
    }
}
