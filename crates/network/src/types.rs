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

//! Callback types for realtime channel consumers.

use std::{fmt::Debug, sync::Arc};

use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use crate::{error::RealtimeError, messages::InboundMessage, mode::ChannelState};

/// Function type for handling decoded inbound envelopes.
pub type MessageHandler = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

/// Function type for handling connect and transport errors.
pub type ErrorHandler = Arc<dyn Fn(&RealtimeError) + Send + Sync>;

/// Function type for observing connection state transitions.
pub type StateHandler = Arc<dyn Fn(ChannelState) + Send + Sync>;

/// The callbacks registered when opening a channel.
#[derive(Clone, Default)]
pub struct ChannelHandlers {
    /// Receives every decoded envelope, as the first consumer of the channel.
    pub on_message: Option<MessageHandler>,
    /// Receives connect and transport errors.
    pub on_error: Option<ErrorHandler>,
    /// Receives every state transition.
    pub on_state: Option<StateHandler>,
}

impl ChannelHandlers {
    #[must_use]
    pub fn new(on_message: MessageHandler) -> Self {
        Self {
            on_message: Some(on_message),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_error_handler(mut self, on_error: ErrorHandler) -> Self {
        self.on_error = Some(on_error);
        self
    }

    #[must_use]
    pub fn with_state_handler(mut self, on_state: StateHandler) -> Self {
        self.on_state = Some(on_state);
        self
    }
}

impl Debug for ChannelHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(ChannelHandlers))
            .field("on_message", &self.on_message.as_ref().map(|_| "<function>"))
            .field("on_error", &self.on_error.as_ref().map(|_| "<function>"))
            .field("on_state", &self.on_state.as_ref().map(|_| "<function>"))
            .finish()
    }
}

/// Creates a channel-based message handler.
///
/// Returns a tuple containing the message handler and a receiver for envelopes.
#[must_use]
pub fn channel_message_handler() -> (MessageHandler, UnboundedReceiver<InboundMessage>) {
    let (tx, rx) = unbounded_channel();
    let handler = Arc::new(move |msg: &InboundMessage| {
        if let Err(e) = tx.send(msg.clone()) {
            tracing::debug!("Failed to send message to channel: {e}");
        }
    });
    (handler, rx)
}

/// Creates a channel-based error handler.
#[must_use]
pub fn channel_error_handler() -> (ErrorHandler, UnboundedReceiver<RealtimeError>) {
    let (tx, rx) = unbounded_channel();
    let handler = Arc::new(move |error: &RealtimeError| {
        if let Err(e) = tx.send(error.clone()) {
            tracing::debug!("Failed to send error to channel: {e}");
        }
    });
    (handler, rx)
}

/// Creates a channel-based state handler.
#[must_use]
pub fn channel_state_handler() -> (StateHandler, UnboundedReceiver<ChannelState>) {
    let (tx, rx) = unbounded_channel();
    let handler = Arc::new(move |state: ChannelState| {
        if let Err(e) = tx.send(state) {
            tracing::debug!("Failed to send state to channel: {e}");
        }
    });
    (handler, rx)
}
