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

//! Error types produced by the realtime channel.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// A typed error enumeration for the realtime channel.
///
/// Errors are `Clone` so the driver can hand the same error to every error callback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RealtimeError {
    /// The endpoint URL or tenant identifier is not usable.
    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    /// The transport could not establish a connection.
    #[error("Connect error: {0}")]
    Connect(String),
    /// An established connection failed.
    #[error("Transport error: {0}")]
    Transport(String),
    /// An inbound frame was not a JSON object with a string `type` field.
    #[error("Malformed message: {0}")]
    Malformed(String),
    #[error("Not connected")]
    NotConnected,
    /// Failure during JSON serialization of an outbound command.
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    /// No tokio runtime was available to spawn the driver task.
    #[error("Runtime error: {0}")]
    Runtime(String),
    /// The channel was closed.
    #[error("Channel closed")]
    Closed,
}

impl RealtimeError {
    pub(crate) fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<tungstenite::Error> for RealtimeError {
    fn from(error: tungstenite::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for RealtimeError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
