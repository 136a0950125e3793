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

//! Wire envelopes exchanged with the realtime endpoint.
//!
//! Inbound frames are JSON objects with a string `type` discriminator and optional `data`,
//! `message`, `topic` and `timestamp` fields. Outbound frames are the `subscribe`,
//! `unsubscribe` and `ping` commands.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use ustr::Ustr;

use crate::error::RealtimeError;

/// Naive ISO 8601 layout, as produced by the backend's `datetime.isoformat()`.
const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// The kinds of message the realtime endpoint is known to push.
#[derive(Clone, Copy, Debug, Display, Hash, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MessageKind {
    /// Greeting sent once a connection is accepted.
    Connected,
    /// Acknowledgement of a subscribe command.
    Subscribed,
    /// Acknowledgement of an unsubscribe command.
    Unsubscribed,
    /// Reply to a ping command.
    Pong,
    /// Server-side error report.
    Error,
    Alert,
    DeviceStatus,
    IotData,
    ResidentUpdate,
    /// Any type this client does not know about.
    Unknown,
}

impl MessageKind {
    /// Returns the kind for a wire `type` value, or [`MessageKind::Unknown`].
    #[must_use]
    pub fn from_type(msg_type: &str) -> Self {
        msg_type.parse().unwrap_or(Self::Unknown)
    }
}

/// An envelope pushed by the realtime endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: String,
    /// The type-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Human-readable text (on `connected` and `error` messages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The topic an acknowledgement refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl InboundMessage {
    /// Decodes an envelope from a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Malformed`] if `text` is not a JSON object with a string
    /// `type` field.
    pub fn from_json(text: &str) -> Result<Self, RealtimeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| RealtimeError::Malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(RealtimeError::Malformed(
                "expected a JSON object".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| RealtimeError::Malformed(e.to_string()))
    }

    #[must_use]
    pub fn kind(&self) -> MessageKind {
        MessageKind::from_type(&self.msg_type)
    }

    /// Parses the envelope timestamp.
    ///
    /// RFC 3339 timestamps are converted to UTC; naive timestamps are taken as UTC.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_deref()?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, NAIVE_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// A command sent to the realtime endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundCommand {
    Subscribe { topic: Ustr },
    Unsubscribe { topic: Ustr },
    Ping,
}

impl OutboundCommand {
    /// Encodes the command as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, RealtimeError> {
        Ok(serde_json::to_string(self)?)
    }
}
