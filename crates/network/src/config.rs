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

//! Configuration for realtime channels.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    backoff::ReconnectBackoff,
    endpoint::{DEFAULT_REALTIME_URL, RealtimeEndpoint},
    error::RealtimeError,
};

/// Configuration for [`crate::channel::RealtimeChannel`] instances.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// The base endpoint URL (`ws` or `wss`).
    pub url: String,
    /// The tenant whose event stream to join, appended to the URL as `tenant_id`.
    pub tenant_id: Option<String>,
    /// The topics to subscribe to once connected.
    pub topics: Vec<String>,
    /// Extra headers sent with the connection handshake.
    pub headers: Vec<(String, String)>,
    /// If the channel reconnects after the connection drops.
    pub auto_reconnect: bool,
    /// The delay (milliseconds) before a reconnect attempt.
    pub reconnect_interval_ms: u64,
    /// The maximum reconnect delay (milliseconds) when the delay grows.
    pub reconnect_delay_max_ms: u64,
    /// The factor applied to the reconnect delay after each attempt (`1.0` keeps it constant).
    pub reconnect_backoff_factor: f64,
    /// The maximum random jitter (milliseconds) added to reconnect delays.
    pub reconnect_jitter_ms: u64,
    /// If the first reconnect after a successful connection happens without delay.
    pub reconnect_immediate_first: bool,
    /// The optional timeout (milliseconds) for a single connection attempt.
    pub connect_timeout_ms: Option<u64>,
    /// The optional interval (seconds) between heartbeat pings while connected.
    pub heartbeat_interval_secs: Option<u64>,
    /// The time (milliseconds) `close` waits for the driver task before aborting it.
    pub close_timeout_ms: u64,
}

impl Default for RealtimeConfig {
    /// Creates a new default [`RealtimeConfig`] instance.
    fn default() -> Self {
        Self {
            url: DEFAULT_REALTIME_URL.to_string(),
            tenant_id: None,
            topics: Vec::new(),
            headers: Vec::new(),
            auto_reconnect: true,
            reconnect_interval_ms: 5_000,
            reconnect_delay_max_ms: 30_000,
            reconnect_backoff_factor: 1.0,
            reconnect_jitter_ms: 0,
            reconnect_immediate_first: false,
            connect_timeout_ms: None,
            heartbeat_interval_secs: Some(30),
            close_timeout_ms: 2_000,
        }
    }
}

impl RealtimeConfig {
    /// Creates a default config for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the endpoint to connect to.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidEndpoint`] if the URL or tenant is invalid.
    pub fn endpoint(&self) -> Result<RealtimeEndpoint, RealtimeError> {
        match &self.tenant_id {
            Some(tenant_id) => RealtimeEndpoint::for_tenant(&self.url, tenant_id),
            None => RealtimeEndpoint::parse(&self.url),
        }
    }

    /// Returns the reconnect backoff described by this config.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidConfig`] if the backoff parameters are inconsistent.
    pub fn backoff(&self) -> Result<ReconnectBackoff, RealtimeError> {
        ReconnectBackoff::new(
            Duration::from_millis(self.reconnect_interval_ms),
            Duration::from_millis(self.reconnect_delay_max_ms.max(self.reconnect_interval_ms)),
            self.reconnect_backoff_factor,
            self.reconnect_jitter_ms,
            self.reconnect_immediate_first,
        )
        .map_err(|e| RealtimeError::InvalidConfig(e.to_string()))
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Returns the heartbeat interval, `None` when disabled or zero.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    #[must_use]
    pub const fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// Validates the config, returning the endpoint to connect to.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or backoff parameters are invalid.
    pub fn validate(&self) -> Result<RealtimeEndpoint, RealtimeError> {
        let endpoint = self.endpoint()?;
        self.backoff()?;
        Ok(endpoint)
    }
}
