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

//! Realtime synchronization machinery for the OwlRD monitoring dashboard.
//!
//! The `owlrd-network` crate provides [`RealtimeChannel`], a persistent WebSocket client which
//! reconnects on failure, re-subscribes its desired topics after every reconnect, and fans
//! pushed envelopes out to any number of consumers. Consumers typically route on the envelope
//! `type` to invalidate cached queries (see [`invalidation`]).
//!
//! # Modules
//!
//! - `channel`: the channel handle and its driver task.
//! - `config`: `serde` configuration for channels.
//! - `endpoint`: tenant-scoped endpoint URLs.
//! - `messages`: inbound envelopes and outbound commands.
//! - `subscription`: desired and wire topic tracking.
//! - `transport`: the connection seam, with the `tokio-tungstenite` implementation.
//! - `testing`: an in-memory transport for tests.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod backoff;
pub mod channel;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod fanout;
pub mod invalidation;
pub mod messages;
pub mod mode;
pub mod subscription;
pub mod testing;
pub mod tls;
pub mod transport;
pub mod types;

pub use crate::{
    channel::{RealtimeChannel, WeakRealtimeChannel},
    config::RealtimeConfig,
    error::RealtimeError,
    messages::{InboundMessage, MessageKind, OutboundCommand},
    mode::ChannelState,
};
