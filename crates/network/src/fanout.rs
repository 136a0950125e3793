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

//! Fan-out of inbound envelopes to the consumers sharing one channel.

use std::{
    fmt::{Debug, Display},
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{messages::InboundMessage, types::MessageHandler};

/// Identifies a consumer registered with a channel.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl ConsumerId {
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// An ordered registry of message consumers.
///
/// Envelopes are delivered to consumers in registration order. Handlers are invoked outside
/// the registry lock, so a handler may add or remove consumers.
#[derive(Default)]
pub struct ConsumerRegistry {
    next_id: AtomicU64,
    consumers: Mutex<Vec<(ConsumerId, MessageHandler)>>,
}

impl ConsumerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn consumers(&self) -> MutexGuard<'_, Vec<(ConsumerId, MessageHandler)>> {
        self.consumers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `handler` and returns its identifier.
    pub fn add(&self, handler: MessageHandler) -> ConsumerId {
        let id = ConsumerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.consumers().push((id, handler));
        id
    }

    /// Removes the consumer `id`, returning whether it was registered.
    pub fn remove(&self, id: ConsumerId) -> bool {
        let mut consumers = self.consumers();
        let before = consumers.len();
        consumers.retain(|(existing, _)| *existing != id);
        consumers.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.consumers().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumers().is_empty()
    }

    pub fn clear(&self) {
        self.consumers().clear();
    }

    /// Delivers `msg` to every registered consumer.
    pub fn dispatch(&self, msg: &InboundMessage) {
        let snapshot: Vec<MessageHandler> = self
            .consumers()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in snapshot {
            handler(msg);
        }
    }
}

impl Debug for ConsumerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(ConsumerRegistry))
            .field("consumers", &self.len())
            .finish()
    }
}
