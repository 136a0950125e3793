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

//! Dispatch-by-type cache invalidation driven by pushed envelopes.
//!
//! Views cache query results keyed by name (`alerts`, `devices`, ...). When the server pushes
//! a change, the matching keys are invalidated so views refetch from the authoritative API.

use std::{fmt::Debug, sync::Arc};

use ahash::AHashMap;
use dashmap::DashMap;
use ustr::Ustr;

use crate::{
    messages::{InboundMessage, MessageKind},
    types::MessageHandler,
};

/// The seam to whichever query cache a view layer uses.
pub trait QueryInvalidator: Send + Sync {
    /// Marks the cached query `key` as stale.
    fn invalidate(&self, key: &str);
}

/// An in-memory query cache which tracks a generation counter per query key.
///
/// A view records the generation when it fetches and refetches when the generation moved.
#[derive(Debug, Default)]
pub struct QueryCache {
    generations: DashMap<Ustr, u64>,
}

impl QueryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current generation of `key`, zero if it was never invalidated.
    #[must_use]
    pub fn generation(&self, key: &str) -> u64 {
        self.generations
            .get(&Ustr::from(key))
            .map_or(0, |entry| *entry.value())
    }

    /// Returns true if `key` was invalidated after `seen_generation`.
    #[must_use]
    pub fn is_stale(&self, key: &str, seen_generation: u64) -> bool {
        self.generation(key) > seen_generation
    }
}

impl QueryInvalidator for QueryCache {
    fn invalidate(&self, key: &str) {
        *self.generations.entry(Ustr::from(key)).or_insert(0) += 1;
    }
}

/// A map from message type to the query keys it invalidates.
#[derive(Clone, Debug)]
pub struct InvalidationRules {
    rules: AHashMap<Ustr, Vec<Ustr>>,
}

impl Default for InvalidationRules {
    /// Creates the rules used by the monitoring dashboard.
    fn default() -> Self {
        Self::empty()
            .with_rule(MessageKind::Alert.as_ref(), ["alerts", "dashboard"])
            .with_rule(MessageKind::DeviceStatus.as_ref(), ["devices", "dashboard"])
            .with_rule(MessageKind::IotData.as_ref(), ["iot-data"])
            .with_rule(MessageKind::ResidentUpdate.as_ref(), ["residents"])
    }
}

impl InvalidationRules {
    /// Creates a rule set which invalidates nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rules: AHashMap::new(),
        }
    }

    /// Sets the query keys invalidated by `msg_type`, replacing any existing rule.
    #[must_use]
    pub fn with_rule<I, S>(mut self, msg_type: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys.into_iter().map(|key| Ustr::from(key.as_ref())).collect();
        self.rules.insert(Ustr::from(msg_type), keys);
        self
    }

    /// Returns the query keys invalidated by `msg_type`.
    #[must_use]
    pub fn keys_for(&self, msg_type: &str) -> &[Ustr] {
        self.rules
            .get(&Ustr::from(msg_type))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Invalidates the keys matching `msg`, returning how many were invalidated.
    pub fn apply(&self, msg: &InboundMessage, invalidator: &dyn QueryInvalidator) -> usize {
        let keys = self.keys_for(&msg.msg_type);
        for key in keys {
            tracing::trace!("Invalidating query '{key}' for '{}' message", msg.msg_type);
            invalidator.invalidate(key);
        }
        keys.len()
    }
}

/// Creates a message handler which applies `rules` to every envelope.
pub fn invalidation_handler<I>(rules: InvalidationRules, invalidator: Arc<I>) -> MessageHandler
where
    I: QueryInvalidator + 'static,
{
    Arc::new(move |msg: &InboundMessage| {
        rules.apply(msg, invalidator.as_ref());
    })
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn message(msg_type: &str) -> InboundMessage {
        InboundMessage {
            msg_type: msg_type.to_string(),
            data: None,
            message: None,
            topic: None,
            timestamp: None,
        }
    }

    #[rstest]
    #[case("alert", &["alerts", "dashboard"])]
    #[case("device_status", &["devices", "dashboard"])]
    #[case("iot_data", &["iot-data"])]
    #[case("resident_update", &["residents"])]
    #[case("pong", &[])]
    #[case("something_new", &[])]
    fn test_default_rules(#[case] msg_type: &str, #[case] expected: &[&str]) {
        let rules = InvalidationRules::default();
        let keys: Vec<&str> = rules.keys_for(msg_type).iter().map(Ustr::as_str).collect();
        assert_eq!(keys, expected);
    }

    #[rstest]
    fn test_handler_bumps_generations() {
        let cache = Arc::new(QueryCache::new());
        let handler = invalidation_handler(InvalidationRules::default(), cache.clone());

        handler(&message("alert"));
        handler(&message("device_status"));
        handler(&message("unknown_type"));

        assert_eq!(cache.generation("alerts"), 1);
        assert_eq!(cache.generation("devices"), 1);
        assert_eq!(cache.generation("dashboard"), 2);
        assert_eq!(cache.generation("residents"), 0);
        assert!(cache.is_stale("dashboard", 1));
        assert!(!cache.is_stale("alerts", 1));
    }

    #[rstest]
    fn test_custom_rule_replaces_default() {
        let rules = InvalidationRules::default().with_rule("alert", ["alert-feed"]);
        let cache = QueryCache::new();

        assert_eq!(rules.apply(&message("alert"), &cache), 1);
        assert_eq!(cache.generation("alert-feed"), 1);
        assert_eq!(cache.generation("alerts"), 0);
    }
}
