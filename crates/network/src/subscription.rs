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

//! Desired-topic and wire subscription tracking for the realtime channel.
//!
//! The tracker keeps two views of the topics a channel deals with:
//!
//! - **Desired**: topics the application currently wants, independent of connection state.
//!   This is the source of truth for what to subscribe to after every (re)connect.
//! - **Wire**: what has been requested on the current connection. A topic is either pending
//!   subscribe (request sent, no `subscribed` reply yet), confirmed (server replied), or pending
//!   unsubscribe (request sent, no `unsubscribed` reply yet).
//!
//! The wire view is cleared whenever a connection ends, since the server holds no session
//! state across connections.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashSet;
use indexmap::IndexSet;
use ustr::Ustr;

/// Topic subscription state for a realtime channel.
///
/// Cloning yields another handle onto the same state, so the channel handle and its driver task
/// observe the same topics.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionState {
    /// Topics the application wants, in the order they were first requested.
    desired: Arc<Mutex<IndexSet<Ustr>>>,
    /// Subscribe requests sent on the current connection and not yet acknowledged.
    pending_subscribe: Arc<DashSet<Ustr>>,
    /// Topics the server acknowledged on the current connection.
    confirmed: Arc<DashSet<Ustr>>,
    /// Unsubscribe requests sent on the current connection and not yet acknowledged.
    pending_unsubscribe: Arc<DashSet<Ustr>>,
}

impl SubscriptionState {
    /// Creates a new [`SubscriptionState`] with the given initial desired topics.
    ///
    /// Duplicate and empty topics are ignored.
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let state = Self::default();
        for topic in topics {
            state.add_desired(topic.as_ref());
        }
        state
    }

    fn desired(&self) -> MutexGuard<'_, IndexSet<Ustr>> {
        self.desired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `topic` to the desired set.
    ///
    /// Returns `true` if the desired set changed.
    pub fn add_desired(&self, topic: &str) -> bool {
        if topic.is_empty() {
            return false;
        }
        self.desired().insert(Ustr::from(topic))
    }

    /// Removes `topic` from the desired set.
    ///
    /// Returns `true` if the desired set changed.
    pub fn remove_desired(&self, topic: &str) -> bool {
        self.desired().shift_remove(&Ustr::from(topic))
    }

    /// Returns the desired topics in the order they were first requested.
    #[must_use]
    pub fn desired_topics(&self) -> Vec<Ustr> {
        self.desired().iter().copied().collect()
    }

    /// Returns the desired topics to replay after a new connection is established.
    #[must_use]
    pub fn replay_topics(&self) -> Vec<Ustr> {
        self.desired_topics()
    }

    /// Returns true if a subscribe request for `topic` is outstanding or confirmed on the
    /// current connection.
    #[must_use]
    pub fn is_on_wire(&self, topic: &Ustr) -> bool {
        self.pending_subscribe.contains(topic) || self.confirmed.contains(topic)
    }

    /// Returns true if `topic` is desired but not yet requested on the current connection.
    #[must_use]
    pub fn needs_subscribe(&self, topic: &str) -> bool {
        let topic = Ustr::from(topic);
        self.desired().contains(&topic) && !self.is_on_wire(&topic)
    }

    /// Returns true if `topic` is requested on the current connection but no longer desired.
    #[must_use]
    pub fn needs_unsubscribe(&self, topic: &str) -> bool {
        let topic = Ustr::from(topic);
        !self.desired().contains(&topic) && self.is_on_wire(&topic)
    }

    /// Records that a subscribe request for `topic` was sent.
    pub fn mark_subscribe(&self, topic: &Ustr) {
        self.pending_unsubscribe.remove(topic);
        self.pending_subscribe.insert(*topic);
    }

    /// Records that an unsubscribe request for `topic` was sent.
    pub fn mark_unsubscribe(&self, topic: &Ustr) {
        self.pending_subscribe.remove(topic);
        self.confirmed.remove(topic);
        self.pending_unsubscribe.insert(*topic);
    }

    /// Handles a `subscribed` reply from the server.
    ///
    /// Replies for topics without an outstanding subscribe request are ignored, since they
    /// refer to a request that was already superseded by an unsubscribe.
    pub fn confirm_subscribe(&self, topic: &str) {
        let topic = Ustr::from(topic);
        if self.pending_subscribe.remove(&topic).is_some() {
            self.confirmed.insert(topic);
        } else {
            tracing::debug!("Ignoring subscribe confirmation for untracked topic '{topic}'");
        }
    }

    /// Handles an `unsubscribed` reply from the server.
    pub fn confirm_unsubscribe(&self, topic: &str) {
        let topic = Ustr::from(topic);
        if self.pending_unsubscribe.remove(&topic).is_none() {
            tracing::debug!("Ignoring unsubscribe confirmation for untracked topic '{topic}'");
        }
    }

    /// Returns the confirmed topics in desired order.
    #[must_use]
    pub fn confirmed_topics(&self) -> Vec<Ustr> {
        self.desired()
            .iter()
            .filter(|topic| self.confirmed.contains(*topic))
            .copied()
            .collect()
    }

    /// Returns the number of subscribe requests awaiting a server reply.
    #[must_use]
    pub fn pending_subscribe_count(&self) -> usize {
        self.pending_subscribe.len()
    }

    /// Returns the number of unsubscribe requests awaiting a server reply.
    #[must_use]
    pub fn pending_unsubscribe_count(&self) -> usize {
        self.pending_unsubscribe.len()
    }

    /// Clears the wire view after a connection ends. The desired set is retained.
    pub fn reset_connection(&self) {
        self.pending_subscribe.clear();
        self.confirmed.clear();
        self.pending_unsubscribe.clear();
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn topics(values: &[&str]) -> Vec<Ustr> {
        values.iter().map(|v| Ustr::from(*v)).collect()
    }

    #[rstest]
    fn test_new_deduplicates_and_skips_empty() {
        let state = SubscriptionState::new(["alerts", "", "devices", "alerts"]);
        assert_eq!(state.desired_topics(), topics(&["alerts", "devices"]));
    }

    #[rstest]
    fn test_add_desired_is_idempotent() {
        let state = SubscriptionState::default();
        assert!(state.add_desired("alerts"));
        assert!(!state.add_desired("alerts"));
        assert_eq!(state.desired_topics(), topics(&["alerts"]));
    }

    #[rstest]
    fn test_remove_desired_absent_is_noop() {
        let state = SubscriptionState::new(["alerts"]);
        assert!(!state.remove_desired("devices"));
        assert!(state.remove_desired("alerts"));
        assert!(state.desired_topics().is_empty());
    }

    #[rstest]
    fn test_subscribe_lifecycle() {
        let state = SubscriptionState::new(["alerts"]);
        let topic = Ustr::from("alerts");
        assert!(state.needs_subscribe("alerts"));

        state.mark_subscribe(&topic);
        assert!(!state.needs_subscribe("alerts"));
        assert_eq!(state.pending_subscribe_count(), 1);
        assert!(state.confirmed_topics().is_empty());

        state.confirm_subscribe("alerts");
        assert_eq!(state.pending_subscribe_count(), 0);
        assert_eq!(state.confirmed_topics(), topics(&["alerts"]));
    }

    #[rstest]
    fn test_unsubscribe_lifecycle() {
        let state = SubscriptionState::new(["alerts"]);
        let topic = Ustr::from("alerts");
        state.mark_subscribe(&topic);
        state.confirm_subscribe("alerts");

        state.remove_desired("alerts");
        assert!(state.needs_unsubscribe("alerts"));

        state.mark_unsubscribe(&topic);
        assert!(!state.needs_unsubscribe("alerts"));
        assert_eq!(state.pending_unsubscribe_count(), 1);
        assert!(!state.is_on_wire(&topic));

        state.confirm_unsubscribe("alerts");
        assert_eq!(state.pending_unsubscribe_count(), 0);
    }

    #[rstest]
    fn test_stale_subscribe_confirmation_ignored() {
        let state = SubscriptionState::new(["alerts"]);
        let topic = Ustr::from("alerts");
        state.mark_subscribe(&topic);
        state.remove_desired("alerts");
        state.mark_unsubscribe(&topic);

        state.confirm_subscribe("alerts");

        assert!(!state.is_on_wire(&topic));
        assert!(state.confirmed_topics().is_empty());
    }

    #[rstest]
    fn test_resubscribe_while_unsubscribe_pending() {
        let state = SubscriptionState::new(["alerts"]);
        let topic = Ustr::from("alerts");
        state.mark_subscribe(&topic);
        state.remove_desired("alerts");
        state.mark_unsubscribe(&topic);

        state.add_desired("alerts");
        assert!(state.needs_subscribe("alerts"));
        state.mark_subscribe(&topic);

        assert_eq!(state.pending_unsubscribe_count(), 0);
        assert_eq!(state.pending_subscribe_count(), 1);
    }

    #[rstest]
    fn test_reset_connection_keeps_desired() {
        let state = SubscriptionState::new(["alerts", "devices"]);
        for topic in state.desired_topics() {
            state.mark_subscribe(&topic);
        }
        state.confirm_subscribe("alerts");

        state.reset_connection();

        assert_eq!(state.replay_topics(), topics(&["alerts", "devices"]));
        assert!(state.confirmed_topics().is_empty());
        assert_eq!(state.pending_subscribe_count(), 0);
        assert!(state.needs_subscribe("alerts"));
        assert!(state.needs_subscribe("devices"));
    }

    #[rstest]
    fn test_clones_share_state() {
        let state = SubscriptionState::default();
        let clone = state.clone();
        clone.add_desired("alerts");
        assert_eq!(state.desired_topics(), vec![Ustr::from("alerts")]);
    }
}
