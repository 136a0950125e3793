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

//! Property-based tests for desired-topic tracking.
//!
//! A simulated connection applies the same rules as the channel driver to arbitrary sequences
//! of subscribe, unsubscribe, acknowledgement and reconnect events, and checks that:
//! - The wire view always matches the desired set once commands are applied
//! - No topic is subscribed twice on one connection without an unsubscribe in between
//! - A reconnect replays exactly the desired set, in request order

use ahash::AHashSet;
use owlrd_network::subscription::SubscriptionState;
use proptest::prelude::*;
use rstest::rstest;
use ustr::Ustr;

const TOPICS: [&str; 4] = ["alerts", "devices", "iot-data", "residents"];

#[derive(Clone, Debug)]
enum Event {
    Subscribe(usize),
    Unsubscribe(usize),
    AckAll,
    Reconnect,
}

fn event_strategy() -> impl Strategy<Value = Event> {
    prop_oneof![
        4 => (0..TOPICS.len()).prop_map(Event::Subscribe),
        3 => (0..TOPICS.len()).prop_map(Event::Unsubscribe),
        2 => Just(Event::AckAll),
        1 => Just(Event::Reconnect),
    ]
}

#[derive(Default)]
struct SimulatedConnection {
    subscribed: AHashSet<Ustr>,
    sent: Vec<(bool, Ustr)>,
}

impl SimulatedConnection {
    fn sync(&mut self, state: &SubscriptionState, topic: &str) -> Result<(), TestCaseError> {
        let topic = Ustr::from(topic);
        if state.needs_subscribe(&topic) {
            prop_assert!(self.subscribed.insert(topic), "duplicate subscribe for {topic}");
            self.sent.push((true, topic));
            state.mark_subscribe(&topic);
        } else if state.needs_unsubscribe(&topic) {
            prop_assert!(self.subscribed.remove(&topic), "unsubscribe for {topic} not subscribed");
            self.sent.push((false, topic));
            state.mark_unsubscribe(&topic);
        }
        Ok(())
    }
}

proptest! {
    #[rstest]
    fn wire_state_follows_desired_set(
        events in proptest::collection::vec(event_strategy(), 1..60)
    ) {
        let state = SubscriptionState::default();
        let mut conn = SimulatedConnection::default();

        for event in events {
            match event {
                Event::Subscribe(i) => {
                    if state.add_desired(TOPICS[i]) {
                        conn.sync(&state, TOPICS[i])?;
                    }
                }
                Event::Unsubscribe(i) => {
                    if state.remove_desired(TOPICS[i]) {
                        conn.sync(&state, TOPICS[i])?;
                    }
                }
                Event::AckAll => {
                    for (subscribe, topic) in conn.sent.drain(..) {
                        if subscribe {
                            state.confirm_subscribe(&topic);
                        } else {
                            state.confirm_unsubscribe(&topic);
                        }
                    }
                }
                Event::Reconnect => {
                    state.reset_connection();
                    conn = SimulatedConnection::default();
                    for topic in state.replay_topics() {
                        conn.sync(&state, &topic)?;
                    }
                    let replayed: Vec<Ustr> = conn.sent.iter().map(|(_, topic)| *topic).collect();
                    prop_assert_eq!(replayed, state.desired_topics());
                }
            }

            let desired: AHashSet<Ustr> = state.desired_topics().into_iter().collect();
            prop_assert_eq!(&conn.subscribed, &desired);
            for topic in TOPICS {
                let topic = Ustr::from(topic);
                prop_assert_eq!(state.is_on_wire(&topic), desired.contains(&topic));
            }
            for topic in state.confirmed_topics() {
                prop_assert!(desired.contains(&topic));
            }
        }
    }
}
