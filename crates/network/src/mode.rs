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

//! Connection state of a realtime channel.

use std::sync::atomic::{AtomicU8, Ordering};

use strum::{AsRefStr, Display, EnumString};

/// Connection state for a realtime channel.
///
/// The state is shared between the channel handle and its driver task through an `AtomicU8`,
/// so reads never block on the driver.
#[derive(Clone, Copy, Debug, Default, Display, Hash, PartialEq, Eq, AsRefStr, EnumString)]
#[repr(u8)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ChannelState {
    /// No connection is established.
    /// Either the channel has not opened yet, a reconnect is pending, or it was closed.
    #[default]
    Disconnected = 0,
    /// A connection attempt is in progress.
    Connecting = 1,
    /// The connection is established and frames are flowing.
    Connected = 2,
}

impl ChannelState {
    /// Convert a u8 to [`ChannelState`], useful when loading from an `AtomicU8`.
    ///
    /// # Panics
    ///
    /// Panics if `value` does not correspond to a variant.
    #[inline]
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Disconnected,
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => panic!("Invalid `ChannelState` value: {value}"),
        }
    }

    #[inline]
    pub fn from_atomic(value: &AtomicU8) -> Self {
        Self::from_u8(value.load(Ordering::SeqCst))
    }

    /// Convert a [`ChannelState`] to a u8, useful when storing to an `AtomicU8`.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    #[inline]
    #[must_use]
    pub const fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Returns true if frames can be written to the connection.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ChannelState::Disconnected)]
    #[case(ChannelState::Connecting)]
    #[case(ChannelState::Connected)]
    fn test_atomic_storage(#[case] state: ChannelState) {
        let atomic = AtomicU8::new(ChannelState::default().as_u8());
        atomic.store(state.as_u8(), Ordering::SeqCst);
        assert_eq!(ChannelState::from_atomic(&atomic), state);
    }

    #[rstest]
    fn test_default_is_disconnected() {
        assert!(ChannelState::default().is_disconnected());
    }

    #[rstest]
    #[case(ChannelState::Connected, "CONNECTED")]
    #[case(ChannelState::Connecting, "CONNECTING")]
    fn test_display_and_parse(#[case] state: ChannelState, #[case] expected: &str) {
        assert_eq!(state.to_string(), expected);
        assert_eq!(ChannelState::from_str(expected).unwrap(), state);
    }

    #[rstest]
    #[should_panic(expected = "Invalid `ChannelState` value: 7")]
    fn test_from_u8_invalid() {
        let _ = ChannelState::from_u8(7);
    }
}
