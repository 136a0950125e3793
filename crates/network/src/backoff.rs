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

//! Reconnect delay scheduling for the realtime channel.
//!
//! By default a channel waits a fixed interval between reconnect attempts. The same type also
//! supports exponential growth up to a cap, random jitter, and an immediate first retry, all
//! selected through [`crate::config::RealtimeConfig`].

use std::time::Duration;

use rand::Rng;

/// Computes successive delays for reconnect attempts.
///
/// Starts from an initial delay and multiplies it by `factor` after every call to
/// [`ReconnectBackoff::next_duration`], capping at `delay_max`. A factor of `1.0` yields a
/// constant interval. Up to `jitter_ms` of random jitter is added to each returned delay.
#[derive(Clone, Debug)]
pub struct ReconnectBackoff {
    delay_initial: Duration,
    delay_max: Duration,
    delay_current: Duration,
    factor: f64,
    jitter_ms: u64,
    immediate_first: bool,
    immediate_pending: bool,
}

impl ReconnectBackoff {
    /// Creates a new [`ReconnectBackoff`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if `factor` is not a finite value of at least `1.0`, or if
    /// `delay_max` is less than `delay_initial`.
    pub fn new(
        delay_initial: Duration,
        delay_max: Duration,
        factor: f64,
        jitter_ms: u64,
        immediate_first: bool,
    ) -> anyhow::Result<Self> {
        if !factor.is_finite() || factor < 1.0 {
            anyhow::bail!("Backoff factor must be finite and >= 1.0, was {factor}");
        }
        if delay_max < delay_initial {
            anyhow::bail!(
                "Backoff max delay {delay_max:?} must not be less than initial delay {delay_initial:?}"
            );
        }

        Ok(Self {
            delay_initial,
            delay_max,
            delay_current: delay_initial,
            factor,
            jitter_ms,
            immediate_first,
            immediate_pending: immediate_first,
        })
    }

    /// Creates a backoff which always waits `interval`.
    #[must_use]
    pub const fn fixed(interval: Duration) -> Self {
        Self {
            delay_initial: interval,
            delay_max: interval,
            delay_current: interval,
            factor: 1.0,
            jitter_ms: 0,
            immediate_first: false,
            immediate_pending: false,
        }
    }

    /// Return the next backoff delay with jitter and update the internal state.
    ///
    /// When configured with `immediate_first`, the first call after construction or
    /// [`ReconnectBackoff::reset`] returns `Duration::ZERO`.
    pub fn next_duration(&mut self) -> Duration {
        if self.immediate_pending {
            self.immediate_pending = false;
            return Duration::ZERO;
        }

        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=self.jitter_ms)
        };
        let delay = self.delay_current + Duration::from_millis(jitter);

        let next_nanos = (self.delay_current.as_nanos() as f64 * self.factor) as u128;
        let max_nanos = self.delay_max.as_nanos();
        let capped = next_nanos.min(max_nanos).min(u128::from(u64::MAX));
        self.delay_current = Duration::from_nanos(capped as u64);

        delay
    }

    /// Reset the backoff to its initial state.
    pub const fn reset(&mut self) {
        self.delay_current = self.delay_initial;
        self.immediate_pending = self.immediate_first;
    }

    /// Returns the current base delay without jitter.
    #[must_use]
    pub const fn current_delay(&self) -> Duration {
        self.delay_current
    }
}
