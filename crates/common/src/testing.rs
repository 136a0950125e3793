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

//! Common test related helper functions.

use std::{future::Future, time::Duration};

use tokio::time::Instant;

/// Repeatedly evaluates an async condition with a delay until it becomes true or a timeout
/// occurs.
///
/// Elapsed time is measured with the `tokio` clock, so the helper also works in tests running
/// with a paused runtime.
///
/// # Panics
///
/// This function will panic if the timeout duration is exceeded without the condition being met.
pub async fn wait_until_async<F, Fut>(mut condition: F, timeout: Duration)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start_time = Instant::now();

    loop {
        if condition().await {
            break;
        }

        assert!(
            start_time.elapsed() <= timeout,
            "Timeout waiting for condition"
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[tokio::test]
    async fn test_wait_until_async_completes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        wait_until_async(
            || {
                let counter = counter_clone.clone();
                async move { counter.fetch_add(1, Ordering::SeqCst) >= 2 }
            },
            Duration::from_secs(1),
        )
        .await;

        assert!(counter.load(Ordering::SeqCst) >= 3);
    }

    #[rstest]
    #[tokio::test]
    #[should_panic(expected = "Timeout waiting for condition")]
    async fn test_wait_until_async_times_out() {
        wait_until_async(|| async { false }, Duration::from_millis(50)).await;
    }
}
