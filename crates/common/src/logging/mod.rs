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

//! The logging setup for OwlRD services.
//!
//! Library crates only emit through the `tracing` macros. Binaries install a subscriber once at
//! startup with [`init_tracing`] or [`init_tracing_with_level`].

use std::{
    env,
    sync::atomic::{AtomicBool, Ordering},
};

use tracing_subscriber::EnvFilter;

/// The environment variable holding the tracing filter directives.
pub const LOG_ENV_VAR: &str = "RUST_LOG";

pub const RECV: &str = "<--";
pub const SEND: &str = "-->";

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize tracing.
///
/// Tracing is configured to filter modules and write up to a specific level by passing
/// a configuration using the `RUST_LOG` environment variable.
///
/// Should only be called once during an applications run, ideally at the beginning of
/// the run. Does nothing if `RUST_LOG` is not set.
///
/// # Errors
///
/// Returns an error if tracing subscriber fails to initialize.
pub fn init_tracing() -> anyhow::Result<()> {
    // Skip tracing initialization if `RUST_LOG` is not set
    if let Ok(v) = env::var(LOG_ENV_VAR) {
        install_subscriber(EnvFilter::new(&v))?;
        tracing::debug!("Initialized tracing logs with {LOG_ENV_VAR}={v}");
    }
    Ok(())
}

/// Initialize tracing with `default_directives` when `RUST_LOG` is not set.
///
/// # Errors
///
/// Returns an error if the directives are invalid or the tracing subscriber fails to
/// initialize.
pub fn init_tracing_with_level(default_directives: &str) -> anyhow::Result<()> {
    let filter = match env::var(LOG_ENV_VAR) {
        Ok(v) => EnvFilter::new(v),
        Err(_) => EnvFilter::try_new(default_directives).map_err(|e| {
            anyhow::anyhow!("Invalid log directives '{default_directives}': {e}")
        })?,
    };
    install_subscriber(filter)
}

fn install_subscriber(filter: EnvFilter) -> anyhow::Result<()> {
    if TRACING_INITIALIZED.swap(true, Ordering::SeqCst) {
        anyhow::bail!("Tracing subscriber already initialized");
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {e}"))
}

/// Logs that a task has started using `tracing::debug!`.
pub fn log_task_started(task_name: &str) {
    tracing::debug!("Started task '{task_name}'");
}

/// Logs that a task has stopped using `tracing::debug!`.
pub fn log_task_stopped(task_name: &str) {
    tracing::debug!("Stopped task '{task_name}'");
}

/// Logs that a task is being awaited using `tracing::debug!`.
pub fn log_task_awaiting(task_name: &str) {
    tracing::debug!("Awaiting task '{task_name}'");
}

/// Logs that a task was aborted using `tracing::debug!`.
pub fn log_task_aborted(task_name: &str) {
    tracing::debug!("Aborted task '{task_name}'");
}

/// Logs that there was an error in a task `tracing::error!`.
pub fn log_task_error(task_name: &str, e: &anyhow::Error) {
    tracing::error!("Error in task '{task_name}': {e}");
}
