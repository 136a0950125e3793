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

//! The `tail` command: prints a tenant's realtime envelopes as JSON lines.

use std::sync::Arc;

use owlrd_common::{config::load_toml_file, env::get_or_env_var_opt};
use owlrd_network::{
    InboundMessage, RealtimeChannel, RealtimeConfig, RealtimeError,
    mode::ChannelState,
    transport::TungsteniteTransport,
    types::{ChannelHandlers, channel_message_handler},
};

use crate::opt::TailOpt;

pub const URL_ENV_VAR: &str = "OWLRD_REALTIME_URL";
pub const TENANT_ENV_VAR: &str = "OWLRD_TENANT_ID";

/// Builds the channel config from the optional config file, then applies CLI overrides.
///
/// Topics given on the command line are added to those from the config file.
pub(crate) fn build_config(opt: &TailOpt) -> anyhow::Result<RealtimeConfig> {
    let mut config: RealtimeConfig = match &opt.config {
        Some(path) => load_toml_file(path)?,
        None => RealtimeConfig::default(),
    };

    if let Some(url) = get_or_env_var_opt(opt.url.clone(), URL_ENV_VAR) {
        config.url = url;
    }
    if let Some(tenant_id) = get_or_env_var_opt(opt.tenant.clone(), TENANT_ENV_VAR) {
        config.tenant_id = Some(tenant_id);
    }
    for topic in &opt.topics {
        if !config.topics.contains(topic) {
            config.topics.push(topic.clone());
        }
    }
    if let Some(secs) = opt.heartbeat_secs {
        config.heartbeat_interval_secs = Some(secs);
    }

    config.validate()?;
    Ok(config)
}

pub(crate) fn format_envelope(msg: &InboundMessage) -> anyhow::Result<String> {
    Ok(serde_json::to_string(msg)?)
}

pub async fn run_tail(opt: TailOpt) -> anyhow::Result<()> {
    let config = build_config(&opt)?;

    let (on_message, mut rx) = channel_message_handler();
    let handlers = ChannelHandlers::new(on_message)
        .with_error_handler(Arc::new(|e: &RealtimeError| {
            tracing::warn!("Realtime channel error: {e}");
        }))
        .with_state_handler(Arc::new(|state: ChannelState| {
            tracing::info!("Realtime channel {state}");
        }));

    let channel = RealtimeChannel::open(config, handlers, TungsteniteTransport::new())?;
    tracing::info!("Tailing {}", channel.endpoint());

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for Ctrl-C: {e}");
                }
                tracing::info!("Closing realtime channel");
                break;
            }
            msg = rx.recv() => match msg {
                Some(msg) => println!("{}", format_envelope(&msg)?),
                None => break,
            },
        }
    }

    channel.close().await;
    Ok(())
}
