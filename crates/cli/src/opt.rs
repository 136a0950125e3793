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

use std::path::PathBuf;

use clap::Parser;

/// Main CLI structure for parsing command-line arguments and options.
///
/// This is the entry point for the OwlRD command-line interface.
#[derive(Debug, Parser)]
#[clap(version, about, author)]
pub struct OwlrdCli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Available top-level commands for the OwlRD CLI.
#[derive(Parser, Debug)]
pub enum Commands {
    Tail(TailOpt),
}

/// Options for tailing a tenant's realtime event stream.
#[derive(Parser, Debug, Clone)]
#[command(about = "Print realtime events for a tenant as JSON lines", long_about = None)]
pub struct TailOpt {
    /// Realtime endpoint URL (falls back to `OWLRD_REALTIME_URL` env var).
    #[arg(long)]
    pub url: Option<String>,
    /// Tenant whose event stream to join (falls back to `OWLRD_TENANT_ID` env var).
    #[arg(long)]
    pub tenant: Option<String>,
    /// Topic to subscribe to, may be repeated.
    #[arg(long = "topic")]
    pub topics: Vec<String>,
    /// Path to a TOML file with channel settings.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Heartbeat interval in seconds, 0 disables heartbeats.
    #[arg(long)]
    pub heartbeat_secs: Option<u64>,
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_parse_tail_with_repeated_topics() {
        let cli = OwlrdCli::try_parse_from([
            "owlrd",
            "tail",
            "--url",
            "ws://localhost:8000/api/v1/realtime/ws",
            "--tenant",
            "t1",
            "--topic",
            "alerts",
            "--topic",
            "devices",
        ])
        .unwrap();

        let Commands::Tail(opt) = cli.command;
        assert_eq!(opt.url.as_deref(), Some("ws://localhost:8000/api/v1/realtime/ws"));
        assert_eq!(opt.tenant.as_deref(), Some("t1"));
        assert_eq!(opt.topics, vec!["alerts", "devices"]);
        assert!(opt.config.is_none());
    }

    #[rstest]
    fn test_parse_requires_subcommand() {
        assert!(OwlrdCli::try_parse_from(["owlrd"]).is_err());
    }
}
