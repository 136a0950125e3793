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

//! Loading of TOML configuration files into `serde` config types.
//!
//! Config types in this workspace derive `Deserialize` with `#[serde(default)]`, so a file only
//! needs to name the fields which differ from the defaults.

use std::path::Path;

use serde::de::DeserializeOwned;

/// Parses a TOML document into the config type `T`.
///
/// # Errors
///
/// Returns an error if the document is not valid TOML or does not match `T`.
pub fn parse_toml_str<T: DeserializeOwned>(content: &str) -> anyhow::Result<T> {
    toml::from_str(content).map_err(|e| anyhow::anyhow!("Invalid config: {e}"))
}

/// Reads and parses the TOML file at `path` into the config type `T`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_toml_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {e}", path.display()))?;
    let config = parse_toml_str(&content)?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use std::io::Write;

    use rstest::rstest;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(default)]
    struct SampleConfig {
        name: String,
        retries: u32,
    }

    impl Default for SampleConfig {
        fn default() -> Self {
            Self {
                name: "default".to_string(),
                retries: 3,
            }
        }
    }

    #[rstest]
    fn test_parse_partial_document_uses_defaults() {
        let config: SampleConfig = parse_toml_str("retries = 7").unwrap();
        assert_eq!(config.name, "default");
        assert_eq!(config.retries, 7);
    }

    #[rstest]
    fn test_parse_invalid_document() {
        let result: anyhow::Result<SampleConfig> = parse_toml_str("retries = \"many\"");
        assert!(result.is_err());
    }

    #[rstest]
    fn test_load_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"from-file\"").unwrap();

        let config: SampleConfig = load_toml_file(file.path()).unwrap();
        assert_eq!(
            config,
            SampleConfig {
                name: "from-file".to_string(),
                retries: 3,
            }
        );
    }

    #[rstest]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result: anyhow::Result<SampleConfig> = load_toml_file(dir.path().join("missing.toml"));
        assert!(result.unwrap_err().to_string().contains("missing.toml"));
    }
}
