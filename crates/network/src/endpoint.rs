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

//! Tenant-scoped realtime endpoint URLs.

use std::fmt::Display;

use url::Url;

use crate::error::RealtimeError;

/// The default realtime endpoint of a local backend.
pub const DEFAULT_REALTIME_URL: &str = "ws://localhost:8000/api/v1/realtime/ws";

/// The query parameter scoping a connection to one tenant's event stream.
pub const TENANT_QUERY_PARAM: &str = "tenant_id";

/// A validated `ws` or `wss` endpoint URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealtimeEndpoint {
    url: Url,
}

impl RealtimeEndpoint {
    /// Parses and validates an endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidEndpoint`] if `url` does not parse (including a missing
    /// host) or has a scheme other than `ws` or `wss`.
    pub fn parse(url: &str) -> Result<Self, RealtimeError> {
        let parsed =
            Url::parse(url).map_err(|e| RealtimeError::invalid_endpoint(url, e.to_string()))?;

        match parsed.scheme() {
            "ws" | "wss" => {}
            scheme => {
                return Err(RealtimeError::invalid_endpoint(
                    url,
                    format!("unsupported scheme '{scheme}'"),
                ));
            }
        }

        Ok(Self { url: parsed })
    }

    /// Builds the endpoint for `tenant_id` from `base_url`.
    ///
    /// Any `tenant_id` already present in the query string is replaced; other query
    /// parameters are kept in order.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::InvalidEndpoint`] if `base_url` is invalid or `tenant_id` is
    /// blank.
    pub fn for_tenant(base_url: &str, tenant_id: &str) -> Result<Self, RealtimeError> {
        let mut endpoint = Self::parse(base_url)?;
        let tenant_id = tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(RealtimeError::invalid_endpoint(base_url, "empty tenant id"));
        }

        let retained: Vec<(String, String)> = endpoint
            .url
            .query_pairs()
            .filter(|(key, _)| key != TENANT_QUERY_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        endpoint
            .url
            .query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair(TENANT_QUERY_PARAM, tenant_id);

        Ok(endpoint)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Returns the tenant this endpoint is scoped to, if any.
    #[must_use]
    pub fn tenant_id(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == TENANT_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }
}

impl Display for RealtimeEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_default_url_for_tenant() {
        let endpoint = RealtimeEndpoint::for_tenant(DEFAULT_REALTIME_URL, "tenant-1").unwrap();
        assert_eq!(
            endpoint.as_str(),
            "ws://localhost:8000/api/v1/realtime/ws?tenant_id=tenant-1"
        );
        assert_eq!(endpoint.tenant_id().as_deref(), Some("tenant-1"));
        assert!(!endpoint.is_secure());
    }

    #[rstest]
    fn test_existing_tenant_replaced_other_params_kept() {
        let endpoint = RealtimeEndpoint::for_tenant(
            "wss://owlrd.example.com/ws?tenant_id=old&token=abc",
            "new",
        )
        .unwrap();
        assert_eq!(
            endpoint.as_str(),
            "wss://owlrd.example.com/ws?token=abc&tenant_id=new"
        );
        assert!(endpoint.is_secure());
    }

    #[rstest]
    #[case("http://localhost:8000/ws")]
    #[case("not a url")]
    #[case("ws://")]
    fn test_invalid_base_url(#[case] url: &str) {
        let result = RealtimeEndpoint::parse(url);
        assert!(matches!(
            result,
            Err(RealtimeError::InvalidEndpoint { .. })
        ));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_blank_tenant_rejected(#[case] tenant: &str) {
        let result = RealtimeEndpoint::for_tenant(DEFAULT_REALTIME_URL, tenant);
        assert!(matches!(
            result,
            Err(RealtimeError::InvalidEndpoint { .. })
        ));
    }

    #[rstest]
    fn test_tenant_is_percent_encoded() {
        let endpoint = RealtimeEndpoint::for_tenant(DEFAULT_REALTIME_URL, "a b&c").unwrap();
        assert!(endpoint.as_str().ends_with("tenant_id=a+b%26c"));
        assert_eq!(endpoint.tenant_id().as_deref(), Some("a b&c"));
    }
}
