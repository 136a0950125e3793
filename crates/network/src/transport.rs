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

//! The transport seam between the realtime channel and the network.
//!
//! The channel driver never touches sockets directly. It asks a [`Transport`] for a
//! [`TransportLink`], a split pair of WebSocket frame sink and stream, so the same driver runs
//! over `tokio-tungstenite` in production and over [`crate::testing::MockTransport`] in tests.

use std::{fmt::Debug, future::Future, pin::Pin};

use futures::{Sink, Stream, StreamExt};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self, Message,
        client::IntoClientRequest,
        http::{HeaderName, HeaderValue},
    },
};

use crate::tls::install_cryptographic_provider;

/// The write half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;

/// The read half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Message, tungstenite::Error>> + Send>>;

/// An established connection, split into its write and read halves.
pub struct TransportLink {
    pub writer: FrameSink,
    pub reader: FrameStream,
}

impl TransportLink {
    /// Creates a new [`TransportLink`] from any frame sink and stream.
    pub fn new<W, R>(writer: W, reader: R) -> Self
    where
        W: Sink<Message, Error = tungstenite::Error> + Send + 'static,
        R: Stream<Item = Result<Message, tungstenite::Error>> + Send + 'static,
    {
        Self {
            writer: Box::pin(writer),
            reader: Box::pin(reader),
        }
    }
}

impl Debug for TransportLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(TransportLink))
            .field("writer", &"<sink>")
            .field("reader", &"<stream>")
            .finish()
    }
}

/// Trait for types that can establish WebSocket connections.
pub trait Transport: Send + Sync + 'static {
    /// Connect to `url`, sending `headers` with the handshake request.
    fn connect(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<TransportLink, tungstenite::Error>> + Send;
}

/// Production transport using `tokio-tungstenite` with rustls for `wss` endpoints.
#[derive(Clone, Debug, Default)]
pub struct TungsteniteTransport;

impl TungsteniteTransport {
    #[must_use]
    pub fn new() -> Self {
        install_cryptographic_provider();
        Self
    }
}

impl Transport for TungsteniteTransport {
    fn connect(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<TransportLink, tungstenite::Error>> + Send {
        install_cryptographic_provider();
        let request = build_request(url, headers);
        async move {
            let (stream, _response) = connect_async(request?).await?;
            let (writer, reader) = stream.split();
            Ok(TransportLink::new(writer, reader))
        }
    }
}

fn build_request(
    url: &str,
    headers: &[(String, String)],
) -> Result<tungstenite::handshake::client::Request, tungstenite::Error> {
    let mut request = url.into_client_request()?;
    let req_headers = request.headers_mut();

    for (key, val) in headers {
        let header_value = HeaderValue::from_str(val)?;
        let header_name: HeaderName = key.parse()?;
        req_headers.insert(header_name, header_value);
    }

    Ok(request)
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_build_request_with_headers() {
        let headers = vec![("Authorization".to_string(), "Bearer token".to_string())];
        let request =
            build_request("ws://localhost:8000/api/v1/realtime/ws?tenant_id=t1", &headers)
                .unwrap();

        assert_eq!(request.uri().query(), Some("tenant_id=t1"));
        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer token"
        );
    }

    #[rstest]
    fn test_build_request_invalid_header_name() {
        let headers = vec![("bad header".to_string(), "x".to_string())];
        assert!(build_request("ws://localhost:8000", &headers).is_err());
    }

    #[rstest]
    fn test_build_request_invalid_url() {
        assert!(build_request("not a url", &[]).is_err());
    }
}
