// Turbine Rust Library for Amazon S3 Compatible Cloud Storage
// Copyright 2024 MinIO, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP-layer collaborator: connection managers and connections
//!
//! The engine never talks to the network directly. Each endpoint owns a
//! [`ConnectionManager`] produced by the client's [`Transport`], and every
//! request is driven on one acquired [`HttpConnection`]. The production
//! transport is reqwest-backed; tests substitute scripted implementations.

use crate::s3::error::Error;
use crate::s3::messages::HttpMessage;
use crate::s3::request::ResponseData;
use crate::s3::segmented_bytes::SegmentedBytes;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Options for spawning one endpoint's connection manager.
#[derive(Clone, Debug)]
pub struct EndpointOptions {
    pub host_name: String,
    pub max_connections: u32,
    pub connect_timeout_ms: u32,
}

/// One live HTTP connection, good for driving a single request at a time.
#[async_trait]
pub trait HttpConnection: Send {
    async fn send(
        &mut self,
        message: &HttpMessage,
        body: &SegmentedBytes,
    ) -> Result<ResponseData, Error>;
}

/// Pool of HTTP connections to one endpoint.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    async fn acquire_connection(&self) -> Result<Box<dyn HttpConnection>, Error>;

    /// Return a connection after use. `close` requests that the underlying
    /// socket not be reused (set after retryable transport errors).
    fn release_connection(&self, connection: Box<dyn HttpConnection>, close: bool);

    /// Release pooled resources; resolves when teardown is complete.
    async fn shutdown(&self);
}

/// Factory for per-endpoint connection managers.
pub trait Transport: Send + Sync {
    fn connection_manager(
        &self,
        options: &EndpointOptions,
    ) -> Result<Arc<dyn ConnectionManager>, Error>;
}

/// Explicit proxy configuration; when absent, proxy settings are read from
/// the environment unless that is disabled.
#[derive(Clone, Debug, Default)]
pub struct ProxyConfig {
    pub url: Option<String>,
    /// Read `HTTP_PROXY`/`HTTPS_PROXY` from the environment when no
    /// explicit proxy URL is set.
    pub use_environment: bool,
}

/// Production transport over a shared reqwest client. reqwest pools
/// connections per host internally; the manager adds the per-endpoint
/// connection cap on top with a semaphore.
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(
        proxy: &ProxyConfig,
        connect_timeout_ms: u32,
        ignore_cert_check: bool,
    ) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder().no_gzip();

        let user_agent = String::from("Turbine (")
            + std::env::consts::OS
            + "; "
            + std::env::consts::ARCH
            + ") s3-turbine/"
            + env!("CARGO_PKG_VERSION");
        builder = builder.user_agent(user_agent);

        if connect_timeout_ms > 0 {
            builder = builder.connect_timeout(Duration::from_millis(connect_timeout_ms as u64));
        }

        #[cfg(any(
            feature = "default-tls",
            feature = "native-tls",
            feature = "rustls-tls"
        ))]
        if ignore_cert_check {
            builder = builder.danger_accept_invalid_certs(true);
        }
        #[cfg(not(any(
            feature = "default-tls",
            feature = "native-tls",
            feature = "rustls-tls"
        )))]
        let _ = ignore_cert_check;

        if let Some(url) = &proxy.url {
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        } else if !proxy.use_environment {
            builder = builder.no_proxy();
        }

        Ok(Self {
            http_client: builder.build()?,
        })
    }
}

impl Transport for ReqwestTransport {
    fn connection_manager(
        &self,
        options: &EndpointOptions,
    ) -> Result<Arc<dyn ConnectionManager>, Error> {
        Ok(Arc::new(ReqwestConnectionManager {
            http_client: self.http_client.clone(),
            permits: Arc::new(Semaphore::new(options.max_connections.max(1) as usize)),
        }))
    }
}

struct ReqwestConnectionManager {
    http_client: reqwest::Client,
    permits: Arc<Semaphore>,
}

#[async_trait]
impl ConnectionManager for ReqwestConnectionManager {
    async fn acquire_connection(&self) -> Result<Box<dyn HttpConnection>, Error> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Error::ConnectionAcquireFailed(e.to_string()))?;

        Ok(Box::new(ReqwestConnection {
            http_client: self.http_client.clone(),
            _permit: permit,
        }))
    }

    fn release_connection(&self, connection: Box<dyn HttpConnection>, _close: bool) {
        // The permit rides on the connection; dropping it frees the slot.
        drop(connection);
    }

    async fn shutdown(&self) {}
}

struct ReqwestConnection {
    http_client: reqwest::Client,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[async_trait]
impl HttpConnection for ReqwestConnection {
    async fn send(
        &mut self,
        message: &HttpMessage,
        body: &SegmentedBytes,
    ) -> Result<ResponseData, Error> {
        let mut builder = self
            .http_client
            .request(message.method.clone(), message.url.to_string());

        for (key, values) in message.headers.iter_all() {
            for value in values {
                builder = builder.header(key.as_str(), value.as_str());
            }
        }

        if !body.is_empty() {
            builder = builder.body(reqwest::Body::from(body.to_bytes()));
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(ResponseData {
            status,
            headers,
            body,
        })
    }
}
