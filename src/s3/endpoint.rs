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

//! Per-host endpoints and their lifetime in the client's endpoint table
//!
//! An endpoint pairs one host name with its connection manager. Endpoints
//! are shared by every meta-request talking to the same host; the table
//! entry carries a ref-count that is NOT atomic — it may only be read or
//! written while the client's lock is held, which is what makes
//! acquire-if-present-else-create and decrement-to-zero-and-remove
//! transactional with the table itself.

use crate::s3::client::ClientInner;
use crate::s3::error::Error;
use crate::s3::transport::{ConnectionManager, EndpointOptions};
use log::debug;
use std::sync::Arc;

/// One table entry: host name plus the connection manager feeding it.
pub struct Endpoint {
    pub host_name: String,
    pub connection_manager: Arc<dyn ConnectionManager>,
}

/// Table slot owning the lock-protected ref-count.
pub(crate) struct EndpointSlot {
    pub endpoint: Arc<Endpoint>,
    /// Guarded by the client lock; never touched elsewhere.
    pub ref_count: usize,
}

/// Endpoint acquire/release, swappable so tests can interpose without
/// changing call sites.
pub(crate) trait EndpointOps: Send + Sync {
    /// Look up or create the endpoint for `host_name` and take a
    /// reference. Takes the client lock internally; the caller must not
    /// hold it.
    fn acquire(&self, client: &Arc<ClientInner>, host_name: &str) -> Result<Arc<Endpoint>, Error>;

    /// Drop a reference. At zero the endpoint leaves the table and its
    /// connection manager shuts down. The caller MUST NOT hold the client
    /// lock: the release acquires it, and the manager teardown must run
    /// outside it.
    fn release(&self, client: &Arc<ClientInner>, endpoint: Arc<Endpoint>);
}

pub(crate) struct DefaultEndpointOps;

impl EndpointOps for DefaultEndpointOps {
    fn acquire(&self, client: &Arc<ClientInner>, host_name: &str) -> Result<Arc<Endpoint>, Error> {
        let mut synced = client.lock_synced();

        if let Some(slot) = synced.endpoints.get_mut(host_name) {
            slot.ref_count += 1;
            return Ok(slot.endpoint.clone());
        }

        let options = EndpointOptions {
            host_name: host_name.to_string(),
            max_connections: client.get_max_active_connections(None),
            connect_timeout_ms: client.config.connect_timeout_ms,
        };
        let connection_manager = client.transport.connection_manager(&options)?;
        let endpoint = Arc::new(Endpoint {
            host_name: host_name.to_string(),
            connection_manager,
        });

        synced.endpoints.insert(
            host_name.to_string(),
            EndpointSlot {
                endpoint: endpoint.clone(),
                ref_count: 1,
            },
        );
        synced.num_endpoints_allocated += 1;
        drop(synced);

        let addresses = client.resolver.host_address_count(host_name);
        debug!("created endpoint for host {host_name} ({addresses} known addresses)");

        Ok(endpoint)
    }

    fn release(&self, client: &Arc<ClientInner>, endpoint: Arc<Endpoint>) {
        let removed = {
            let mut synced = client.lock_synced();

            let remove = match synced.endpoints.get_mut(&endpoint.host_name) {
                Some(slot) => {
                    debug_assert!(slot.ref_count > 0);
                    slot.ref_count -= 1;
                    slot.ref_count == 0
                }
                None => false,
            };

            if remove {
                synced.endpoints.remove(&endpoint.host_name);
                synced.num_endpoints_allocated -= 1;
                true
            } else {
                false
            }
        };

        if removed {
            debug!("endpoint for host {} released", endpoint.host_name);
            // Teardown runs outside the client lock; the manager's own
            // shutdown may re-enter the client.
            let manager = endpoint.connection_manager.clone();
            if tokio::runtime::Handle::try_current().is_ok() {
                let client = client.clone();
                tokio::spawn(async move {
                    manager.shutdown().await;
                    client.schedule_process_work();
                });
            }
        }
    }
}
