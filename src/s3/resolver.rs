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

//! DNS collaborator, consulted only when sizing the connection pool

/// Reports how many addresses back a host. The count is a proxy for the
/// parallelism the endpoint can absorb; name resolution itself stays in
/// the HTTP layer.
pub trait HostResolver: Send + Sync {
    fn host_address_count(&self, host: &str) -> usize;
}

/// Default resolver: assumes a single address per host.
pub struct StaticResolver;

impl HostResolver for StaticResolver {
    fn host_address_count(&self, _host: &str) -> usize {
        1
    }
}
