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

//! The transfer client: endpoint table, admission control and work loop

use crate::s3::auto_ranged_put::AutoRangedPut;
use crate::s3::endpoint::{DefaultEndpointOps, EndpointOps, EndpointSlot};
use crate::s3::error::Error;
use crate::s3::http::BaseUrl;
use crate::s3::meta_request::{MetaRequest, MetaRequestHandle};
use crate::s3::object_content::ObjectContent;
use crate::s3::request::Request;
use crate::s3::resolver::{HostResolver, StaticResolver};
use crate::s3::retry::{ExponentialBackoffRetry, RetryStrategy};
use crate::s3::scheduler;
use crate::s3::signer::{AnonymousSigner, Signer};
use crate::s3::transport::{ProxyConfig, ReqwestTransport, Transport};
use crate::s3::types::{ContentMd5, MetaRequestType, PutObjectOptions};
use log::debug;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::AtomicU32;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Notify};

/// The default region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Minimum allowed size (in bytes) for a multipart upload part (except the
/// last one).
pub const MIN_PART_SIZE: u64 = 5_242_880; // 5 MiB

/// Maximum allowed size (in bytes) for a single multipart upload part.
pub const MAX_PART_SIZE: u64 = 5_368_709_120; // 5 GiB

/// Maximum allowed size (in bytes) for a single object upload.
pub const MAX_OBJECT_SIZE: u64 = 5_497_558_138_880; // 5 TiB

/// Maximum number of parts allowed in a multipart upload.
pub const MAX_MULTIPART_COUNT: u32 = 10_000;

/// Default part size for uploads.
pub const DEFAULT_PART_SIZE: u64 = 8 * 1024 * 1024; // 8 MiB

/// Throughput one virtual IP of the store is assumed to sustain.
const PER_VIP_THROUGHPUT_GBPS: f64 = 4.0;

/// Connection cap per virtual IP.
const MAX_NUM_CONNECTIONS_PER_VIP: u32 = 10;

fn num_connections_per_vip(mr_type: MetaRequestType) -> u32 {
    match mr_type {
        MetaRequestType::PutObject => MAX_NUM_CONNECTIONS_PER_VIP,
        MetaRequestType::GetObject => MAX_NUM_CONNECTIONS_PER_VIP,
        MetaRequestType::Default => MAX_NUM_CONNECTIONS_PER_VIP,
    }
}

/// Immutable client configuration; nothing here changes after build.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: BaseUrl,
    pub region: String,
    pub part_size: u64,
    pub max_part_size: u64,
    pub throughput_target_gbps: f64,
    /// Derived: how many virtual IPs would be needed to hit the target.
    pub ideal_vip_count: u32,
    /// Hard cap on connections per meta-request; 0 means no override.
    pub max_active_connections_override: u32,
    pub content_md5: ContentMd5,
    pub enable_read_backpressure: bool,
    pub initial_read_window: u64,
    pub connect_timeout_ms: u32,
}

impl ClientConfig {
    pub fn content_md5_enabled(&self) -> bool {
        self.content_md5 == ContentMd5::Enabled
    }
}

/// What one finished preparation hands back to the work loop.
pub(crate) enum PreparedOutcome {
    Ready(Box<Request>),
    Failed,
}

/// State guarded by the client lock. Everything the work loop owns
/// exclusively lives in `scheduler::ThreadedData` instead.
pub(crate) struct ClientSyncedData {
    pub endpoints: HashMap<String, EndpointSlot>,
    pub pending_meta_request_work: Vec<Arc<dyn MetaRequest>>,
    pub prepared_requests: Vec<PreparedOutcome>,
    pub retry_requests: Vec<Box<Request>>,
    pub process_work_scheduled: bool,
    pub active: bool,
    pub work_loop_started: bool,
    pub num_endpoints_allocated: u32,
    pub num_failed_prepare_requests: u32,
    pub shutdown_callback: Option<Box<dyn FnOnce() + Send>>,
}

/// Cross-thread counters kept out of the lock.
#[derive(Default)]
pub(crate) struct ClientStats {
    /// Requests currently being sent/received over the network.
    pub num_requests_network_io: AtomicU32,
}

pub struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) retry_strategy: Arc<dyn RetryStrategy>,
    pub(crate) resolver: Arc<dyn HostResolver>,
    pub(crate) signer: Arc<dyn Signer>,
    pub(crate) endpoint_ops: Arc<dyn EndpointOps>,
    pub(crate) synced: Mutex<ClientSyncedData>,
    pub(crate) work_notify: Notify,
    pub(crate) stats: ClientStats,
    pub(crate) shutdown_tx: watch::Sender<bool>,
    pub(crate) shutdown_rx: watch::Receiver<bool>,
}

impl ClientInner {
    pub(crate) fn lock_synced(&self) -> MutexGuard<'_, ClientSyncedData> {
        self.synced.lock().expect("client lock poisoned")
    }

    /// Mark work pending and wake the work loop unless a wake-up is
    /// already outstanding.
    pub(crate) fn schedule_process_work(&self) {
        let mut synced = self.lock_synced();
        if synced.process_work_scheduled {
            return;
        }
        synced.process_work_scheduled = true;
        drop(synced);
        self.work_notify.notify_one();
    }

    /// Admission ceiling: connections one meta-request may occupy. With no
    /// type given, the overall per-client ceiling.
    pub(crate) fn get_max_active_connections(&self, mr_type: Option<MetaRequestType>) -> u32 {
        let per_vip = match mr_type {
            Some(t) => num_connections_per_vip(t),
            None => MAX_NUM_CONNECTIONS_PER_VIP,
        };
        let mut max_connections = self.config.ideal_vip_count * per_vip;
        if self.config.max_active_connections_override > 0 {
            max_connections = max_connections.min(self.config.max_active_connections_override);
        }
        max_connections.max(1)
    }

    /// Requests allowed on the network at once.
    pub(crate) fn get_max_requests_in_flight(&self) -> u32 {
        self.get_max_active_connections(None)
    }

    /// Requests allowed in preparation at once; the factor keeps
    /// preparation overlapped with network I/O.
    pub(crate) fn get_max_requests_prepare(&self) -> u32 {
        self.get_max_requests_in_flight() * 2
    }
}

/// Builder for [`TurbineClient`].
pub struct TurbineClientBuilder {
    base_url: BaseUrl,
    region: Option<String>,
    part_size: u64,
    max_part_size: u64,
    throughput_target_gbps: f64,
    max_active_connections_override: u32,
    content_md5: ContentMd5,
    enable_read_backpressure: bool,
    initial_read_window: u64,
    connect_timeout_ms: u32,
    proxy: ProxyConfig,
    ignore_cert_check: bool,
    transport: Option<Arc<dyn Transport>>,
    retry_strategy: Option<Arc<dyn RetryStrategy>>,
    resolver: Option<Arc<dyn HostResolver>>,
    signer: Option<Arc<dyn Signer>>,
    endpoint_ops: Option<Arc<dyn EndpointOps>>,
    shutdown_callback: Option<Box<dyn FnOnce() + Send>>,
}

impl TurbineClientBuilder {
    pub fn new(base_url: BaseUrl) -> Self {
        Self {
            base_url,
            region: None,
            part_size: DEFAULT_PART_SIZE,
            max_part_size: MAX_PART_SIZE,
            throughput_target_gbps: 10.0,
            max_active_connections_override: 0,
            content_md5: ContentMd5::Disabled,
            enable_read_backpressure: false,
            initial_read_window: 0,
            connect_timeout_ms: 0,
            proxy: ProxyConfig {
                url: None,
                use_environment: true,
            },
            ignore_cert_check: false,
            transport: None,
            retry_strategy: None,
            resolver: None,
            signer: None,
            endpoint_ops: None,
            shutdown_callback: None,
        }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size;
        self
    }

    pub fn throughput_target_gbps(mut self, gbps: f64) -> Self {
        self.throughput_target_gbps = gbps;
        self
    }

    /// Hard cap on connections regardless of the throughput target.
    pub fn max_active_connections(mut self, max: u32) -> Self {
        self.max_active_connections_override = max;
        self
    }

    pub fn content_md5(mut self, policy: ContentMd5) -> Self {
        self.content_md5 = policy;
        self
    }

    /// Enable read backpressure with the given initial window in bytes.
    pub fn read_backpressure(mut self, initial_read_window: u64) -> Self {
        self.enable_read_backpressure = true;
        self.initial_read_window = initial_read_window;
        self
    }

    pub fn connect_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }

    /// Skip TLS certificate verification. Insecure; testing only.
    pub fn ignore_cert_check(mut self, ignore: bool) -> Self {
        self.ignore_cert_check = ignore;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn retry_strategy(mut self, retry_strategy: Arc<dyn RetryStrategy>) -> Self {
        self.retry_strategy = Some(retry_strategy);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub(crate) fn endpoint_ops(mut self, ops: Arc<dyn EndpointOps>) -> Self {
        self.endpoint_ops = Some(ops);
        self
    }

    /// Callback invoked once the client has completely shut down.
    pub fn shutdown_callback(mut self, callback: Box<dyn FnOnce() + Send>) -> Self {
        self.shutdown_callback = Some(callback);
        self
    }

    pub fn build(self) -> Result<TurbineClient, Error> {
        if self.part_size < MIN_PART_SIZE {
            return Err(Error::InvalidMinPartSize(self.part_size));
        }
        if self.part_size > self.max_part_size {
            return Err(Error::InvalidMaxPartSize(self.part_size));
        }

        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(StaticResolver) as Arc<dyn HostResolver>);

        // How many virtual IPs the throughput target calls for, gated by
        // how many addresses actually back the endpoint.
        let mut ideal_vip_count =
            (self.throughput_target_gbps / PER_VIP_THROUGHPUT_GBPS).ceil() as u32;
        let address_count = resolver.host_address_count(self.base_url.host()).max(1) as u32;
        ideal_vip_count = ideal_vip_count.clamp(1, MAX_NUM_CONNECTIONS_PER_VIP * address_count);

        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::new(
                &self.proxy,
                self.connect_timeout_ms,
                self.ignore_cert_check,
            )?) as Arc<dyn Transport>,
        };

        let config = ClientConfig {
            base_url: self.base_url,
            region: self.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            part_size: self.part_size,
            max_part_size: self.max_part_size,
            throughput_target_gbps: self.throughput_target_gbps,
            ideal_vip_count,
            max_active_connections_override: self.max_active_connections_override,
            content_md5: self.content_md5,
            enable_read_backpressure: self.enable_read_backpressure,
            initial_read_window: self.initial_read_window,
            connect_timeout_ms: self.connect_timeout_ms,
        };

        debug!(
            "built client; throughput_target={}Gbps ideal_vip_count={} part_size={}",
            config.throughput_target_gbps, config.ideal_vip_count, config.part_size
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(TurbineClient {
            inner: Arc::new(ClientInner {
                config,
                transport,
                retry_strategy: self
                    .retry_strategy
                    .unwrap_or_else(|| Arc::new(ExponentialBackoffRetry::default())),
                resolver,
                signer: self
                    .signer
                    .unwrap_or_else(|| Arc::new(AnonymousSigner) as Arc<dyn Signer>),
                endpoint_ops: self
                    .endpoint_ops
                    .unwrap_or_else(|| Arc::new(DefaultEndpointOps) as Arc<dyn EndpointOps>),
                synced: Mutex::new(ClientSyncedData {
                    endpoints: HashMap::new(),
                    pending_meta_request_work: Vec::new(),
                    prepared_requests: Vec::new(),
                    retry_requests: Vec::new(),
                    process_work_scheduled: false,
                    active: true,
                    work_loop_started: false,
                    num_endpoints_allocated: 0,
                    num_failed_prepare_requests: 0,
                    shutdown_callback: self.shutdown_callback,
                }),
                work_notify: Notify::new(),
                stats: ClientStats::default(),
                shutdown_tx,
                shutdown_rx,
            }),
        })
    }
}

/// High-throughput transfer client. Cheap to clone; all clones share one
/// endpoint table and work loop.
#[derive(Clone)]
pub struct TurbineClient {
    inner: Arc<ClientInner>,
}

impl TurbineClient {
    /// Returns a builder for a client talking to the given endpoint URL.
    pub fn builder(base_url: &str) -> Result<TurbineClientBuilder, Error> {
        Ok(TurbineClientBuilder::new(BaseUrl::from_str(base_url)?))
    }

    pub(crate) fn inner(&self) -> &Arc<ClientInner> {
        &self.inner
    }

    /// Submit an auto-ranged put. The upload is decomposed into a
    /// multipart upload whose parts go out in parallel; the returned
    /// handle can pause, cancel or await the transfer.
    pub fn put_object(
        &self,
        options: PutObjectOptions,
        content: ObjectContent,
    ) -> Result<MetaRequestHandle, Error> {
        if !self.inner.lock_synced().active {
            return Err(Error::ClientShutdown);
        }

        let (put, finish_rx) = AutoRangedPut::new(&self.inner, options, content)?;
        let meta_request: Arc<dyn MetaRequest> = put;

        self.ensure_work_loop()?;

        // The meta-request holds one endpoint reference for its whole
        // lifetime; per-request references come and go on top of it.
        {
            let shared = meta_request.shared();
            let url = shared.target.base_url.build_url(
                &crate::s3::multimap_ext::Multimap::new(),
                &shared.target.bucket,
                None,
            )?;
            let endpoint = self
                .inner
                .endpoint_ops
                .acquire(&self.inner, &url.host_header_value())?;
            *shared.endpoint.lock().expect("meta-request endpoint lock") = Some(endpoint);
        }

        self.inner
            .lock_synced()
            .pending_meta_request_work
            .push(meta_request.clone());
        self.inner.schedule_process_work();

        Ok(MetaRequestHandle {
            inner: meta_request,
            finish_rx,
        })
    }

    /// Stop accepting meta-requests and wait for everything in flight to
    /// terminate, the endpoint table to drain, and the work loop to exit.
    pub async fn shutdown(&self) {
        let started = {
            let mut synced = self.inner.lock_synced();
            synced.active = false;
            synced.work_loop_started
        };
        self.inner.schedule_process_work();

        if !started {
            let callback = self.inner.lock_synced().shutdown_callback.take();
            if let Some(callback) = callback {
                callback();
            }
            return;
        }

        let mut rx = self.inner.shutdown_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    fn ensure_work_loop(&self) -> Result<(), Error> {
        let mut synced = self.inner.lock_synced();
        if synced.work_loop_started {
            return Ok(());
        }

        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            Error::Internal("meta-requests must be submitted from within a tokio runtime".into())
        })?;
        synced.work_loop_started = true;
        drop(synced);

        handle.spawn(scheduler::run_work_loop(self.inner.clone()));
        Ok(())
    }
}
