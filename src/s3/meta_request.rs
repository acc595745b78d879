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

//! The abstract meta-request contract shared by all transfer variants
//!
//! A meta-request is one user-level logical transfer that the engine
//! decomposes into many HTTP requests. Variants implement [`MetaRequest`];
//! the client's work loop only ever sees the trait. Locking discipline:
//! the client lock is never held while a meta-request lock is taken, and
//! neither lock is held across I/O or user callbacks.

use crate::s3::checksum::ChecksumAlgorithm;
use crate::s3::client::ClientInner;
use crate::s3::endpoint::Endpoint;
use crate::s3::error::{Error, ErrorResponse};
use crate::s3::messages::{HttpMessage, MessageTarget};
use crate::s3::request::{Request, ResponseData};
use crate::s3::signer::Signer;
use crate::s3::types::{
    FinishResult, MetaRequestCallbacks, MetaRequestType, Progress, UpdateFlags,
};
use crate::s3::utils::utc_now;
use async_trait::async_trait;
use http::HeaderMap;
use log::debug;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::oneshot;

/// Outcome of one `update` call.
pub enum UpdateResult {
    /// Work remains and a request is ready to be prepared.
    Work(Box<Request>),
    /// Work remains but nothing can be emitted yet.
    Waiting,
    /// No work remains; the finish callback has been dispatched.
    Done,
}

/// Contract between the client's work loop and one transfer variant.
#[async_trait]
pub trait MetaRequest: Send + Sync {
    fn meta_request_type(&self) -> MetaRequestType;

    fn shared(&self) -> &MetaRequestShared;

    /// Advance the state machine: either produce the next request under
    /// the meta-request lock, or report that nothing can be emitted, or
    /// arrange termination and report done.
    fn update(self: Arc<Self>, flags: UpdateFlags) -> UpdateResult;

    /// Prepare a request off-lock: read body bytes, compute checksums and
    /// build the HTTP message. Runs on the work loop's executor; never
    /// called concurrently for one meta-request.
    async fn prepare_request(&self, request: &mut Request) -> Result<(), Error>;

    /// A request completed, successfully or with a terminal error after
    /// retries. Acquires the meta-request lock to advance phase counters.
    fn finished_request(&self, request: Box<Request>, result: Result<(), Error>);

    /// Record a failure; only the first failure is kept.
    fn set_fail(&self, failed_request: Option<&Request>, error: Error);

    /// True once a finish result (success, failure, pause) exists.
    fn has_finish_result(&self) -> bool;

    /// Serialize a pause token, then fail the meta-request with
    /// [`Error::Paused`] so uploaded parts survive server-side. Returns
    /// `None` when no server-side state exists yet to resume.
    fn pause(&self) -> Result<Option<String>, Error>;

    /// Cancel the transfer. In-flight requests drain; the state machine
    /// then runs its abort branch.
    fn cancel(&self) {
        self.set_fail(None, Error::Canceled);
        self.shared().schedule_process_work();
    }
}

/// Caller-facing handle to a submitted meta-request.
pub struct MetaRequestHandle {
    pub(crate) inner: Arc<dyn MetaRequest>,
    pub(crate) finish_rx: oneshot::Receiver<FinishResult>,
}

impl MetaRequestHandle {
    /// Wait for the transfer to terminate.
    pub async fn join(self) -> FinishResult {
        match self.finish_rx.await {
            Ok(result) => result,
            Err(_) => FinishResult {
                error: Some(Error::ClientShutdown),
                ..Default::default()
            },
        }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Pause the transfer and return the serialized resume token, or
    /// `None` when the transfer had no server-side state to resume yet.
    pub fn pause(&self) -> Result<Option<String>, Error> {
        self.inner.pause()
    }
}

/// Generic finish state every variant embeds under its own lock.
#[derive(Default)]
pub(crate) struct BaseState {
    finish_result: Option<FinishResult>,
    finish_dispatched: bool,
}

impl BaseState {
    pub fn has_finish_result(&self) -> bool {
        self.finish_result.is_some()
    }

    /// First failure wins; later failures are dropped.
    pub fn set_fail_synced(&mut self, failed_request: Option<&Request>, error: Error) {
        if self.finish_result.is_some() {
            return;
        }
        self.finish_result = Some(FinishResult {
            response_status: error.response_status(),
            failed_request: failed_request.map(|r| crate::s3::types::FailedRequest {
                tag: r.tag,
                part_number: r.part_number,
            }),
            error: Some(error),
        });
    }

    pub fn set_success_synced(&mut self) {
        if self.finish_result.is_none() {
            self.finish_result = Some(FinishResult::default());
        }
    }

    /// The recorded failure preserves server-side upload state (pause or
    /// failed resume).
    pub fn finish_preserves_upload(&self) -> bool {
        matches!(
            self.finish_result.as_ref().and_then(|r| r.error.as_ref()),
            Some(e) if e.preserves_upload()
        )
    }

    pub fn finish_is_success(&self) -> bool {
        matches!(self.finish_result.as_ref(), Some(r) if r.is_success())
    }

    /// Take the result for dispatch; returns `None` if already dispatched.
    pub fn take_finish_result(&mut self) -> Option<FinishResult> {
        if self.finish_dispatched {
            return None;
        }
        self.finish_dispatched = true;
        Some(self.finish_result.take().unwrap_or_default())
    }
}

/// Configuration and plumbing common to every meta-request variant.
pub struct MetaRequestShared {
    pub(crate) client: Weak<ClientInner>,
    pub mr_type: MetaRequestType,
    pub part_size: u64,
    pub checksum_algorithm: ChecksumAlgorithm,
    pub compute_content_md5: bool,
    pub target: MessageTarget,
    pub(crate) signer: Arc<dyn Signer>,
    pub(crate) callbacks: Mutex<MetaRequestCallbacks>,
    /// Reference on the endpoint this transfer talks to, held for the
    /// meta-request's lifetime so the endpoint outlives its requests.
    pub(crate) endpoint: Mutex<Option<Arc<Endpoint>>>,
    finish_tx: Mutex<Option<oneshot::Sender<FinishResult>>>,
}

impl MetaRequestShared {
    pub(crate) fn new(
        client: Weak<ClientInner>,
        mr_type: MetaRequestType,
        part_size: u64,
        checksum_algorithm: ChecksumAlgorithm,
        compute_content_md5: bool,
        target: MessageTarget,
        signer: Arc<dyn Signer>,
        callbacks: MetaRequestCallbacks,
    ) -> (Self, oneshot::Receiver<FinishResult>) {
        let (finish_tx, finish_rx) = oneshot::channel();
        (
            Self {
                client,
                mr_type,
                part_size,
                checksum_algorithm,
                compute_content_md5,
                target,
                signer,
                callbacks: Mutex::new(callbacks),
                endpoint: Mutex::new(None),
                finish_tx: Mutex::new(Some(finish_tx)),
            },
            finish_rx,
        )
    }

    /// Wake the client's work loop.
    pub(crate) fn schedule_process_work(&self) {
        if let Some(client) = self.client.upgrade() {
            client.schedule_process_work();
        }
    }

    /// Default signing: stamp the current date-time and run the hook.
    pub(crate) fn sign_message(
        &self,
        message: &mut HttpMessage,
        body: &crate::s3::segmented_bytes::SegmentedBytes,
    ) -> Result<(), Error> {
        self.signer.sign(message, body, utc_now())
    }

    /// Invoke the user's headers callback at most once.
    pub(crate) fn invoke_headers_callback(&self, headers: &HeaderMap, status: u16) {
        let callback = self
            .callbacks
            .lock()
            .expect("meta-request callbacks lock")
            .headers
            .take();
        if let Some(callback) = callback {
            callback(headers, status);
        }
    }

    pub(crate) fn invoke_progress_callback(&self, progress: &Progress) {
        let callbacks = self.callbacks.lock().expect("meta-request callbacks lock");
        if let Some(callback) = callbacks.progress.as_ref() {
            callback(progress);
        }
    }

    /// Dispatch the terminal result: fire the finish callback, resolve the
    /// handle, and let the client drop the meta-request from its lists.
    pub(crate) fn finish(&self, result: FinishResult) {
        debug!(
            "meta-request {} finished; success={}",
            self.mr_type,
            result.is_success()
        );

        let finish = self
            .callbacks
            .lock()
            .expect("meta-request callbacks lock")
            .finish
            .take();
        if let Some(finish) = finish {
            finish(&result);
        }

        let tx = self
            .finish_tx
            .lock()
            .expect("meta-request finish lock")
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(result);
        }

        // Give back the lifetime reference on the endpoint. Neither the
        // client lock nor the meta-request lock is held here.
        if let Some(client) = self.client.upgrade() {
            let endpoint = self
                .endpoint
                .lock()
                .expect("meta-request endpoint lock")
                .take();
            if let Some(endpoint) = endpoint {
                client.endpoint_ops.release(&client, endpoint);
            }
        }

        self.schedule_process_work();
    }
}

/// Classifies an executed request's response, parsing the server error
/// body on failure. The default `send_request_finish` of every variant.
pub(crate) fn classify_response(response: &ResponseData) -> Result<(), Error> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }

    match ErrorResponse::parse(response.body.clone()) {
        Ok(parsed) => Err(Error::S3Error {
            status: response.status,
            response: parsed,
        }),
        Err(_) => Err(Error::ServerError(response.status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_wins() {
        let mut base = BaseState::default();
        base.set_fail_synced(None, Error::Canceled);
        base.set_fail_synced(None, Error::MissingUploadId);

        let result = base.take_finish_result().unwrap();
        assert!(matches!(result.error, Some(Error::Canceled)));
        // Dispatch happens once.
        assert!(base.take_finish_result().is_none());
    }

    #[test]
    fn success_does_not_overwrite_failure() {
        let mut base = BaseState::default();
        base.set_fail_synced(None, Error::Paused);
        base.set_success_synced();
        assert!(base.finish_preserves_upload());
        assert!(!base.finish_is_success());
    }
}
