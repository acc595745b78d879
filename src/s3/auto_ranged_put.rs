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

//! The auto-ranged put: a resumable, checksummed multipart upload
//!
//! The state machine walks ListParts (resume only) → CreateMultipartUpload
//! → part uploads → CompleteMultipartUpload, with an abort branch that
//! runs after cancellation or failure. All phase flags and counters live
//! under one lock; the body stream is read strictly serially behind an
//! async mutex, off every lock.

use crate::s3::client::{ClientInner, MAX_MULTIPART_COUNT, MAX_OBJECT_SIZE, MAX_PART_SIZE, MIN_PART_SIZE};
use crate::s3::error::Error;
use crate::s3::header_constants::{CONTENT_MD5, CREATE_MPU_COPY_HEADERS, ETAG};
use crate::s3::list_parts::ListPartsPage;
use crate::s3::messages;
use crate::s3::messages::MessageTarget;
use crate::s3::meta_request::{BaseState, MetaRequest, MetaRequestShared, UpdateResult};
use crate::s3::multimap_ext::{Multimap, MultimapExt};
use crate::s3::object_content::{ContentStream, ObjectContent};
use crate::s3::request::{Request, RequestFlags, RequestTag};
use crate::s3::resume_token::ResumeToken;
use crate::s3::types::{
    FinishResult, MetaRequestCallbacks, MetaRequestType, Progress, PutObjectOptions, UpdateFlags,
};
use crate::s3::utils::{check_bucket_name, get_top_level_tag_value, strip_quotes};
use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use log::{debug, error};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Lifecycle of one protocol phase (list-parts, create, complete, abort).
#[derive(Clone, Copy, Debug, Default)]
struct PhaseState {
    sent: bool,
    completed: bool,
    succeeded: bool,
}

impl PhaseState {
    /// A phase that never runs for this upload.
    fn skipped() -> Self {
        Self {
            sent: true,
            completed: true,
            succeeded: true,
        }
    }
}

/// Everything guarded by the meta-request lock.
struct PutSynced {
    base: BaseState,
    upload_id: Option<String>,
    /// Quote-stripped ETags, indexed by part number - 1. Sparsely populated
    /// until the upload completes.
    etag_list: Vec<Option<String>>,
    /// Base64 checksums, indexed by part number - 1.
    checksums_list: Vec<Option<String>>,
    /// SSE-C response headers captured from CreateMultipartUpload (or the
    /// initial request on resume) for echoing with the final headers.
    needed_response_headers: Multimap,
    num_parts_sent: u32,
    num_parts_completed: u32,
    num_parts_successful: u32,
    num_parts_failed: u32,
    list_parts: PhaseState,
    list_parts_continuation_token: Option<String>,
    create_mpu: PhaseState,
    complete_mpu: PhaseState,
    abort_mpu: PhaseState,
    /// Scan cursor of the part loop; touched only by the work loop.
    next_part_number: u32,
}

/// Serial reader over the user's body stream. `num_parts_read_from_stream`
/// tracks how far the stream has advanced in part units, so resumed
/// uploads know how many bytes to skip before the next live part.
struct PutBodyReader {
    content: Option<ObjectContent>,
    stream: Option<ContentStream>,
    num_parts_read_from_stream: u32,
}

impl PutBodyReader {
    async fn stream(&mut self) -> Result<&mut ContentStream, Error> {
        if self.stream.is_none() {
            let content = self
                .content
                .take()
                .ok_or_else(|| Error::Internal("body stream already consumed".to_string()))?;
            self.stream = Some(content.into_content_stream().await?);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| Error::Internal("body stream unavailable".to_string()))
    }
}

/// What one `update` pass decided, computed entirely under the lock.
enum Decision {
    Emit(RequestTag, u16, RequestFlags),
    Wait,
    Finish,
}

pub struct AutoRangedPut {
    shared: MetaRequestShared,
    content_length: u64,
    total_num_parts: u32,
    synced: Mutex<PutSynced>,
    body: tokio::sync::Mutex<PutBodyReader>,
}

impl AutoRangedPut {
    /// Builds the meta-request from submit options. Validates the resume
    /// token, sizes the parts, and primes the phase flags.
    pub(crate) fn new(
        client: &Arc<ClientInner>,
        options: PutObjectOptions,
        content: ObjectContent,
    ) -> Result<(Arc<Self>, oneshot::Receiver<FinishResult>), Error> {
        check_bucket_name(&options.bucket)?;
        if options.object.is_empty() {
            return Err(Error::InvalidObjectName(String::from(
                "object name cannot be empty",
            )));
        }

        let content_length = match options.content_length.or(content.size_hint().value()) {
            Some(v) => v,
            None => return Err(Error::ContentLengthUnknown),
        };

        let requested_part_size = options.part_size.unwrap_or(client.config.part_size);

        let resume = match options.resume_token.as_deref() {
            Some(token) => {
                let token = ResumeToken::parse(token)?;
                token.validate_for_put_object(
                    content_length,
                    MIN_PART_SIZE,
                    MAX_MULTIPART_COUNT,
                )?;
                Some(token)
            }
            None => None,
        };

        // A resume token pins the part geometry of the original upload.
        let part_size = resume
            .as_ref()
            .map_or(requested_part_size, |t| t.partition_size);
        let total_num_parts = calc_num_parts(content_length, part_size)?;

        let target = MessageTarget {
            base_url: client.config.base_url.clone(),
            bucket: options.bucket,
            object: options.object,
            initial_headers: options.headers,
        };

        let compute_content_md5 = client.config.content_md5_enabled()
            || target.initial_headers.get_ignore_case(CONTENT_MD5).is_some();

        let callbacks = MetaRequestCallbacks {
            headers: options.headers_callback,
            progress: options.progress_callback,
            finish: options.finish_callback,
        };

        let (shared, finish_rx) = MetaRequestShared::new(
            Arc::downgrade(client),
            MetaRequestType::PutObject,
            part_size,
            options.checksum_algorithm,
            compute_content_md5,
            target,
            client.signer.clone(),
            callbacks,
        );

        let put = Self::build(shared, content_length, total_num_parts, resume, content);
        Ok((Arc::new(put), finish_rx))
    }

    /// Construction guts, callable without a live client.
    fn build(
        shared: MetaRequestShared,
        content_length: u64,
        total_num_parts: u32,
        resume: Option<ResumeToken>,
        content: ObjectContent,
    ) -> Self {
        let mut synced = PutSynced {
            base: BaseState::default(),
            upload_id: None,
            etag_list: vec![None; total_num_parts as usize],
            checksums_list: vec![None; total_num_parts as usize],
            needed_response_headers: Multimap::new(),
            num_parts_sent: 0,
            num_parts_completed: 0,
            num_parts_successful: 0,
            num_parts_failed: 0,
            list_parts: PhaseState::default(),
            list_parts_continuation_token: None,
            create_mpu: PhaseState::default(),
            complete_mpu: PhaseState::default(),
            abort_mpu: PhaseState::default(),
            next_part_number: 1,
        };

        match resume {
            Some(token) => {
                // CreateMultipartUpload never runs on resume, so the SSE-C
                // headers it would have captured come from the initial
                // request instead.
                for name in CREATE_MPU_COPY_HEADERS {
                    if let Some(value) = shared.target.initial_headers.get_ignore_case(name) {
                        synced.needed_response_headers.add(*name, value);
                    }
                }
                synced.upload_id = Some(token.multipart_upload_id);
                synced.create_mpu = PhaseState::skipped();
            }
            None => {
                synced.list_parts = PhaseState::skipped();
            }
        }

        debug!(
            "created auto-ranged put; content_length={} part_size={} total_num_parts={}",
            content_length, shared.part_size, total_num_parts
        );

        Self {
            shared,
            content_length,
            total_num_parts,
            synced: Mutex::new(synced),
            body: tokio::sync::Mutex::new(PutBodyReader {
                content: Some(content),
                stream: None,
                num_parts_read_from_stream: 0,
            }),
        }
    }

    /// Either the configured part size or, for the last part, whatever the
    /// content length leaves over.
    fn compute_request_body_size(&self, part_number: u32) -> u64 {
        let mut request_body_size = self.shared.part_size;
        if part_number == self.total_num_parts {
            let content_remainder = self.content_length % self.shared.part_size;
            if content_remainder > 0 {
                request_body_size = content_remainder;
            }
        }
        request_body_size
    }

    fn lock_synced(&self) -> std::sync::MutexGuard<'_, PutSynced> {
        self.synced.lock().expect("meta-request lock poisoned")
    }

    /// The state machine proper. Runs under the lock; mutates phase flags
    /// and counters; returns what the caller should do off-lock.
    fn update_synced(&self, synced: &mut PutSynced, flags: UpdateFlags) -> Decision {
        if !synced.base.has_finish_result() {
            // Resuming and the next ListParts page has not been requested.
            if !synced.list_parts.sent {
                synced.list_parts.sent = true;
                return Decision::Emit(RequestTag::ListParts, 0, RequestFlags::RECORD_RESPONSE_HEADERS);
            }

            // Waiting on list parts to finish.
            if !synced.list_parts.completed {
                return Decision::Wait;
            }

            if !synced.create_mpu.sent {
                synced.create_mpu.sent = true;
                return Decision::Emit(
                    RequestTag::CreateMultipartUpload,
                    0,
                    RequestFlags::RECORD_RESPONSE_HEADERS,
                );
            }

            if !synced.create_mpu.completed {
                return Decision::Wait;
            }

            if synced.num_parts_sent < self.total_num_parts {
                // Skip over parts the server already has (resume case);
                // preparation will advance the stream past their bytes.
                while (synced.next_part_number as usize) <= synced.etag_list.len()
                    && synced.etag_list[synced.next_part_number as usize - 1].is_some()
                {
                    synced.next_part_number += 1;
                }

                debug_assert!(synced.next_part_number <= self.total_num_parts);
                if synced.next_part_number > self.total_num_parts {
                    return Decision::Wait;
                }

                if flags.conservative {
                    // Upload streams are read strictly serially; when the
                    // scheduler is saturated, deep queuing of parts only
                    // wastes memory.
                    let num_parts_in_flight =
                        synced.num_parts_sent - synced.num_parts_completed;
                    if num_parts_in_flight > 0 {
                        return Decision::Wait;
                    }
                }

                let part_number = synced.next_part_number as u16;
                synced.next_part_number += 1;
                synced.num_parts_sent += 1;

                debug!(
                    "auto-ranged put: emitting request for part {} of {}",
                    part_number, self.total_num_parts
                );
                return Decision::Emit(
                    RequestTag::UploadPart,
                    part_number,
                    RequestFlags::RECORD_RESPONSE_HEADERS,
                );
            }

            // CompleteMultipartUpload has to wait for every part.
            if synced.num_parts_completed != self.total_num_parts {
                return Decision::Wait;
            }

            if !synced.complete_mpu.sent {
                synced.complete_mpu.sent = true;
                return Decision::Emit(
                    RequestTag::CompleteMultipartUpload,
                    0,
                    RequestFlags::RECORD_RESPONSE_HEADERS,
                );
            }

            if !synced.complete_mpu.completed {
                return Decision::Wait;
            }

            Decision::Finish
        } else {
            // Cancellation/failure path: drain in-flight phases, then
            // decide whether the server-side upload gets aborted.
            if !synced.create_mpu.sent {
                return Decision::Finish;
            }

            if !synced.create_mpu.completed {
                return Decision::Wait;
            }

            if synced.num_parts_completed < synced.num_parts_sent {
                return Decision::Wait;
            }

            if synced.complete_mpu.sent && !synced.complete_mpu.completed {
                return Decision::Wait;
            }

            if synced.base.finish_preserves_upload() {
                return Decision::Finish;
            }

            if synced.complete_mpu.completed && synced.complete_mpu.succeeded {
                return Decision::Finish;
            }

            if !synced.abort_mpu.sent {
                if synced.upload_id.is_none() {
                    return Decision::Finish;
                }

                synced.abort_mpu.sent = true;
                return Decision::Emit(
                    RequestTag::AbortMultipartUpload,
                    0,
                    RequestFlags::ALWAYS_SEND,
                );
            }

            if !synced.abort_mpu.completed {
                return Decision::Wait;
            }

            Decision::Finish
        }
    }

    /// Dispatch the terminal result exactly once, outside the lock.
    fn dispatch_finish(&self) {
        let result = self.lock_synced().base.take_finish_result();
        if let Some(result) = result {
            self.shared.finish(result);
        }
    }

    /// Reads and discards previously uploaded parts from the stream,
    /// re-verifying their checksums against the stored values.
    async fn skip_parts_from_stream(
        &self,
        reader: &mut PutBodyReader,
        skip_until_part_number: u32,
    ) -> Result<(), Error> {
        debug_assert!(reader.num_parts_read_from_stream <= skip_until_part_number);
        debug_assert!(skip_until_part_number <= self.total_num_parts);

        if reader.num_parts_read_from_stream == skip_until_part_number {
            return Ok(());
        }

        debug!(
            "auto-ranged put: skipping parts {} through {}",
            reader.num_parts_read_from_stream + 1,
            skip_until_part_number
        );

        for part_index in reader.num_parts_read_from_stream..skip_until_part_number {
            let part_number = part_index + 1;
            let request_body_size = self.compute_request_body_size(part_number);

            let body = reader
                .stream()
                .await?
                .read_upto(request_body_size as usize)
                .await
                .map_err(|e| Error::ResumeFailed(format!("input stream cannot be read: {e}")))?;

            if body.len() as u64 != request_body_size {
                return Err(Error::ResumeFailed(format!(
                    "input stream ended early while skipping part {part_number}"
                )));
            }

            let stored_checksum = self.lock_synced().checksums_list[part_index as usize].clone();
            if let Some(stored) = stored_checksum {
                if let Some(computed) = self.shared.checksum_algorithm.compute(&body) {
                    if computed != stored {
                        error!(
                            "auto-ranged put: checksum for previously uploaded part {} does not \
                             match the stream",
                            part_number
                        );
                        return Err(Error::ResumedPartChecksumMismatch(part_number as u16));
                    }
                }
            }
        }

        reader.num_parts_read_from_stream = skip_until_part_number;
        Ok(())
    }

    fn finished_list_parts(&self, request: &Request, result: Result<(), Error>) {
        let mut error = result.err();
        let mut parsed_page = None;

        if error.is_none() {
            match ListPartsPage::parse(&request.response.body) {
                Ok(page) => parsed_page = Some(page),
                Err(e) => error = Some(e),
            }
        }

        let mut synced = self.lock_synced();
        let mut has_more_results = false;

        if let Some(page) = parsed_page {
            for part in &page.parts {
                let part_index = part.part_number as usize - 1;
                if part_index >= synced.etag_list.len() {
                    error = Some(Error::ListPartsParseFailed(format!(
                        "part number {} exceeds the expected {} parts",
                        part.part_number,
                        synced.etag_list.len()
                    )));
                    break;
                }

                if let Some(checksum) = part.checksum_for(self.shared.checksum_algorithm) {
                    synced.checksums_list[part_index] = Some(checksum.to_string());
                }
                synced.etag_list[part_index] = Some(strip_quotes(&part.etag).to_string());
            }

            if error.is_none() {
                synced.list_parts_continuation_token = page.next_part_number_marker.clone();
                has_more_results = page.is_truncated;

                if !has_more_results {
                    // Pagination is done; account for everything the server
                    // already has so the part loop skips it.
                    let previously_uploaded = synced
                        .etag_list
                        .iter()
                        .filter(|etag| etag.is_some())
                        .count() as u32;
                    synced.num_parts_sent += previously_uploaded;
                    synced.num_parts_completed += previously_uploaded;
                    synced.num_parts_successful += previously_uploaded;

                    debug!(
                        "auto-ranged put: resuming; {} out of {} parts completed during a \
                         previous request",
                        synced.num_parts_completed, self.total_num_parts
                    );
                }
            }
        }

        if has_more_results {
            // Ask for the next page on the following update pass.
            synced.list_parts.sent = false;
        } else {
            synced.list_parts.completed = true;
            synced.list_parts.succeeded = error.is_none();
        }

        if let Some(error) = error {
            synced.base.set_fail_synced(Some(request), error);
        }
    }

    fn finished_create_mpu(&self, request: &Request, result: Result<(), Error>) {
        let mut error = result.err();
        let mut upload_id = None;
        let mut needed_response_headers = Multimap::new();

        if error.is_none() {
            // Capture headers needed for the final, transformed headers.
            for name in CREATE_MPU_COPY_HEADERS {
                if let Some(value) = request.response.headers.get(*name) {
                    if let Ok(value) = value.to_str() {
                        needed_response_headers.add(*name, value);
                    }
                }
            }

            match get_top_level_tag_value(&request.response.body, "UploadId") {
                Ok(id) if !id.is_empty() => upload_id = Some(id),
                _ => {
                    error!("auto-ranged put: could not find upload-id in create-multipart-upload response");
                    error = Some(Error::MissingUploadId);
                }
            }
        }

        let mut synced = self.lock_synced();

        synced.needed_response_headers = needed_response_headers;
        synced.create_mpu.completed = true;
        synced.create_mpu.succeeded = error.is_none();
        if let Some(id) = upload_id {
            synced.upload_id = Some(id);
        }

        if let Some(error) = error {
            synced.base.set_fail_synced(Some(request), error);
        }
    }

    fn finished_part(&self, request: &Request, result: Result<(), Error>) {
        debug_assert!(request.part_number > 0);
        let part_index = request.part_number as usize - 1;

        let mut error = result.err();
        let mut etag = None;

        if error.is_none() {
            match request.response.headers.get(ETAG).map(|v| v.to_str()) {
                Some(Ok(value)) => etag = Some(strip_quotes(value).to_string()),
                _ => {
                    error!(
                        "auto-ranged put: could not find ETag header for part {}",
                        request.part_number
                    );
                    error = Some(Error::MissingEtag(request.part_number));
                }
            }
        }

        if error.is_none() {
            self.shared.invoke_progress_callback(&Progress {
                bytes_transferred: request.body.len() as u64,
                content_length: self.content_length,
            });
        }

        let mut synced = self.lock_synced();

        synced.num_parts_completed += 1;
        debug!(
            "auto-ranged put: {} out of {} parts have completed",
            synced.num_parts_completed, self.total_num_parts
        );

        match error {
            None => {
                synced.num_parts_successful += 1;
                synced.etag_list[part_index] = etag;
            }
            Some(error) => {
                synced.num_parts_failed += 1;
                synced.base.set_fail_synced(Some(request), error);
            }
        }
    }

    fn finished_complete_mpu(&self, request: &Request, result: Result<(), Error>) {
        let error = result.err();

        if error.is_none() {
            // Synthesize the final user-visible headers: raw response
            // headers, the captured SSE-C headers, and the object ETag
            // pulled out of the XML body.
            let mut final_headers: HeaderMap = request.response.headers.clone();

            {
                let synced = self.lock_synced();
                for (key, values) in synced.needed_response_headers.iter_all() {
                    for value in values {
                        if let (Ok(name), Ok(value)) = (
                            HeaderName::from_bytes(key.as_bytes()),
                            HeaderValue::from_str(value),
                        ) {
                            final_headers.insert(name, value);
                        }
                    }
                }
            }

            if let Ok(etag) = get_top_level_tag_value(&request.response.body, "ETag") {
                if let Ok(value) = HeaderValue::from_str(&etag) {
                    final_headers.insert(http::header::ETAG, value);
                }
            }

            self.shared
                .invoke_headers_callback(&final_headers, request.response.status);
        }

        let mut synced = self.lock_synced();
        synced.complete_mpu.completed = true;
        synced.complete_mpu.succeeded = error.is_none();

        if let Some(error) = error {
            synced.base.set_fail_synced(Some(request), error);
        }
    }

    fn finished_abort_mpu(&self, result: Result<(), Error>) {
        let mut synced = self.lock_synced();
        synced.abort_mpu.completed = true;
        synced.abort_mpu.succeeded = result.is_ok();
    }
}

#[async_trait]
impl MetaRequest for AutoRangedPut {
    fn meta_request_type(&self) -> MetaRequestType {
        MetaRequestType::PutObject
    }

    fn shared(&self) -> &MetaRequestShared {
        &self.shared
    }

    fn update(self: Arc<Self>, flags: UpdateFlags) -> UpdateResult {
        let decision = {
            let mut synced = self.lock_synced();
            let decision = self.update_synced(&mut synced, flags);
            if matches!(decision, Decision::Finish) {
                synced.base.set_success_synced();
            }
            decision
        };

        match decision {
            Decision::Emit(tag, part_number, request_flags) => {
                let this: Arc<dyn MetaRequest> = self.clone();
                let mut request = Request::new(this, tag, request_flags);
                request.part_number = part_number;
                UpdateResult::Work(request)
            }
            Decision::Wait => UpdateResult::Waiting,
            Decision::Finish => {
                self.dispatch_finish();
                UpdateResult::Done
            }
        }
    }

    async fn prepare_request(&self, request: &mut Request) -> Result<(), Error> {
        let mut message = match request.tag {
            RequestTag::ListParts => {
                let (upload_id, marker) = {
                    let synced = self.lock_synced();
                    (
                        synced.upload_id.clone().ok_or_else(|| {
                            Error::Internal("list-parts without an upload id".to_string())
                        })?,
                        synced.list_parts_continuation_token.clone(),
                    )
                };
                messages::list_parts_message(&self.shared.target, &upload_id, marker.as_deref())?
            }

            RequestTag::CreateMultipartUpload => messages::create_multipart_upload_message(
                &self.shared.target,
                self.shared.checksum_algorithm,
            )?,

            RequestTag::UploadPart => {
                let part_number = request.part_number as u32;
                let request_body_size = self.compute_request_body_size(part_number);

                if request.num_times_prepared == 0 {
                    let mut reader = self.body.lock().await;

                    self.skip_parts_from_stream(&mut reader, part_number - 1).await?;

                    let body = reader
                        .stream()
                        .await?
                        .read_upto(request_body_size as usize)
                        .await?;
                    if body.len() as u64 != request_body_size {
                        return Err(Error::InsufficientData(
                            request_body_size,
                            body.len() as u64,
                        ));
                    }
                    reader.num_parts_read_from_stream = part_number;

                    let checksum = self.shared.checksum_algorithm.compute(&body);
                    request.body = body;
                    if checksum.is_some() {
                        self.lock_synced().checksums_list[part_number as usize - 1] =
                            checksum;
                    }
                }

                let (upload_id, checksum) = {
                    let synced = self.lock_synced();
                    (
                        synced.upload_id.clone().ok_or_else(|| {
                            Error::Internal("upload-part without an upload id".to_string())
                        })?,
                        synced.checksums_list[request.part_number as usize - 1].clone(),
                    )
                };

                messages::upload_part_message(
                    &self.shared.target,
                    &upload_id,
                    request.part_number,
                    &request.body,
                    self.shared.compute_content_md5,
                    self.shared.checksum_algorithm,
                    checksum.as_deref(),
                )?
            }

            RequestTag::CompleteMultipartUpload => {
                if request.num_times_prepared == 0 {
                    // Corner case of the trailing parts having been uploaded
                    // before the pause: their bytes still have to be read
                    // (and verified) off the stream.
                    let mut reader = self.body.lock().await;
                    self.skip_parts_from_stream(&mut reader, self.total_num_parts).await?;
                }

                let synced = self.lock_synced();
                let upload_id = synced.upload_id.clone().ok_or_else(|| {
                    Error::Internal("complete-multipart-upload without an upload id".to_string())
                })?;
                let body = messages::complete_multipart_upload_body(
                    &synced.etag_list,
                    &synced.checksums_list,
                    self.shared.checksum_algorithm,
                )?;
                let message = messages::complete_multipart_upload_message(
                    &self.shared.target,
                    &upload_id,
                    &body,
                )?;
                drop(synced);
                request.body = body;
                message
            }

            RequestTag::AbortMultipartUpload => {
                let upload_id = {
                    let synced = self.lock_synced();
                    synced.upload_id.clone().ok_or_else(|| {
                        Error::Internal("abort-multipart-upload without an upload id".to_string())
                    })?
                };
                debug!("auto-ranged put: abort request for upload id {upload_id}");
                messages::abort_multipart_upload_message(&self.shared.target, &upload_id)?
            }
        };

        self.shared.sign_message(&mut message, &request.body)?;
        request.message = Some(message);
        request.num_times_prepared += 1;

        debug!(
            "auto-ranged put: prepared {} request (part {})",
            request.tag, request.part_number
        );
        Ok(())
    }

    fn finished_request(&self, request: Box<Request>, result: Result<(), Error>) {
        match request.tag {
            RequestTag::ListParts => self.finished_list_parts(&request, result),
            RequestTag::CreateMultipartUpload => self.finished_create_mpu(&request, result),
            RequestTag::UploadPart => self.finished_part(&request, result),
            RequestTag::CompleteMultipartUpload => self.finished_complete_mpu(&request, result),
            RequestTag::AbortMultipartUpload => self.finished_abort_mpu(result),
        }

        self.shared.schedule_process_work();
    }

    fn set_fail(&self, failed_request: Option<&Request>, error: Error) {
        self.lock_synced().base.set_fail_synced(failed_request, error);
    }

    fn has_finish_result(&self) -> bool {
        self.lock_synced().base.has_finish_result()
    }

    fn pause(&self) -> Result<Option<String>, Error> {
        let mut synced = self.lock_synced();

        // A token only exists once the multipart upload does; without an
        // upload id there is nothing to resume.
        let token = match (&synced.upload_id, synced.create_mpu.completed) {
            (Some(upload_id), true) => Some(
                ResumeToken::for_put_object(upload_id, self.shared.part_size, self.total_num_parts)
                    .serialize()?,
            ),
            _ => None,
        };

        // Fail with PAUSED so the abort branch leaves the uploaded parts
        // in place for a later resume.
        synced.base.set_fail_synced(None, Error::Paused);
        drop(synced);

        self.shared.schedule_process_work();
        Ok(token)
    }
}

/// Number of parts a body of `content_length` bytes makes at `part_size`.
fn calc_num_parts(content_length: u64, part_size: u64) -> Result<u32, Error> {
    if part_size < MIN_PART_SIZE {
        return Err(Error::InvalidMinPartSize(part_size));
    }
    if part_size > MAX_PART_SIZE {
        return Err(Error::InvalidMaxPartSize(part_size));
    }
    if content_length > MAX_OBJECT_SIZE {
        return Err(Error::InvalidObjectSize(content_length));
    }

    let mut num_parts = (content_length / part_size) as u32;
    if content_length % part_size > 0 {
        num_parts += 1;
    }
    if num_parts == 0 {
        num_parts = 1;
    }
    if num_parts > MAX_MULTIPART_COUNT {
        return Err(Error::InvalidPartCount(
            content_length,
            part_size,
            MAX_MULTIPART_COUNT,
        ));
    }

    Ok(num_parts)
}
