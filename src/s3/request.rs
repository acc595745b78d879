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

//! The single-HTTP-request artifact driven through the client pipeline

use crate::s3::messages::HttpMessage;
use crate::s3::meta_request::MetaRequest;
use crate::s3::retry::RetryToken;
use crate::s3::segmented_bytes::SegmentedBytes;
use bytes::Bytes;
use http::HeaderMap;
use std::fmt;
use std::sync::Arc;

/// Discriminates the requests an auto-ranged put issues. Every request a
/// meta-request surfaces carries exactly one tag; the finish hook uses it
/// to route the response into the right phase of the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestTag {
    ListParts,
    CreateMultipartUpload,
    UploadPart,
    CompleteMultipartUpload,
    AbortMultipartUpload,
}

impl fmt::Display for RequestTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestTag::ListParts => write!(f, "list-parts"),
            RequestTag::CreateMultipartUpload => write!(f, "create-multipart-upload"),
            RequestTag::UploadPart => write!(f, "upload-part"),
            RequestTag::CompleteMultipartUpload => write!(f, "complete-multipart-upload"),
            RequestTag::AbortMultipartUpload => write!(f, "abort-multipart-upload"),
        }
    }
}

/// Creation-time behavior flags of a [`Request`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestFlags {
    /// Capture the response headers so the finish hook can inspect them.
    pub record_response_headers: bool,
    /// Send even after the meta-request acquired a finish result (used by
    /// the abort so cancellation does not strip it from the queue).
    pub always_send: bool,
}

impl RequestFlags {
    pub const RECORD_RESPONSE_HEADERS: RequestFlags = RequestFlags {
        record_response_headers: true,
        always_send: false,
    };

    pub const ALWAYS_SEND: RequestFlags = RequestFlags {
        record_response_headers: true,
        always_send: true,
    };
}

/// Response capture of one executed request.
#[derive(Clone, Debug, Default)]
pub struct ResponseData {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// One HTTP request in flight on behalf of a meta-request. Created by
/// `update`, filled in by `prepare_request`, executed on a connection, and
/// consumed by `finished_request`.
pub struct Request {
    pub meta_request: Arc<dyn MetaRequest>,
    pub tag: RequestTag,
    /// 1-based part number; 0 when the request is not a part upload.
    pub part_number: u16,
    pub flags: RequestFlags,
    /// Number of times this request went through preparation. Retries
    /// re-prepare with the body already read, so preparation skips the
    /// stream-consuming paths when this is non-zero.
    pub num_times_prepared: u32,
    /// Request body, retained across retries.
    pub body: SegmentedBytes,
    /// The HTTP message built by preparation.
    pub message: Option<HttpMessage>,
    pub response: ResponseData,
    /// Retry accounting carried across attempts; `None` until the first
    /// failure.
    pub(crate) retry_token: Option<RetryToken>,
}

impl Request {
    pub fn new(meta_request: Arc<dyn MetaRequest>, tag: RequestTag, flags: RequestFlags) -> Box<Self> {
        Box::new(Self {
            meta_request,
            tag,
            part_number: 0,
            flags,
            num_times_prepared: 0,
            body: SegmentedBytes::new(),
            message: None,
            response: ResponseData::default(),
            retry_token: None,
        })
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("tag", &self.tag)
            .field("part_number", &self.part_number)
            .field("num_times_prepared", &self.num_times_prepared)
            .field("body_len", &self.body.len())
            .finish()
    }
}
