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

//! Shared types of the transfer engine

use crate::s3::checksum::ChecksumAlgorithm;
use crate::s3::error::Error;
use crate::s3::multimap_ext::Multimap;
use crate::s3::request::RequestTag;
use http::HeaderMap;
use std::fmt;
use typed_builder::TypedBuilder;

/// Kind of a meta-request. Determines the admission ceiling applied to it
/// and which state machine drives it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetaRequestType {
    PutObject,
    GetObject,
    Default,
}

impl fmt::Display for MetaRequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaRequestType::PutObject => write!(f, "put-object"),
            MetaRequestType::GetObject => write!(f, "get-object"),
            MetaRequestType::Default => write!(f, "default"),
        }
    }
}

/// Scheduler hints passed to `update`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateFlags {
    /// The queue is already long enough; refrain from emitting new work
    /// that is not strictly needed to make progress.
    pub conservative: bool,
}

/// Content-MD5 policy for uploads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContentMd5 {
    #[default]
    Disabled,
    Enabled,
}

/// Transfer progress reported after each completed part.
#[derive(Clone, Copy, Debug)]
pub struct Progress {
    pub bytes_transferred: u64,
    pub content_length: u64,
}

/// Identity of the request a meta-request failed on.
#[derive(Clone, Copy, Debug)]
pub struct FailedRequest {
    pub tag: RequestTag,
    pub part_number: u16,
}

/// Terminal result of a meta-request, delivered exactly once.
#[derive(Debug, Default)]
pub struct FinishResult {
    /// `None` on success.
    pub error: Option<Error>,
    /// HTTP status of the response that failed the meta-request, if any.
    pub response_status: Option<u16>,
    /// The request the meta-request failed on, if any.
    pub failed_request: Option<FailedRequest>,
}

impl FinishResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Callback invoked with the final user-visible response headers.
pub type HeadersCallback = Box<dyn Fn(&HeaderMap, u16) + Send + Sync>;

/// Callback invoked after every completed part.
pub type ProgressCallback = Box<dyn Fn(&Progress) + Send + Sync>;

/// Callback invoked once when the meta-request terminates.
pub type FinishCallback = Box<dyn FnOnce(&FinishResult) + Send>;

/// User-facing callbacks of one meta-request.
#[derive(Default)]
pub struct MetaRequestCallbacks {
    pub headers: Option<HeadersCallback>,
    pub progress: Option<ProgressCallback>,
    pub finish: Option<FinishCallback>,
}

/// Options for submitting an auto-ranged put.
#[derive(TypedBuilder)]
pub struct PutObjectOptions {
    #[builder(setter(into))]
    pub bucket: String,

    #[builder(setter(into))]
    pub object: String,

    /// Extra headers sent with CreateMultipartUpload (user metadata,
    /// SSE-C, content-type and friends).
    #[builder(default)]
    pub headers: Multimap,

    /// Total body length in bytes. Required when the content itself does
    /// not know its size.
    #[builder(default, setter(into))]
    pub content_length: Option<u64>,

    /// Part size override; the client default applies when absent.
    #[builder(default, setter(into))]
    pub part_size: Option<u64>,

    #[builder(default)]
    pub checksum_algorithm: ChecksumAlgorithm,

    /// Serialized pause token from a previous invocation.
    #[builder(default, setter(into))]
    pub resume_token: Option<String>,

    #[builder(default, setter(strip_option))]
    pub headers_callback: Option<HeadersCallback>,

    #[builder(default, setter(strip_option))]
    pub progress_callback: Option<ProgressCallback>,

    #[builder(default, setter(strip_option))]
    pub finish_callback: Option<FinishCallback>,
}
