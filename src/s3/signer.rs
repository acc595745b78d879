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

//! Request-signing hook
//!
//! Signing is a collaborator concern; the engine only guarantees that every
//! prepared request passes through the hook with a fresh signing date
//! before it goes on the wire.

use crate::s3::error::Error;
use crate::s3::messages::HttpMessage;
use crate::s3::segmented_bytes::SegmentedBytes;
use crate::s3::utils::UtcTime;

pub trait Signer: Send + Sync {
    fn sign(
        &self,
        message: &mut HttpMessage,
        body: &SegmentedBytes,
        date_time: UtcTime,
    ) -> Result<(), Error>;
}

/// No-op signer for anonymous access.
pub struct AnonymousSigner;

impl Signer for AnonymousSigner {
    fn sign(
        &self,
        _message: &mut HttpMessage,
        _body: &SegmentedBytes,
        _date_time: UtcTime,
    ) -> Result<(), Error> {
        Ok(())
    }
}
