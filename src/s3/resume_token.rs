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

//! Persisted pause/resume token for multipart uploads

use crate::s3::error::Error;
use serde::{Deserialize, Serialize};

/// Token type tag for a paused PutObject. The literal is part of the
/// persisted format and must stay stable across releases.
pub const PUT_OBJECT_TOKEN_TYPE: &str = "AWS_S3_META_REQUEST_TYPE_PUT_OBJECT";

/// Opaque-to-the-caller state emitted by `pause()` and accepted on
/// construction to resume a multipart upload. Serialized as UTF-8 JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeToken {
    #[serde(rename = "type")]
    pub token_type: String,
    pub multipart_upload_id: String,
    pub partition_size: u64,
    pub total_num_parts: u32,
}

impl ResumeToken {
    pub fn for_put_object(upload_id: &str, partition_size: u64, total_num_parts: u32) -> Self {
        Self {
            token_type: PUT_OBJECT_TOKEN_TYPE.to_string(),
            multipart_upload_id: upload_id.to_string(),
            partition_size,
            total_num_parts,
        }
    }

    pub fn parse(token: &str) -> Result<Self, Error> {
        serde_json::from_str(token)
            .map_err(|e| Error::InvalidResumeToken(format!("malformed token: {e}")))
    }

    pub fn serialize(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Validates the token against a put of `content_length` bytes and the
    /// engine's part limits.
    pub fn validate_for_put_object(
        &self,
        content_length: u64,
        min_part_size: u64,
        max_num_parts: u32,
    ) -> Result<(), Error> {
        if self.token_type != PUT_OBJECT_TOKEN_TYPE {
            return Err(Error::InvalidResumeToken(format!(
                "token type '{}' is not a put-object token",
                self.token_type
            )));
        }

        if self.partition_size < min_part_size {
            return Err(Error::InvalidResumeToken(format!(
                "part size {} specified in the token is below the multipart minimum",
                self.partition_size
            )));
        }

        if self.total_num_parts > max_num_parts {
            return Err(Error::InvalidResumeToken(format!(
                "total number of parts {} specified in the token is too large",
                self.total_num_parts
            )));
        }

        let mut num_parts = (content_length / self.partition_size) as u32;
        if content_length % self.partition_size > 0 {
            num_parts += 1;
        }
        if num_parts != self.total_num_parts {
            return Err(Error::InvalidResumeToken(format!(
                "persisted number of parts {} does not match the expected {} for the body length",
                self.total_num_parts, num_parts
            )));
        }

        Ok(())
    }
}
