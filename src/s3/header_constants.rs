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

pub const CONTENT_MD5: &str = "Content-MD5";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const AUTHORIZATION: &str = "Authorization";
pub const ETAG: &str = "ETag";
pub const HOST: &str = "Host";
pub const USER_AGENT: &str = "User-Agent";

pub const X_AMZ_CHECKSUM_ALGORITHM: &str = "x-amz-checksum-algorithm";
pub const X_AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";
pub const X_AMZ_DATE: &str = "x-amz-date";

pub const X_AMZ_SSE_CUSTOMER_ALGORITHM: &str = "x-amz-server-side-encryption-customer-algorithm";
pub const X_AMZ_SSE_CUSTOMER_KEY: &str = "x-amz-server-side-encryption-customer-key";
pub const X_AMZ_SSE_CUSTOMER_KEY_MD5: &str = "x-amz-server-side-encryption-customer-key-MD5";
pub const X_AMZ_SSE_CONTEXT: &str = "x-amz-server-side-encryption-context";

/// Response headers from CreateMultipartUpload that must be echoed back to
/// the user with the final CompleteMultipartUpload headers.
pub const CREATE_MPU_COPY_HEADERS: &[&str] = &[
    X_AMZ_SSE_CUSTOMER_ALGORITHM,
    X_AMZ_SSE_CUSTOMER_KEY_MD5,
    X_AMZ_SSE_CONTEXT,
];
