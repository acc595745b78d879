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

//! The ephemeral pairing of a request with the connection driving it

use crate::s3::endpoint::Endpoint;
use crate::s3::request::Request;
use crate::s3::retry::RetryToken;
use std::sync::Arc;

/// How one request attempt concluded, as reported back to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionFinishCode {
    Success,
    Failed,
    Retry,
}

/// Lives for exactly one request attempt: the endpoint the connection was
/// acquired from, the request being driven, and the retry token carried
/// across attempts (absent until the first failure).
pub(crate) struct Connection {
    pub endpoint: Arc<Endpoint>,
    pub request: Option<Box<Request>>,
    pub retry_token: Option<RetryToken>,
}
