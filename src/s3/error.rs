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

//! Error definitions for transfer engine operations

use crate::s3::utils::get_default_text;
use bytes::{Buf, Bytes};
use std::fmt;
use xmltree::Element;

/// Error body returned by the server for a failed S3 operation.
#[derive(Clone, Debug, Default)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub resource: String,
    pub request_id: String,
}

impl ErrorResponse {
    pub fn parse(body: Bytes) -> Result<Self, Error> {
        let root = Element::parse(body.reader()).map_err(Error::XmlParseError)?;

        Ok(Self {
            code: get_default_text(&root, "Code"),
            message: get_default_text(&root, "Message"),
            resource: get_default_text(&root, "Resource"),
            request_id: get_default_text(&root, "RequestId"),
        })
    }
}

/// Error definitions
#[derive(Debug)]
pub enum Error {
    IOError(std::io::Error),
    HttpError(reqwest::Error),
    InvalidUrl(http::uri::InvalidUri),
    XmlParseError(xmltree::ParseError),
    XmlError(String),
    JsonError(serde_json::Error),
    StrError(http::header::ToStrError),
    InvalidBaseUrl(String),
    InvalidBucketName(String),
    InvalidObjectName(String),
    UrlBuildError(String),
    InvalidResumeToken(String),
    InvalidMinPartSize(u64),
    InvalidMaxPartSize(u64),
    InvalidObjectSize(u64),
    InvalidPartCount(u64, u64, u32),
    TooManyParts,
    InsufficientData(u64, u64),
    ContentLengthUnknown,
    MissingUploadId,
    MissingEtag(u16),
    ListPartsParseFailed(String),
    ResumedPartChecksumMismatch(u16),
    ResumeFailed(String),
    Paused,
    Canceled,
    S3Error {
        status: u16,
        response: ErrorResponse,
    },
    ServerError(u16),
    ConnectionAcquireFailed(String),
    ClientShutdown,
    Internal(String),
}

impl Error {
    /// True when the finish result must not trigger a server-side abort of
    /// the multipart upload: pausing keeps the uploaded parts around for a
    /// later resume, and a failed resume must not destroy the very parts a
    /// retry with the same token would need.
    pub fn preserves_upload(&self) -> bool {
        matches!(
            self,
            Error::Paused | Error::ResumeFailed(_) | Error::ResumedPartChecksumMismatch(_)
        )
    }

    /// True when a request failing with this error may be handed back to the
    /// retry strategy instead of failing the meta-request outright.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::HttpError(_) => true,
            Error::ServerError(status) => *status >= 500,
            Error::ConnectionAcquireFailed(_) => true,
            Error::S3Error { status, response } => {
                *status >= 500
                    || response.code == "SlowDown"
                    || response.code == "RequestTimeout"
                    || response.code == "InternalError"
            }
            _ => false,
        }
    }

    /// HTTP response status associated with the error, if any.
    pub fn response_status(&self) -> Option<u16> {
        match self {
            Error::S3Error { status, .. } => Some(*status),
            Error::ServerError(status) => Some(*status),
            _ => None,
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IOError(e) => write!(f, "{e}"),
            Error::HttpError(e) => write!(f, "{e}"),
            Error::InvalidUrl(e) => write!(f, "{e}"),
            Error::XmlParseError(e) => write!(f, "{e}"),
            Error::XmlError(m) => write!(f, "{m}"),
            Error::JsonError(e) => write!(f, "{e}"),
            Error::StrError(e) => write!(f, "{e}"),
            Error::InvalidBaseUrl(m) => write!(f, "{m}"),
            Error::InvalidBucketName(m) => write!(f, "{m}"),
            Error::InvalidObjectName(m) => write!(f, "{m}"),
            Error::UrlBuildError(m) => write!(f, "{m}"),
            Error::InvalidResumeToken(m) => write!(f, "invalid resume token: {m}"),
            Error::InvalidMinPartSize(s) => {
                write!(f, "part size {s} is not supported; minimum allowed 5MiB")
            }
            Error::InvalidMaxPartSize(s) => {
                write!(f, "part size {s} is not supported; maximum allowed 5GiB")
            }
            Error::InvalidObjectSize(s) => {
                write!(f, "object size {s} is not supported; maximum allowed 5TiB")
            }
            Error::InvalidPartCount(os, ps, pc) => write!(
                f,
                "object size {os} and part size {ps} make more than {pc} parts for upload"
            ),
            Error::TooManyParts => write!(f, "too many parts for upload"),
            Error::InsufficientData(expected, got) => write!(
                f,
                "not enough data in the stream; expected: {expected}, got: {got} bytes",
            ),
            Error::ContentLengthUnknown => write!(f, "content length is unknown"),
            Error::MissingUploadId => {
                write!(f, "could not find upload-id in create-multipart-upload response")
            }
            Error::MissingEtag(part) => {
                write!(f, "could not find ETag header in response for part {part}")
            }
            Error::ListPartsParseFailed(m) => write!(f, "failed to parse list-parts response: {m}"),
            Error::ResumedPartChecksumMismatch(part) => write!(
                f,
                "checksum for previously uploaded part {part} does not match the stream"
            ),
            Error::ResumeFailed(m) => write!(f, "failed to resume upload: {m}"),
            Error::Paused => write!(f, "meta-request paused"),
            Error::Canceled => write!(f, "meta-request canceled"),
            Error::S3Error { status, response } => write!(
                f,
                "s3 operation failed; status: {}, code: {}, message: {}, resource: {}, request_id: {}",
                status, response.code, response.message, response.resource, response.request_id,
            ),
            Error::ServerError(status) => {
                write!(f, "server failed with HTTP status code {status}")
            }
            Error::ConnectionAcquireFailed(m) => {
                write!(f, "could not acquire an HTTP connection: {m}")
            }
            Error::ClientShutdown => write!(f, "client is shutting down"),
            Error::Internal(m) => write!(f, "{m}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IOError(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::HttpError(err)
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Error::InvalidUrl(err)
    }
}

impl From<xmltree::ParseError> for Error {
    fn from(err: xmltree::ParseError) -> Self {
        Error::XmlParseError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err)
    }
}

impl From<http::header::ToStrError> for Error {
    fn from(err: http::header::ToStrError) -> Self {
        Error::StrError(err)
    }
}
