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

//! In-memory S3 double plugged in through the transport trait. Drives the
//! whole client pipeline without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use http::header::HeaderValue;
use http::HeaderMap;
use s3_turbine::s3::client::TurbineClient;
use s3_turbine::s3::error::Error;
use s3_turbine::s3::messages::HttpMessage;
use s3_turbine::s3::multimap_ext::{Multimap, MultimapExt};
use s3_turbine::s3::request::ResponseData;
use s3_turbine::s3::retry::ExponentialBackoffRetry;
use s3_turbine::s3::segmented_bytes::SegmentedBytes;
use s3_turbine::s3::transport::{ConnectionManager, EndpointOptions, HttpConnection, Transport};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const SSE_C_HEADERS: &[&str] = &[
    "x-amz-server-side-encryption-customer-algorithm",
    "x-amz-server-side-encryption-customer-key-MD5",
    "x-amz-server-side-encryption-context",
];

/// Deterministic pseudo-random body bytes.
pub fn test_body(len: usize, seed: u64) -> Bytes {
    let mut data = Vec::with_capacity(len + 8);
    let mut state = seed ^ 0x9e3779b97f4a7c15;
    while data.len() < len {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        data.extend_from_slice(&state.to_le_bytes());
    }
    data.truncate(len);
    Bytes::from(data)
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Multimap,
    pub headers: Multimap,
    pub body_len: usize,
}

impl RecordedRequest {
    pub fn is_create(&self) -> bool {
        self.method == "POST" && self.query.contains_key("uploads")
    }

    pub fn is_part(&self) -> bool {
        self.method == "PUT" && self.query.contains_key("partNumber")
    }

    pub fn is_complete(&self) -> bool {
        self.method == "POST" && self.query.contains_key("uploadId")
    }

    pub fn is_abort(&self) -> bool {
        self.method == "DELETE"
    }

    pub fn is_list_parts(&self) -> bool {
        self.method == "GET" && self.query.contains_key("uploadId")
    }

    pub fn part_number(&self) -> Option<u16> {
        self.query.get("partNumber").and_then(|v| v.parse().ok())
    }
}

#[derive(Clone, Debug)]
pub struct StoredPart {
    pub etag: String,
    pub data: Bytes,
    pub checksum_crc32c: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CompletedUpload {
    pub upload_id: String,
    pub body_xml: String,
    pub etag: String,
    pub object_bytes: Bytes,
}

#[derive(Default)]
pub struct MockS3State {
    pub next_upload_id: u32,
    pub uploads: HashMap<String, HashMap<u16, StoredPart>>,
    pub completed: Vec<CompletedUpload>,
    pub aborted: Vec<String>,
    pub requests: Vec<RecordedRequest>,
    pub create_failures_remaining: u32,
    pub part_failures_remaining: u32,
    /// Parts per ListParts page; 0 serves everything in one page.
    pub list_page_size: usize,
    pub part_delay: Option<Duration>,
}

pub struct MockS3 {
    pub state: Mutex<MockS3State>,
}

impl MockS3 {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockS3State::default()),
        })
    }

    pub fn lock(&self) -> MutexGuard<'_, MockS3State> {
        self.state.lock().expect("mock state lock")
    }

    /// Pre-populate an in-progress upload, as if parts were uploaded by an
    /// earlier process.
    pub fn seed_upload(&self, upload_id: &str, parts: Vec<(u16, Bytes, Option<String>)>) {
        let mut state = self.lock();
        let upload = state.uploads.entry(upload_id.to_string()).or_default();
        for (part_number, data, checksum_crc32c) in parts {
            upload.insert(
                part_number,
                StoredPart {
                    etag: format!("{:x}", md5::compute(&data)),
                    data,
                    checksum_crc32c,
                },
            );
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    async fn handle(
        &self,
        message: &HttpMessage,
        body: &SegmentedBytes,
    ) -> Result<ResponseData, Error> {
        let record = RecordedRequest {
            method: message.method.to_string(),
            path: message.url.path.clone(),
            query: message.url.query.clone(),
            headers: message.headers.clone(),
            body_len: body.len(),
        };

        let delay = {
            let mut state = self.lock();
            state.requests.push(record.clone());
            if record.is_part() {
                state.part_delay
            } else {
                None
            }
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if record.is_create() {
            return Ok(self.handle_create(message));
        }
        if record.is_part() {
            return Ok(self.handle_part(&record, message, body));
        }
        if record.is_list_parts() {
            return Ok(self.handle_list_parts(&record));
        }
        if record.is_abort() {
            return Ok(self.handle_abort(&record));
        }
        if record.is_complete() {
            return Ok(self.handle_complete(&record, body));
        }

        Ok(server_error(400, "InvalidRequest"))
    }

    fn handle_create(&self, message: &HttpMessage) -> ResponseData {
        let mut state = self.lock();
        if state.create_failures_remaining > 0 {
            state.create_failures_remaining -= 1;
            return server_error(500, "InternalError");
        }

        state.next_upload_id += 1;
        let upload_id = format!("upload-{}", state.next_upload_id);
        state.uploads.insert(upload_id.clone(), HashMap::new());

        // SSE-C request headers come back as response headers.
        let mut headers = HeaderMap::new();
        for name in SSE_C_HEADERS {
            if let Some(value) = message.headers.get_ignore_case(name) {
                if let (Ok(name), Ok(value)) = (
                    http::header::HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    headers.insert(name, value);
                }
            }
        }

        ResponseData {
            status: 200,
            headers,
            body: Bytes::from(format!(
                "<InitiateMultipartUploadResult><UploadId>{upload_id}</UploadId>\
                 </InitiateMultipartUploadResult>"
            )),
        }
    }

    fn handle_part(
        &self,
        record: &RecordedRequest,
        message: &HttpMessage,
        body: &SegmentedBytes,
    ) -> ResponseData {
        let mut state = self.lock();
        if state.part_failures_remaining > 0 {
            state.part_failures_remaining -= 1;
            return server_error(500, "InternalError");
        }

        let upload_id = record.query.get("uploadId").cloned().unwrap_or_default();
        let part_number = match record.part_number() {
            Some(v) => v,
            None => return server_error(400, "InvalidPart"),
        };
        let data = body.to_bytes();
        let etag = format!("{:x}", md5::compute(&data));
        let checksum_crc32c = message
            .headers
            .get_ignore_case("x-amz-checksum-crc32c")
            .map(str::to_string);

        let upload = match state.uploads.get_mut(&upload_id) {
            Some(upload) => upload,
            None => return server_error(404, "NoSuchUpload"),
        };
        upload.insert(
            part_number,
            StoredPart {
                etag: etag.clone(),
                data,
                checksum_crc32c,
            },
        );

        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format!("\"{etag}\"")) {
            headers.insert(http::header::ETAG, value);
        }
        ResponseData {
            status: 200,
            headers,
            body: Bytes::new(),
        }
    }

    fn handle_list_parts(&self, record: &RecordedRequest) -> ResponseData {
        let state = self.lock();
        let upload_id = record.query.get("uploadId").cloned().unwrap_or_default();
        let upload = match state.uploads.get(&upload_id) {
            Some(upload) => upload,
            None => return server_error(404, "NoSuchUpload"),
        };

        let marker: u16 = record
            .query
            .get("part-number-marker")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let mut part_numbers: Vec<u16> =
            upload.keys().copied().filter(|n| *n > marker).collect();
        part_numbers.sort_unstable();

        let page_size = if state.list_page_size == 0 {
            part_numbers.len()
        } else {
            state.list_page_size
        };
        let truncated = part_numbers.len() > page_size;
        part_numbers.truncate(page_size.max(1));

        let mut xml = String::from("<ListPartsResult>");
        xml.push_str(&format!("<IsTruncated>{truncated}</IsTruncated>"));
        if truncated {
            if let Some(last) = part_numbers.last() {
                xml.push_str(&format!("<NextPartNumberMarker>{last}</NextPartNumberMarker>"));
            }
        }
        for part_number in &part_numbers {
            let part = &upload[part_number];
            xml.push_str("<Part>");
            xml.push_str(&format!("<PartNumber>{part_number}</PartNumber>"));
            xml.push_str(&format!("<ETag>\"{}\"</ETag>", part.etag));
            xml.push_str(&format!("<Size>{}</Size>", part.data.len()));
            if let Some(checksum) = &part.checksum_crc32c {
                xml.push_str(&format!("<ChecksumCRC32C>{checksum}</ChecksumCRC32C>"));
            }
            xml.push_str("</Part>");
        }
        xml.push_str("</ListPartsResult>");

        ResponseData {
            status: 200,
            headers: HeaderMap::new(),
            body: Bytes::from(xml),
        }
    }

    fn handle_abort(&self, record: &RecordedRequest) -> ResponseData {
        let mut state = self.lock();
        let upload_id = record.query.get("uploadId").cloned().unwrap_or_default();
        state.uploads.remove(&upload_id);
        state.aborted.push(upload_id);
        ResponseData {
            status: 204,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    fn handle_complete(&self, record: &RecordedRequest, body: &SegmentedBytes) -> ResponseData {
        let mut state = self.lock();
        let upload_id = record.query.get("uploadId").cloned().unwrap_or_default();
        let body_xml = String::from_utf8_lossy(&body.to_bytes()).to_string();

        let upload = match state.uploads.remove(&upload_id) {
            Some(upload) => upload,
            None => return server_error(404, "NoSuchUpload"),
        };

        let mut part_numbers: Vec<u16> = upload.keys().copied().collect();
        part_numbers.sort_unstable();
        let mut object_bytes = Vec::new();
        let mut etag_concat = String::new();
        for part_number in &part_numbers {
            object_bytes.extend_from_slice(&upload[part_number].data);
            etag_concat.push_str(&upload[part_number].etag);
        }
        let etag = format!("{:x}-{}", md5::compute(etag_concat.as_bytes()), part_numbers.len());

        state.completed.push(CompletedUpload {
            upload_id,
            body_xml,
            etag: etag.clone(),
            object_bytes: Bytes::from(object_bytes),
        });

        ResponseData {
            status: 200,
            headers: HeaderMap::new(),
            body: Bytes::from(format!(
                "<CompleteMultipartUploadResult><ETag>&quot;{etag}&quot;</ETag>\
                 </CompleteMultipartUploadResult>"
            )),
        }
    }
}

fn server_error(status: u16, code: &str) -> ResponseData {
    ResponseData {
        status,
        headers: HeaderMap::new(),
        body: Bytes::from(format!(
            "<Error><Code>{code}</Code><Message>injected failure</Message></Error>"
        )),
    }
}

pub struct MockTransport {
    pub s3: Arc<MockS3>,
}

impl Transport for MockTransport {
    fn connection_manager(
        &self,
        _options: &EndpointOptions,
    ) -> Result<Arc<dyn ConnectionManager>, Error> {
        Ok(Arc::new(MockConnectionManager {
            s3: self.s3.clone(),
        }))
    }
}

struct MockConnectionManager {
    s3: Arc<MockS3>,
}

#[async_trait]
impl ConnectionManager for MockConnectionManager {
    async fn acquire_connection(&self) -> Result<Box<dyn HttpConnection>, Error> {
        Ok(Box::new(MockConnection {
            s3: self.s3.clone(),
        }))
    }

    fn release_connection(&self, _connection: Box<dyn HttpConnection>, _close: bool) {}

    async fn shutdown(&self) {}
}

struct MockConnection {
    s3: Arc<MockS3>,
}

#[async_trait]
impl HttpConnection for MockConnection {
    async fn send(
        &mut self,
        message: &HttpMessage,
        body: &SegmentedBytes,
    ) -> Result<ResponseData, Error> {
        self.s3.handle(message, body).await
    }
}

/// Client wired to the mock store with fast retries.
pub fn mock_client(s3: &Arc<MockS3>) -> TurbineClient {
    mock_client_with(s3, |builder| builder)
}

pub fn mock_client_with(
    s3: &Arc<MockS3>,
    configure: impl FnOnce(s3_turbine::s3::client::TurbineClientBuilder) -> s3_turbine::s3::client::TurbineClientBuilder,
) -> TurbineClient {
    let _ = env_logger::builder().is_test(true).try_init();
    let builder = TurbineClient::builder("http://mock.local:9000")
        .expect("mock base url")
        .transport(Arc::new(MockTransport { s3: s3.clone() }))
        .retry_strategy(Arc::new(ExponentialBackoffRetry::new(
            3,
            Duration::from_millis(1),
            Duration::from_millis(4),
        )));
    configure(builder).build().expect("mock client")
}
