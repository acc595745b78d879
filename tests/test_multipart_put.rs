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

mod common;

use bytes::Bytes;
use common::*;
use http::HeaderMap;
use s3_turbine::s3::checksum::ChecksumAlgorithm;
use s3_turbine::s3::segmented_bytes::SegmentedBytes;
use s3_turbine::s3::types::{ContentMd5, Progress, PutObjectOptions};
use s3_turbine::s3::{ObjectContent, Size};
use std::collections::HashMap;

const MIB: usize = 1024 * 1024;

#[tokio::test]
async fn fresh_multipart_put_uploads_all_parts_in_order() {
    let s3 = MockS3::new();
    let client = mock_client(&s3);
    let body = test_body(25 * MIB, 1);

    let (headers_tx, mut headers_rx) = tokio::sync::mpsc::unbounded_channel();
    let options = PutObjectOptions::builder()
        .bucket("test-bucket")
        .object("big-object")
        .part_size(8 * MIB as u64)
        .headers_callback(Box::new(move |headers: &HeaderMap, status: u16| {
            let etag = headers
                .get("ETag")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let _ = headers_tx.send((etag, status));
        }))
        .build();

    let handle = client
        .put_object(options, ObjectContent::from(body.clone()))
        .unwrap();
    let result = handle.join().await;
    assert!(result.error.is_none(), "{:?}", result.error);

    {
        let state = s3.lock();
        assert_eq!(state.completed.len(), 1);
        assert!(state.aborted.is_empty());

        // Three 8 MiB parts plus the 1 MiB tail, reassembled byte for byte.
        let completed = &state.completed[0];
        assert_eq!(completed.object_bytes, body);

        let sizes: HashMap<u16, usize> = state
            .requests
            .iter()
            .filter(|r| r.is_part())
            .map(|r| (r.part_number().unwrap(), r.body_len))
            .collect();
        assert_eq!(sizes.len(), 4);
        assert_eq!(sizes[&1], 8 * MIB);
        assert_eq!(sizes[&2], 8 * MIB);
        assert_eq!(sizes[&3], 8 * MIB);
        assert_eq!(sizes[&4], MIB);

        // The completion body enumerates parts 1..4 in ascending order.
        let positions: Vec<usize> = (1..=4)
            .map(|n| {
                completed
                    .body_xml
                    .find(&format!("<PartNumber>{n}</PartNumber>"))
                    .unwrap_or_else(|| panic!("part {n} missing from completion body"))
            })
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(state.requests.iter().filter(|r| r.is_create()).count(), 1);
        assert!(!state.requests.iter().any(|r| r.is_list_parts()));
    }

    // The final headers carry the object ETag extracted from the XML body,
    // with the quote entities decoded back to real quotes.
    let (etag, status) = headers_rx.recv().await.unwrap();
    assert_eq!(status, 200);
    let expected = format!("\"{}\"", s3.lock().completed[0].etag);
    assert_eq!(etag, expected);

    client.shutdown().await;
}

#[tokio::test]
async fn small_body_still_uploads_as_single_part() {
    let s3 = MockS3::new();
    let client = mock_client(&s3);
    let body = test_body(3 * MIB, 2);

    let options = PutObjectOptions::builder()
        .bucket("test-bucket")
        .object("small-object")
        .build();
    let handle = client
        .put_object(options, ObjectContent::from(body.clone()))
        .unwrap();
    let result = handle.join().await;
    assert!(result.error.is_none(), "{:?}", result.error);

    let state = s3.lock();
    assert_eq!(state.requests.iter().filter(|r| r.is_part()).count(), 1);
    assert_eq!(state.completed[0].object_bytes, body);
}

#[tokio::test]
async fn parts_carry_checksums_and_content_md5() {
    let s3 = MockS3::new();
    let client = mock_client_with(&s3, |b| b.content_md5(ContentMd5::Enabled));
    let body = test_body(10 * MIB, 3);

    let options = PutObjectOptions::builder()
        .bucket("test-bucket")
        .object("checksummed")
        .part_size(5 * MIB as u64)
        .checksum_algorithm(ChecksumAlgorithm::Crc32c)
        .build();
    let handle = client
        .put_object(options, ObjectContent::from(body.clone()))
        .unwrap();
    let result = handle.join().await;
    assert!(result.error.is_none(), "{:?}", result.error);

    let state = s3.lock();

    let create = state.requests.iter().find(|r| r.is_create()).unwrap();
    assert_eq!(
        create.headers.get("x-amz-checksum-algorithm").map(String::as_str),
        Some("CRC32C")
    );

    for request in state.requests.iter().filter(|r| r.is_part()) {
        let part_number = request.part_number().unwrap() as usize;
        let offset = (part_number - 1) * 5 * MIB;
        let expected = ChecksumAlgorithm::Crc32c
            .compute(&SegmentedBytes::from(body.slice(offset..offset + 5 * MIB)))
            .unwrap();

        assert_eq!(
            request.headers.get("x-amz-checksum-crc32c").map(String::as_str),
            Some(expected.as_str()),
            "part {part_number}"
        );
        assert!(request.headers.contains_key("Content-MD5"), "part {part_number}");
    }

    // The completion body echoes the per-part checksums.
    assert!(state.completed[0].body_xml.contains("<ChecksumCRC32C>"));
}

#[tokio::test]
async fn progress_reports_every_uploaded_byte() {
    let s3 = MockS3::new();
    let client = mock_client(&s3);
    let body = test_body(25 * MIB, 4);

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel();
    let options = PutObjectOptions::builder()
        .bucket("test-bucket")
        .object("tracked")
        .part_size(8 * MIB as u64)
        .progress_callback(Box::new(move |progress: &Progress| {
            let _ = progress_tx.send((progress.bytes_transferred, progress.content_length));
        }))
        .build();

    let handle = client.put_object(options, ObjectContent::from(body)).unwrap();
    let result = handle.join().await;
    assert!(result.error.is_none(), "{:?}", result.error);

    drop(client);
    let mut total = 0u64;
    let mut events = 0;
    while let Ok((transferred, content_length)) = progress_rx.try_recv() {
        total += transferred;
        events += 1;
        assert_eq!(content_length, 25 * MIB as u64);
    }
    assert_eq!(events, 4);
    assert_eq!(total, 25 * MIB as u64);
}

#[tokio::test]
async fn sse_customer_headers_are_echoed_in_final_headers() {
    let s3 = MockS3::new();
    let client = mock_client(&s3);
    let body = test_body(6 * MIB, 5);

    let mut extra_headers = s3_turbine::s3::multimap_ext::Multimap::new();
    extra_headers.insert(
        "x-amz-server-side-encryption-customer-algorithm".to_string(),
        "AES256".to_string(),
    );

    let (headers_tx, mut headers_rx) = tokio::sync::mpsc::unbounded_channel();
    let options = PutObjectOptions::builder()
        .bucket("test-bucket")
        .object("sse-object")
        .headers(extra_headers)
        .headers_callback(Box::new(move |headers: &HeaderMap, _status: u16| {
            let algorithm = headers
                .get("x-amz-server-side-encryption-customer-algorithm")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let _ = headers_tx.send(algorithm);
        }))
        .build();

    let handle = client.put_object(options, ObjectContent::from(body)).unwrap();
    let result = handle.join().await;
    assert!(result.error.is_none(), "{:?}", result.error);

    // CreateMultipartUpload captured the header from its response; the
    // completion response itself never carried it.
    assert_eq!(headers_rx.recv().await.unwrap().as_deref(), Some("AES256"));
}

#[tokio::test]
async fn content_of_unknown_length_is_rejected() {
    let s3 = MockS3::new();
    let client = mock_client(&s3);

    let stream = futures_util::stream::iter(vec![Ok(Bytes::from_static(b"data"))]);
    let options = PutObjectOptions::builder()
        .bucket("test-bucket")
        .object("unknown-length")
        .build();

    let result = client.put_object(options, ObjectContent::new_from_stream(stream, Size::Unknown));
    assert!(matches!(
        result,
        Err(s3_turbine::s3::error::Error::ContentLengthUnknown)
    ));
}
