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

use common::*;
use s3_turbine::s3::client::TurbineClient;
use s3_turbine::s3::error::Error;
use s3_turbine::s3::request::RequestTag;
use s3_turbine::s3::types::PutObjectOptions;
use s3_turbine::s3::ObjectContent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const MIB: usize = 1024 * 1024;

/// A CreateMultipartUpload that keeps failing exhausts the retry strategy
/// and surfaces the server error; with no upload id there is nothing to
/// abort.
#[tokio::test]
async fn create_failure_exhausts_retries_and_skips_abort() {
    let s3 = MockS3::new();
    s3.lock().create_failures_remaining = u32::MAX;

    let client = mock_client(&s3);
    let body = test_body(10 * MIB, 21);
    let options = PutObjectOptions::builder()
        .bucket("test-bucket")
        .object("never-starts")
        .build();

    let handle = client.put_object(options, ObjectContent::from(body)).unwrap();
    let result = handle.join().await;

    assert!(matches!(result.error, Some(Error::S3Error { status: 500, .. })));
    assert_eq!(result.response_status, Some(500));
    let failed = result.failed_request.expect("failed request recorded");
    assert_eq!(failed.tag, RequestTag::CreateMultipartUpload);

    let state = s3.lock();
    // The retry strategy allows three attempts before giving up.
    assert_eq!(state.requests.iter().filter(|r| r.is_create()).count(), 3);
    assert!(!state.requests.iter().any(|r| r.is_part()));
    assert!(!state.requests.iter().any(|r| r.is_abort()));
    assert!(state.completed.is_empty());
}

/// A transient part failure is retried on the same preparation data and
/// the upload still completes.
#[tokio::test]
async fn transient_part_failure_is_retried() {
    let s3 = MockS3::new();
    s3.lock().part_failures_remaining = 1;

    let client = mock_client(&s3);
    let body = test_body(10 * MIB, 22);
    let options = PutObjectOptions::builder()
        .bucket("test-bucket")
        .object("retried-part")
        .part_size(5 * MIB as u64)
        .build();

    let handle = client
        .put_object(options, ObjectContent::from(body.clone()))
        .unwrap();
    let result = handle.join().await;
    assert!(result.error.is_none(), "{:?}", result.error);

    let state = s3.lock();
    // Two parts plus one failed attempt.
    assert_eq!(state.requests.iter().filter(|r| r.is_part()).count(), 3);
    assert_eq!(state.completed[0].object_bytes, body);
    assert!(state.aborted.is_empty());
}

/// A failed part after retries fails the meta-request; the abort then
/// cleans up the server-side upload.
#[tokio::test]
async fn exhausted_part_failure_aborts_the_upload() {
    let s3 = MockS3::new();
    s3.lock().part_failures_remaining = u32::MAX;

    let client = mock_client(&s3);
    let body = test_body(10 * MIB, 23);
    let options = PutObjectOptions::builder()
        .bucket("test-bucket")
        .object("doomed-part")
        .part_size(5 * MIB as u64)
        .build();

    let handle = client.put_object(options, ObjectContent::from(body)).unwrap();
    let result = handle.join().await;

    assert!(matches!(result.error, Some(Error::S3Error { status: 500, .. })));

    let state = s3.lock();
    assert_eq!(state.aborted, vec!["upload-1".to_string()]);
    assert!(state.completed.is_empty());
}

/// Cancellation drains in-flight work, aborts the server-side upload, and
/// reports the transfer as canceled.
#[tokio::test]
async fn cancel_aborts_and_reports_canceled() {
    let s3 = MockS3::new();
    s3.lock().part_delay = Some(std::time::Duration::from_millis(40));

    let client = mock_client_with(&s3, |b| b.max_active_connections(1));
    let body = test_body(25 * MIB, 24);
    let options = PutObjectOptions::builder()
        .bucket("test-bucket")
        .object("canceled-object")
        .part_size(8 * MIB as u64)
        .build();

    let handle = client.put_object(options, ObjectContent::from(body)).unwrap();
    handle.cancel();

    let result = handle.join().await;
    assert!(matches!(result.error, Some(Error::Canceled)));

    let state = s3.lock();
    assert!(state.completed.is_empty());
    // The abort went through despite the canceled state.
    if state.requests.iter().any(|r| r.is_create()) {
        assert!(state.uploads.is_empty());
    }
}

/// Shutdown waits for the work loop to wind down and fires the callback.
#[tokio::test]
async fn shutdown_fires_callback_and_rejects_new_work() {
    let s3 = MockS3::new();
    let fired = Arc::new(AtomicBool::new(false));
    let fired_clone = fired.clone();

    let client = mock_client_with(&s3, move |b| {
        b.shutdown_callback(Box::new(move || {
            fired_clone.store(true, Ordering::SeqCst);
        }))
    });

    let body = test_body(6 * MIB, 25);
    let options = PutObjectOptions::builder()
        .bucket("test-bucket")
        .object("last-object")
        .build();
    let handle = client
        .put_object(options, ObjectContent::from(body))
        .unwrap();
    assert!(handle.join().await.error.is_none());

    client.shutdown().await;
    assert!(fired.load(Ordering::SeqCst));

    let options = PutObjectOptions::builder()
        .bucket("test-bucket")
        .object("too-late")
        .build();
    let result = client.put_object(options, ObjectContent::from(test_body(6 * MIB, 26)));
    assert!(matches!(result, Err(Error::ClientShutdown)));
}

/// A client that never started its work loop still shuts down cleanly.
#[tokio::test]
async fn idle_client_shuts_down_immediately() {
    let s3 = MockS3::new();
    let client = mock_client(&s3);
    client.shutdown().await;
    assert!(s3.lock().requests.is_empty());

    // And so does one built without any submissions at all.
    let plain = TurbineClient::builder("http://localhost:9000").unwrap().build().unwrap();
    plain.shutdown().await;
}
