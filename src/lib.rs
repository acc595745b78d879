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

//! # Turbine (`s3-turbine`)
//!
//! A high-throughput transfer engine for Amazon S3 compatible object
//! storage. Turbine saturates fast network links by decomposing a single
//! logical upload into many concurrent HTTP requests spread across pooled
//! connections, then reassembling the results in order for the caller.
//!
//! The central abstraction is the *meta-request*: a user-level logical
//! transfer that the engine splits into individual part uploads, paginated
//! listings, and lifecycle calls. The [`s3::client::TurbineClient`] owns the
//! connection pools, admission control, and the cooperative work loop that
//! drives every meta-request through its `update → prepare → send → finish`
//! pipeline.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use s3_turbine::s3::client::TurbineClient;
//! use s3_turbine::s3::types::PutObjectOptions;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = TurbineClient::builder("https://play.min.io")
//!         .unwrap()
//!         .throughput_target_gbps(25.0)
//!         .build()
//!         .unwrap();
//!
//!     let handle = client
//!         .put_object(
//!             PutObjectOptions::builder()
//!                 .bucket("my-bucket")
//!                 .object("my-object")
//!                 .build(),
//!             b"hello world".as_slice().into(),
//!         )
//!         .unwrap();
//!
//!     let result = handle.join().await;
//!     assert!(result.error.is_none());
//! }
//! ```
//!
//! ## Features
//! - Parallel multi-part uploads with per-part checksums
//! - Pause/resume over an opaque persisted token
//! - Bounded admission control derived from a throughput target
//! - Pluggable transport, retry strategy, and signing hooks

#![allow(clippy::result_large_err)]
#![allow(clippy::too_many_arguments)]
pub mod s3;

#[cfg(test)]
#[macro_use]
extern crate quickcheck;
