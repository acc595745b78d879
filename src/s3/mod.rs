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

//! Implementation of the S3 transfer engine

pub mod auto_ranged_put;
pub mod checksum;
pub mod client;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod header_constants;
pub mod http;
pub mod list_parts;
pub mod messages;
pub mod meta_request;
pub mod multimap_ext;
mod object_content;
pub mod request;
pub mod resolver;
pub mod resume_token;
pub mod retry;
mod scheduler;
pub mod segmented_bytes;
pub mod signer;
pub mod transport;
pub mod types;
pub mod utils;

pub use client::{TurbineClient, TurbineClientBuilder};
pub use object_content::{ContentStream, ObjectContent, Size};
