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

//! ListParts response pages, used to rebuild upload state on resume

use crate::s3::checksum::ChecksumAlgorithm;
use crate::s3::error::Error;
use crate::s3::utils::{get_default_text, get_option_text, get_text};
use bytes::Buf;
use xmltree::{Element, XMLNode};

/// One part the server reports as already uploaded.
#[derive(Clone, Debug, Default)]
pub struct PartInfo {
    /// 1-based part number.
    pub part_number: u16,
    /// ETag exactly as the server sent it, surrounding quotes included.
    pub etag: String,
    pub size: Option<u64>,
    pub checksum_crc32: Option<String>,
    pub checksum_crc32c: Option<String>,
    pub checksum_sha1: Option<String>,
    pub checksum_sha256: Option<String>,
}

impl PartInfo {
    /// The reported checksum matching the configured algorithm, if any.
    pub fn checksum_for(&self, algorithm: ChecksumAlgorithm) -> Option<&str> {
        match algorithm {
            ChecksumAlgorithm::None => None,
            ChecksumAlgorithm::Crc32 => self.checksum_crc32.as_deref(),
            ChecksumAlgorithm::Crc32c => self.checksum_crc32c.as_deref(),
            ChecksumAlgorithm::Sha1 => self.checksum_sha1.as_deref(),
            ChecksumAlgorithm::Sha256 => self.checksum_sha256.as_deref(),
        }
    }

    fn parse(element: &Element) -> Result<Self, Error> {
        let part_number = get_text(element, "PartNumber")?
            .parse::<u16>()
            .map_err(|e| Error::ListPartsParseFailed(format!("bad PartNumber: {e}")))?;
        if part_number == 0 {
            return Err(Error::ListPartsParseFailed(
                "part number must be positive".to_string(),
            ));
        }

        Ok(Self {
            part_number,
            etag: get_text(element, "ETag")
                .map_err(|_| Error::ListPartsParseFailed("missing ETag".to_string()))?,
            size: get_option_text(element, "Size").and_then(|v| v.parse().ok()),
            checksum_crc32: get_option_text(element, "ChecksumCRC32"),
            checksum_crc32c: get_option_text(element, "ChecksumCRC32C"),
            checksum_sha1: get_option_text(element, "ChecksumSHA1"),
            checksum_sha256: get_option_text(element, "ChecksumSHA256"),
        })
    }
}

/// One page of a paginated ListParts response.
#[derive(Clone, Debug, Default)]
pub struct ListPartsPage {
    pub parts: Vec<PartInfo>,
    pub is_truncated: bool,
    /// Marker to pass as `part-number-marker` for the next page.
    pub next_part_number_marker: Option<String>,
}

impl ListPartsPage {
    pub fn parse(body: &[u8]) -> Result<Self, Error> {
        let root = Element::parse(body.reader())
            .map_err(|e| Error::ListPartsParseFailed(e.to_string()))?;

        let is_truncated = get_default_text(&root, "IsTruncated").eq_ignore_ascii_case("true");
        let next_part_number_marker = get_option_text(&root, "NextPartNumberMarker");

        let mut parts = Vec::new();
        for node in &root.children {
            if let XMLNode::Element(element) = node {
                if element.name == "Part" {
                    parts.push(PartInfo::parse(element)?);
                }
            }
        }

        Ok(Self {
            parts,
            is_truncated,
            next_part_number_marker,
        })
    }
}
