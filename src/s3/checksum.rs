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

//! Per-part checksum algorithms for multipart uploads

use crate::s3::segmented_bytes::SegmentedBytes;
use crate::s3::utils::b64encode;
use crc::{Crc, CRC_32_ISCSI, CRC_32_ISO_HDLC};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;

/// Checksum algorithm applied to every uploaded part. The computed value is
/// sent with each part and echoed in the CompleteMultipartUpload body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    #[default]
    None,
    Crc32,
    Crc32c,
    Sha1,
    Sha256,
}

impl ChecksumAlgorithm {
    /// Header carrying the base64 checksum value on an UploadPart request.
    pub fn header_name(&self) -> Option<&'static str> {
        match self {
            ChecksumAlgorithm::None => None,
            ChecksumAlgorithm::Crc32 => Some("x-amz-checksum-crc32"),
            ChecksumAlgorithm::Crc32c => Some("x-amz-checksum-crc32c"),
            ChecksumAlgorithm::Sha1 => Some("x-amz-checksum-sha1"),
            ChecksumAlgorithm::Sha256 => Some("x-amz-checksum-sha256"),
        }
    }

    /// Per-part element tag inside the CompleteMultipartUpload XML body,
    /// and the element name in ListParts responses.
    pub fn xml_tag(&self) -> Option<&'static str> {
        match self {
            ChecksumAlgorithm::None => None,
            ChecksumAlgorithm::Crc32 => Some("ChecksumCRC32"),
            ChecksumAlgorithm::Crc32c => Some("ChecksumCRC32C"),
            ChecksumAlgorithm::Sha1 => Some("ChecksumSHA1"),
            ChecksumAlgorithm::Sha256 => Some("ChecksumSHA256"),
        }
    }

    /// Value for the `x-amz-checksum-algorithm` header on
    /// CreateMultipartUpload.
    pub fn algorithm_header_value(&self) -> Option<&'static str> {
        match self {
            ChecksumAlgorithm::None => None,
            ChecksumAlgorithm::Crc32 => Some("CRC32"),
            ChecksumAlgorithm::Crc32c => Some("CRC32C"),
            ChecksumAlgorithm::Sha1 => Some("SHA1"),
            ChecksumAlgorithm::Sha256 => Some("SHA256"),
        }
    }

    /// Computes the base64 encoded checksum of one part body. Returns
    /// `None` for [`ChecksumAlgorithm::None`].
    pub fn compute(&self, body: &SegmentedBytes) -> Option<String> {
        match self {
            ChecksumAlgorithm::None => None,
            ChecksumAlgorithm::Crc32 => {
                let crc = Crc::<u32>::new(&CRC_32_ISO_HDLC);
                let mut digest = crc.digest();
                for chunk in body.iter() {
                    digest.update(chunk);
                }
                Some(b64encode(digest.finalize().to_be_bytes()))
            }
            ChecksumAlgorithm::Crc32c => {
                let crc = Crc::<u32>::new(&CRC_32_ISCSI);
                let mut digest = crc.digest();
                for chunk in body.iter() {
                    digest.update(chunk);
                }
                Some(b64encode(digest.finalize().to_be_bytes()))
            }
            ChecksumAlgorithm::Sha1 => {
                let mut hasher = Sha1::new();
                for chunk in body.iter() {
                    hasher.update(chunk);
                }
                Some(b64encode(hasher.finalize()))
            }
            ChecksumAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                for chunk in body.iter() {
                    hasher.update(chunk);
                }
                Some(b64encode(hasher.finalize()))
            }
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.algorithm_header_value() {
            Some(v) => write!(f, "{v}"),
            None => write!(f, "NONE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn body(data: &'static [u8]) -> SegmentedBytes {
        SegmentedBytes::from(Bytes::from_static(data))
    }

    #[test]
    fn crc32_known_vector() {
        // CRC32 of "123456789" is 0xCBF43926.
        let sum = ChecksumAlgorithm::Crc32.compute(&body(b"123456789")).unwrap();
        assert_eq!(sum, b64encode(0xCBF43926u32.to_be_bytes()));
    }

    #[test]
    fn crc32c_known_vector() {
        // CRC32C of "123456789" is 0xE3069283.
        let sum = ChecksumAlgorithm::Crc32c.compute(&body(b"123456789")).unwrap();
        assert_eq!(sum, b64encode(0xE3069283u32.to_be_bytes()));
    }

    #[test]
    fn chunking_does_not_change_the_checksum() {
        let mut chunked = SegmentedBytes::new();
        chunked.append(Bytes::from_static(b"1234"));
        chunked.append(Bytes::from_static(b"56789"));

        for algorithm in [
            ChecksumAlgorithm::Crc32,
            ChecksumAlgorithm::Crc32c,
            ChecksumAlgorithm::Sha1,
            ChecksumAlgorithm::Sha256,
        ] {
            assert_eq!(
                algorithm.compute(&chunked),
                algorithm.compute(&body(b"123456789")),
                "{algorithm}"
            );
        }
    }

    #[test]
    fn none_has_no_headers_or_value() {
        assert_eq!(ChecksumAlgorithm::None.compute(&body(b"x")), None);
        assert_eq!(ChecksumAlgorithm::None.header_name(), None);
        assert_eq!(ChecksumAlgorithm::None.xml_tag(), None);
    }
}
