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

//! HTTP message construction for the requests a multipart upload issues

use crate::s3::checksum::ChecksumAlgorithm;
use crate::s3::error::Error;
use crate::s3::header_constants::*;
use crate::s3::http::{BaseUrl, Url};
use crate::s3::multimap_ext::{Multimap, MultimapExt};
use crate::s3::segmented_bytes::SegmentedBytes;
use crate::s3::utils::md5sum_hash_sb;
use bytes::BytesMut;
use http::Method;

/// A prepared HTTP message, ready to be handed to a connection. The body
/// travels separately on the owning request so retries can resend it
/// without re-reading the user's stream.
#[derive(Clone, Debug)]
pub struct HttpMessage {
    pub method: Method,
    pub url: Url,
    pub headers: Multimap,
}

/// Target of a multipart upload; everything message construction needs to
/// know about where the object lives.
#[derive(Clone, Debug)]
pub struct MessageTarget {
    pub base_url: BaseUrl,
    pub bucket: String,
    pub object: String,
    /// Headers from the user's initial request (metadata, SSE-C, ...).
    pub initial_headers: Multimap,
}

/// Headers never forwarded from the initial request onto derived requests.
const EXCLUDED_FORWARD_HEADERS: &[&str] = &[
    CONTENT_LENGTH,
    CONTENT_MD5,
    CONTENT_ENCODING,
    AUTHORIZATION,
    HOST,
    USER_AGENT,
    X_AMZ_CONTENT_SHA256,
    X_AMZ_DATE,
    "x-amz-checksum-crc32",
    "x-amz-checksum-crc32c",
    "x-amz-checksum-sha1",
    "x-amz-checksum-sha256",
];

/// Headers from the initial request that part uploads must carry: the
/// server rejects parts whose SSE-C headers do not match the create call.
const SSE_C_FORWARD_HEADERS: &[&str] = &[
    X_AMZ_SSE_CUSTOMER_ALGORITHM,
    X_AMZ_SSE_CUSTOMER_KEY,
    X_AMZ_SSE_CUSTOMER_KEY_MD5,
];

fn is_excluded(key: &str) -> bool {
    EXCLUDED_FORWARD_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(key))
}

fn forward_initial_headers(target: &MessageTarget, headers: &mut Multimap) {
    for (key, values) in target.initial_headers.iter_all() {
        if is_excluded(key) {
            continue;
        }
        for value in values {
            headers.add(key.clone(), value.clone());
        }
    }
}

fn forward_sse_c_headers(target: &MessageTarget, headers: &mut Multimap) {
    for name in SSE_C_FORWARD_HEADERS {
        for (key, values) in target.initial_headers.iter_all() {
            if key.eq_ignore_ascii_case(name) {
                for value in values {
                    headers.add(key.clone(), value.clone());
                }
            }
        }
    }
}

/// Builds the `POST ?uploads` message starting a multipart upload.
pub fn create_multipart_upload_message(
    target: &MessageTarget,
    checksum_algorithm: ChecksumAlgorithm,
) -> Result<HttpMessage, Error> {
    let mut headers = Multimap::new();
    forward_initial_headers(target, &mut headers);
    if let Some(algorithm) = checksum_algorithm.algorithm_header_value() {
        headers.add(X_AMZ_CHECKSUM_ALGORITHM, algorithm);
    }
    if headers.get_ignore_case(CONTENT_TYPE).is_none() {
        headers.add(CONTENT_TYPE, "application/octet-stream");
    }

    let mut query_params = Multimap::new();
    query_params.add("uploads", "");

    Ok(HttpMessage {
        method: Method::POST,
        url: target
            .base_url
            .build_url(&query_params, &target.bucket, Some(&target.object))?,
        headers,
    })
}

/// Builds the `PUT ?partNumber=N&uploadId=U` message for one part. The
/// caller supplies the already computed checksum of `body`, if any.
pub fn upload_part_message(
    target: &MessageTarget,
    upload_id: &str,
    part_number: u16,
    body: &SegmentedBytes,
    compute_content_md5: bool,
    checksum_algorithm: ChecksumAlgorithm,
    checksum: Option<&str>,
) -> Result<HttpMessage, Error> {
    let mut headers = Multimap::new();
    forward_sse_c_headers(target, &mut headers);

    if compute_content_md5 {
        headers.add(CONTENT_MD5, md5sum_hash_sb(body));
    }
    if let (Some(name), Some(value)) = (checksum_algorithm.header_name(), checksum) {
        headers.add(name, value);
    }

    let mut query_params = Multimap::new();
    query_params.add("partNumber", part_number.to_string());
    query_params.add("uploadId", upload_id);

    Ok(HttpMessage {
        method: Method::PUT,
        url: target
            .base_url
            .build_url(&query_params, &target.bucket, Some(&target.object))?,
        headers,
    })
}

/// Builds the XML payload enumerating completed parts in order.
pub fn complete_multipart_upload_body(
    etag_list: &[Option<String>],
    checksums_list: &[Option<String>],
    checksum_algorithm: ChecksumAlgorithm,
) -> Result<SegmentedBytes, Error> {
    let mut data = BytesMut::with_capacity(100 * etag_list.len() + 100);
    data.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    data.extend_from_slice(
        b"<CompleteMultipartUpload xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">",
    );
    for (index, etag) in etag_list.iter().enumerate() {
        let etag = etag.as_ref().ok_or(Error::MissingEtag(index as u16 + 1))?;
        data.extend_from_slice(b"<Part><PartNumber>");
        data.extend_from_slice((index + 1).to_string().as_bytes());
        data.extend_from_slice(b"</PartNumber><ETag>");
        data.extend_from_slice(etag.as_bytes());
        data.extend_from_slice(b"</ETag>");
        if let Some(tag) = checksum_algorithm.xml_tag() {
            if let Some(checksum) = checksums_list.get(index).and_then(Option::as_ref) {
                data.extend_from_slice(b"<");
                data.extend_from_slice(tag.as_bytes());
                data.extend_from_slice(b">");
                data.extend_from_slice(checksum.as_bytes());
                data.extend_from_slice(b"</");
                data.extend_from_slice(tag.as_bytes());
                data.extend_from_slice(b">");
            }
        }
        data.extend_from_slice(b"</Part>");
    }
    data.extend_from_slice(b"</CompleteMultipartUpload>");

    Ok(SegmentedBytes::from(data.freeze()))
}

/// Builds the `POST ?uploadId=U` message completing the upload. The body
/// must come from [`complete_multipart_upload_body`].
pub fn complete_multipart_upload_message(
    target: &MessageTarget,
    upload_id: &str,
    body: &SegmentedBytes,
) -> Result<HttpMessage, Error> {
    let mut headers = Multimap::new();
    headers.add(CONTENT_TYPE, "application/xml");
    headers.add(CONTENT_MD5, md5sum_hash_sb(body));

    let mut query_params = Multimap::new();
    query_params.add("uploadId", upload_id);

    Ok(HttpMessage {
        method: Method::POST,
        url: target
            .base_url
            .build_url(&query_params, &target.bucket, Some(&target.object))?,
        headers,
    })
}

/// Builds the `DELETE ?uploadId=U` message aborting the upload.
pub fn abort_multipart_upload_message(
    target: &MessageTarget,
    upload_id: &str,
) -> Result<HttpMessage, Error> {
    let mut query_params = Multimap::new();
    query_params.add("uploadId", upload_id);

    Ok(HttpMessage {
        method: Method::DELETE,
        url: target
            .base_url
            .build_url(&query_params, &target.bucket, Some(&target.object))?,
        headers: Multimap::new(),
    })
}

/// Builds one `GET ?uploadId=U&part-number-marker=M` page request.
pub fn list_parts_message(
    target: &MessageTarget,
    upload_id: &str,
    part_number_marker: Option<&str>,
) -> Result<HttpMessage, Error> {
    let mut headers = Multimap::new();
    forward_initial_headers(target, &mut headers);

    let mut query_params = Multimap::new();
    query_params.add("uploadId", upload_id);
    if let Some(marker) = part_number_marker {
        query_params.add("part-number-marker", marker);
    }

    Ok(HttpMessage {
        method: Method::GET,
        url: target
            .base_url
            .build_url(&query_params, &target.bucket, Some(&target.object))?,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn target() -> MessageTarget {
        let mut initial_headers = Multimap::new();
        initial_headers.add("x-amz-meta-color", "green");
        initial_headers.add(CONTENT_LENGTH, "1234");
        initial_headers.add(X_AMZ_SSE_CUSTOMER_ALGORITHM, "AES256");
        MessageTarget {
            base_url: "http://localhost:9000".parse().unwrap(),
            bucket: "bucket".to_string(),
            object: "object".to_string(),
            initial_headers,
        }
    }

    #[test]
    fn create_forwards_metadata_but_not_transport_headers() {
        let msg = create_multipart_upload_message(&target(), ChecksumAlgorithm::Crc32c).unwrap();

        assert_eq!(msg.method, Method::POST);
        assert_eq!(msg.headers.get_ignore_case("x-amz-meta-color"), Some("green"));
        assert_eq!(msg.headers.get_ignore_case(CONTENT_LENGTH), None);
        assert_eq!(
            msg.headers.get_ignore_case(X_AMZ_CHECKSUM_ALGORITHM),
            Some("CRC32C")
        );
        assert!(msg.url.query.contains_key("uploads"));
    }

    #[test]
    fn upload_part_carries_checksum_and_md5() {
        let body = SegmentedBytes::from(Bytes::from_static(b"hello"));
        let checksum = ChecksumAlgorithm::Crc32c.compute(&body);
        let msg = upload_part_message(
            &target(),
            "upload-1",
            3,
            &body,
            true,
            ChecksumAlgorithm::Crc32c,
            checksum.as_deref(),
        )
        .unwrap();

        assert_eq!(msg.method, Method::PUT);
        assert_eq!(
            msg.url.query.get("partNumber").map(String::as_str),
            Some("3")
        );
        assert_eq!(
            msg.url.query.get("uploadId").map(String::as_str),
            Some("upload-1")
        );
        assert_eq!(
            msg.headers.get_ignore_case(CONTENT_MD5),
            Some(md5sum_hash_sb(&body).as_str())
        );
        assert_eq!(
            msg.headers.get_ignore_case("x-amz-checksum-crc32c"),
            checksum.as_deref()
        );
        // SSE-C headers ride along, metadata does not.
        assert_eq!(
            msg.headers.get_ignore_case(X_AMZ_SSE_CUSTOMER_ALGORITHM),
            Some("AES256")
        );
        assert_eq!(msg.headers.get_ignore_case("x-amz-meta-color"), None);
    }

    #[test]
    fn complete_body_lists_parts_in_order() {
        let etags = vec![Some("e1".to_string()), Some("e2".to_string())];
        let checksums = vec![Some("c1".to_string()), None];
        let body =
            complete_multipart_upload_body(&etags, &checksums, ChecksumAlgorithm::Crc32).unwrap();

        let xml = String::from_utf8(body.to_bytes().to_vec()).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <CompleteMultipartUpload xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
             <Part><PartNumber>1</PartNumber><ETag>e1</ETag><ChecksumCRC32>c1</ChecksumCRC32></Part>\
             <Part><PartNumber>2</PartNumber><ETag>e2</ETag></Part>\
             </CompleteMultipartUpload>"
        );
    }

    #[test]
    fn complete_body_requires_every_etag() {
        let etags = vec![Some("e1".to_string()), None];
        let err = complete_multipart_upload_body(&etags, &[], ChecksumAlgorithm::None).unwrap_err();
        assert!(matches!(err, Error::MissingEtag(2)));
    }

    #[test]
    fn list_parts_paginates_with_marker() {
        let msg = list_parts_message(&target(), "upload-1", Some("17")).unwrap();
        assert_eq!(msg.method, Method::GET);
        assert_eq!(
            msg.url.query.get("part-number-marker").map(String::as_str),
            Some("17")
        );

        // Initial headers ride along minus the exclusion set.
        assert_eq!(msg.headers.get_ignore_case("x-amz-meta-color"), Some("green"));
        assert_eq!(
            msg.headers.get_ignore_case(X_AMZ_SSE_CUSTOMER_ALGORITHM),
            Some("AES256")
        );
        assert_eq!(msg.headers.get_ignore_case(CONTENT_LENGTH), None);

        let msg = list_parts_message(&target(), "upload-1", None).unwrap();
        assert!(!msg.url.query.contains_key("part-number-marker"));
    }
}
