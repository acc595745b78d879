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

//! Various utility and helper functions

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::engine::Engine as _;
use bytes::Buf;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use md5::compute as md5compute;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use sha2::{Digest, Sha256};
use xmltree::Element;

use crate::s3::error::Error;
use crate::s3::segmented_bytes::SegmentedBytes;

/// Date and time with UTC timezone
pub type UtcTime = DateTime<Utc>;

/// Encodes data using base64 algorithm
pub fn b64encode<T: AsRef<[u8]>>(input: T) -> String {
    BASE64.encode(input)
}

/// Gets hex encoded SHA256 hash of given data
pub fn sha256_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Gets base64 encoded MD5 hash of given data
pub fn md5sum_hash(data: &[u8]) -> String {
    b64encode(md5compute(data).as_slice())
}

/// Gets base64 encoded MD5 hash of a segmented byte buffer
pub fn md5sum_hash_sb(sb: &SegmentedBytes) -> String {
    let mut hasher = md5::Context::new();
    for data in sb.iter() {
        hasher.consume(data);
    }
    b64encode(hasher.compute().as_slice())
}

/// Gets current UTC time
pub fn utc_now() -> UtcTime {
    chrono::offset::Utc::now()
}

/// Gets AMZ date value of given time
pub fn to_amz_date(time: UtcTime) -> String {
    time.format("%Y%m%dT%H%M%SZ").to_string()
}

const OBJECT_KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

pub fn urlencode_object_key(key: &str) -> String {
    utf8_percent_encode(key, OBJECT_KEY_ENCODE_SET).collect()
}

/// Checks if given hostname is valid or not
pub fn match_hostname(value: &str) -> bool {
    lazy_static! {
        static ref HOSTNAME_REGEX: Regex =
            Regex::new(r"^([a-z_\d-]{1,63}\.)*([a-z_\d-]{1,63})$").unwrap();
    }

    if !HOSTNAME_REGEX.is_match(value.to_lowercase().as_str()) {
        return false;
    }

    for token in value.split('.') {
        if token.starts_with('-')
            || token.starts_with('_')
            || token.ends_with('-')
            || token.ends_with('_')
        {
            return false;
        }
    }

    true
}

/// Validates a bucket name per the S3 naming rules
pub fn check_bucket_name(bucket_name: &str) -> Result<(), Error> {
    let name = bucket_name.trim();
    if name.is_empty() {
        return Err(Error::InvalidBucketName(String::from(
            "bucket name cannot be empty",
        )));
    }
    if name.len() < 3 || name.len() > 63 {
        return Err(Error::InvalidBucketName(String::from(
            "bucket name must be between 3 and 63 characters long",
        )));
    }
    if name.contains("..") || name.contains(".-") || name.contains("-.") {
        return Err(Error::InvalidBucketName(String::from(
            "bucket name cannot contain successive characters '..', '.-' or '-.'",
        )));
    }
    if !match_hostname(name) {
        return Err(Error::InvalidBucketName(format!(
            "bucket name '{name}' is not a valid DNS name"
        )));
    }
    Ok(())
}

/// ETag values arrive from the server surrounded by double quotes; strip
/// them so the value can be echoed back without quoting later.
pub fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Gets text of a direct child of the given XML element. Extraction is
/// top-level only; nested elements with the same tag are never considered.
pub fn get_text(element: &Element, tag: &str) -> Result<String, Error> {
    Ok(element
        .get_child(tag)
        .ok_or(Error::XmlError(format!("<{tag}> tag not found")))?
        .get_text()
        .unwrap_or_default()
        .to_string())
}

/// Gets optional text of a direct child of the given XML element
pub fn get_option_text(element: &Element, tag: &str) -> Option<String> {
    element
        .get_child(tag)
        .map(|v| v.get_text().unwrap_or_default().to_string())
}

/// Gets text of a direct child of the given XML element, or empty string
pub fn get_default_text(element: &Element, tag: &str) -> String {
    element
        .get_child(tag)
        .map_or(String::new(), |v| v.get_text().unwrap_or_default().to_string())
}

/// Parses an XML document body and extracts the text of one top-level tag.
/// The parser decodes XML entities, so `&quot;` inside the value arrives as
/// a literal double quote.
pub fn get_top_level_tag_value(body: &[u8], tag: &str) -> Result<String, Error> {
    let root = Element::parse(body.reader())?;
    get_text(&root, tag)
}
