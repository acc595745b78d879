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

use crate::s3::segmented_bytes::SegmentedBytes;
use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncReadExt;

type IoResult<T> = core::result::Result<T, std::io::Error>;

/// Size of an upload body, when known up front.
#[derive(Debug, Clone, PartialEq, Eq, Copy, Default)]
pub enum Size {
    Known(u64),
    #[default]
    Unknown,
}

impl Size {
    pub fn is_known(&self) -> bool {
        matches!(self, Size::Known(_))
    }

    pub fn value(&self) -> Option<u64> {
        match self {
            Size::Known(v) => Some(*v),
            Size::Unknown => None,
        }
    }
}

impl From<Option<u64>> for Size {
    fn from(value: Option<u64>) -> Self {
        match value {
            Some(v) => Size::Known(v),
            None => Size::Unknown,
        }
    }
}

impl From<u64> for Size {
    fn from(value: u64) -> Self {
        Size::Known(value)
    }
}

/// Object content that can be uploaded.
///
/// Can be constructed from a stream of `Bytes`, a file path, or an
/// in-memory buffer.
pub struct ObjectContent(ObjectContentInner);

enum ObjectContentInner {
    Stream(Pin<Box<dyn Stream<Item = IoResult<Bytes>> + Send>>, Size),
    FilePath(PathBuf),
    Bytes(SegmentedBytes),
}

impl From<Bytes> for ObjectContent {
    fn from(value: Bytes) -> Self {
        ObjectContent(ObjectContentInner::Bytes(SegmentedBytes::from(value)))
    }
}

impl From<String> for ObjectContent {
    fn from(value: String) -> Self {
        ObjectContent(ObjectContentInner::Bytes(SegmentedBytes::from(value)))
    }
}

impl From<Vec<u8>> for ObjectContent {
    fn from(value: Vec<u8>) -> Self {
        Bytes::from(value).into()
    }
}

impl From<&'static [u8]> for ObjectContent {
    fn from(value: &'static [u8]) -> Self {
        Bytes::from(value).into()
    }
}

impl From<&'static str> for ObjectContent {
    fn from(value: &'static str) -> Self {
        Bytes::from(value.as_bytes()).into()
    }
}

impl From<&Path> for ObjectContent {
    fn from(value: &Path) -> Self {
        ObjectContent(ObjectContentInner::FilePath(value.to_path_buf()))
    }
}

impl Default for ObjectContent {
    fn default() -> Self {
        ObjectContent(ObjectContentInner::Bytes(SegmentedBytes::new()))
    }
}

impl ObjectContent {
    /// Create a new `ObjectContent` from a stream of `Bytes`.
    pub fn new_from_stream(
        r: impl Stream<Item = IoResult<Bytes>> + Send + 'static,
        size: impl Into<Size>,
    ) -> Self {
        ObjectContent(ObjectContentInner::Stream(Box::pin(r), size.into()))
    }

    /// Size of the content when it is knowable without I/O.
    pub fn size_hint(&self) -> Size {
        match &self.0 {
            ObjectContentInner::Stream(_, size) => *size,
            ObjectContentInner::FilePath(_) => Size::Unknown,
            ObjectContentInner::Bytes(sb) => Size::Known(sb.len() as u64),
        }
    }

    pub(crate) async fn into_content_stream(self) -> IoResult<ContentStream> {
        match self.0 {
            ObjectContentInner::Stream(r, size) => Ok(ContentStream::new(r, size)),

            ObjectContentInner::FilePath(path) => {
                let file = tokio::fs::File::open(&path).await?;
                let size = file.metadata().await?.len();

                let file_stream = stream::unfold(file, |mut file| async move {
                    let mut buf = vec![0u8; 64 * 1024];
                    match file.read(&mut buf).await {
                        Ok(0) => None,
                        Ok(n) => {
                            buf.truncate(n);
                            Some((Ok(Bytes::from(buf)), file))
                        }
                        Err(e) => Some((Err(e), file)),
                    }
                });

                Ok(ContentStream::new(Box::pin(file_stream), Size::Known(size)))
            }

            ObjectContentInner::Bytes(sb) => {
                let size = sb.len() as u64;
                let r = Box::pin(stream::iter(sb.into_iter().map(Ok)));
                Ok(ContentStream::new(r, Size::Known(size)))
            }
        }
    }
}

/// A byte stream with exact-length reads. Upload preparation reads exactly
/// one part's worth of bytes at a time; chunks arriving from the underlying
/// stream may straddle part boundaries, so any overrun is buffered for the
/// next read.
pub struct ContentStream {
    stream: Pin<Box<dyn Stream<Item = IoResult<Bytes>> + Send>>,
    leftover: Option<Bytes>,
    size: Size,
}

impl ContentStream {
    pub fn new(stream: Pin<Box<dyn Stream<Item = IoResult<Bytes>> + Send>>, size: Size) -> Self {
        Self {
            stream,
            leftover: None,
            size,
        }
    }

    pub fn empty() -> Self {
        Self {
            stream: Box::pin(stream::empty()),
            leftover: None,
            size: Size::Known(0),
        }
    }

    pub fn get_size(&self) -> Size {
        self.size
    }

    /// Read up to `n` bytes from the stream. Returns fewer than `n` bytes
    /// only at the end of the stream.
    pub async fn read_upto(&mut self, n: usize) -> IoResult<SegmentedBytes> {
        let mut out = SegmentedBytes::new();
        let mut remaining = n;

        if let Some(mut chunk) = self.leftover.take() {
            if chunk.len() > remaining {
                self.leftover = Some(chunk.split_off(remaining));
            }
            remaining -= chunk.len();
            out.append(chunk);
        }

        while remaining > 0 {
            match self.stream.next().await {
                Some(chunk) => {
                    let mut chunk = chunk?;
                    if chunk.is_empty() {
                        continue;
                    }
                    if chunk.len() > remaining {
                        self.leftover = Some(chunk.split_off(remaining));
                    }
                    remaining -= chunk.len();
                    out.append(chunk);
                }
                None => break,
            }
        }

        Ok(out)
    }
}
