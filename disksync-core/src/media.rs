use std::fmt;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Content to be sent to the backend, together with the mime type the object
/// should carry.
pub struct MediaUpload {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    mime_type: String,
    resumable: bool,
    chunk_size: usize,
}

impl MediaUpload {
    pub fn new<R>(reader: R, mime_type: impl Into<String>) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
            mime_type: mime_type.into(),
            resumable: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn empty(mime_type: impl Into<String>) -> Self {
        Self::new(tokio::io::empty(), mime_type)
    }

    pub async fn from_path(path: &Path, mime_type: impl Into<String>) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(file, mime_type))
    }

    pub fn resumable(mut self, resumable: bool) -> Self {
        self.resumable = resumable;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn is_resumable(&self) -> bool {
        self.resumable
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn into_reader(self) -> Pin<Box<dyn AsyncRead + Send>> {
        self.reader
    }
}

impl fmt::Debug for MediaUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaUpload")
            .field("mime_type", &self.mime_type)
            .field("resumable", &self.resumable)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

/// Readable stream over the content of a remote object.
pub struct RemoteReader {
    inner: Pin<Box<dyn AsyncRead + Send>>,
}

impl RemoteReader {
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            inner: Box::pin(reader),
        }
    }
}

impl AsyncRead for RemoteReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}

impl fmt::Debug for RemoteReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteReader").finish_non_exhaustive()
    }
}
