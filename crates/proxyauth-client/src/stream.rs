//! Byte stream returned for a fetched resource.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::error::FetchError;

/// The body of a successfully fetched resource.
///
/// Yields chunks as they arrive from the network. Use [`ResourceStream::bytes`]
/// to collect the whole body.
pub struct ResourceStream {
    inner: BoxStream<'static, Result<Bytes, FetchError>>,
    content_type: Option<String>,
}

impl ResourceStream {
    /// Wraps a chunk stream.
    pub fn new<S>(inner: S, content_type: Option<String>) -> Self
    where
        S: Stream<Item = Result<Bytes, FetchError>> + Send + 'static,
    {
        Self {
            inner: inner.boxed(),
            content_type,
        }
    }

    /// A stream that yields `body` as a single chunk.
    pub fn from_bytes(body: impl Into<Bytes>) -> Self {
        Self::new(stream::once(futures::future::ready(Ok(body.into()))), None)
    }

    /// The `Content-Type` the server declared, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Reads the remaining body into memory.
    ///
    /// # Errors
    ///
    /// Returns the first error the underlying stream yields.
    pub async fn bytes(mut self) -> Result<Bytes, FetchError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.inner.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl Stream for ResourceStream {
    type Item = Result<Bytes, FetchError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for ResourceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStream")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}
