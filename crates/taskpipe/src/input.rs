// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sources of bytes for the child's standard input.

use futures::stream;
use futures_core::Stream;
use std::fmt;
use std::pin::Pin;

/// Boxed chunk stream fed to the child's stdin.
pub type ByteChunkStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send + 'static>>;

/// What to feed the child's standard input.
///
/// Whichever variant is used, the engine writes every chunk in order and
/// closes the stdin pipe when the source is exhausted, so the child always
/// observes end-of-input.
#[derive(Default)]
pub enum InputSource {
    /// No input; stdin is closed immediately after launch.
    #[default]
    None,
    /// A single in-memory buffer, written as one chunk.
    Bytes(Vec<u8>),
    /// A lazy sequence of chunks; the writer suspends between chunks until
    /// the producer yields the next one.
    Stream(ByteChunkStream),
}

impl InputSource {
    /// Input from an in-memory buffer.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Input from an eagerly known sequence of chunks, written one at a time.
    pub fn chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        I::IntoIter: Send + 'static,
        C: Into<Vec<u8>> + Send + 'static,
    {
        Self::Stream(Box::pin(stream::iter(
            chunks.into_iter().map(Into::into),
        )))
    }

    /// Input from an arbitrary asynchronous chunk producer.
    pub fn stream(chunks: impl Stream<Item = Vec<u8>> + Send + 'static) -> Self {
        Self::Stream(Box::pin(chunks))
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("InputSource::None"),
            Self::Bytes(b) => write!(f, "InputSource::Bytes({} bytes)", b.len()),
            Self::Stream(_) => f.write_str("InputSource::Stream(..)"),
        }
    }
}

impl From<Vec<u8>> for InputSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for InputSource {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<String> for InputSource {
    fn from(s: String) -> Self {
        Self::Bytes(s.into_bytes())
    }
}

impl From<&str> for InputSource {
    fn from(s: &str) -> Self {
        Self::Bytes(s.as_bytes().to_vec())
    }
}
