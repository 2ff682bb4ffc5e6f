//! Byte sink with buffer and channel modes.

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::error::LlsnError;

/// A byte sink the encoder writes to.
///
/// Buffer mode collects everything into one contiguous buffer. Channel mode
/// forwards each write as its own chunk; writes block while the channel is
/// full, and dropping the sink closes the channel exactly once.
pub enum ByteSink {
    Buffer(BytesMut),
    Channel(mpsc::Sender<Bytes>),
}

impl ByteSink {
    /// A sink backed by a growable in-memory buffer.
    pub fn buffer() -> Self {
        Self::Buffer(BytesMut::new())
    }

    /// A sink that forwards chunks over a channel.
    pub fn channel(chunks: mpsc::Sender<Bytes>) -> Self {
        Self::Channel(chunks)
    }

    /// Writes one logical chunk.
    pub async fn write(&mut self, data: impl Into<Bytes>) -> Result<(), LlsnError> {
        match self {
            Self::Buffer(buf) => {
                buf.extend_from_slice(&data.into());
                Ok(())
            }
            Self::Channel(tx) => tx.send(data.into()).await.map_err(|_| {
                LlsnError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "chunk consumer dropped",
                ))
            }),
        }
    }

    /// Writes a single byte.
    pub async fn write_u8(&mut self, byte: u8) -> Result<(), LlsnError> {
        self.write(Bytes::copy_from_slice(&[byte])).await
    }

    /// The collected bytes of a buffer-mode sink; empty for channel mode.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Buffer(buf) => buf.freeze(),
            Self::Channel(_) => Bytes::new(),
        }
    }
}
