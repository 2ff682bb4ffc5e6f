//! Blocking byte source with buffer and channel modes.

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::READ_TIMEOUT;
use crate::error::LlsnError;

/// A byte source the decoder reads from.
///
/// In buffer mode all bytes are available up front and underflow is fatal.
/// In channel mode reads accumulate chunks until enough bytes arrived; a
/// source closed mid-read yields [`LlsnError::Malformed`] and 60 seconds of
/// inactivity yields [`LlsnError::Timeout`].
pub struct ByteSource {
    buf: BytesMut,
    chunks: Option<mpsc::Receiver<Bytes>>,
}

impl ByteSource {
    /// A source over a contiguous byte slice.
    pub fn from_bytes(data: impl AsRef<[u8]>) -> Self {
        Self {
            buf: BytesMut::from(data.as_ref()),
            chunks: None,
        }
    }

    /// A source fed by an ordered chunk channel. Closing the sender is the
    /// cancellation signal.
    pub fn from_channel(chunks: mpsc::Receiver<Bytes>) -> Self {
        Self {
            buf: BytesMut::new(),
            chunks: Some(chunks),
        }
    }

    /// Reads exactly `n` bytes, advancing the source.
    pub async fn read(&mut self, n: usize) -> Result<Bytes, LlsnError> {
        self.fill(n).await?;
        Ok(self.buf.split_to(n).freeze())
    }

    /// Reads a single byte.
    pub async fn read_u8(&mut self) -> Result<u8, LlsnError> {
        self.fill(1).await?;
        let b = self.buf[0];
        let _ = self.buf.split_to(1);
        Ok(b)
    }

    /// Returns the next `n` bytes without advancing.
    pub async fn peek(&mut self, n: usize) -> Result<&[u8], LlsnError> {
        self.fill(n).await?;
        Ok(&self.buf[..n])
    }

    async fn fill(&mut self, n: usize) -> Result<(), LlsnError> {
        while self.buf.len() < n {
            let Some(chunks) = self.chunks.as_mut() else {
                return Err(LlsnError::malformed(format!(
                    "need {n} bytes but only {} remaining",
                    self.buf.len()
                )));
            };
            match timeout(READ_TIMEOUT, chunks.recv()).await {
                Ok(Some(chunk)) => self.buf.extend_from_slice(&chunk),
                Ok(None) => {
                    return Err(LlsnError::malformed(
                        "chunk source closed before the packet was complete",
                    ));
                }
                Err(_) => return Err(LlsnError::Timeout),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffer_read_and_peek() {
        let mut src = ByteSource::from_bytes([1, 2, 3, 4]);
        assert_eq!(src.peek(2).await.unwrap(), &[1, 2]);
        assert_eq!(&src.read(3).await.unwrap()[..], &[1, 2, 3]);
        assert_eq!(src.read_u8().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn buffer_underflow_is_malformed() {
        let mut src = ByteSource::from_bytes([1]);
        assert!(matches!(
            src.read(2).await,
            Err(LlsnError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn channel_accumulates_chunks() {
        let (tx, rx) = mpsc::channel(8);
        let mut src = ByteSource::from_channel(rx);
        tx.send(Bytes::from_static(&[1, 2])).await.unwrap();
        tx.send(Bytes::from_static(&[3, 4, 5])).await.unwrap();
        assert_eq!(&src.read(4).await.unwrap()[..], &[1, 2, 3, 4]);
        assert_eq!(src.read_u8().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn closed_channel_is_malformed() {
        let (tx, rx) = mpsc::channel::<Bytes>(1);
        let mut src = ByteSource::from_channel(rx);
        drop(tx);
        assert!(matches!(
            src.read(1).await,
            Err(LlsnError::Malformed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_channel_times_out() {
        let (tx, rx) = mpsc::channel::<Bytes>(1);
        let mut src = ByteSource::from_channel(rx);
        // The sender stays alive but never produces a chunk; paused time
        // auto-advances past the inactivity window.
        let result = src.read(1).await;
        assert!(matches!(result, Err(LlsnError::Timeout)));
        drop(tx);
    }
}
