//! Stream transport.
//!
//! Reconstructs commands from a byte stream that may deliver data in chunks
//! of any size, down to a single byte per read, and writes encoded commands
//! to a sink.

use crate::codec::{encode, FrameHeader};
use crate::command::Command;
use crate::error::ProtocolError;
use crate::registry::Registry;
use crate::{HEADER_LENGTH, READ_DELAY};
use bytes::{Buf, BytesMut};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Command transport over a reader/writer pair.
///
/// A zero-length read marks end of stream. Read errors are logged and also
/// end the stream: nothing more can be read from it.
pub struct Transport<R, W> {
    reader: R,
    writer: W,
    registry: Arc<Registry>,
    buffer: BytesMut,
    read_delay: Duration,
    eof: bool,
}

impl<R, W> Transport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, registry: Arc<Registry>) -> Self {
        Self {
            reader,
            writer,
            registry,
            buffer: BytesMut::with_capacity(HEADER_LENGTH),
            read_delay: READ_DELAY,
            eof: false,
        }
    }

    /// Sets the pause between partial reads.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Encodes and writes a command. No acknowledgment is awaited.
    pub async fn send(&mut self, command: &Command) -> io::Result<()> {
        let frame = encode(command);
        tracing::debug!(
            "Sending {} ({} bytes): {}",
            command,
            frame.len(),
            hex::encode(&frame)
        );
        self.writer.write_all(&frame).await?;
        self.writer.flush().await
    }

    /// Receives the next command.
    ///
    /// Returns `Ok(None)` when the stream ends, including in the middle of a
    /// frame, and when the frame's type is not registered. Bytes of a
    /// truncated frame are discarded. Only decoder errors such as a
    /// malformed payload are returned as `Err`.
    ///
    /// Cancelling the returned future between reads keeps any bytes already
    /// read in the buffer.
    pub async fn recv(&mut self) -> Result<Option<Command>, ProtocolError> {
        if !self.fill(HEADER_LENGTH).await {
            self.discard_truncated("header");
            return Ok(None);
        }

        let header = match FrameHeader::parse(&self.buffer) {
            Some(header) => header,
            None => return Ok(None),
        };

        if !self.fill(header.frame_length()).await {
            self.discard_truncated("payload");
            return Ok(None);
        }

        self.buffer.advance(HEADER_LENGTH);
        let payload = self.buffer.split_to(header.length as usize).freeze();
        tracing::trace!(
            "Frame type={:#04x} length={} reassembled",
            header.type_byte,
            header.length
        );

        self.registry.decode(header.type_byte, payload)
    }

    /// Returns whether the underlying stream has ended.
    pub fn at_eof(&self) -> bool {
        self.eof
    }

    /// Returns the number of bytes of the current partial frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Shuts down the write side.
    pub async fn close(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }

    /// Reads until `required` bytes are buffered or the stream ends.
    ///
    /// Only the missing count is requested, so the buffer never runs past
    /// the frame being assembled.
    async fn fill(&mut self, required: usize) -> bool {
        while self.buffer.len() < required {
            if self.eof {
                return false;
            }

            let missing = required - self.buffer.len();
            self.read_some(missing).await;

            if self.buffer.len() < required && !self.eof {
                tokio::time::sleep(self.read_delay).await;
            }
        }
        true
    }

    async fn read_some(&mut self, max: usize) {
        self.buffer.reserve(max);
        let mut limited = (&mut self.reader).take(max as u64);
        match limited.read_buf(&mut self.buffer).await {
            Ok(0) => {
                tracing::debug!("End of stream");
                self.eof = true;
            }
            Ok(n) => {
                tracing::trace!("Read {} of {} requested bytes", n, max);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::debug!("Read error, treating as end of stream: {}", e);
                self.eof = true;
            }
        }
    }

    fn discard_truncated(&mut self, part: &str) {
        if self.buffer.is_empty() {
            return;
        }
        tracing::warn!(
            "Stream ended inside a frame {}, discarding {} bytes",
            part,
            self.buffer.len()
        );
        self.buffer.clear();
    }
}
