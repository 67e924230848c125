// ABOUTME: Growing read buffer and partial-write-resumable write buffer shared by both engines
// ABOUTME: Generalizes the BytesMut-backed buffering this crate's connection handling has always used

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FrameError;
use crate::frame::{Frame, DEFAULT_MAX_PAYLOAD_LEN};

const INITIAL_READ_CAPACITY: usize = 512;

/// Dynamically sized inbound byte buffer, shared shape for the parent engine
/// and both child engines.
///
/// Starts small and doubles (at least) whenever headroom runs low, so a
/// single `read` can always make progress regardless of how large frames get.
pub struct ReadBuffer {
    buf: BytesMut,
    max_payload_len: u32,
}

impl ReadBuffer {
    pub fn new(max_payload_len: u32) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_READ_CAPACITY),
            max_payload_len,
        }
    }

    /// Read once from `stream` into the tail of the buffer, growing it first
    /// if headroom is low. Returns `Ok(0)` on EOF, matching `AsyncReadExt::read`.
    pub async fn fill<R: AsyncRead + Unpin>(&mut self, stream: &mut R) -> std::io::Result<usize> {
        if self.buf.capacity() - self.buf.len() < INITIAL_READ_CAPACITY / 4 {
            let grow_by = self.buf.capacity().max(INITIAL_READ_CAPACITY);
            self.buf.reserve(grow_by);
        }
        stream.read_buf(&mut self.buf).await
    }

    /// Decode and remove the next complete frame, if one is buffered.
    pub fn take_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        Frame::decode(&mut self.buf, self.max_payload_len)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Outbound byte buffer drained by repeated nonblocking writes, resuming after
/// any partial write.
#[derive(Default)]
pub struct WriteBuffer {
    buf: BytesMut,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    pub fn push(&mut self, bytes: bytes::Bytes) {
        self.buf.extend_from_slice(&bytes);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write as much of the buffer as the stream will accept in one call and
    /// drop the written prefix. `flush` is left to the caller (the cooperative
    /// engines flush once per reactor tick rather than per frame).
    pub async fn drain<W: AsyncWrite + Unpin>(&mut self, stream: &mut W) -> std::io::Result<usize> {
        if self.buf.is_empty() {
            return Ok(0);
        }
        let n = stream.write(&self.buf).await?;
        self.buf.advance(n);
        Ok(n)
    }

    /// Remove and return the entire buffered content, leaving the buffer
    /// empty. Used by the cooperative child so a write can be awaited without
    /// holding a borrow of the shared buffer across the `.await` point.
    pub fn take_all(&mut self) -> bytes::Bytes {
        std::mem::take(&mut self.buf).freeze()
    }

    pub async fn flush<W: AsyncWrite + Unpin>(&mut self, stream: &mut W) -> std::io::Result<()> {
        while !self.buf.is_empty() {
            self.drain(stream).await?;
        }
        stream.flush().await
    }
}

/// Blocking-mode variant: writes a frame to completion using synchronous
/// `std::io::{Read, Write}`, used by the single-threaded blocking child where
/// pulling in a reactor for one request at a time would be overkill.
pub mod blocking {
    use std::io::{self, Read, Write};

    use bytes::BytesMut;

    use crate::error::FrameError;
    use crate::frame::Frame;

    pub struct ReadBuffer {
        buf: BytesMut,
        max_payload_len: u32,
    }

    impl ReadBuffer {
        pub fn new(max_payload_len: u32) -> Self {
            Self {
                buf: BytesMut::with_capacity(super::INITIAL_READ_CAPACITY),
                max_payload_len,
            }
        }

        pub fn fill<R: Read>(&mut self, stream: &mut R) -> io::Result<usize> {
            if self.buf.capacity() - self.buf.len() < super::INITIAL_READ_CAPACITY / 4 {
                let grow_by = self.buf.capacity().max(super::INITIAL_READ_CAPACITY);
                self.buf.reserve(grow_by);
            }
            let start = self.buf.len();
            let spare = self.buf.capacity() - start;
            self.buf.resize(start + spare, 0);
            let n = stream.read(&mut self.buf[start..])?;
            self.buf.truncate(start + n);
            Ok(n)
        }

        pub fn take_frame(&mut self) -> Result<Option<Frame>, FrameError> {
            Frame::decode(&mut self.buf, self.max_payload_len)
        }
    }

    pub fn write_all_frame<W: Write + ?Sized>(stream: &mut W, bytes: &[u8]) -> io::Result<()> {
        stream.write_all(bytes)?;
        stream.flush()
    }
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_LEN)
    }
}
