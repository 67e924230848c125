// ABOUTME: Error taxonomy for framing, serialization, and engine-level failures
// ABOUTME: Mirrors the split between wire-level and session-level errors used throughout this crate

use std::io;

/// Errors that can occur while decoding or encoding a frame header.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("not enough data buffered to decode a full frame")]
    Incomplete,

    #[error("frame payload length {length} exceeds the configured maximum of {max}")]
    PayloadTooLarge { length: u32, max: u32 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors produced by a [`crate::serializer::Serializer`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum SerializerError {
    #[error("length-prefixed payload truncated while reading a string")]
    Truncated,

    #[error("value of kind {0} cannot be represented by this serializer")]
    UnsupportedValue(&'static str),

    #[error("json encode/decode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bare encode/decode failed: {0}")]
    Bare(#[from] serde_bare::error::Error),
}

/// Terminal conditions for a running [`crate::parent::ParentEngine`] or child engine.
///
/// Every variant here is terminal: the engine that raises one transitions to its
/// closed state and does not retry. There is no per-call error delivery (see
/// the error handling design notes): an `EngineError` is always delivered through
/// `on_error`, never through a `reply_cb`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("serializer error: {0}")]
    Serializer(#[from] SerializerError),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("peer closed the connection with {pending} reply(s) still outstanding")]
    UnexpectedEof { pending: usize },
}
