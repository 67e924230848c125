// ABOUTME: The parent-side protocol engine: a single-threaded tokio task owning the socket
// ABOUTME: Grounded on this crate's connection/client layering: builder-style options, a driving event loop, a typed reply handle

mod pending;
mod request_id;
mod state;

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::frame::{Frame, DEFAULT_MAX_PAYLOAD_LEN};
use crate::io::{ReadBuffer, WriteBuffer};
use crate::serializer::{LengthPrefixedStringsSerializer, Serializer};
use crate::value::Value;

pub use pending::PendingTable;
pub use request_id::RequestIdAllocator;
pub use state::ParentState;

/// Which child execution model the peer is running. Must match exactly,
/// since a `ParentEngine` spawned with the wrong mode will misinterpret
/// response ordering (see the data model notes on `PendingTable`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Blocking,
    Cooperative,
}

type OnEvent = Box<dyn FnMut(Vec<Value>) + Send + 'static>;
type OnError = Box<dyn FnOnce(EngineError) + Send + 'static>;
type OnDestroy = Box<dyn FnOnce() + Send + 'static>;

/// Configuration for [`ParentEngine::spawn`], built with fluent `with_*`
/// setters in the style this crate already uses for client-side options.
pub struct ParentOptions {
    mode: Mode,
    serializer: Arc<dyn Serializer>,
    max_payload_len: u32,
    on_event: Option<OnEvent>,
    on_error: Option<OnError>,
    on_destroy: Option<OnDestroy>,
}

impl Default for ParentOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Blocking,
            serializer: Arc::new(LengthPrefixedStringsSerializer),
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            on_event: None,
            on_error: None,
            on_destroy: None,
        }
    }
}

impl ParentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_max_payload_len(mut self, max_payload_len: u32) -> Self {
        self.max_payload_len = max_payload_len;
        self
    }

    pub fn on_event(mut self, f: impl FnMut(Vec<Value>) + Send + 'static) -> Self {
        self.on_event = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(EngineError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn on_destroy(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_destroy = Some(Box::new(f));
        self
    }
}

enum Command {
    Invoke(Vec<Value>, pending::ReplyCb),
}

/// Caller-facing front for a running parent engine.
///
/// `invoke` never blocks: it hands the request to the engine task over an
/// unbounded channel and returns immediately. Dropping the handle (or calling
/// [`Handle::close`], which is just an explicit drop) begins the drain-and-close
/// sequence described in the component design notes.
pub struct Handle {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl Handle {
    pub fn invoke(&self, args: Vec<Value>, reply_cb: impl FnOnce(Vec<Value>) + Send + 'static) {
        let send_result = self
            .cmd_tx
            .send(Command::Invoke(args, Box::new(reply_cb)));
        if send_result.is_err() {
            debug_assert!(false, "invoke called on a closed ParentEngine handle");
            tracing::warn!("invoke called after the parent engine had already closed");
        }
    }

    /// Begin graceful shutdown: stop accepting new calls, finish delivering
    /// replies already in flight, then half-close once the write side drains.
    pub fn close(self) {
        tracing::debug!("parent handle closed");
    }
}

pub struct ParentEngine;

impl ParentEngine {
    /// Take ownership of `stream` and drive the parent side of the protocol
    /// on a dedicated `tokio` task until the connection reaches a terminal state.
    pub fn spawn<S>(stream: S, options: ParentOptions) -> Handle
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(stream, options, cmd_rx));
        Handle { cmd_tx }
    }
}

async fn run<S>(stream: S, mut options: ParentOptions, mut cmd_rx: mpsc::UnboundedReceiver<Command>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut read_half, mut write_half) = tokio::io::split(stream);
    let mut read_buf = ReadBuffer::new(options.max_payload_len);
    let mut write_buf = WriteBuffer::new();
    let mut pending = match options.mode {
        Mode::Blocking => PendingTable::new_blocking(),
        Mode::Cooperative => PendingTable::new_cooperative(),
    };
    let mut ids = RequestIdAllocator::new();
    let mut state = ParentState::Running;

    let mut fire_error = |options: &mut ParentOptions, err: EngineError| {
        tracing::warn!(error = %err, "parent engine closing on error");
        if let Some(cb) = options.on_error.take() {
            cb(err);
        } else if let Some(on_event) = options.on_event.as_mut() {
            on_event(vec![Value::Str("error".into()), Value::Str(err.to_string())]);
        } else {
            tracing::error!(error = %err, "unhandled parent engine error");
        }
    };

    loop {
        if state == ParentState::Closed {
            break;
        }

        tokio::select! {
            maybe_cmd = cmd_rx.recv(), if state == ParentState::Running => {
                match maybe_cmd {
                    Some(Command::Invoke(args, cb)) => {
                        let payload = match options.serializer.encode(&args) {
                            Ok(p) => p,
                            Err(e) => { fire_error(&mut options, EngineError::Serializer(e)); state = ParentState::Closed; continue; }
                        };
                        let id = ids.alloc(|id| pending.contains(id));
                        pending.insert(id, cb);
                        match Frame::encode(id, &payload, options.max_payload_len) {
                            Ok(frame) => write_buf.push(frame),
                            Err(e) => { fire_error(&mut options, EngineError::Frame(e)); state = ParentState::Closed; }
                        }
                    }
                    None => {
                        state = ParentState::ShuttingDown;
                        if write_buf.is_empty() {
                            let _ = write_half.shutdown().await;
                        }
                    }
                }
            }

            read_result = read_buf.fill(&mut read_half), if state != ParentState::Closed => {
                match read_result {
                    Ok(0) => {
                        if state == ParentState::ShuttingDown && pending.is_empty() {
                            state = ParentState::Closed;
                            if let Some(cb) = options.on_destroy.take() {
                                cb();
                            }
                        } else {
                            let pending_count = pending.len();
                            state = ParentState::Closed;
                            fire_error(&mut options, EngineError::UnexpectedEof { pending: pending_count });
                        }
                    }
                    Ok(_) => {
                        loop {
                            match read_buf.take_frame() {
                                Ok(Some(frame)) => {
                                    if let Some(err) = dispatch_frame(frame, &mut pending, &mut options) {
                                        fire_error(&mut options, err);
                                        state = ParentState::Closed;
                                        break;
                                    }
                                }
                                Ok(None) => break,
                                Err(e) => { fire_error(&mut options, EngineError::Frame(e)); state = ParentState::Closed; break; }
                            }
                        }
                    }
                    Err(e) => {
                        fire_error(&mut options, EngineError::Io(e));
                        state = ParentState::Closed;
                    }
                }
            }

            write_result = write_buf.drain(&mut write_half), if !write_buf.is_empty() => {
                match write_result {
                    Ok(_) => {
                        if write_buf.is_empty() && state == ParentState::ShuttingDown {
                            let _ = write_half.shutdown().await;
                        }
                    }
                    Err(e) => {
                        fire_error(&mut options, EngineError::Io(e));
                        state = ParentState::Closed;
                    }
                }
            }
        }
    }
}

/// Returns `Some(err)` when the frame cannot be reconciled with the pending
/// set at all, a terminal protocol violation the caller must close over.
fn dispatch_frame(
    frame: Frame,
    pending: &mut PendingTable,
    options: &mut ParentOptions,
) -> Option<EngineError> {
    if frame.is_event() {
        match options.serializer.decode(&frame.payload) {
            Ok(values) => {
                if let Some(on_event) = options.on_event.as_mut() {
                    on_event(values);
                }
            }
            Err(e) => return Some(EngineError::Serializer(e)),
        }
        return None;
    }

    match pending.take(frame.id) {
        Some(cb) => match options.serializer.decode(&frame.payload) {
            Ok(values) => {
                cb(values);
                None
            }
            Err(e) => Some(EngineError::Serializer(e)),
        },
        None => Some(EngineError::Protocol(format!(
            "response for id {} has no matching pending request",
            frame.id
        ))),
    }
}
