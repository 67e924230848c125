// ABOUTME: Explicit event-emission capability handed to handler code by the child engine
// ABOUTME: Replaces the source's global emit symbol with a parameter, per the re-architecture notes

use std::rc::Rc;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::EngineError;
use crate::serializer::Serializer;
use crate::value::Value;

/// Emit capability for the blocking child engine.
///
/// Synchronous: writing an event frame happens on the caller's stack, to
/// completion, before `emit` returns. Handed to handler functions by
/// reference so a handler can emit any number of events before returning
/// its response.
pub struct BlockingEmitter<'a> {
    stream: &'a mut dyn std::io::Write,
    serializer: &'a dyn Serializer,
    max_payload_len: u32,
}

impl<'a> BlockingEmitter<'a> {
    pub fn new(
        stream: &'a mut dyn std::io::Write,
        serializer: &'a dyn Serializer,
        max_payload_len: u32,
    ) -> Self {
        Self {
            stream,
            serializer,
            max_payload_len,
        }
    }

    pub fn emit(&mut self, values: &[Value]) -> Result<(), EngineError> {
        let payload = self.serializer.encode(values)?;
        let frame = crate::frame::Frame::encode_event(&payload, self.max_payload_len)?;
        crate::io::blocking::write_all_frame(self.stream, &frame)?;
        Ok(())
    }
}

/// Emit capability for the cooperative child engine.
///
/// Cheaply cloned (an `Rc` around the shared outbound buffer), since a
/// handler task may hold on to it across `.await` points and emit events
/// throughout its lifetime, not only at the start or end.
#[derive(Clone)]
pub struct Emitter {
    outbound: Rc<std::cell::RefCell<crate::io::WriteBuffer>>,
    serializer: Arc<dyn Serializer>,
    max_payload_len: u32,
    waker: Rc<tokio::sync::Notify>,
}

impl Emitter {
    pub(crate) fn new(
        outbound: Rc<std::cell::RefCell<crate::io::WriteBuffer>>,
        serializer: Arc<dyn Serializer>,
        max_payload_len: u32,
        waker: Rc<tokio::sync::Notify>,
    ) -> Self {
        Self {
            outbound,
            serializer,
            max_payload_len,
            waker,
        }
    }

    pub fn emit(&self, values: &[Value]) -> Result<(), EngineError> {
        let payload = self.serializer.encode(values)?;
        let frame: Bytes = crate::frame::Frame::encode_event(&payload, self.max_payload_len)?;
        self.outbound.borrow_mut().push(frame);
        self.waker.notify_one();
        Ok(())
    }
}

/// One-shot completion capability handed to a cooperative handler task.
///
/// Calling `done` encodes and enqueues the response frame and decrements the
/// child's busy counter; it may be called exactly once per request.
#[derive(Clone)]
pub struct Done {
    id: u32,
    outbound: Rc<std::cell::RefCell<crate::io::WriteBuffer>>,
    serializer: Arc<dyn Serializer>,
    max_payload_len: u32,
    busy: Rc<std::cell::Cell<u64>>,
    waker: Rc<tokio::sync::Notify>,
}

impl Done {
    pub(crate) fn new(
        id: u32,
        outbound: Rc<std::cell::RefCell<crate::io::WriteBuffer>>,
        serializer: Arc<dyn Serializer>,
        max_payload_len: u32,
        busy: Rc<std::cell::Cell<u64>>,
        waker: Rc<tokio::sync::Notify>,
    ) -> Self {
        Self {
            id,
            outbound,
            serializer,
            max_payload_len,
            busy,
            waker,
        }
    }

    pub fn done(self, values: Vec<Value>) -> Result<(), EngineError> {
        let payload = self.serializer.encode(&values)?;
        let frame: Bytes = crate::frame::Frame::encode(self.id, &payload, self.max_payload_len)?;
        self.outbound.borrow_mut().push(frame);
        self.busy.set(self.busy.get() - 1);
        self.waker.notify_one();
        Ok(())
    }
}
