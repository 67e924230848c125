// ABOUTME: The serial child engine: one request in flight at a time, synchronous syscalls only
// ABOUTME: No tokio runtime pulled in here, deliberately, matching the "minimum dependencies" design goal

use std::io::{Read, Write};
use std::sync::Arc;

use crate::emitter::BlockingEmitter;
use crate::error::EngineError;
use crate::frame::Frame;
use crate::handler::BlockingHandlerRegistry;
use crate::io::blocking::{write_all_frame, ReadBuffer};
use crate::serializer::Serializer;
use crate::value::Value;

/// How a blocking child engine stopped running.
#[derive(Debug)]
pub enum ExitOutcome {
    /// Peer EOF observed with no request in progress: half-close and exit 0.
    Clean,
    Fatal(EngineError),
}

pub struct ChildEngineBlocking;

impl ChildEngineBlocking {
    /// Drive the blocking protocol loop over `stream` to completion.
    ///
    /// Returns rather than calling `std::process::exit` itself, so it can be
    /// exercised in-process by tests; a real child binary's `main` should
    /// match on the [`ExitOutcome`] and exit with the documented codes.
    pub fn run<S: Read + Write>(
        mut stream: S,
        handlers: &BlockingHandlerRegistry,
        serializer: Arc<dyn Serializer>,
        max_payload_len: u32,
    ) -> ExitOutcome {
        let mut read_buf = ReadBuffer::new(max_payload_len);

        loop {
            let frame = loop {
                match read_buf.take_frame() {
                    Ok(Some(frame)) => break Some(frame),
                    Ok(None) => {}
                    Err(e) => return ExitOutcome::Fatal(EngineError::Frame(e)),
                }
                match read_buf.fill(&mut stream) {
                    Ok(0) => break None,
                    Ok(_) => continue,
                    Err(e) => return ExitOutcome::Fatal(EngineError::Io(e)),
                }
            };

            let Some(frame) = frame else {
                return ExitOutcome::Clean;
            };

            if frame.is_event() {
                return ExitOutcome::Fatal(EngineError::Protocol(
                    "parent sent an event-shaped frame (id 0); only children emit events".into(),
                ));
            }

            let args = match serializer.decode(&frame.payload) {
                Ok(values) => values,
                Err(e) => return ExitOutcome::Fatal(EngineError::Serializer(e)),
            };

            let (name, call_args) = match args.split_first() {
                Some((Value::Str(name), rest)) => (name.clone(), rest.to_vec()),
                _ => {
                    return ExitOutcome::Fatal(EngineError::Protocol(
                        "request payload must start with the handler name".into(),
                    ))
                }
            };

            let Some(handler) = handlers.get(&name) else {
                return ExitOutcome::Fatal(EngineError::Protocol(format!(
                    "no handler registered for {name}"
                )));
            };

            let result = {
                let mut emitter = BlockingEmitter::new(&mut stream, serializer.as_ref(), max_payload_len);
                handler(&mut emitter, &call_args)
            };

            let payload = match serializer.encode(&result) {
                Ok(p) => p,
                Err(e) => return ExitOutcome::Fatal(EngineError::Serializer(e)),
            };
            let response = match Frame::encode(frame.id, &payload, max_payload_len) {
                Ok(f) => f,
                Err(e) => return ExitOutcome::Fatal(EngineError::Frame(e)),
            };
            if let Err(e) = write_all_frame(&mut stream, &response) {
                return ExitOutcome::Fatal(EngineError::Io(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::LengthPrefixedStringsSerializer;
    use std::io::Cursor;

    struct DuplexBuf {
        read: Cursor<Vec<u8>>,
        write: Vec<u8>,
    }

    impl Read for DuplexBuf {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.read.read(buf)
        }
    }

    impl Write for DuplexBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.write.write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn echoes_a_single_request_then_exits_cleanly_on_eof() {
        let serializer: Arc<dyn Serializer> = Arc::new(LengthPrefixedStringsSerializer);
        let mut handlers = BlockingHandlerRegistry::new();
        handlers.register(
            "echo",
            Box::new(|_emitter, args| args.to_vec()),
        );

        let request_payload = serializer
            .encode(&[Value::Str("echo".into()), Value::Str("hello".into())])
            .unwrap();
        let request = Frame::encode(1, &request_payload, crate::frame::DEFAULT_MAX_PAYLOAD_LEN).unwrap();

        let mut stream = DuplexBuf {
            read: Cursor::new(request.to_vec()),
            write: Vec::new(),
        };

        let outcome = ChildEngineBlocking::run(
            &mut stream,
            &handlers,
            serializer.clone(),
            crate::frame::DEFAULT_MAX_PAYLOAD_LEN,
        );

        match outcome {
            ExitOutcome::Clean => {}
            ExitOutcome::Fatal(e) => panic!("expected clean exit, got {e}"),
        }

        let mut out = bytes::BytesMut::from(&stream.write[..]);
        let response = Frame::decode(&mut out, crate::frame::DEFAULT_MAX_PAYLOAD_LEN)
            .unwrap()
            .unwrap();
        assert_eq!(response.id, 1);
        let decoded = serializer.decode(&response.payload).unwrap();
        assert_eq!(decoded, vec![Value::Str("hello".into())]);
    }
}
