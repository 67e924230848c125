// ABOUTME: The reactor-driven child engine: concurrent in-flight requests, single thread via LocalSet
// ABOUTME: Events and responses share one outbound buffer so their wire order matches enqueue order

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;

use crate::emitter::{Done, Emitter};
use crate::error::EngineError;
use crate::frame::Frame;
use crate::handler::CooperativeHandlerRegistry;
use crate::io::WriteBuffer;
use crate::serializer::Serializer;
use crate::value::Value;

#[derive(Debug)]
pub enum ExitOutcome {
    Clean,
    Fatal(EngineError),
}

pub struct ChildEngineCooperative;

impl ChildEngineCooperative {
    /// Build a dedicated current-thread runtime and drive the cooperative
    /// protocol loop to completion. This is the entry point a real forked
    /// child's `main` calls; it owns its own runtime rather than sharing one,
    /// matching the "single-threaded reactor per process" design.
    ///
    /// `make_stream` is called once the runtime is active (its own `enter`
    /// guard is held for the call), so it may use constructors like
    /// `tokio::net::TcpStream::from_std` that need a reactor handle.
    pub fn run_on_current_thread<S>(
        make_stream: impl FnOnce() -> std::io::Result<S>,
        handlers: CooperativeHandlerRegistry,
        serializer: Arc<dyn Serializer>,
        max_payload_len: u32,
    ) -> std::io::Result<ExitOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin + 'static,
    {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build the cooperative child's current-thread runtime");
        let stream = {
            let _guard = rt.enter();
            make_stream()?
        };
        let local = tokio::task::LocalSet::new();
        Ok(local.block_on(
            &rt,
            run_local(stream, Rc::new(handlers), serializer, max_payload_len),
        ))
    }
}

/// Reusable async core, for composing with a caller-owned `LocalSet` (tests
/// do this so a single test runtime can host both engines of a pair).
pub async fn run_local<S>(
    stream: S,
    handlers: Rc<CooperativeHandlerRegistry>,
    serializer: Arc<dyn Serializer>,
    max_payload_len: u32,
) -> ExitOutcome
where
    S: AsyncRead + AsyncWrite + Unpin + 'static,
{
    let (mut read_half, mut write_half) = tokio::io::split(stream);
    let outbound = Rc::new(RefCell::new(WriteBuffer::new()));
    let busy = Rc::new(Cell::new(1u64));
    let waker = Rc::new(Notify::new());
    let mut read_buf = crate::io::ReadBuffer::new(max_payload_len);
    let mut reading_done = false;

    loop {
        if busy.get() == 0 && outbound.borrow().is_empty() {
            let _ = write_half.shutdown().await;
            return ExitOutcome::Clean;
        }

        tokio::select! {
            read_result = read_buf.fill(&mut read_half), if !reading_done => {
                match read_result {
                    Ok(0) => {
                        reading_done = true;
                        busy.set(busy.get() - 1);
                        waker.notify_one();
                    }
                    Ok(_) => {
                        loop {
                            match read_buf.take_frame() {
                                Ok(Some(frame)) => {
                                    if let Some(err) = dispatch_request(
                                        frame,
                                        &handlers,
                                        &serializer,
                                        max_payload_len,
                                        &outbound,
                                        &busy,
                                        &waker,
                                    ) {
                                        return ExitOutcome::Fatal(err);
                                    }
                                }
                                Ok(None) => break,
                                Err(e) => return ExitOutcome::Fatal(EngineError::Frame(e)),
                            }
                        }
                    }
                    Err(e) => return ExitOutcome::Fatal(EngineError::Io(e)),
                }
            }

            _ = waker.notified() => {}

            write_result = drain_once(&outbound, &mut write_half), if !outbound.borrow().is_empty() => {
                if let Err(e) = write_result {
                    return ExitOutcome::Fatal(EngineError::Io(e));
                }
            }
        }
    }
}

async fn drain_once<W: AsyncWrite + Unpin>(
    outbound: &Rc<RefCell<WriteBuffer>>,
    write_half: &mut W,
) -> std::io::Result<()> {
    let chunk = outbound.borrow_mut().take_all();
    write_half.write_all(&chunk).await
}

/// Decode a request frame's handler name and arguments, then spawn a local
/// task that runs the handler to completion and reports via `Done`. Returns
/// `Some(err)` for a terminal protocol violation (events arriving from the
/// parent, or an unknown handler name).
fn dispatch_request(
    frame: Frame,
    handlers: &Rc<CooperativeHandlerRegistry>,
    serializer: &Arc<dyn Serializer>,
    max_payload_len: u32,
    outbound: &Rc<RefCell<WriteBuffer>>,
    busy: &Rc<Cell<u64>>,
    waker: &Rc<Notify>,
) -> Option<EngineError> {
    if frame.is_event() {
        return Some(EngineError::Protocol(
            "parent sent an event-shaped frame (id 0); only children emit events".into(),
        ));
    }

    let args = match serializer.decode(&frame.payload) {
        Ok(values) => values,
        Err(e) => return Some(EngineError::Serializer(e)),
    };
    let (name, call_args) = match args.split_first() {
        Some((Value::Str(name), rest)) => (name.clone(), rest.to_vec()),
        _ => {
            return Some(EngineError::Protocol(
                "request payload must start with the handler name".into(),
            ))
        }
    };
    let Some(handler) = handlers.get(&name) else {
        return Some(EngineError::Protocol(format!("no handler registered for {name}")));
    };

    busy.set(busy.get() + 1);
    let emitter = Emitter::new(outbound.clone(), serializer.clone(), max_payload_len, waker.clone());
    let done = Done::new(
        frame.id,
        outbound.clone(),
        serializer.clone(),
        max_payload_len,
        busy.clone(),
        waker.clone(),
    );
    let future = handler(emitter, done, call_args);
    tokio::task::spawn_local(future);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::LengthPrefixedStringsSerializer;
    use std::pin::Pin;

    fn encode_call(serializer: &dyn Serializer, name: &str, args: &[Value]) -> bytes::Bytes {
        let mut full = vec![Value::Str(name.to_string())];
        full.extend_from_slice(args);
        serializer.encode(&full).unwrap()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn completes_requests_out_of_order_and_exits_cleanly() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let serializer: Arc<dyn Serializer> = Arc::new(LengthPrefixedStringsSerializer);
                let (client, server) = tokio::io::duplex(8192);

                let mut handlers = CooperativeHandlerRegistry::new();
                handlers.register(
                    "immediate",
                    Box::new(|_emitter: Emitter, done: Done, args: Vec<Value>| {
                        Box::pin(async move {
                            done.done(args).unwrap();
                        }) as Pin<Box<dyn std::future::Future<Output = ()>>>
                    }),
                );

                let mut client = client;
                let req1 = Frame::encode(
                    1,
                    &encode_call(serializer.as_ref(), "immediate", &[Value::Str("one".into())]),
                    crate::frame::DEFAULT_MAX_PAYLOAD_LEN,
                )
                .unwrap();
                let req2 = Frame::encode(
                    2,
                    &encode_call(serializer.as_ref(), "immediate", &[Value::Str("two".into())]),
                    crate::frame::DEFAULT_MAX_PAYLOAD_LEN,
                )
                .unwrap();

                use tokio::io::AsyncWriteExt;
                client.write_all(&req1).await.unwrap();
                client.write_all(&req2).await.unwrap();
                client.shutdown().await.unwrap();

                let outcome = run_local(server, Rc::new(handlers), serializer.clone(), crate::frame::DEFAULT_MAX_PAYLOAD_LEN).await;
                assert!(matches!(outcome, ExitOutcome::Clean));

                use tokio::io::AsyncReadExt;
                let mut collected = Vec::new();
                client.read_to_end(&mut collected).await.unwrap();
                let mut buf = bytes::BytesMut::from(&collected[..]);
                let mut ids = Vec::new();
                while let Some(frame) = Frame::decode(&mut buf, crate::frame::DEFAULT_MAX_PAYLOAD_LEN).unwrap() {
                    ids.push(frame.id);
                }
                assert_eq!(ids.len(), 2);
                assert!(ids.contains(&1) && ids.contains(&2));
            })
            .await;
    }
}
