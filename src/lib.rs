//! A framed, pipelined RPC core between a parent process and a previously
//! forked child process sharing a bidirectional byte-stream.
//!
//! The parent drives a [`parent::ParentEngine`]; the child runs one of two
//! execution models, [`child::ChildEngineBlocking`] (serial, synchronous) or
//! [`child::ChildEngineCooperative`] (concurrent, reactor-driven). Both sides
//! agree on a [`frame::Frame`] wire shape and a [`serializer::Serializer`] for
//! argument/return encoding; see each module's docs for the contract.
//!
//! ```rust,no_run
//! use forkrpc::parent::{ParentEngine, ParentOptions, Mode};
//! use forkrpc::value::Value;
//!
//! # async fn run(stream: tokio::net::TcpStream) {
//! let handle = ParentEngine::spawn(
//!     stream,
//!     ParentOptions::new()
//!         .with_mode(Mode::Cooperative)
//!         .on_event(|values| println!("event: {values:?}"))
//!         .on_error(|err| eprintln!("fatal: {err}")),
//! );
//!
//! handle.invoke(vec![Value::Str("echo".into()), Value::Str("hi".into())], |reply| {
//!     println!("reply: {reply:?}");
//! });
//! # }
//! ```

pub mod child;
pub mod emitter;
pub mod error;
pub mod frame;
pub mod handler;
pub mod io;
pub mod parent;
pub mod serializer;
pub mod value;

pub use error::EngineError;
pub use frame::Frame;
pub use value::Value;
