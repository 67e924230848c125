// ABOUTME: Child-side name -> handler function registry
// ABOUTME: Replaces the source's eval-string handler loading with a map built before the engine starts

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::emitter::{BlockingEmitter, Done, Emitter};
use crate::value::Value;

/// A blocking-mode handler: runs to completion on the single child thread and
/// returns its reply tuple directly.
pub type BlockingHandlerFn = Box<dyn Fn(&mut BlockingEmitter, &[Value]) -> Vec<Value> + Send + Sync>;

/// A cooperative-mode handler: spawned as a local task, completes by calling
/// `done.done(values)` whenever it is ready rather than by returning.
pub type CooperativeHandlerFn =
    Box<dyn Fn(Emitter, Done, Vec<Value>) -> Pin<Box<dyn Future<Output = ()>>>>;

/// Name -> handler map populated by the caller before `run` is invoked, per
/// the re-architecture away from dynamically evaluated handler code.
#[derive(Default)]
pub struct BlockingHandlerRegistry {
    handlers: HashMap<String, BlockingHandlerFn>,
}

impl BlockingHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: BlockingHandlerFn) -> &mut Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<&BlockingHandlerFn> {
        self.handlers.get(name)
    }
}

#[derive(Default)]
pub struct CooperativeHandlerRegistry {
    handlers: HashMap<String, CooperativeHandlerFn>,
}

impl CooperativeHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: CooperativeHandlerFn) -> &mut Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<&CooperativeHandlerFn> {
        self.handlers.get(name)
    }
}
