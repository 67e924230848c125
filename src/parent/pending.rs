// ABOUTME: Parent-side pending-reply bookkeeping for both child execution models
// ABOUTME: Blocking mode is an ordered FIFO queue, cooperative mode is keyed by request id

use std::collections::{HashMap, VecDeque};

use crate::value::Value;

pub type ReplyCb = Box<dyn FnOnce(Vec<Value>) + Send + 'static>;

pub enum PendingTable {
    Blocking(VecDeque<(u32, ReplyCb)>),
    Cooperative(HashMap<u32, ReplyCb>),
}

impl PendingTable {
    pub fn new_blocking() -> Self {
        PendingTable::Blocking(VecDeque::new())
    }

    pub fn new_cooperative() -> Self {
        PendingTable::Cooperative(HashMap::new())
    }

    pub fn insert(&mut self, id: u32, cb: ReplyCb) {
        match self {
            PendingTable::Blocking(q) => q.push_back((id, cb)),
            PendingTable::Cooperative(m) => {
                m.insert(id, cb);
            }
        }
    }

    /// Remove and return the callback matching `id`, if the shape of the
    /// pending set allows it: in blocking mode this also enforces FIFO order
    /// by rejecting an `id` that does not match the head of the queue.
    pub fn take(&mut self, id: u32) -> Option<ReplyCb> {
        match self {
            PendingTable::Blocking(q) => {
                let front_matches = q.front().map(|(front_id, _)| *front_id == id).unwrap_or(false);
                if front_matches {
                    q.pop_front().map(|(_, cb)| cb)
                } else {
                    None
                }
            }
            PendingTable::Cooperative(m) => m.remove(&id),
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        match self {
            PendingTable::Blocking(_) => false,
            PendingTable::Cooperative(m) => m.contains_key(&id),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PendingTable::Blocking(q) => q.len(),
            PendingTable::Cooperative(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
