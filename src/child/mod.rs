// ABOUTME: The two child execution models: blocking (serial, sync I/O) and cooperative (reactor-driven)

pub mod blocking;
pub mod cooperative;

pub use blocking::ChildEngineBlocking;
pub use cooperative::ChildEngineCooperative;
