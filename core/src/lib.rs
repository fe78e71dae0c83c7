pub mod codegen;
pub mod config;
pub mod error;
pub mod header;
pub mod host;
pub mod memory;
pub mod persist;
pub mod text;
pub mod ui;
pub mod util;

// Run loop, machine state and translation cache
pub mod vm;

pub use config::{EngineConfig, EnvPatch};
pub use error::{MemoryError, VmError};
pub use host::{Envelope, Event, KeyInput, LineInput, Order, StoreResult, StreamTarget, Variable};
pub use vm::Engine;

#[cfg(test)]
mod engine_test;
