//! Execution engine subsystem
//!
//! Machine state (memory, header, stacks), the translation cache of compiled
//! units, the execution context handed to those units and the engine that
//! drives the run loop between host events.

mod cache;
mod context;
mod engine;
mod frame;
mod machine;
mod object;
mod random;
mod state;
mod streams;

pub use cache::{CacheStats, TranslationCache};
pub use context::ExecContext;
pub use engine::{Engine, RESTORED};
pub use frame::{Frame, MAX_LOCALS};
pub use machine::Machine;
pub use random::RandomState;
pub use state::{MAX_FRAMES, MAX_STACK, StackSnapshot, VmState};
pub use streams::{MAX_MEMORY_STREAMS, OutputStreams};
