//! Thread module

pub mod stack;
pub mod state;
pub mod statistics;
pub mod thread;

pub use stack::{ThreadStack, STACK_FENCEPOST};
pub use state::ThreadState;
pub use statistics::ThreadStatistics;
pub use thread::{ChildRecord, Thread, ThreadParams};
