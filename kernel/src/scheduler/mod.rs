//! Scheduler subsystem
//!
//! Policy-ordered ready queue, thread control blocks in a generation-checked
//! arena, the sleep queue, burst prediction and the context-switch boundary.

pub mod core;
pub mod idle;
pub mod prediction;
pub mod sleep_queue;
pub mod switch;
pub mod table;
pub mod thread;

// Re-exports
pub use self::core::{Scheduler, SchedulingPolicy, Statistics, StatsReport};
pub use sleep_queue::{SleepEntry, SleepQueue};
pub use table::{ThreadId, ThreadTable};
pub use thread::{ChildRecord, Thread, ThreadState, ThreadStatistics};
