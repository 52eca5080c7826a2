//! Scheduler core module
//!
//! Ready-queue ordering, the policy table and process-wide statistics.

pub mod policy;
pub mod scheduler;
pub mod statistics;

pub use policy::SchedulingPolicy;
pub use scheduler::{ReadyKey, ReadyQueue, Scheduler};
pub use statistics::{Statistics, StatsReport};
