//! Prediction algorithms for scheduler
//!
//! Burst estimation feeds the shortest-next-burst policy; priority decay
//! feeds the UNIX priority policy.

pub mod ema;
pub mod priority;

pub use ema::BurstEstimator;
pub use priority::decay_priorities;
