//! Blocking synchronization built on `block_and_sleep` / `wake`

pub mod semaphore;
pub mod wait_queue;

pub use semaphore::Semaphore;
pub use wait_queue::WaitQueue;
