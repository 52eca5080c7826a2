//! Counting semaphore
//!
//! The canonical client of `block_and_sleep` and `wake`: P blocks while the
//! count is zero, V hands the CPU-less waiter back to the ready queue.

use core::sync::atomic::{AtomicU32, Ordering};

use super::wait_queue::WaitQueue;
use crate::process::{InterruptGuard, Kernel};

#[derive(Debug)]
pub struct Semaphore {
    name: String,
    value: AtomicU32,
    queue: WaitQueue,
}

impl Semaphore {
    pub fn new(name: &str, initial: u32) -> Self {
        Self { name: name.to_owned(), value: AtomicU32::new(initial), queue: WaitQueue::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> u32 {
        self.value.load(Ordering::SeqCst)
    }

    /// Wait until the count is positive, then decrement it
    pub fn p(&self, kernel: &Kernel) {
        let _guard = InterruptGuard::new(kernel);
        while self.value.load(Ordering::SeqCst) == 0 {
            log::trace!("semaphore {}: thread {} waits", self.name, kernel.current_pid());
            self.queue.wait(kernel);
        }
        self.value.fetch_sub(1, Ordering::SeqCst);
    }

    /// Increment the count, readying one waiter if any
    pub fn v(&self, kernel: &Kernel) {
        let _guard = InterruptGuard::new(kernel);
        self.queue.notify_one(kernel);
        self.value.fetch_add(1, Ordering::SeqCst);
    }

    /// Threads blocked in `p`
    pub fn waiters(&self) -> usize {
        self.queue.len()
    }
}
