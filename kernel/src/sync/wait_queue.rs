//! Wait Queue
//!
//! A mechanism for threads to sleep until an event occurs. Waiters are
//! woken in arrival order.

use std::collections::VecDeque;

use spin::Mutex;

use crate::process::Kernel;
use crate::Pid;

/// A queue of waiting threads
#[derive(Debug, Default)]
pub struct WaitQueue {
    waiting: Mutex<VecDeque<Pid>>,
}

impl WaitQueue {
    /// Create a new wait queue
    pub const fn new() -> Self {
        Self { waiting: Mutex::new(VecDeque::new()) }
    }

    /// Block the current thread until notified
    ///
    /// Interrupts must already be off, so that no notify can slip in
    /// between the caller's check and the block.
    pub fn wait(&self, kernel: &Kernel) {
        let pid = kernel.current_pid();
        self.waiting.lock().push_back(pid);
        kernel.block_and_sleep();
    }

    /// Wake up the oldest waiter; returns its pid
    pub fn notify_one(&self, kernel: &Kernel) -> Option<Pid> {
        loop {
            let pid = self.waiting.lock().pop_front()?;
            match kernel.wake(pid) {
                Ok(()) => return Some(pid),
                Err(err) => log::warn!("wait queue: dropping waiter {}: {}", pid, err),
            }
        }
    }

    /// Wake up all waiting threads
    pub fn notify_all(&self, kernel: &Kernel) -> usize {
        let mut woken = 0;
        while self.notify_one(kernel).is_some() {
            woken += 1;
        }
        woken
    }

    pub fn len(&self) -> usize {
        self.waiting.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.lock().is_empty()
    }
}
