//! UNIX-style decaying priorities
//!
//! At every burst boundary each live thread's CPU credit is halved and its
//! priority recomputed as `base + credit / 2`. Lower values dispatch first.

use crate::scheduler::thread::Thread;

/// Decay every thread that has not exited
pub fn decay_priorities<'a>(threads: impl Iterator<Item = &'a mut Thread>) {
    for thread in threads.filter(|thread| !thread.is_exited()) {
        thread.decay_priority();
    }
}
