//! Sleep Queue - threads waiting for a wake tick
//!
//! Kept sorted ascending by wake tick; equal ticks keep arrival order.
//! The timer handler is the only consumer.

use std::collections::VecDeque;

use super::table::ThreadId;
use crate::Pid;

/// One sleeping thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepEntry {
    pub id: ThreadId,
    pub pid: Pid,
    pub wake_tick: u64,
}

#[derive(Debug, Default)]
pub struct SleepQueue {
    entries: VecDeque<SleepEntry>,
}

impl SleepQueue {
    pub fn new() -> Self {
        Self { entries: VecDeque::new() }
    }

    /// Insert after every entry waking at or before `wake_tick`
    pub fn insert(&mut self, id: ThreadId, pid: Pid, wake_tick: u64) {
        let pos = self
            .entries
            .iter()
            .position(|entry| entry.wake_tick > wake_tick)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, SleepEntry { id, pid, wake_tick });
    }

    /// Remove every entry whose wake tick has arrived, earliest first
    pub fn pop_due(&mut self, now: u64) -> Vec<SleepEntry> {
        let due = self.entries.iter().take_while(|entry| entry.wake_tick <= now).count();
        self.entries.drain(..due).collect()
    }

    /// Earliest pending wake tick
    pub fn next_wake(&self) -> Option<u64> {
        self.entries.front().map(|entry| entry.wake_tick)
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SleepEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::table::ThreadTable;
    use crate::scheduler::thread::{Thread, ThreadParams};
    use proptest::prelude::*;

    fn ids(count: usize) -> Vec<(ThreadId, Pid)> {
        let params = ThreadParams {
            now: 0,
            base_priority: 50,
            initial_burst_estimate: 0.0,
            max_children: 1,
        };
        let mut table = ThreadTable::new(count);
        (0..count)
            .map(|_| {
                let id = table.allocate(|pid| Thread::new(pid, "s", None, &params)).unwrap();
                (id, table.get(id).unwrap().pid())
            })
            .collect()
    }

    #[test]
    fn test_pop_order_is_by_wake_tick() {
        let threads = ids(3);
        let mut queue = SleepQueue::new();
        for ((id, pid), tick) in threads.iter().zip([50, 10, 30]) {
            queue.insert(*id, *pid, tick);
        }
        let woken: Vec<u64> = queue.pop_due(100).iter().map(|e| e.wake_tick).collect();
        assert_eq!(woken, vec![10, 30, 50]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_due_leaves_future_entries() {
        let threads = ids(3);
        let mut queue = SleepQueue::new();
        queue.insert(threads[0].0, threads[0].1, 40);
        queue.insert(threads[1].0, threads[1].1, 10);
        queue.insert(threads[2].0, threads[2].1, 40);
        let woken = queue.pop_due(39);
        assert_eq!(woken.len(), 1);
        assert_eq!(queue.next_wake(), Some(40));
        // equal wake ticks keep arrival order
        let rest: Vec<Pid> = queue.pop_due(40).iter().map(|e| e.pid).collect();
        assert_eq!(rest, vec![threads[0].1, threads[2].1]);
    }

    proptest! {
        #[test]
        fn prop_pop_order_sorted(ticks in proptest::collection::vec(0u64..500, 1..24)) {
            let threads = ids(ticks.len());
            let mut queue = SleepQueue::new();
            for ((id, pid), tick) in threads.iter().zip(ticks.iter()) {
                queue.insert(*id, *pid, *tick);
            }
            let woken: Vec<u64> = queue.pop_due(u64::MAX).iter().map(|e| e.wake_tick).collect();
            let mut expected = ticks.clone();
            expected.sort();
            prop_assert_eq!(woken, expected);
        }
    }
}
