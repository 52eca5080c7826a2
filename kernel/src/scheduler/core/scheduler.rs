//! Scheduler Core - ready queue and policy ordering
//!
//! The ready queue is a single `VecDeque` kept in policy order. Insertion is
//! stable: a thread lands after every entry with an equal key, so ties fall
//! back to arrival order under every policy.
//!
//! Callers must hold the CPU with interrupts disabled; the `Kernel` checks
//! that before reaching in here.

use std::collections::VecDeque;

use super::policy::SchedulingPolicy;
use super::statistics::Statistics;
use crate::scheduler::prediction::BurstEstimator;
use crate::scheduler::table::ThreadId;
use crate::scheduler::thread::{Thread, ThreadState};
use crate::Pid;

/// Sort key of a ready thread
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum ReadyKey {
    /// FIFO: position is arrival order
    Arrival,
    /// Expected next burst
    Burst(f64),
    /// Dynamic priority, lower first
    Priority(i64),
}

impl ReadyKey {
    fn sorts_before(self, other: ReadyKey) -> bool {
        matches!(self.partial_cmp(&other), Some(core::cmp::Ordering::Less))
    }
}

#[derive(Debug, Clone, Copy)]
struct ReadyEntry {
    id: ThreadId,
    pid: Pid,
    key: ReadyKey,
}

/// Policy-ordered ready queue
#[derive(Debug, Default)]
pub struct ReadyQueue {
    entries: VecDeque<ReadyEntry>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self { entries: VecDeque::new() }
    }

    /// Insert after every entry that does not sort after `key`
    pub fn insert(&mut self, id: ThreadId, pid: Pid, key: ReadyKey) {
        let entry = ReadyEntry { id, pid, key };
        if key == ReadyKey::Arrival {
            self.entries.push_back(entry);
            return;
        }
        let pos = self
            .entries
            .iter()
            .position(|queued| key.sorts_before(queued.key))
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, entry);
    }

    pub fn pop_front(&mut self) -> Option<ThreadId> {
        self.entries.pop_front().map(|entry| entry.id)
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Pids in dispatch order
    pub fn pids(&self) -> Vec<Pid> {
        self.entries.iter().map(|entry| entry.pid).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ready-queue owner and policy engine
#[derive(Debug)]
pub struct Scheduler {
    policy: SchedulingPolicy,
    estimator: BurstEstimator,
    ready: ReadyQueue,
}

impl Scheduler {
    pub fn new(policy: SchedulingPolicy, estimator: BurstEstimator) -> Self {
        Self { policy, estimator, ready: ReadyQueue::new() }
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    pub fn estimator(&self) -> BurstEstimator {
        self.estimator
    }

    fn key_for(&self, thread: &Thread) -> ReadyKey {
        match self.policy {
            SchedulingPolicy::Fifo => ReadyKey::Arrival,
            SchedulingPolicy::ShortestNextBurst => ReadyKey::Burst(thread.stats().expected_burst()),
            SchedulingPolicy::RoundRobin | SchedulingPolicy::UnixPriority => {
                ReadyKey::Priority(thread.priority())
            }
        }
    }

    /// Mark `thread` ready, stamp its wait start and queue it by policy
    pub fn enqueue_ready(&mut self, id: ThreadId, thread: &mut Thread, now: u64) {
        thread.set_state(ThreadState::Ready);
        thread.stats_mut().mark_wait_start(now);
        let key = self.key_for(thread);
        self.ready.insert(id, thread.pid(), key);
        log::debug!("enqueue: thread {} ({}) key {:?}", thread.pid(), thread.name(), key);
    }

    /// Remove the head of the ready queue. Does not touch thread state.
    pub fn select_next_ready(&mut self) -> Option<ThreadId> {
        self.ready.pop_front()
    }

    /// Account a finished CPU burst: global stats, estimate, CPU credit
    pub fn end_burst(&self, thread: &mut Thread, burst: u64, stats: &mut Statistics) {
        if burst == 0 {
            return;
        }
        stats.track_cpu_burst(burst);
        if self.policy.uses_burst_estimate() {
            let expected = thread.stats().expected_burst();
            stats.track_estimate_error(burst, expected);
            let next = self.estimator.next(burst as f64, expected);
            thread.stats_mut().set_expected_burst(next);
            log::trace!("burst: thread {} ran {} (expected {:.2}, next {:.2})", thread.pid(), burst, expected, next);
        }
        if self.policy.decays_priority() {
            thread.add_cpu_credit(burst);
        }
    }

    pub fn is_ready(&self, id: ThreadId) -> bool {
        self.ready.contains(id)
    }

    pub fn ready_pids(&self) -> Vec<Pid> {
        self.ready.pids()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::table::ThreadTable;
    use crate::scheduler::thread::ThreadParams;
    use proptest::prelude::*;

    fn table_with(count: usize) -> (ThreadTable, Vec<ThreadId>) {
        let params = ThreadParams {
            now: 0,
            base_priority: 50,
            initial_burst_estimate: 0.0,
            max_children: 1,
        };
        let mut table = ThreadTable::new(count.max(1));
        let ids = (0..count)
            .map(|_| table.allocate(|pid| Thread::new(pid, "r", None, &params)).unwrap())
            .collect();
        (table, ids)
    }

    fn enqueue(scheduler: &mut Scheduler, table: &mut ThreadTable, id: ThreadId, now: u64) {
        scheduler.enqueue_ready(id, table.get_mut(id).unwrap(), now);
    }

    #[test]
    fn test_enqueue_marks_ready_and_stamps_wait() {
        let (mut table, ids) = table_with(1);
        let mut scheduler = Scheduler::new(SchedulingPolicy::Fifo, BurstEstimator::default());
        enqueue(&mut scheduler, &mut table, ids[0], 42);
        let thread = table.get(ids[0]).unwrap();
        assert_eq!(thread.state(), ThreadState::Ready);
        assert_eq!(thread.stats().wait_start(), 42);
        // selection leaves state alone
        assert_eq!(scheduler.select_next_ready(), Some(ids[0]));
        assert_eq!(table.get(ids[0]).unwrap().state(), ThreadState::Ready);
        assert_eq!(scheduler.select_next_ready(), None);
    }

    #[test]
    fn test_sjf_orders_by_estimate_with_stable_ties() {
        let (mut table, ids) = table_with(4);
        for (id, estimate) in ids.iter().zip([30.0, 10.0, 30.0, 20.0]) {
            table.get_mut(*id).unwrap().stats_mut().set_expected_burst(estimate);
        }
        let mut scheduler =
            Scheduler::new(SchedulingPolicy::ShortestNextBurst, BurstEstimator::default());
        for id in &ids {
            enqueue(&mut scheduler, &mut table, *id, 0);
        }
        let order: Vec<ThreadId> = std::iter::from_fn(|| scheduler.select_next_ready()).collect();
        assert_eq!(order, vec![ids[1], ids[3], ids[0], ids[2]]);
    }

    #[test]
    fn test_priority_orders_ascending() {
        let (mut table, ids) = table_with(3);
        table.get_mut(ids[0]).unwrap().add_cpu_credit(400);
        table.get_mut(ids[0]).unwrap().decay_priority();
        let mut scheduler = Scheduler::new(SchedulingPolicy::UnixPriority, BurstEstimator::default());
        for id in &ids {
            enqueue(&mut scheduler, &mut table, *id, 0);
        }
        assert_eq!(scheduler.select_next_ready(), Some(ids[1]));
        assert_eq!(scheduler.select_next_ready(), Some(ids[2]));
        assert_eq!(scheduler.select_next_ready(), Some(ids[0]));
    }

    #[test]
    fn test_end_burst_updates_estimate_only_under_sjf() {
        let (mut table, ids) = table_with(1);
        let mut stats = Statistics::new();
        let fifo = Scheduler::new(SchedulingPolicy::Fifo, BurstEstimator::default());
        fifo.end_burst(table.get_mut(ids[0]).unwrap(), 40, &mut stats);
        assert_eq!(table.get(ids[0]).unwrap().stats().expected_burst(), 0.0);

        let sjf = Scheduler::new(SchedulingPolicy::ShortestNextBurst, BurstEstimator::default());
        sjf.end_burst(table.get_mut(ids[0]).unwrap(), 40, &mut stats);
        assert_eq!(table.get(ids[0]).unwrap().stats().expected_burst(), 20.0);
        assert_eq!(stats.estimate_error, 40.0);
        assert_eq!(stats.burst_count, 2);
    }

    #[test]
    fn test_end_burst_credits_cpu_under_priority() {
        let (mut table, ids) = table_with(1);
        let mut stats = Statistics::new();
        let scheduler = Scheduler::new(SchedulingPolicy::UnixPriority, BurstEstimator::default());
        scheduler.end_burst(table.get_mut(ids[0]).unwrap(), 64, &mut stats);
        assert_eq!(table.get(ids[0]).unwrap().cpu_credit(), 64);
    }

    proptest! {
        #[test]
        fn prop_fifo_dispatches_in_arrival_order(count in 1usize..32) {
            let (mut table, ids) = table_with(count);
            let mut scheduler = Scheduler::new(SchedulingPolicy::Fifo, BurstEstimator::default());
            for (tick, id) in ids.iter().enumerate() {
                enqueue(&mut scheduler, &mut table, *id, tick as u64);
            }
            let order: Vec<ThreadId> = std::iter::from_fn(|| scheduler.select_next_ready()).collect();
            prop_assert_eq!(order, ids);
        }

        #[test]
        fn prop_priority_insert_is_stable(credits in proptest::collection::vec(0u64..4, 1..24)) {
            let (mut table, ids) = table_with(credits.len());
            for (id, credit) in ids.iter().zip(credits.iter()) {
                let thread = table.get_mut(*id).unwrap();
                thread.add_cpu_credit(credit * 8);
                thread.decay_priority();
            }
            let mut scheduler = Scheduler::new(SchedulingPolicy::UnixPriority, BurstEstimator::default());
            for id in &ids {
                enqueue(&mut scheduler, &mut table, *id, 0);
            }
            let order: Vec<ThreadId> = std::iter::from_fn(|| scheduler.select_next_ready()).collect();
            let mut expected = ids.clone();
            expected.sort_by_key(|id| table.get(*id).unwrap().priority());
            prop_assert_eq!(order, expected);
        }
    }
}
