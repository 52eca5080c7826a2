//! Read-only views of the scheduler for tests and tooling

use super::Kernel;
use crate::scheduler::thread::{ChildRecord, ThreadState, ThreadStatistics};
use crate::Pid;

/// Scheduler state at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub tick: u64,
    pub current: Option<Pid>,
    /// Every TCB in the `Running` state
    pub running: Vec<Pid>,
    /// Ready queue in dispatch order
    pub ready: Vec<Pid>,
    /// Sleep queue as (pid, wake tick), earliest first
    pub sleeping: Vec<(Pid, u64)>,
    pub pending_destruction: Option<Pid>,
    /// Threads that have not exited
    pub live: Vec<Pid>,
}

impl SchedulerSnapshot {
    /// True when no pid is both ready and asleep
    pub fn queues_disjoint(&self) -> bool {
        self.ready.iter().all(|pid| self.sleeping.iter().all(|(sleeper, _)| sleeper != pid))
    }
}

/// One thread as seen from outside
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadInfo {
    pub pid: Pid,
    pub ppid: Option<Pid>,
    pub name: String,
    pub state: ThreadState,
    pub exited: bool,
    pub priority: i64,
    pub cpu_credit: u64,
    pub children: Vec<ChildRecord>,
    pub stats: ThreadStatistics,
    /// Address-space (saves, restores) when the thread runs a user program
    pub space_switches: Option<(u64, u64)>,
    pub has_stack: bool,
}

impl Kernel {
    pub fn snapshot(&self) -> SchedulerSnapshot {
        let st = self.lock();
        let mut live: Vec<Pid> = st
            .threads
            .iter()
            .filter(|(_, thread)| !thread.is_exited())
            .map(|(_, thread)| thread.pid())
            .collect();
        live.sort_unstable();
        SchedulerSnapshot {
            tick: st.now(),
            current: st.current_thread().map(|thread| thread.pid()),
            running: st
                .threads
                .iter()
                .filter(|(_, thread)| thread.state() == ThreadState::Running)
                .map(|(_, thread)| thread.pid())
                .collect(),
            ready: st.scheduler.ready_pids(),
            sleeping: st.sleepers.entries().map(|entry| (entry.pid, entry.wake_tick)).collect(),
            pending_destruction: st
                .to_be_destroyed
                .and_then(|id| st.threads.get(id))
                .map(|thread| thread.pid()),
            live,
        }
    }

    /// Details of a thread that has not been destroyed yet
    pub fn thread_info(&self, pid: Pid) -> Option<ThreadInfo> {
        let st = self.lock();
        let thread = st.threads.lookup(pid).and_then(|id| st.threads.get(id))?;
        Some(ThreadInfo {
            pid,
            ppid: thread.ppid(),
            name: thread.name().to_owned(),
            state: thread.state(),
            exited: thread.is_exited(),
            priority: thread.priority(),
            cpu_credit: thread.cpu_credit(),
            children: thread.children().to_vec(),
            stats: thread.stats().clone(),
            space_switches: thread.space().map(|space| (space.saves(), space.restores())),
            has_stack: thread.has_stack(),
        })
    }
}
