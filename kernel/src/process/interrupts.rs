//! Simulated interrupt level and the clock
//!
//! Disabling interrupts is the kernel's only mutual exclusion primitive.
//! Re-enabling them costs `SYSTEM_TICK` and is where pending timer events
//! get serviced, which in turn is where a preemptive policy forces the
//! running thread to yield.

use super::halt::HaltReason;
use super::Kernel;
use crate::config::SYSTEM_TICK;
use crate::machine::{IntStatus, MachineStatus, TickKind};
use crate::scheduler::idle::{plan_idle, IdleStep};

/// Interrupts-off critical section
///
/// Restores the previous level when dropped. A guard dropped while its
/// thread unwinds (exit, halt, fatal error) leaves the level alone: the
/// thread no longer owns the CPU.
#[must_use = "interrupts are re-enabled as soon as the guard is dropped"]
pub struct InterruptGuard<'k> {
    kernel: &'k Kernel,
    previous: IntStatus,
}

impl<'k> InterruptGuard<'k> {
    pub fn new(kernel: &'k Kernel) -> Self {
        let previous = kernel.set_level(IntStatus::Off);
        Self { kernel, previous }
    }

    pub fn previous(&self) -> IntStatus {
        self.previous
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        self.kernel.set_level(self.previous);
    }
}

impl Kernel {
    /// Set the interrupt level, returning the previous one
    ///
    /// Going from off to on charges `SYSTEM_TICK` and services any due
    /// timer event, which may preempt the caller before this returns.
    pub fn set_level(&self, level: IntStatus) -> IntStatus {
        let old = {
            let mut st = self.lock();
            if st.halted.is_some() {
                return level;
            }
            st.interrupt.set_level(level)
        };
        if old == IntStatus::Off && level == IntStatus::On {
            self.one_tick(TickKind::System, SYSTEM_TICK);
        }
        old
    }

    pub fn interrupt_level(&self) -> IntStatus {
        self.lock().interrupt.level()
    }

    /// Advance the clock by `ticks` of `kind` and run the timer handler
    /// if interrupts are on
    pub(crate) fn one_tick(&self, kind: TickKind, ticks: u64) {
        {
            let mut st = self.lock();
            if st.halted.is_some() {
                return;
            }
            st.stats.advance(kind, ticks);
            st.interrupt.set_status(match kind {
                TickKind::System => MachineStatus::System,
                TickKind::User => MachineStatus::User,
            });
            if st.interrupt.level() == IntStatus::Off {
                return;
            }
            st.interrupt.set_level(IntStatus::Off);
            st.service_timer();
            st.interrupt.set_level(IntStatus::On);

            if !st.interrupt.take_yield() {
                return;
            }
            let Some(id) = st.current else {
                return;
            };
            let thread = st.thread_mut(id);
            // the yield's own re-enable can cross the next timer tick when
            // the quantum is at most SYSTEM_TICK
            if thread.is_preempting() {
                log::trace!("timer: thread {} already yielding", thread.pid());
                return;
            }
            thread.set_preempting(true);
            thread.stats_mut().note_preempted();
            st.stats.preemptions += 1;
        }
        log::trace!("timer: forcing a yield");
        self.yield_cpu();
        let mut st = self.lock();
        let id = st.current_id("preempt");
        st.thread_mut(id).set_preempting(false);
    }

    /// Burn `ticks` of kernel-mode CPU time, one tick at a time so that
    /// the timer can interrupt in between
    pub fn cpu_work(&self, ticks: u64) {
        for _ in 0..ticks {
            self.one_tick(TickKind::System, 1);
        }
    }

    /// Wait for the next interrupt with nothing ready to run
    ///
    /// Jumps the clock to the next timer event that can wake a sleeper.
    /// With an empty sleep queue nothing can ever become ready again, so
    /// the machine halts.
    pub(crate) fn idle(&self) {
        let mut st = self.lock();
        st.require_interrupts_off("idle");
        let now = st.now();
        match plan_idle(&st.sleepers, &st.interrupt, now) {
            IdleStep::Halt => {
                drop(st);
                self.shutdown(HaltReason::NoRunnableThreads)
            }
            IdleStep::AdvanceTo(target) => {
                log::trace!("idle: {} -> {}", now, target);
                st.stats.advance_idle(target - now);
                st.interrupt.set_status(MachineStatus::Idle);
                st.service_timer();
            }
        }
    }
}
