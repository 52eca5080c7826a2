//! Idle planning
//!
//! When nothing is ready the CPU waits for the next interrupt. The only
//! interrupt source that can make a thread ready is the timer waking a
//! sleeper, so an empty sleep queue means the machine can never make
//! progress again and must halt.

use super::sleep_queue::SleepQueue;
use crate::machine::Interrupt;

/// What the CPU does while nothing is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleStep {
    /// Nothing can ever become ready
    Halt,
    /// Skip the clock ahead to this timer tick and service it
    AdvanceTo(u64),
}

/// Choose the next idle step
///
/// Timer events before the earliest wake tick are skipped; the clock lands
/// on the first timer grid point at or after it.
pub fn plan_idle(sleepers: &SleepQueue, interrupt: &Interrupt, now: u64) -> IdleStep {
    let Some(wake) = sleepers.next_wake() else {
        return IdleStep::Halt;
    };
    let next_timer = interrupt.next_timer();
    let period = interrupt.period();
    let target = if wake > next_timer {
        next_timer + (wake - next_timer).div_ceil(period) * period
    } else {
        next_timer
    };
    IdleStep::AdvanceTo(target.max(now))
}
