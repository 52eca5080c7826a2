//! Interrupt level, processor status and the periodic timer

use core::fmt;

/// Interrupt enable level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntStatus {
    Off,
    On,
}

/// What the processor is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineStatus {
    /// Waiting for an interrupt, nothing to run
    Idle,
    /// Executing kernel code
    System,
    /// Executing a user program
    User,
}

/// Which counter a tick is charged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    System,
    User,
}

impl fmt::Display for IntStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::On => write!(f, "on"),
        }
    }
}

/// Interrupt controller state
///
/// The timer fires on a fixed grid of `period` ticks. A due timer that
/// could not be serviced (interrupts off) stays pending until the next check.
#[derive(Debug, Clone)]
pub struct Interrupt {
    level: IntStatus,
    status: MachineStatus,
    yield_on_return: bool,
    period: u64,
    next_timer: u64,
    timer_fired: u64,
}

impl Interrupt {
    /// Machine comes up with interrupts disabled
    pub fn new(period: u64) -> Self {
        Self {
            level: IntStatus::Off,
            status: MachineStatus::System,
            yield_on_return: false,
            period,
            next_timer: period,
            timer_fired: 0,
        }
    }

    pub fn level(&self) -> IntStatus {
        self.level
    }

    /// Returns the previous level
    pub fn set_level(&mut self, level: IntStatus) -> IntStatus {
        core::mem::replace(&mut self.level, level)
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    pub fn set_status(&mut self, status: MachineStatus) -> MachineStatus {
        core::mem::replace(&mut self.status, status)
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    /// Tick of the next timer event
    pub fn next_timer(&self) -> u64 {
        self.next_timer
    }

    pub fn timer_due(&self, now: u64) -> bool {
        now >= self.next_timer
    }

    /// Consume a due timer event and rearm on the next grid point
    pub fn acknowledge_timer(&mut self, now: u64) {
        while self.next_timer <= now {
            self.next_timer += self.period;
        }
        self.timer_fired += 1;
    }

    pub fn timer_fired(&self) -> u64 {
        self.timer_fired
    }

    /// Ask the running thread to yield once the handler returns
    pub fn request_yield(&mut self) {
        self.yield_on_return = true;
    }

    pub fn take_yield(&mut self) -> bool {
        core::mem::take(&mut self.yield_on_return)
    }
}
