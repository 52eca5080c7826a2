//! Scheduling Policies
//!
//! - Fifo: ready threads run in arrival order, no preemption
//! - ShortestNextBurst: ready queue sorted by the EMA burst estimate, no preemption
//! - RoundRobin: arrival order, timer forces a yield every quantum
//! - UnixPriority: sorted by decaying priority, timer forces a yield every quantum

use core::fmt;
use core::str::FromStr;

use crate::error::KernelError;

/// Scheduling policy identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SchedulingPolicy {
    /// Append at tail
    Fifo = 1,
    /// Ascending expected burst
    ShortestNextBurst = 2,
    /// Ascending dynamic priority, fixed quantum
    RoundRobin = 3,
    /// Ascending decaying priority, fixed quantum
    UnixPriority = 4,
}

impl SchedulingPolicy {
    pub const ALL: [SchedulingPolicy; 4] =
        [Self::Fifo, Self::ShortestNextBurst, Self::RoundRobin, Self::UnixPriority];

    /// Create from the numeric selector
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Fifo),
            2 => Some(Self::ShortestNextBurst),
            3 => Some(Self::RoundRobin),
            4 => Some(Self::UnixPriority),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::ShortestNextBurst => "sjf",
            Self::RoundRobin => "rr",
            Self::UnixPriority => "priority",
        }
    }

    /// Does the timer force yields under this policy?
    pub fn is_preemptive(&self) -> bool {
        matches!(self, Self::RoundRobin | Self::UnixPriority)
    }

    /// Is the burst estimator consulted?
    pub fn uses_burst_estimate(&self) -> bool {
        matches!(self, Self::ShortestNextBurst)
    }

    /// Do priorities decay with CPU usage?
    pub fn decays_priority(&self) -> bool {
        matches!(self, Self::UnixPriority)
    }

    /// Is the ready queue ordered by dynamic priority?
    pub fn orders_by_priority(&self) -> bool {
        matches!(self, Self::RoundRobin | Self::UnixPriority)
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SchedulingPolicy {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = KernelError::InvalidConfig { field: "policy", reason: "unknown scheduling policy" };
        if let Ok(raw) = s.parse::<u32>() {
            return Self::from_raw(raw).ok_or(unknown);
        }
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "sjf" | "shortest-next-burst" => Ok(Self::ShortestNextBurst),
            "rr" | "round-robin" => Ok(Self::RoundRobin),
            "priority" | "unix" | "unix-priority" => Ok(Self::UnixPriority),
            _ => Err(unknown),
        }
    }
}
