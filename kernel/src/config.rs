//! Kernel configuration and machine constants

use crate::error::{KernelError, KernelResult};
use crate::scheduler::SchedulingPolicy;

/// Ticks charged per user-mode instruction
pub const USER_TICK: u64 = 1;

/// Ticks charged each time interrupts are re-enabled
pub const SYSTEM_TICK: u64 = 10;

/// Default timer period for non-preemptive policies
pub const DEFAULT_TIMER_TICKS: u64 = 100;

/// Default round-robin / priority quantum
pub const DEFAULT_QUANTUM: u64 = 100;

/// Smoothing constant `a` of the burst estimator
pub const DEFAULT_BURST_SMOOTHING: f64 = 0.5;

/// UNIX-style base priority (lower dispatches first)
pub const DEFAULT_BASE_PRIORITY: i64 = 50;

/// Live TCB bound
pub const MAX_THREADS: usize = 1000;

/// Children one thread may fork
pub const MAX_CHILDREN: usize = 64;

/// Thread stack size, in 32-bit words (256 KiB)
pub const STACK_WORDS: usize = 64 * 1024;

/// Smallest stack the host can run kernel code on
pub const MIN_STACK_WORDS: usize = 16 * 1024;

/// Kernel configuration
#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    /// Ready-queue discipline
    pub policy: SchedulingPolicy,
    /// Timer period under preemptive policies
    pub quantum: u64,
    /// Timer period under non-preemptive policies
    pub timer_ticks: u64,
    /// Weight of the newest observation in the burst estimate
    pub burst_smoothing: f64,
    /// Expected burst of a fresh thread
    pub initial_burst_estimate: f64,
    pub base_priority: i64,
    pub max_threads: usize,
    pub max_children: usize,
    pub stack_words: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            policy: SchedulingPolicy::Fifo,
            quantum: DEFAULT_QUANTUM,
            timer_ticks: DEFAULT_TIMER_TICKS,
            burst_smoothing: DEFAULT_BURST_SMOOTHING,
            initial_burst_estimate: 0.0,
            base_priority: DEFAULT_BASE_PRIORITY,
            max_threads: MAX_THREADS,
            max_children: MAX_CHILDREN,
            stack_words: STACK_WORDS,
        }
    }
}

impl KernelConfig {
    pub fn new(policy: SchedulingPolicy) -> Self {
        Self { policy, ..Self::default() }
    }

    pub fn with_quantum(mut self, quantum: u64) -> Self {
        self.quantum = quantum;
        self
    }

    pub fn with_timer_ticks(mut self, ticks: u64) -> Self {
        self.timer_ticks = ticks;
        self
    }

    pub fn with_burst_smoothing(mut self, alpha: f64) -> Self {
        self.burst_smoothing = alpha;
        self
    }

    pub fn with_initial_burst_estimate(mut self, estimate: f64) -> Self {
        self.initial_burst_estimate = estimate;
        self
    }

    pub fn with_base_priority(mut self, priority: i64) -> Self {
        self.base_priority = priority;
        self
    }

    pub fn with_max_threads(mut self, max: usize) -> Self {
        self.max_threads = max;
        self
    }

    pub fn with_max_children(mut self, max: usize) -> Self {
        self.max_children = max;
        self
    }

    pub fn with_stack_words(mut self, words: usize) -> Self {
        self.stack_words = words;
        self
    }

    /// Period of the hardware timer for the active policy
    pub fn timer_period(&self) -> u64 {
        if self.policy.is_preemptive() {
            self.quantum
        } else {
            self.timer_ticks
        }
    }

    pub fn validate(&self) -> KernelResult<()> {
        if self.quantum == 0 {
            return Err(KernelError::InvalidConfig { field: "quantum", reason: "must be positive" });
        }
        if self.timer_ticks == 0 {
            return Err(KernelError::InvalidConfig {
                field: "timer_ticks",
                reason: "must be positive",
            });
        }
        if !(self.burst_smoothing > 0.0 && self.burst_smoothing <= 1.0) {
            return Err(KernelError::InvalidConfig {
                field: "burst_smoothing",
                reason: "must lie in (0, 1]",
            });
        }
        if !self.initial_burst_estimate.is_finite() || self.initial_burst_estimate < 0.0 {
            return Err(KernelError::InvalidConfig {
                field: "initial_burst_estimate",
                reason: "must be a finite non-negative tick count",
            });
        }
        if self.max_threads == 0 {
            return Err(KernelError::InvalidConfig { field: "max_threads", reason: "must be positive" });
        }
        if self.max_children == 0 {
            return Err(KernelError::InvalidConfig {
                field: "max_children",
                reason: "must be positive",
            });
        }
        if self.stack_words < MIN_STACK_WORDS {
            return Err(KernelError::InvalidConfig {
                field: "stack_words",
                reason: "below the minimum host stack",
            });
        }
        Ok(())
    }
}
