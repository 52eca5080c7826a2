//! Per-thread CPU burst and wait tracking

/// Statistics tracker owned by every TCB
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadStatistics {
    start_tick: u64,
    end_tick: Option<u64>,
    burst_start: u64,
    wait_start: u64,
    /// Exponential estimate of the next CPU burst
    expected_burst: f64,
    instructions: u64,
    bursts: u64,
    dispatches: u64,
    blocked: u64,
    preempted: u64,
}

impl ThreadStatistics {
    pub fn new(now: u64, initial_estimate: f64) -> Self {
        Self {
            start_tick: now,
            end_tick: None,
            burst_start: now,
            wait_start: now,
            expected_burst: initial_estimate,
            instructions: 0,
            bursts: 0,
            dispatches: 0,
            blocked: 0,
            preempted: 0,
        }
    }

    pub fn start_tick(&self) -> u64 {
        self.start_tick
    }

    pub fn end_tick(&self) -> Option<u64> {
        self.end_tick
    }

    pub fn burst_start(&self) -> u64 {
        self.burst_start
    }

    pub fn wait_start(&self) -> u64 {
        self.wait_start
    }

    pub fn expected_burst(&self) -> f64 {
        self.expected_burst
    }

    /// User instructions executed
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    /// Non-empty CPU bursts completed
    pub fn bursts(&self) -> u64 {
        self.bursts
    }

    /// Times this thread was handed the CPU
    pub fn dispatches(&self) -> u64 {
        self.dispatches
    }

    /// Times this thread entered `Blocked`
    pub fn blocked(&self) -> u64 {
        self.blocked
    }

    /// Timer-forced yields
    pub fn preempted(&self) -> u64 {
        self.preempted
    }

    pub(crate) fn mark_wait_start(&mut self, now: u64) {
        self.wait_start = now;
    }

    /// Leave the ready queue: opens a burst, returns the ticks spent waiting
    pub(crate) fn begin_burst(&mut self, now: u64) -> u64 {
        self.burst_start = now;
        self.dispatches += 1;
        now.saturating_sub(self.wait_start)
    }

    /// Close the running burst and start a new one at `now`
    pub(crate) fn end_burst(&mut self, now: u64) -> u64 {
        let burst = now.saturating_sub(self.burst_start);
        self.burst_start = now;
        if burst > 0 {
            self.bursts += 1;
        }
        burst
    }

    pub(crate) fn set_expected_burst(&mut self, estimate: f64) {
        self.expected_burst = estimate;
    }

    pub(crate) fn add_instructions(&mut self, count: u64) {
        self.instructions += count;
    }

    pub(crate) fn note_blocked(&mut self) {
        self.blocked += 1;
    }

    pub(crate) fn note_preempted(&mut self) {
        self.preempted += 1;
    }

    /// Record the end of the thread's life; returns its completion time
    pub(crate) fn finish(&mut self, now: u64) -> u64 {
        self.end_tick = Some(now);
        now.saturating_sub(self.start_tick)
    }
}
