//! Statistics - process-wide scheduling counters
//!
//! Reset only at boot. Average wait time is taken over dispatches: every
//! ready-queue residency that ends with the thread getting the CPU is one
//! sample.

use core::fmt;

use crate::machine::TickKind;

/// Global aggregate statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    /// Simulated clock
    pub total_ticks: u64,
    pub idle_ticks: u64,
    pub system_ticks: u64,
    pub user_ticks: u64,
    /// Clock value when the first thread was dispatched
    pub simulation_start: u64,

    /// Sum of all CPU bursts
    pub cpu_busy_ticks: u64,
    pub burst_count: u64,
    pub burst_min: Option<u64>,
    pub burst_max: Option<u64>,
    /// Sum of |observed - expected| under the shortest-next-burst policy
    pub estimate_error: f64,

    pub wait_total: u64,
    pub wait_samples: u64,

    /// Lifetime of every exited thread
    pub finish_times: Vec<u64>,

    pub context_switches: u64,
    pub yields: u64,
    pub preemptions: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock, charging `kind`
    pub fn advance(&mut self, kind: TickKind, ticks: u64) {
        self.total_ticks += ticks;
        match kind {
            TickKind::System => self.system_ticks += ticks,
            TickKind::User => self.user_ticks += ticks,
        }
    }

    /// Jump the clock over an idle stretch
    pub fn advance_idle(&mut self, ticks: u64) {
        self.total_ticks += ticks;
        self.idle_ticks += ticks;
    }

    pub fn track_cpu_burst(&mut self, burst: u64) {
        if burst == 0 {
            return;
        }
        self.cpu_busy_ticks += burst;
        self.burst_count += 1;
        self.burst_min = Some(self.burst_min.map_or(burst, |min| min.min(burst)));
        self.burst_max = Some(self.burst_max.map_or(burst, |max| max.max(burst)));
    }

    pub fn track_estimate_error(&mut self, observed: u64, expected: f64) {
        self.estimate_error += (observed as f64 - expected).abs();
    }

    pub fn track_wait_time(&mut self, waited: u64) {
        self.wait_total += waited;
        self.wait_samples += 1;
    }

    pub fn track_finish_time(&mut self, lifetime: u64) {
        self.finish_times.push(lifetime);
    }

    pub fn average_burst(&self) -> f64 {
        ratio(self.cpu_busy_ticks as f64, self.burst_count)
    }

    pub fn average_wait(&self) -> f64 {
        ratio(self.wait_total as f64, self.wait_samples)
    }

    pub fn average_finish_time(&self) -> f64 {
        ratio(self.finish_times.iter().sum::<u64>() as f64, self.finish_times.len() as u64)
    }

    /// Population variance of completion times
    pub fn finish_time_variance(&self) -> f64 {
        let mean = self.average_finish_time();
        let squares: f64 = self
            .finish_times
            .iter()
            .map(|&t| {
                let delta = t as f64 - mean;
                delta * delta
            })
            .sum();
        ratio(squares, self.finish_times.len() as u64)
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.total_ticks.saturating_sub(self.simulation_start)
    }

    pub fn report(&self) -> StatsReport {
        let elapsed = self.elapsed_ticks();
        StatsReport {
            total_ticks: self.total_ticks,
            idle_ticks: self.idle_ticks,
            system_ticks: self.system_ticks,
            user_ticks: self.user_ticks,
            elapsed_ticks: elapsed,
            cpu_busy_ticks: self.cpu_busy_ticks,
            cpu_utilization: ratio(self.cpu_busy_ticks as f64 * 100.0, elapsed),
            burst_count: self.burst_count,
            burst_min: self.burst_min.unwrap_or(0),
            burst_max: self.burst_max.unwrap_or(0),
            burst_avg: self.average_burst(),
            estimate_error_ratio: ratio(self.estimate_error, self.cpu_busy_ticks),
            wait_avg: self.average_wait(),
            completed: self.finish_times.len(),
            finish_min: self.finish_times.iter().copied().min().unwrap_or(0),
            finish_max: self.finish_times.iter().copied().max().unwrap_or(0),
            finish_avg: self.average_finish_time(),
            finish_variance: self.finish_time_variance(),
            context_switches: self.context_switches,
            yields: self.yields,
            preemptions: self.preemptions,
        }
    }
}

fn ratio(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

/// End-of-run summary
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub total_ticks: u64,
    pub idle_ticks: u64,
    pub system_ticks: u64,
    pub user_ticks: u64,
    pub elapsed_ticks: u64,
    pub cpu_busy_ticks: u64,
    /// Percent of elapsed ticks spent in bursts
    pub cpu_utilization: f64,
    pub burst_count: u64,
    pub burst_min: u64,
    pub burst_max: u64,
    pub burst_avg: f64,
    pub estimate_error_ratio: f64,
    pub wait_avg: f64,
    pub completed: usize,
    pub finish_min: u64,
    pub finish_max: u64,
    pub finish_avg: f64,
    pub finish_variance: f64,
    pub context_switches: u64,
    pub yields: u64,
    pub preemptions: u64,
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Ticks: total {}, idle {}, system {}, user {}",
            self.total_ticks, self.idle_ticks, self.system_ticks, self.user_ticks
        )?;
        writeln!(f, "Total CPU busy time: {}", self.cpu_busy_ticks)?;
        writeln!(f, "Total execution time: {}", self.elapsed_ticks)?;
        writeln!(f, "CPU utilization: {:.2}%", self.cpu_utilization)?;
        writeln!(
            f,
            "CPU bursts: {} non-zero, min {}, max {}, avg {:.2}",
            self.burst_count, self.burst_min, self.burst_max, self.burst_avg
        )?;
        writeln!(f, "Burst estimation error: {:.4}", self.estimate_error_ratio)?;
        writeln!(f, "Average wait time in ready queue: {:.2}", self.wait_avg)?;
        writeln!(
            f,
            "Thread completion: {} threads, min {}, max {}, avg {:.2}, variance {:.2}",
            self.completed, self.finish_min, self.finish_max, self.finish_avg, self.finish_variance
        )?;
        write!(
            f,
            "Context switches: {}, yields: {}, preemptions: {}",
            self.context_switches, self.yields, self.preemptions
        )
    }
}
