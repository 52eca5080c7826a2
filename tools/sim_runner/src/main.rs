//! exo-sim
//!
//! Boots the simulated process-management kernel with a chosen scheduling
//! policy, runs a workload and prints the end-of-run report:
//! - `threads`: kernel threads alternating CPU bursts and sleeps
//! - `processes`: a user program that forks children and joins them

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use exo_proc_kernel::machine::registers::{ARG1_REG, RESULT_REG};
use exo_proc_kernel::{Kernel, KernelConfig, ProgramBuilder, RunReport, SchedulingPolicy, Syscall};

/// First register used to remember forked child pids
const CHILD_PID_BASE_REG: usize = 9;
const MAX_PROCESSES: usize = 16;

#[derive(Parser)]
#[command(name = "exo-sim")]
#[command(author = "Exo-OS Team")]
#[command(version = "0.1.0")]
#[command(about = "Exo-OS process scheduler simulator")]
struct Cli {
    /// Scheduling policy (fifo, sjf, rr, priority or 1-4)
    #[arg(short, long, default_value = "fifo")]
    policy: SchedulingPolicy,

    /// Quantum for preemptive policies
    #[arg(short, long, default_value_t = 100)]
    quantum: u64,

    /// Timer period for non-preemptive policies
    #[arg(long, default_value_t = 100)]
    timer_ticks: u64,

    /// Live thread limit
    #[arg(long, default_value_t = 1000)]
    max_threads: usize,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Kernel threads with mixed burst lengths
    Threads {
        /// Number of worker threads
        #[arg(short = 'n', long, default_value_t = 4)]
        count: usize,
        /// Bursts per worker
        #[arg(short, long, default_value_t = 5)]
        bursts: u32,
        /// Length of the shortest burst
        #[arg(long, default_value_t = 40)]
        burst: u64,
        /// Sleep between bursts
        #[arg(long, default_value_t = 60)]
        sleep: u64,
    },
    /// User processes forked from one parent program
    Processes {
        /// Children to fork
        #[arg(short = 'n', long, default_value_t = 4)]
        count: usize,
        /// Instructions each child executes
        #[arg(short, long, default_value_t = 500)]
        work: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level)).init();

    let config = KernelConfig::new(cli.policy)
        .with_quantum(cli.quantum)
        .with_timer_ticks(cli.timer_ticks)
        .with_max_threads(cli.max_threads);
    config.validate().context("invalid kernel configuration")?;
    let kernel = Kernel::new(config);

    let report = match cli.command {
        Commands::Threads { count, bursts, burst, sleep } => {
            run_threads(&kernel, count, bursts, burst, sleep)?
        }
        Commands::Processes { count, work } => run_processes(&kernel, count, work)?,
    };
    println!("{}", report);
    Ok(())
}

fn run_threads(kernel: &Kernel, count: usize, bursts: u32, burst: u64, sleep: u64) -> Result<RunReport> {
    log::info!("workload: {} threads x {} bursts", count, bursts);
    let report = kernel.run(move |k| {
        let workers: Vec<_> = (0..count)
            .map(|index| {
                k.fork(
                    &format!("worker{}", index),
                    move |k, index| {
                        let length = burst * (1 + index as u64 % 3);
                        for _ in 0..bursts {
                            k.cpu_work(length);
                            k.sleep(sleep);
                        }
                    },
                    index as isize,
                )
            })
            .collect();
        for pid in workers {
            if let Some(code) = k.join_pid(pid) {
                log::debug!("worker {} joined with {}", pid, code);
            }
        }
    })?;
    Ok(report)
}

/// Parent: fork `count` children, then join them in order. Each child
/// computes and exits with its pid.
fn run_processes(kernel: &Kernel, count: usize, work: u32) -> Result<RunReport> {
    if count == 0 || count > MAX_PROCESSES {
        bail!("process count must lie in 1..={}", MAX_PROCESSES);
    }
    let child_entry = 3 * count + 2 * count + 2;
    let mut builder = ProgramBuilder::new("parent");
    for slot in 0..count {
        builder
            .syscall(Syscall::Fork)
            .jump_if_zero(RESULT_REG, child_entry)
            .mov(CHILD_PID_BASE_REG + slot, RESULT_REG);
    }
    for slot in 0..count {
        builder.mov(ARG1_REG, CHILD_PID_BASE_REG + slot).syscall(Syscall::Join);
    }
    builder.load_imm(ARG1_REG, 0).syscall(Syscall::Exit);
    debug_assert_eq!(builder.label(), child_entry);
    builder
        .compute(work)
        .syscall(Syscall::GetPid)
        .mov(ARG1_REG, RESULT_REG)
        .syscall(Syscall::Exit);

    kernel.register_program("/bin/parent", builder.build()?);
    let report = kernel.run_program("/bin/parent")?;
    Ok(report)
}
