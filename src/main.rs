//! Paging Machine - Main Entry Point
//!
//! Spawns a few counter processes on a simulated real machine, optionally
//! forks the first one, and runs everything round-robin to completion.
//!
//! Usage: paging-machine [OPTIONS]

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use log::info;

use paging_machine::demo::CounterProcess;
use paging_machine::{FaultReport, MachineConfig, ProcessIdentity, RealMachine, StepOutcome};

/// Command-line configuration
#[derive(Parser, Debug)]
#[command(name = "paging-machine", version, about = "Demand-paged real machine simulator")]
struct Args {
    /// TOML file with page_size, frame_count, virtual_page_count, quantum, seed
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of counter processes to spawn
    #[arg(short = 'n', long, default_value_t = 3)]
    processes: usize,

    /// Instructions each process runs before finishing
    #[arg(short, long, default_value_t = 40)]
    length: usize,

    /// Words skipped between consecutive writes
    #[arg(long, default_value_t = 1)]
    stride: usize,

    /// Fork the first process before running
    #[arg(long)]
    fork: bool,

    /// Make the last process fault on this instruction (0-based)
    #[arg(long, value_name = "INSTRUCTION")]
    crash_at: Option<usize>,

    /// Override the configured quantum
    #[arg(short, long)]
    quantum: Option<usize>,

    /// Override the configured frame-search seed
    #[arg(long)]
    seed: Option<u64>,

    /// Print detailed scheduling and paging information
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    // Run the machine and handle any errors
    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn load_config(args: &Args) -> anyhow::Result<MachineConfig> {
    let mut config = match &args.config {
        Some(path) => MachineConfig::from_file(path)?,
        None => MachineConfig::default(),
    };
    if let Some(quantum) = args.quantum {
        config.quantum = quantum;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;
    Ok(config)
}

/// Run one instruction of the first process, then fork it.
///
/// Returns the fault report if that instruction crashed the process, in
/// which case there is nothing left to fork.
fn fork_first(machine: &mut RealMachine<CounterProcess>) -> Option<FaultReport> {
    let first = machine.processes().next().map(|(handle, _)| handle)?;
    // Give the parent something to copy
    match machine.execute(first)? {
        StepOutcome::Faulted(report) => return Some(report),
        StepOutcome::Executed => {}
    }
    match machine.fork(first) {
        Ok(child) => info!("process {} forked into {}", first, child),
        Err(e) => eprintln!("Fork failed: {}", e),
    }
    None
}

/// Main logic separated from main() for cleaner error handling
fn run(args: &Args) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let mut machine: RealMachine<CounterProcess> =
        RealMachine::new(config).context("failed to build the real machine")?;

    for pid in 0..args.processes {
        let identity = ProcessIdentity::new(format!("counter-{}", pid), pid as u32);
        let crash_at = args.crash_at.filter(|_| pid + 1 == args.processes);
        machine.spawn(|memory| {
            let process = CounterProcess::new(memory, identity, args.length).with_stride(args.stride);
            Ok(match crash_at {
                Some(instruction) => process.with_fault_at(instruction),
                None => process,
            })
        })?;
    }

    let mut faults = Vec::new();
    let mut instructions = 0;
    if args.fork {
        match fork_first(&mut machine) {
            Some(report) => faults.push(report),
            None => instructions += 1,
        }
    }

    let run = machine.run_to_completion();
    instructions += run.instructions;
    faults.extend(run.faults);

    println!("=== Summary ===");
    println!("Rounds:                 {}", run.rounds);
    println!("Instructions executed:  {}", instructions);
    println!("Faults:                 {}", faults.len());
    for fault in &faults {
        println!("  {}", fault);
    }
    println!(
        "Frames in use:          {} of {}",
        machine.allocated_frame_count(),
        machine.memory().frame_count()
    );

    let reaped = machine.reap_finished();
    println!("Processes reaped:       {}", reaped.len());
    println!("Frames in use after:    {}", machine.allocated_frame_count());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use paging_machine::FaultKind;

    fn machine_with(fault_at: Option<usize>) -> RealMachine<CounterProcess> {
        let config = MachineConfig {
            seed: Some(3),
            ..MachineConfig::default()
        };
        let mut machine = RealMachine::new(config).unwrap();
        machine
            .spawn(|memory| {
                let process = CounterProcess::new(memory, ProcessIdentity::new("first", 0), 4);
                Ok(match fault_at {
                    Some(instruction) => process.with_fault_at(instruction),
                    None => process,
                })
            })
            .unwrap();
        machine
    }

    #[test]
    fn test_fork_first_adds_child() {
        let mut machine = machine_with(None);
        assert!(fork_first(&mut machine).is_none());
        assert_eq!(machine.process_count(), 2);
    }

    #[test]
    fn test_fork_first_reports_warm_up_fault() {
        let mut machine = machine_with(Some(0));
        let report = fork_first(&mut machine).unwrap();
        assert_eq!(report.kind, FaultKind::Program);
        assert_eq!(machine.process_count(), 0);
    }

    #[test]
    fn test_fork_first_without_processes() {
        let mut machine: RealMachine<CounterProcess> =
            RealMachine::new(MachineConfig::default()).unwrap();
        assert!(fork_first(&mut machine).is_none());
    }
}
