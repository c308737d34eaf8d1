//! VM Manager - Main Entry Point
//!
//! Replays a trace of page allocations, frees, accesses and process
//! switches against the simulated copy-on-write memory manager.
//!
//! Usage: vm-manager [OPTIONS] <TRACE>

use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::LevelFilter;

use vm_manager::constants::{INVALID_FRAME, NR_PAGEFRAMES};
use vm_manager::io::{read_trace, write_results, Command, TraceLine};
use vm_manager::vm_manager::VmManager;

/// Command-line configuration
#[derive(Debug, Parser)]
#[command(name = "vm-manager", about = "Copy-on-write virtual memory simulator")]
struct Config {
    /// Trace file, one command per line
    trace: PathBuf,

    /// Number of physical page frames
    #[arg(short, long, default_value_t = NR_PAGEFRAMES)]
    frames: usize,

    /// Write the frame of each alloc/read/write (or -1) to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print every step and enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let config = Config::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if config.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    if let Err(e) = run(&config) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Main logic separated from main() for cleaner error handling
fn run(config: &Config) -> Result<()> {
    if config.frames == 0 {
        bail!("--frames must be at least 1");
    }

    let trace = read_trace(&config.trace)
        .with_context(|| format!("reading {}", config.trace.display()))?;

    if config.verbose {
        eprintln!("=== VM Manager ===");
        eprintln!("Trace file:  {}", config.trace.display());
        eprintln!("Frames:      {}", config.frames);
        eprintln!("Commands:    {}", trace.len());
        eprintln!();
    }

    let mut vm = VmManager::new(config.frames);
    let mut results = Vec::new();
    let mut failures = 0usize;

    for step in &trace {
        if !execute(&mut vm, step, &mut results, config.verbose)? {
            failures += 1;
        }
    }

    if config.verbose {
        eprintln!();
        eprintln!("=== Summary ===");
        eprintln!("Commands executed: {}", trace.len());
        eprintln!("Failed commands:   {}", failures);
        eprintln!("Free frames:       {}", vm.pool().free_count());
        eprintln!();
    }

    if let Some(output) = &config.output {
        write_results(output, &results)
            .with_context(|| format!("writing {}", output.display()))?;
        if config.verbose {
            eprintln!("Results written to: {}", output.display());
        }
    }

    Ok(())
}

/// Run one trace command; returns false when the manager rejected it
fn execute(vm: &mut VmManager, step: &TraceLine, results: &mut Vec<i64>, verbose: bool) -> Result<bool> {
    let pid = vm.current_pid();
    let (ok, detail) = match step.command {
        Command::Alloc { vpn, access } => match vm.alloc_page(vpn, access) {
            Ok(pfn) => {
                results.push(pfn as i64);
                (true, format!("alloc {} ({}) -> frame {}", vpn, access, pfn))
            }
            Err(e) => {
                results.push(INVALID_FRAME);
                (false, format!("alloc {} ({}) failed: {}", vpn, access, e))
            }
        },
        Command::Free { vpn } => match vm.free_page(vpn) {
            Ok(()) => (true, format!("free {}", vpn)),
            Err(e) => (false, format!("free {} failed: {}", vpn, e)),
        },
        Command::Access { vpn, access } => match vm.access(vpn, access) {
            Ok(outcome) => {
                results.push(outcome.pfn as i64);
                let fault = outcome.fault.map(|f| format!(" [fault: {:?}]", f)).unwrap_or_default();
                (true, format!("{} {} -> frame {}{}", access, vpn, outcome.pfn, fault))
            }
            Err(e) => {
                results.push(INVALID_FRAME);
                (false, format!("{} {} failed: {}", access, vpn, e))
            }
        },
        Command::Switch { pid: next } => {
            let outcome = vm.switch_process(next);
            (true, format!("switch to {} ({:?})", next, outcome))
        }
        Command::Show => {
            println!("pid {} page table:", vm.current_pid());
            print!("{}", vm.ptbr());
            return Ok(true);
        }
        Command::Counts => {
            for (pfn, count) in vm.mapcounts().iter().enumerate().filter(|(_, c)| **c > 0) {
                println!("frame {:3}: {}", pfn, count);
            }
            return Ok(true);
        }
        Command::Check => {
            vm.check_mapcounts()
                .with_context(|| format!("mapcount audit failed at line {}", step.line))?;
            (true, "mapcounts consistent".to_string())
        }
    };

    if verbose {
        eprintln!("{:4}: [pid {}] {}", step.line, pid, detail);
    }
    Ok(ok)
}
