use std::collections::VecDeque;
use std::mem;

use log::{debug, info};

use crate::allocator;
use crate::constants::*;
use crate::error::{Result, VmError};
use crate::fault::{self, FaultResolution};
use crate::memory::FramePool;
use crate::page_table::{Access, PageTable};
use crate::process::Process;
use crate::translation::{translate, TranslationResult, VirtualPage};

/// What `switch_process` did to reach the requested pid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The pid was on the ready list and is now current
    Resumed,
    /// No such process existed; it was forked from the previous one
    Forked,
    /// The pid was already current
    AlreadyCurrent,
}

/// Result of an access that went through the fault handler if needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessOutcome {
    pub pfn: usize,
    pub fault: Option<FaultResolution>,
}

/// The simulated machine: frame pool, running process and ready list
///
/// Every page-level operation acts on the current process, whose page
/// table is the translation root.
#[derive(Debug, Clone)]
pub struct VmManager {
    pool: FramePool,
    current: Process,
    ready: VecDeque<Process>,
}

impl VmManager {
    /// Create a machine with `nr_frames` page frames running the initial process
    pub fn new(nr_frames: usize) -> Self {
        VmManager {
            pool: FramePool::new(nr_frames),
            current: Process::new(INITIAL_PID),
            ready: VecDeque::new(),
        }
    }

    pub fn current_pid(&self) -> u32 {
        self.current.pid
    }

    pub fn current(&self) -> &Process {
        &self.current
    }

    /// Pids on the ready list, front first
    pub fn ready_pids(&self) -> Vec<u32> {
        self.ready.iter().map(|p| p.pid).collect()
    }

    /// The translation root: page table of the current process
    pub fn ptbr(&self) -> &PageTable {
        &self.current.pagetable
    }

    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    pub fn mapcounts(&self) -> &[u32] {
        self.pool.mapcounts()
    }

    /// Current process followed by the ready list
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        std::iter::once(&self.current).chain(self.ready.iter())
    }

    pub fn alloc_page(&mut self, vpn: u32, access: Access) -> Result<usize> {
        allocator::alloc_page(&mut self.current.pagetable, &mut self.pool, vpn, access)
    }

    pub fn free_page(&mut self, vpn: u32) -> Result<()> {
        allocator::free_page(&mut self.current.pagetable, &mut self.pool, vpn)
    }

    pub fn handle_page_fault(&mut self, vpn: u32, access: Access) -> Result<FaultResolution> {
        fault::handle_page_fault(&mut self.current.pagetable, &mut self.pool, vpn, access)
    }

    /// Walk the current page table without resolving faults
    pub fn translate(&self, vpn: u32, access: Access) -> Result<TranslationResult> {
        let page = VirtualPage::from_raw(vpn)?;
        Ok(translate(&self.current.pagetable, &page, access))
    }

    /// Perform an access, running the fault handler once if translation fails
    pub fn access(&mut self, vpn: u32, access: Access) -> Result<AccessOutcome> {
        if let TranslationResult::Mapped(pfn) = self.translate(vpn, access)? {
            return Ok(AccessOutcome { pfn, fault: None });
        }

        let resolution = self.handle_page_fault(vpn, access)?;
        match self.translate(vpn, access)? {
            TranslationResult::Mapped(pfn) => Ok(AccessOutcome {
                pfn,
                fault: Some(resolution),
            }),
            _ => Err(VmError::UnresolvableFault { vpn, access }),
        }
    }

    /// Make `pid` the current process, forking it from the current one if it does not exist
    pub fn switch_process(&mut self, pid: u32) -> SwitchOutcome {
        if pid == self.current.pid {
            debug!("switch: pid {} is already running", pid);
            return SwitchOutcome::AlreadyCurrent;
        }

        let found = self
            .ready
            .iter()
            .position(|p| p.pid == pid)
            .and_then(|idx| self.ready.remove(idx));

        let (next, outcome) = match found {
            Some(next) => (next, SwitchOutcome::Resumed),
            None => (self.current.fork(&mut self.pool, pid), SwitchOutcome::Forked),
        };

        let prev = mem::replace(&mut self.current, next);
        info!("switch: pid {} -> pid {} ({:?})", prev.pid, pid, outcome);
        self.ready.push_back(prev);
        outcome
    }

    /// Recount valid PTEs across every process and compare with the pool
    pub fn check_mapcounts(&self) -> Result<()> {
        let mut tally = vec![0u32; self.pool.len()];
        for process in self.processes() {
            for (_, pte) in process.pagetable.valid_entries() {
                tally[pte.pfn] += 1;
            }
        }

        for (pfn, (&recorded, &counted)) in self.pool.mapcounts().iter().zip(tally.iter()).enumerate() {
            if recorded != counted {
                return Err(VmError::MapcountMismatch { pfn, recorded, counted });
            }
        }
        Ok(())
    }
}

impl Default for VmManager {
    fn default() -> Self {
        Self::new(NR_PAGEFRAMES)
    }
}
