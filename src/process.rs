use log::debug;

use crate::constants::NR_PAGETABLES;
use crate::memory::FramePool;
use crate::page_table::{PageTable, PteDirectory};

/// A simulated process: an id and its address space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub pid: u32,
    pub pagetable: PageTable,
}

impl Process {
    /// Create a process with an empty address space
    pub fn new(pid: u32) -> Self {
        Process {
            pid,
            pagetable: PageTable::new(),
        }
    }

    /// Create a child sharing every mapped frame copy-on-write
    ///
    /// Each valid entry gains a reference on its frame. Entries writable in
    /// the parent become read-only and private in both tables so the next
    /// write from either side faults into the copy-on-write path.
    pub fn fork(&mut self, pool: &mut FramePool, child_pid: u32) -> Process {
        let mut child = Process::new(child_pid);
        let mut shared = 0usize;

        for outer in 0..NR_PAGETABLES {
            let Some(parent_dir) = self.pagetable.directory_mut(outer) else {
                continue;
            };

            let mut child_dir = PteDirectory::default();
            for (parent_pte, child_pte) in parent_dir.ptes.iter_mut().zip(child_dir.ptes.iter_mut()) {
                if parent_pte.valid {
                    pool.get(parent_pte.pfn);
                    shared += 1;
                }
                if parent_pte.writable {
                    parent_pte.writable = false;
                    parent_pte.private = true;
                }
                *child_pte = *parent_pte;
            }
            child.pagetable.install_directory(outer, child_dir);
        }

        debug!(
            "fork: pid {} -> pid {}, {} frames shared",
            self.pid, child_pid, shared
        );
        child
    }
}
