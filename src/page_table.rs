use std::fmt;

use log::debug;

use crate::constants::*;
use crate::translation::VirtualPage;

/// Kind of memory access requested by the framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => write!(f, "read"),
            Access::Write => write!(f, "write"),
        }
    }
}

/// A single page table entry
///
/// `private` marks an entry whose frame was shared by fork; a write to it
/// must go through copy-on-write before it succeeds. `pfn` is only
/// meaningful while `valid`, or while the frame is still held by another
/// process after this entry was freed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pte {
    pub valid: bool,
    pub writable: bool,
    pub private: bool,
    pub pfn: usize,
}

impl Pte {
    /// Bind the entry to `pfn`
    pub fn map(&mut self, pfn: usize, access: Access) {
        self.pfn = pfn;
        self.valid = true;
        self.writable = access == Access::Write;
    }

    /// Clear the access bits, keeping `pfn`
    pub fn invalidate(&mut self) {
        self.valid = false;
        self.writable = false;
        self.private = false;
    }
}

/// Inner level of the page table: one PTE per page of a 16-page region
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PteDirectory {
    pub ptes: [Pte; NR_PTES_PER_PAGE],
}

/// Per-process root of the two-level page table
///
/// Directories are allocated the first time a page in their region is
/// touched and live as long as the table does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTable {
    outer_ptes: [Option<Box<PteDirectory>>; NR_PAGETABLES],
}

impl PageTable {
    /// Create a table with no directories
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory covering outer slot `outer`, if it was allocated
    #[inline]
    pub fn directory(&self, outer: usize) -> Option<&PteDirectory> {
        self.outer_ptes[outer].as_deref()
    }

    #[inline]
    pub fn directory_mut(&mut self, outer: usize) -> Option<&mut PteDirectory> {
        self.outer_ptes[outer].as_deref_mut()
    }

    /// Directory covering `outer`, allocated empty on first use
    pub fn directory_or_create(&mut self, outer: usize) -> &mut PteDirectory {
        self.outer_ptes[outer].get_or_insert_with(|| {
            debug!("page directory {} created", outer);
            Box::default()
        })
    }

    /// Set the directory for `outer`, replacing any previous one
    pub fn install_directory(&mut self, outer: usize, dir: PteDirectory) {
        self.outer_ptes[outer] = Some(Box::new(dir));
    }

    /// Whether the directory covering `page` exists
    #[inline]
    pub fn has_directory(&self, page: &VirtualPage) -> bool {
        self.outer_ptes[page.outer].is_some()
    }

    /// Entry for `page`, if its directory exists
    pub fn pte(&self, page: &VirtualPage) -> Option<&Pte> {
        self.directory(page.outer).map(|dir| &dir.ptes[page.inner])
    }

    pub fn pte_mut(&mut self, page: &VirtualPage) -> Option<&mut Pte> {
        self.directory_mut(page.outer).map(|dir| &mut dir.ptes[page.inner])
    }

    /// Number of allocated directories
    pub fn directory_count(&self) -> usize {
        self.outer_ptes.iter().filter(|dir| dir.is_some()).count()
    }

    /// Iterate over every allocated directory with its outer index
    pub fn directories(&self) -> impl Iterator<Item = (usize, &PteDirectory)> {
        self.outer_ptes
            .iter()
            .enumerate()
            .filter_map(|(outer, dir)| dir.as_deref().map(|dir| (outer, dir)))
    }

    /// Iterate over every valid entry, in vpn order
    pub fn valid_entries(&self) -> impl Iterator<Item = (u32, &Pte)> {
        self.directories().flat_map(|(outer, dir)| {
            dir.ptes
                .iter()
                .enumerate()
                .filter(|(_, pte)| pte.valid)
                .map(move |(inner, pte)| (VirtualPage::compose(outer, inner), pte))
        })
    }
}

impl fmt::Display for PageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (vpn, pte) in self.valid_entries() {
            write!(
                f,
                "{:3} -> {:3} {}",
                vpn,
                pte.pfn,
                if pte.writable { "rw" } else { "ro" }
            )?;
            if pte.private {
                write!(f, " cow")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
