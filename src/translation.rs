use crate::constants::*;
use crate::error::{Result, VmError};
use crate::page_table::{Access, PageTable};

/// Represents the decomposed components of a virtual page number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualPage {
    pub vpn: u32,
    pub outer: usize,
    pub inner: usize,
}

impl VirtualPage {
    /// Decompose a raw VPN into its outer and inner indices
    pub fn from_raw(vpn: u32) -> Result<Self> {
        if vpn as usize >= NR_VPNS {
            return Err(VmError::VpnOutOfRange { vpn });
        }
        Ok(VirtualPage {
            vpn,
            outer: (vpn >> OUTER_SHIFT) as usize,
            inner: (vpn & INNER_MASK) as usize,
        })
    }

    /// Rebuild a VPN from its indices
    #[inline]
    pub fn compose(outer: usize, inner: usize) -> u32 {
        ((outer as u32) << OUTER_SHIFT) | inner as u32
    }
}

impl std::fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VPN({}) = (outer={}, inner={})", self.vpn, self.outer, self.inner)
    }
}

/// Result of walking the page table for one access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationResult {
    Mapped(usize),
    NoDirectory,
    InvalidPte,
    WriteProtected,
}

impl TranslationResult {
    /// Convert to the output format (-1 for faults, pfn otherwise)
    pub fn to_output(&self) -> i64 {
        match self {
            TranslationResult::Mapped(pfn) => *pfn as i64,
            _ => INVALID_FRAME,
        }
    }

    #[inline]
    pub fn is_fault(&self) -> bool {
        !matches!(self, TranslationResult::Mapped(_))
    }
}

/// Walk `pt` for `access` to `page`, the way the MMU does before raising a fault
pub fn translate(pt: &PageTable, page: &VirtualPage, access: Access) -> TranslationResult {
    // Step 1: outer level
    let Some(dir) = pt.directory(page.outer) else {
        return TranslationResult::NoDirectory;
    };

    // Step 2: inner level
    let pte = &dir.ptes[page.inner];
    if !pte.valid {
        return TranslationResult::InvalidPte;
    }

    // Step 3: access control
    if access == Access::Write && !pte.writable {
        return TranslationResult::WriteProtected;
    }

    TranslationResult::Mapped(pte.pfn)
}
