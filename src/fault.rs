//! Page fault classification and resolution, including copy-on-write.

use log::{debug, warn};

use crate::allocator::alloc_page;
use crate::error::{Result, VmError};
use crate::memory::FramePool;
use crate::page_table::{Access, PageTable};
use crate::translation::VirtualPage;

/// How a page fault was repaired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultResolution {
    /// The page's directory did not exist; it was created and a frame bound
    DirectoryCreated { pfn: usize },
    /// The entry was invalid; a frame was bound
    Populated { pfn: usize },
    /// A shared frame was duplicated; the caller copies `from` into `to`
    CopiedOnWrite { from: usize, to: usize },
    /// The last owner of a shared frame was given write access in place
    Upgraded { pfn: usize },
}

impl FaultResolution {
    /// Frame the page is mapped to after resolution
    pub fn pfn(&self) -> usize {
        match *self {
            FaultResolution::DirectoryCreated { pfn }
            | FaultResolution::Populated { pfn }
            | FaultResolution::Upgraded { pfn } => pfn,
            FaultResolution::CopiedOnWrite { to, .. } => to,
        }
    }
}

/// Repair `pt` after `access` to `vpn` failed to translate
///
/// Recognized faults, checked in order: missing directory, invalid entry,
/// and a write to a read-only entry that fork marked private. Anything else
/// is a protection violation and reported as [`VmError::UnresolvableFault`].
pub fn handle_page_fault(
    pt: &mut PageTable,
    pool: &mut FramePool,
    vpn: u32,
    access: Access,
) -> Result<FaultResolution> {
    let page = VirtualPage::from_raw(vpn)?;

    if !pt.has_directory(&page) {
        let pfn = alloc_page(pt, pool, vpn, access)?;
        debug!("fault: vpn {} had no directory, frame {}", vpn, pfn);
        return Ok(FaultResolution::DirectoryCreated { pfn });
    }

    let Some(pte) = pt.pte_mut(&page) else {
        return Err(VmError::UnresolvableFault { vpn, access });
    };

    if !pte.valid {
        let pfn = alloc_page(pt, pool, vpn, access)?;
        debug!("fault: vpn {} populated with frame {}", vpn, pfn);
        return Ok(FaultResolution::Populated { pfn });
    }

    if pte.writable || access != Access::Write || !pte.private {
        warn!("fault: {} to vpn {} is a protection violation", access, vpn);
        return Err(VmError::UnresolvableFault { vpn, access });
    }

    let shared = pte.pfn;
    if pool.mapcount(shared) >= 2 {
        // Find the copy target first so a full pool leaves the mapping intact
        let Some(target) = pool.first_free() else {
            warn!("fault: no free frame to copy frame {} for vpn {}", shared, vpn);
            return Err(VmError::PoolExhausted);
        };
        pool.put(shared);
        pte.invalidate();
        let pfn = alloc_page(pt, pool, vpn, Access::Write)?;
        debug_assert_eq!(pfn, target);
        debug!("fault: vpn {} copied frame {} -> {}", vpn, shared, pfn);
        Ok(FaultResolution::CopiedOnWrite { from: shared, to: pfn })
    } else {
        pte.writable = true;
        pte.private = false;
        debug!("fault: vpn {} now sole owner of frame {}, writable", vpn, shared);
        Ok(FaultResolution::Upgraded { pfn: shared })
    }
}
