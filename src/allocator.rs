//! Binding and releasing page frames for a single page table.

use log::{debug, warn};

use crate::error::{Result, VmError};
use crate::memory::FramePool;
use crate::page_table::{Access, PageTable};
use crate::translation::VirtualPage;

/// Map `vpn` in `pt` to the smallest-numbered free frame of `pool`
///
/// The directory covering `vpn` is created if needed, even when the
/// allocation itself then fails. Returns the bound pfn.
pub fn alloc_page(pt: &mut PageTable, pool: &mut FramePool, vpn: u32, access: Access) -> Result<usize> {
    let page = VirtualPage::from_raw(vpn)?;
    let pte = &mut pt.directory_or_create(page.outer).ptes[page.inner];

    if pte.valid {
        warn!("alloc: vpn {} already mapped to frame {}", vpn, pte.pfn);
        return Err(VmError::AlreadyMapped { vpn });
    }

    let Some(pfn) = pool.first_free() else {
        warn!("alloc: no free frame for vpn {}", vpn);
        return Err(VmError::PoolExhausted);
    };

    pte.map(pfn, access);
    pool.get(pfn);
    debug!("alloc: vpn {} -> frame {} ({})", vpn, pfn, access);
    Ok(pfn)
}

/// Unmap `vpn` from `pt` and drop its reference on the frame
///
/// When another page table still maps the frame, the entry keeps its pfn.
pub fn free_page(pt: &mut PageTable, pool: &mut FramePool, vpn: u32) -> Result<()> {
    let page = VirtualPage::from_raw(vpn)?;
    let Some(pte) = pt.pte_mut(&page).filter(|pte| pte.valid) else {
        warn!("free: vpn {} is not mapped", vpn);
        return Err(VmError::NotMapped { vpn });
    };

    let pfn = pte.pfn;
    pte.invalidate();
    let remaining = pool.put(pfn);
    if remaining < 1 {
        pte.pfn = 0;
    }
    debug!("free: vpn {} released frame {} (mapcount {})", vpn, pfn, remaining);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(vpn: u32) -> VirtualPage {
        VirtualPage::from_raw(vpn).unwrap()
    }

    #[test]
    fn test_alloc_smallest_free_frame() {
        let mut pt = PageTable::new();
        let mut pool = FramePool::new(4);

        assert_eq!(alloc_page(&mut pt, &mut pool, 0, Access::Write), Ok(0));
        assert_eq!(alloc_page(&mut pt, &mut pool, 10, Access::Read), Ok(1));
        assert_eq!(alloc_page(&mut pt, &mut pool, 200, Access::Read), Ok(2));
        assert_eq!(pool.mapcounts(), &[1, 1, 1, 0]);
    }

    #[test]
    fn test_alloc_sets_access_bits() {
        let mut pt = PageTable::new();
        let mut pool = FramePool::new(4);

        alloc_page(&mut pt, &mut pool, 3, Access::Write).unwrap();
        alloc_page(&mut pt, &mut pool, 4, Access::Read).unwrap();

        let rw = pt.pte(&page(3)).unwrap();
        assert!(rw.valid && rw.writable && !rw.private);
        let ro = pt.pte(&page(4)).unwrap();
        assert!(ro.valid && !ro.writable);
    }

    #[test]
    fn test_alloc_creates_directory() {
        let mut pt = PageTable::new();
        let mut pool = FramePool::new(4);

        alloc_page(&mut pt, &mut pool, 100, Access::Read).unwrap();
        assert!(pt.has_directory(&page(100)));
        assert_eq!(pt.directory_count(), 1);

        // Same region, no new directory
        alloc_page(&mut pt, &mut pool, 101, Access::Read).unwrap();
        assert_eq!(pt.directory_count(), 1);
    }

    #[test]
    fn test_alloc_already_mapped() {
        let mut pt = PageTable::new();
        let mut pool = FramePool::new(4);

        alloc_page(&mut pt, &mut pool, 8, Access::Read).unwrap();
        assert_eq!(
            alloc_page(&mut pt, &mut pool, 8, Access::Write),
            Err(VmError::AlreadyMapped { vpn: 8 })
        );
        // Nothing changed
        assert_eq!(pool.mapcounts(), &[1, 0, 0, 0]);
        assert!(!pt.pte(&page(8)).unwrap().writable);
    }

    #[test]
    fn test_alloc_pool_exhausted() {
        let mut pt = PageTable::new();
        let mut pool = FramePool::new(2);

        alloc_page(&mut pt, &mut pool, 0, Access::Read).unwrap();
        alloc_page(&mut pt, &mut pool, 1, Access::Read).unwrap();
        assert_eq!(
            alloc_page(&mut pt, &mut pool, 40, Access::Read),
            Err(VmError::PoolExhausted)
        );
        // The directory was still created, the entry stays invalid
        assert!(pt.has_directory(&page(40)));
        assert!(!pt.pte(&page(40)).unwrap().valid);
        assert_eq!(pool.mapcounts(), &[1, 1]);
    }

    #[test]
    fn test_alloc_out_of_range() {
        let mut pt = PageTable::new();
        let mut pool = FramePool::new(2);
        assert_eq!(
            alloc_page(&mut pt, &mut pool, 256, Access::Read),
            Err(VmError::VpnOutOfRange { vpn: 256 })
        );
        assert_eq!(pt.directory_count(), 0);
    }

    #[test]
    fn test_free_sole_owner_clears_pfn() {
        let mut pt = PageTable::new();
        let mut pool = FramePool::new(4);

        alloc_page(&mut pt, &mut pool, 0, Access::Read).unwrap();
        alloc_page(&mut pt, &mut pool, 1, Access::Write).unwrap();
        free_page(&mut pt, &mut pool, 1).unwrap();

        let pte = pt.pte(&page(1)).unwrap();
        assert!(!pte.valid && !pte.writable && !pte.private);
        assert_eq!(pte.pfn, 0);
        assert_eq!(pool.mapcounts(), &[1, 0, 0, 0]);
    }

    #[test]
    fn test_free_shared_frame_keeps_pfn() {
        let mut pt = PageTable::new();
        let mut pool = FramePool::new(4);

        alloc_page(&mut pt, &mut pool, 0, Access::Read).unwrap();
        alloc_page(&mut pt, &mut pool, 1, Access::Write).unwrap();
        // Another page table holds frame 1 too
        pool.get(1);

        free_page(&mut pt, &mut pool, 1).unwrap();
        let pte = pt.pte(&page(1)).unwrap();
        assert!(!pte.valid);
        assert_eq!(pte.pfn, 1);
        assert_eq!(pool.mapcount(1), 1);
    }

    #[test]
    fn test_freed_frame_is_reused() {
        let mut pt = PageTable::new();
        let mut pool = FramePool::new(4);

        alloc_page(&mut pt, &mut pool, 0, Access::Read).unwrap();
        alloc_page(&mut pt, &mut pool, 1, Access::Read).unwrap();
        free_page(&mut pt, &mut pool, 0).unwrap();

        assert_eq!(alloc_page(&mut pt, &mut pool, 2, Access::Read), Ok(0));
        // And a freed vpn can be mapped again
        assert_eq!(alloc_page(&mut pt, &mut pool, 0, Access::Read), Ok(2));
    }

    #[test]
    fn test_free_unmapped() {
        let mut pt = PageTable::new();
        let mut pool = FramePool::new(4);

        // No directory at all
        assert_eq!(free_page(&mut pt, &mut pool, 20), Err(VmError::NotMapped { vpn: 20 }));

        // Directory exists, entry invalid
        alloc_page(&mut pt, &mut pool, 16, Access::Read).unwrap();
        assert_eq!(free_page(&mut pt, &mut pool, 20), Err(VmError::NotMapped { vpn: 20 }));

        // Double free
        free_page(&mut pt, &mut pool, 16).unwrap();
        assert_eq!(free_page(&mut pt, &mut pool, 16), Err(VmError::NotMapped { vpn: 16 }));
        assert_eq!(pool.mapcounts(), &[0, 0, 0, 0]);
    }
}
