use crate::page_table::Access;

/// Result alias for page table and frame pool operations.
pub type Result<T> = core::result::Result<T, VmError>;

/// Errors reported by the memory manager to the driving framework.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// Every frame in the pool is referenced by at least one PTE.
    #[error("page frame pool exhausted")]
    PoolExhausted,
    /// The PTE for the page is already valid.
    #[error("vpn {vpn} is already mapped")]
    AlreadyMapped { vpn: u32 },
    /// The page was expected to be mapped but its PTE is not valid.
    #[error("vpn {vpn} is not mapped")]
    NotMapped { vpn: u32 },
    /// The failed access matches none of the recognized fault classes.
    #[error("unresolvable {access} fault at vpn {vpn}")]
    UnresolvableFault { vpn: u32, access: Access },
    #[error("vpn {vpn} is outside the address space")]
    VpnOutOfRange { vpn: u32 },
    /// A frame's recorded mapcount disagrees with the PTEs naming it.
    #[error("frame {pfn}: mapcount {recorded} but {counted} valid PTEs")]
    MapcountMismatch { pfn: usize, recorded: u32, counted: u32 },
}
