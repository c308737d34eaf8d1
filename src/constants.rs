pub const PTES_BITS: u32 = 4;

/// Entries in one inner page directory
pub const NR_PTES_PER_PAGE: usize = 1 << PTES_BITS;
/// Slots in the outer table of a process
pub const NR_PAGETABLES: usize = 1 << PTES_BITS;
/// Addressable pages per process
pub const NR_VPNS: usize = NR_PAGETABLES * NR_PTES_PER_PAGE;

pub const INNER_MASK: u32 = (1 << PTES_BITS) - 1;
pub const OUTER_SHIFT: u32 = PTES_BITS;

/// Default size of the physical frame pool
pub const NR_PAGEFRAMES: usize = 128;

pub const INITIAL_PID: u32 = 0;

pub const INVALID_FRAME: i64 = -1;
