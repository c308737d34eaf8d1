#![cfg(test)]
//! Property tests for the memory manager.
//!
//! Random sequences of allocations, frees, accesses and process switches
//! must keep the frame pool consistent with the page tables:
//!   - every frame's mapcount equals the number of valid PTEs naming it
//!   - an invalid PTE is never writable
//!   - allocation always returns the smallest free frame

use proptest::prelude::*;

use crate::page_table::Access;
use crate::vm_manager::VmManager;

const FRAMES: usize = 8;
const VPNS: u32 = 40;

#[derive(Debug, Clone, Copy)]
enum Op {
    Alloc(u32, Access),
    Free(u32),
    Access(u32, Access),
    Switch(u32),
}

fn arb_access() -> impl Strategy<Value = Access> {
    prop_oneof![Just(Access::Read), Just(Access::Write)]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..VPNS, arb_access()).prop_map(|(vpn, access)| Op::Alloc(vpn, access)),
        2 => (0..VPNS).prop_map(Op::Free),
        3 => (0..VPNS, arb_access()).prop_map(|(vpn, access)| Op::Access(vpn, access)),
        1 => (0u32..4).prop_map(Op::Switch),
    ]
}

fn apply(vm: &mut VmManager, op: Op) {
    // Rejections are fine; only the bookkeeping is under test
    match op {
        Op::Alloc(vpn, access) => {
            let _ = vm.alloc_page(vpn, access);
        }
        Op::Free(vpn) => {
            let _ = vm.free_page(vpn);
        }
        Op::Access(vpn, access) => {
            let _ = vm.access(vpn, access);
        }
        Op::Switch(pid) => {
            vm.switch_process(pid);
        }
    }
}

proptest! {
    #[test]
    fn mapcounts_match_page_tables(ops in prop::collection::vec(arb_op(), 1..80)) {
        let mut vm = VmManager::new(FRAMES);
        for op in ops {
            apply(&mut vm, op);
            prop_assert_eq!(vm.check_mapcounts(), Ok(()));
        }
    }

    #[test]
    fn invalid_entries_are_never_writable(ops in prop::collection::vec(arb_op(), 1..80)) {
        let mut vm = VmManager::new(FRAMES);
        for op in ops {
            apply(&mut vm, op);
        }
        for process in vm.processes() {
            for (_, dir) in process.pagetable.directories() {
                for pte in dir.ptes.iter().filter(|pte| !pte.valid) {
                    prop_assert!(!pte.writable);
                }
            }
        }
    }

    #[test]
    fn alloc_returns_smallest_free_frame(
        ops in prop::collection::vec(arb_op(), 0..60),
        vpn in 0..VPNS,
        access in arb_access(),
    ) {
        let mut vm = VmManager::new(FRAMES);
        for op in ops {
            apply(&mut vm, op);
        }

        let expected = vm.mapcounts().iter().position(|&count| count == 0);
        let already_mapped = vm.translate(vpn, Access::Read).map(|r| !r.is_fault()).unwrap_or(false);
        let result = vm.alloc_page(vpn, access);

        match (already_mapped, expected) {
            (true, _) => prop_assert!(result.is_err()),
            (false, Some(pfn)) => prop_assert_eq!(result, Ok(pfn)),
            (false, None) => prop_assert_eq!(result, Err(crate::VmError::PoolExhausted)),
        }
    }
}
