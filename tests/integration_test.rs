//! Integration tests for the buddy arena crate
//!
//! Exercises the public allocator API end to end: split and coalesce
//! scenarios, registry validation, payload access and reporting.

#![no_std]

extern crate alloc;
extern crate buddy_arena;

use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;
use buddy_arena::{AllocError, BuddyAllocator, Handle, HEADER_SIZE, MAX_ORDER, MIN_ORDER};

const ORDER: usize = 8;

fn free_counts(allocator: &BuddyAllocator) -> Vec<(usize, usize)> {
    allocator.describe().free_counts()
}

fn assert_fully_coalesced(allocator: &BuddyAllocator) {
    assert_eq!(free_counts(allocator), vec![(allocator.order(), 1)]);
    assert_eq!(allocator.live_count(), 0);
    assert!(allocator.is_consistent());
}

#[test]
fn test_single_allocation_splits_to_order_four() {
    let mut allocator = BuddyAllocator::new(ORDER).unwrap();

    // 11 bytes + 1 header byte -> 16-byte block
    let handle = allocator.allocate(11).unwrap();

    let report = allocator.describe();
    assert_eq!(report.live.len(), 1);
    assert_eq!(report.live[0].order, 4);
    assert_eq!(report.live[0].block_size(), 16);
    assert_eq!(report.live[0].handle, handle);
    assert_eq!(report.free_counts(), vec![(4, 1), (5, 1), (6, 1), (7, 1)]);
    assert!(allocator.is_consistent());

    allocator.release(handle).unwrap();
    assert_fully_coalesced(&allocator);
}

#[test]
fn test_release_with_allocated_buddy_does_not_merge() {
    let mut allocator = BuddyAllocator::new(ORDER).unwrap();

    let first = allocator.allocate(11).unwrap();
    let second = allocator.allocate(11).unwrap();
    assert_eq!(second.addr() - first.addr(), 16);

    allocator.release(first).unwrap();
    let report = allocator.describe();
    assert_eq!(report.free_count(4), 1);
    let order4 = report.free.iter().find(|free| free.order == 4).unwrap();
    // The released block is the lower half at offset 0; its buddy is live.
    assert_eq!(order4.offsets, vec![0]);
    assert_eq!(report.live[0].offset, 16);
    assert_eq!(report.live.len(), 1);
    assert_eq!(report.live[0].handle, second);
    assert!(allocator.is_consistent());

    allocator.release(second).unwrap();
    assert_fully_coalesced(&allocator);
}

#[test]
fn test_write_and_read_payload() {
    let mut allocator = BuddyAllocator::new(ORDER).unwrap();
    allocator.show_details(true);

    let foo = allocator.allocate(11).unwrap();
    let bar = allocator.allocate(11).unwrap();

    allocator.payload_mut(foo).unwrap()[..11].copy_from_slice(b"HelloWorld\0");
    allocator.payload_mut(bar).unwrap().fill(0xff);

    assert_eq!(&allocator.payload(foo).unwrap()[..11], b"HelloWorld\0");
    assert!(allocator.payload(bar).unwrap().iter().all(|&b| b == 0xff));

    allocator.release(bar).unwrap();
    assert_eq!(&allocator.payload(foo).unwrap()[..11], b"HelloWorld\0");

    allocator.release(foo).unwrap();
    assert_fully_coalesced(&allocator);
}

#[test]
fn test_double_release_fails() {
    let mut allocator = BuddyAllocator::new(ORDER).unwrap();
    let handle = allocator.allocate(30).unwrap();

    assert_eq!(allocator.release(handle), Ok(()));
    assert_eq!(allocator.release(handle), Err(AllocError::NotAllocated));
    assert_fully_coalesced(&allocator);
}

#[test]
fn test_foreign_handle_rejected() {
    let mut ours = BuddyAllocator::new(ORDER).unwrap();
    let mut theirs = BuddyAllocator::new(ORDER).unwrap();

    let mine = ours.allocate(11).unwrap();
    let foreign = theirs.allocate(11).unwrap();
    let before = ours.describe();

    assert_eq!(ours.release(foreign), Err(AllocError::NotAllocated));
    assert_eq!(ours.payload(foreign), Err(AllocError::NotAllocated));
    assert_eq!(ours.describe(), before);

    // Both arenas stay independent.
    theirs.release(foreign).unwrap();
    assert_fully_coalesced(&theirs);
    ours.release(mine).unwrap();
    assert_fully_coalesced(&ours);
}

#[test]
fn test_request_too_large_never_mutates() {
    let mut allocator = BuddyAllocator::new(ORDER).unwrap();
    let held = allocator.allocate(100).unwrap();
    let before = allocator.describe();

    for size in [256, 1000, usize::MAX - 1, usize::MAX] {
        assert_eq!(allocator.allocate(size), Err(AllocError::TooLarge));
        assert_eq!(allocator.describe(), before);
    }

    assert_eq!(allocator.allocate(0), Err(AllocError::InvalidParam));
    assert_eq!(allocator.describe(), before);

    allocator.release(held).unwrap();
    assert_fully_coalesced(&allocator);
}

#[test]
fn test_out_of_memory_under_fragmentation() {
    let mut allocator = BuddyAllocator::new(ORDER).unwrap();

    // Sixteen 16-byte blocks fill the 256-byte arena.
    let handles: Vec<Handle> = (0..16).map(|_| allocator.allocate(15).unwrap()).collect();
    assert_eq!(allocator.allocate(1), Err(AllocError::NoMemory));
    assert_eq!(allocator.free_bytes(), 0);

    // Free every other block: 128 bytes free, but no two free buddies.
    for handle in handles.iter().step_by(2) {
        allocator.release(*handle).unwrap();
    }
    assert_eq!(allocator.free_bytes(), 128);
    assert_eq!(free_counts(&allocator), vec![(4, 8)]);
    assert_eq!(allocator.allocate(16), Err(AllocError::NoMemory));
    assert!(allocator.allocate(15).is_ok());
}

#[test]
fn test_repeated_allocate_release_is_stable() {
    let mut allocator = BuddyAllocator::new(ORDER).unwrap();
    let _a = allocator.allocate(11).unwrap();
    let _b = allocator.allocate(60).unwrap();
    let before = allocator.describe();

    for size in [1, 11, 15, 16, 31, 100] {
        for _ in 0..8 {
            if let Ok(handle) = allocator.allocate(size) {
                allocator.release(handle).unwrap();
            }
            assert_eq!(allocator.describe(), before);
        }
    }
    assert!(allocator.is_consistent());
}

#[test]
fn test_describe_is_read_only() {
    let mut allocator = BuddyAllocator::new(ORDER).unwrap();
    let a = allocator.allocate(20).unwrap();
    let b = allocator.allocate(5).unwrap();

    let first = allocator.describe();
    let second = allocator.describe();
    assert_eq!(first, second);
    assert_eq!(first.order, ORDER);
    assert_eq!(first.live.len(), 2);
    assert!(first.live.windows(2).all(|w| w[0].offset < w[1].offset));
    assert_eq!(first.free_bytes(), allocator.free_bytes());

    allocator.release(a).unwrap();
    allocator.release(b).unwrap();
    assert_fully_coalesced(&allocator);
}

#[test]
fn test_report_rendering() {
    let mut allocator = BuddyAllocator::new(ORDER).unwrap();
    let handle = allocator.allocate(11).unwrap();

    let text = allocator.describe().to_string();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        alloc::format!("{{ {:#x}, 16 }}", handle.addr())
    );
    assert_eq!(
        lines.next().unwrap(),
        "|  16  ||  32  ||  64  ||  128  |"
    );

    allocator.release(handle).unwrap();
    assert_eq!(allocator.describe().to_string(), "|  256  |");
}

#[test]
fn test_order_bounds() {
    assert_eq!(
        BuddyAllocator::new(MIN_ORDER - 1).err(),
        Some(AllocError::InvalidOrder)
    );
    assert_eq!(
        BuddyAllocator::new(MAX_ORDER + 1).err(),
        Some(AllocError::InvalidOrder)
    );

    let mut smallest = BuddyAllocator::new(MIN_ORDER).unwrap();
    let max_payload = (1 << MIN_ORDER) - HEADER_SIZE;
    assert_eq!(smallest.allocate(max_payload + 1), Err(AllocError::TooLarge));
    let handle = smallest.allocate(max_payload).unwrap();
    assert_eq!(smallest.capacity(handle), Ok(max_payload));
    smallest.release(handle).unwrap();
    assert_fully_coalesced(&smallest);
}

#[test]
fn test_error_display() {
    assert_eq!(
        AllocError::NotAllocated.to_string(),
        "handle is not a live allocation"
    );
    assert_eq!(AllocError::NoMemory.to_string(), "out of memory");
}
