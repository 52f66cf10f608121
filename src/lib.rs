//! Buddy Arena Allocator
//!
//! This crate implements a fixed-arena allocator based on the buddy system,
//! featuring:
//! - A single 2^M byte arena aligned to its own size
//! - Per-order free lists linked through offsets stored inside free blocks
//! - Eager coalescing of free buddies on release
//! - An allocation registry that rejects double and foreign frees
//!
//! ```
//! use buddy_arena::{AllocError, BuddyAllocator};
//!
//! let mut arena = BuddyAllocator::new(8).unwrap();
//! let handle = arena.allocate(11).unwrap();
//! arena.payload_mut(handle).unwrap()[..10].copy_from_slice(b"HelloWorld");
//! assert_eq!(&arena.payload(handle).unwrap()[..10], b"HelloWorld");
//!
//! arena.release(handle).unwrap();
//! assert_eq!(arena.release(handle), Err(AllocError::NotAllocated));
//! ```

#![no_std]

extern crate alloc;

use core::fmt;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// The error type used for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The arena order is outside `MIN_ORDER..=MAX_ORDER`.
    InvalidOrder,
    /// Invalid request size (e.g. zero bytes).
    InvalidParam,
    /// The request cannot be satisfied even by an empty arena.
    TooLarge,
    /// No free block is large enough to serve the request.
    NoMemory,
    /// Release of a handle that is not currently allocated.
    NotAllocated,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AllocError::InvalidOrder => "arena order out of supported range",
            AllocError::InvalidParam => "invalid allocation request",
            AllocError::TooLarge => "request exceeds arena capacity",
            AllocError::NoMemory => "out of memory",
            AllocError::NotAllocated => "handle is not a live allocation",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for AllocError {}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

/// Checks whether the offset has the demanded alignment.
///
/// Equivalent to `offset % align == 0`, but the alignment must be a power of two.
#[inline]
const fn is_aligned(offset: usize, align: usize) -> bool {
    offset & (align - 1) == 0
}

pub mod buddy;
pub use buddy::{
    ArenaReport, BlockHeader, BuddyAllocator, BuddyBlock, BuddyStats, FreeOrder, Handle,
    LiveAllocation, HEADER_SIZE, MAX_ORDER, MIN_ORDER,
};
#[cfg(feature = "tracking")]
pub use buddy::UsageStats;
