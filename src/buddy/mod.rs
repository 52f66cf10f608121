//! Buddy allocator module
//!
//! This module provides a complete buddy system implementation with:
//! - Offset-linked circular free lists stored inside the arena
//! - Split on allocation, eager coalescing on release
//! - An allocation registry and arena reports

pub mod arena;
pub mod buddy_allocator;
pub mod buddy_block;
pub mod buddy_set;
pub mod free_list;
pub mod stats;

pub use arena::{Arena, Handle};
pub use buddy_allocator::BuddyAllocator;
pub use buddy_block::{BlockHeader, BuddyBlock, HEADER_SIZE, MAX_ORDER, MIN_ORDER};
pub use buddy_set::BuddySet;
pub use free_list::FreeList;
#[cfg(feature = "tracking")]
pub use stats::UsageStats;
pub use stats::{ArenaReport, BuddyStats, FreeOrder, LiveAllocation};
