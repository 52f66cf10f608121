//! Reports and statistics for the buddy allocator
//!
//! Provides the read-only arena snapshot returned by `describe`, byte
//! accounting, and failure reporting.

use alloc::vec::Vec;
use core::fmt;

use super::{
    arena::Handle,
    buddy_block::{block_size, MAX_ORDER},
};

/// One live allocation in an [`ArenaReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveAllocation {
    pub handle: Handle,
    /// Offset of the block header from the arena base
    pub offset: usize,
    pub order: usize,
    /// Bytes asked for by the caller
    pub requested: usize,
}

impl LiveAllocation {
    /// Size of the whole block, header included
    pub fn block_size(&self) -> usize {
        block_size(self.order)
    }
}

/// Free blocks of one order in an [`ArenaReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeOrder {
    pub order: usize,
    /// Block offsets in free-list order, head first
    pub offsets: Vec<usize>,
}

impl FreeOrder {
    pub fn count(&self) -> usize {
        self.offsets.len()
    }
}

/// Snapshot of the arena: live allocations and free blocks.
///
/// `Display` renders it the way a debugging host prints it: one
/// `{ 0xADDR, SIZE }` line per live block, then a row of `|  SIZE  |` cells
/// for the free blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaReport {
    /// Order of the whole arena
    pub order: usize,
    /// Live allocations sorted by offset
    pub live: Vec<LiveAllocation>,
    /// Non-empty free lists, lowest order first
    pub free: Vec<FreeOrder>,
}

impl ArenaReport {
    /// Number of free blocks of `order`.
    pub fn free_count(&self, order: usize) -> usize {
        self.free
            .iter()
            .find(|free| free.order == order)
            .map_or(0, FreeOrder::count)
    }

    /// `(order, count)` for every non-empty free list.
    pub fn free_counts(&self) -> Vec<(usize, usize)> {
        self.free.iter().map(|free| (free.order, free.count())).collect()
    }

    /// Total bytes held by free blocks.
    pub fn free_bytes(&self) -> usize {
        self.free
            .iter()
            .map(|free| free.count() * block_size(free.order))
            .sum()
    }
}

impl fmt::Display for ArenaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for live in &self.live {
            writeln!(f, "{{ {:#x}, {} }}", live.handle.addr(), live.block_size())?;
        }
        for free in &self.free {
            for _ in &free.offsets {
                write!(f, "|  {}  |", block_size(free.order))?;
            }
        }
        Ok(())
    }
}

/// Byte accounting for one arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuddyStats {
    pub total_bytes: usize,
    pub free_bytes: usize,
    pub used_bytes: usize,
    /// Bytes callers asked for; `used_bytes - requested_bytes` is lost to
    /// rounding and headers.
    pub requested_bytes: usize,
    pub live_allocations: usize,
    pub free_blocks_by_order: [usize; MAX_ORDER + 1],
}

impl Default for BuddyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BuddyStats {
    pub const fn new() -> Self {
        Self {
            total_bytes: 0,
            free_bytes: 0,
            used_bytes: 0,
            requested_bytes: 0,
            live_allocations: 0,
            free_blocks_by_order: [0; MAX_ORDER + 1],
        }
    }

    /// Bytes lost to block rounding and headers.
    pub fn overhead_bytes(&self) -> usize {
        self.used_bytes.saturating_sub(self.requested_bytes)
    }
}

/// Running counters kept across the allocator's lifetime
#[cfg(feature = "tracking")]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UsageStats {
    pub allocations: usize,
    pub releases: usize,
    pub failed_allocations: usize,
    pub invalid_releases: usize,
    pub splits: usize,
    pub merges: usize,
    pub peak_used_bytes: usize,
}

/// Detailed memory statistics reporter
#[cfg(feature = "tracking")]
pub struct MemoryStatsReporter;

#[cfg(feature = "tracking")]
impl MemoryStatsReporter {
    /// Print detailed allocation failure statistics
    /// This is a standalone function to keep allocation logic clean
    #[allow(unused_variables)]
    pub fn print_alloc_failure_stats(stats: &BuddyStats, arena_order: usize, request: usize) {
        #[cfg(feature = "log")]
        use log::error;
        error!("========================================");
        error!(
            "Request: {} bytes (order {} arena, {} bytes)",
            request,
            arena_order,
            block_size(arena_order)
        );
        error!("  Free bytes: {}", stats.free_bytes);
        error!(
            "  Used bytes: {} ({} requested)",
            stats.used_bytes, stats.requested_bytes
        );
        error!("  Live allocations: {}", stats.live_allocations);
        error!("  Free blocks by order:");

        for order in (0..=arena_order).rev() {
            let count = stats.free_blocks_by_order[order];
            if count > 0 {
                error!(
                    "    Order {}: {} blocks ({} bytes each)",
                    order,
                    count,
                    block_size(order)
                );
            }
        }
        error!("========================================");
    }
}
