//! Buddy allocator over one fixed arena
//!
//! Combines the split/coalesce engine with the allocation registry: every
//! live block is recorded by offset, which is how `release` tells a valid
//! handle from a double free or a foreign pointer.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::{AllocError, AllocResult};

#[cfg(feature = "log")]
use log::{debug, warn};

use super::{
    arena::Handle,
    buddy_block::{block_size, order_for_size, BuddyBlock, MIN_ORDER},
    buddy_set::BuddySet,
    stats::{ArenaReport, BuddyStats, FreeOrder, LiveAllocation},
};

#[cfg(feature = "tracking")]
use super::stats::{MemoryStatsReporter, UsageStats};

/// Registry entry for one live block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Allocation {
    order: usize,
    requested: usize,
}

/// Buddy allocator owning a single 2^M byte arena
///
/// All operations take `&mut self` or `&self`; the allocator is a plain value
/// with no internal locking.
pub struct BuddyAllocator {
    set: BuddySet,
    /// Live blocks keyed by header offset
    registry: BTreeMap<usize, Allocation>,
    show_details: bool,
    #[cfg(feature = "tracking")]
    usage: UsageStats,
}

impl BuddyAllocator {
    /// Create an allocator over a fresh arena of 2^`order` bytes.
    ///
    /// Fails with [`AllocError::InvalidOrder`] when `order` is outside
    /// `MIN_ORDER..=MAX_ORDER`.
    pub fn new(order: usize) -> AllocResult<Self> {
        Ok(Self {
            set: BuddySet::new(order)?,
            registry: BTreeMap::new(),
            show_details: false,
            #[cfg(feature = "tracking")]
            usage: UsageStats::default(),
        })
    }

    /// Log the arena report after every successful allocate and release.
    pub fn show_details(&mut self, show: bool) {
        self.show_details = show;
    }

    /// Order of the whole arena.
    pub fn order(&self) -> usize {
        self.set.max_order()
    }

    /// Size of the arena in bytes.
    pub fn total_bytes(&self) -> usize {
        block_size(self.order())
    }

    /// Bytes held by live blocks, headers and rounding included.
    pub fn used_bytes(&self) -> usize {
        self.registry
            .values()
            .map(|allocation| block_size(allocation.order))
            .sum()
    }

    /// Bytes held by free blocks.
    pub fn free_bytes(&self) -> usize {
        self.total_bytes() - self.used_bytes()
    }

    /// Number of live allocations.
    pub fn live_count(&self) -> usize {
        self.registry.len()
    }

    /// Allocate a block with room for `size` payload bytes.
    pub fn allocate(&mut self, size: usize) -> AllocResult<Handle> {
        if size == 0 {
            warn!("buddy allocator: zero-byte allocation request");
            return Err(AllocError::InvalidParam);
        }

        let order = match order_for_size(size) {
            Some(order) if order <= self.order() => order,
            _ => {
                warn!(
                    "buddy allocator: {} bytes exceeds the order {} arena",
                    size,
                    self.order()
                );
                return Err(AllocError::TooLarge);
            }
        };

        let (block, _splits) = match self.set.alloc_block(order) {
            Ok(found) => found,
            Err(err) => {
                debug!(
                    "buddy allocator: allocation failure: {} bytes (order {})",
                    size, order
                );
                #[cfg(feature = "tracking")]
                {
                    self.usage.failed_allocations += 1;
                    MemoryStatsReporter::print_alloc_failure_stats(
                        &self.stats(),
                        self.order(),
                        size,
                    );
                }
                return Err(err);
            }
        };

        self.registry.insert(
            block.offset,
            Allocation {
                order,
                requested: size,
            },
        );

        #[cfg(feature = "tracking")]
        {
            self.usage.allocations += 1;
            self.usage.splits += _splits;
            self.usage.peak_used_bytes = self.usage.peak_used_bytes.max(self.used_bytes());
        }

        let handle = self.set.arena().handle_of(block.offset);
        if self.show_details {
            debug!(
                "allocated {} bytes at {:#x} (order {})\n{}",
                size,
                handle.addr(),
                order,
                self.describe()
            );
        }
        Ok(handle)
    }

    /// Release a block previously returned by [`allocate`](Self::allocate).
    ///
    /// Fails with [`AllocError::NotAllocated`] for a handle that is not live:
    /// already released, from another arena, or never returned at all.
    pub fn release(&mut self, handle: Handle) -> AllocResult {
        let Some((offset, allocation)) = self.take_registered(handle) else {
            warn!(
                "buddy allocator: release of {:#x}: not a live allocation",
                handle.addr()
            );
            #[cfg(feature = "tracking")]
            {
                self.usage.invalid_releases += 1;
            }
            return Err(AllocError::NotAllocated);
        };

        let (_landed, _merges) = self
            .set
            .free_block(BuddyBlock::new(allocation.order, offset));

        #[cfg(feature = "tracking")]
        {
            self.usage.releases += 1;
            self.usage.merges += _merges;
        }

        if self.show_details {
            debug!(
                "released {:#x} into order {} block at {:#x}\n{}",
                handle.addr(),
                _landed.order,
                _landed.offset,
                self.describe()
            );
        }
        Ok(())
    }

    fn take_registered(&mut self, handle: Handle) -> Option<(usize, Allocation)> {
        let offset = self.set.arena().offset_of(handle)?;
        let allocation = self.registry.remove(&offset)?;
        Some((offset, allocation))
    }

    fn live_block(&self, handle: Handle) -> AllocResult<BuddyBlock> {
        let offset = self
            .set
            .arena()
            .offset_of(handle)
            .ok_or(AllocError::NotAllocated)?;
        let allocation = self
            .registry
            .get(&offset)
            .ok_or(AllocError::NotAllocated)?;
        Ok(BuddyBlock::new(allocation.order, offset))
    }

    /// Usable bytes of a live allocation.
    pub fn capacity(&self, handle: Handle) -> AllocResult<usize> {
        self.live_block(handle)
            .map(|block| self.set.arena().payload(block).len())
    }

    /// Payload of a live allocation.
    pub fn payload(&self, handle: Handle) -> AllocResult<&[u8]> {
        let block = self.live_block(handle)?;
        Ok(self.set.arena().payload(block))
    }

    /// Mutable payload of a live allocation.
    pub fn payload_mut(&mut self, handle: Handle) -> AllocResult<&mut [u8]> {
        let block = self.live_block(handle)?;
        Ok(self.set.arena_mut().payload_mut(block))
    }

    /// Snapshot of live allocations and free blocks.
    pub fn describe(&self) -> ArenaReport {
        let arena = self.set.arena();
        let live = self
            .registry
            .iter()
            .map(|(&offset, allocation)| LiveAllocation {
                handle: arena.handle_of(offset),
                offset,
                order: allocation.order,
                requested: allocation.requested,
            })
            .collect();

        let free = (MIN_ORDER..=self.order())
            .filter(|&order| !arena.free_list(order).is_empty())
            .map(|order| FreeOrder {
                order,
                offsets: arena.free_offsets(order).collect(),
            })
            .collect();

        ArenaReport {
            order: self.order(),
            live,
            free,
        }
    }

    /// Byte accounting for the arena.
    pub fn stats(&self) -> BuddyStats {
        let mut stats = BuddyStats::new();
        stats.total_bytes = self.total_bytes();

        for order in MIN_ORDER..=self.order() {
            let count = self.set.get_order_block_count(order);
            stats.free_blocks_by_order[order] = count;
            stats.free_bytes += count * block_size(order);
        }

        stats.used_bytes = stats.total_bytes.saturating_sub(stats.free_bytes);
        stats.requested_bytes = self.registry.values().map(|a| a.requested).sum();
        stats.live_allocations = self.registry.len();
        stats
    }

    /// Running counters since construction.
    #[cfg(feature = "tracking")]
    pub fn usage(&self) -> UsageStats {
        self.usage
    }

    /// Check free lists, headers and the registry against each other.
    ///
    /// Returns `false` and logs the first violation if any block is
    /// misplaced, overlapping, unaccounted for or mislabelled.
    pub fn is_consistent(&self) -> bool {
        let allocated: Vec<BuddyBlock> = self
            .registry
            .iter()
            .map(|(&offset, allocation)| BuddyBlock::new(allocation.order, offset))
            .collect();
        self.set.check_consistency(allocated)
    }
}
