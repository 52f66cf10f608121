//! Split and coalesce over a single arena
//!
//! Implements the core buddy system: taking a block of a given order out of
//! the free lists (splitting larger blocks on the way down) and returning a
//! block (merging with free buddies on the way up).

use alloc::vec::Vec;

use crate::{is_aligned, AllocError, AllocResult};

#[cfg(feature = "log")]
use log::{error, trace};

use super::{
    arena::Arena,
    buddy_block::{BlockHeader, BuddyBlock, MIN_ORDER},
};

/// A buddy set implementation - the free-list side of one arena
pub struct BuddySet {
    arena: Arena,
}

impl BuddySet {
    /// Create a buddy set over a fresh arena of 2^`order` bytes
    pub fn new(order: usize) -> AllocResult<Self> {
        Ok(Self {
            arena: Arena::new(order)?,
        })
    }

    pub fn max_order(&self) -> usize {
        self.arena.order()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Take a block of exactly `order` out of the free lists.
    ///
    /// Returns the block together with the number of splits performed.
    /// The block's header is marked allocated.
    pub fn alloc_block(&mut self, order: usize) -> AllocResult<(BuddyBlock, usize)> {
        if order > self.max_order() {
            return Err(AllocError::TooLarge);
        }

        // Try to find a block of the required order or higher
        let found = (order..=self.max_order()).find(|&o| !self.arena.free_list(o).is_empty());
        let Some(found) = found else {
            return Err(AllocError::NoMemory);
        };

        let Some(mut block) = self.arena.pop_free(found) else {
            error!("order {}: list reported non-empty but had no head", found);
            return Err(AllocError::NoMemory);
        };

        // Split down to required order, keeping the lower half
        let mut splits = 0;
        while block.order > order {
            let (low, high) = block.split();
            trace!(
                "split {:#x}/{} -> {:#x}/{} + {:#x}/{}",
                block.offset,
                block.order,
                low.offset,
                low.order,
                high.offset,
                high.order
            );
            self.arena.push_free(high);
            block = low;
            splits += 1;
        }

        self.arena
            .set_header(block.offset, BlockHeader::allocated(block.order));
        Ok((block, splits))
    }

    /// Return `block` to the free lists, merging with free buddies.
    ///
    /// Returns the block that finally lands on a free list and the number of
    /// merges performed.
    pub fn free_block(&mut self, block: BuddyBlock) -> (BuddyBlock, usize) {
        let mut current = block;
        let mut merges = 0;

        while current.order < self.max_order() {
            let buddy = BuddyBlock::new(current.order, current.buddy_offset());
            let header = self.arena.header(buddy.offset);

            // An allocated buddy, or a free one that is itself split further,
            // ends the merge.
            if !header.is_free || header.order != current.order {
                break;
            }

            self.arena.unlink_free(buddy);
            trace!(
                "merge {:#x} + {:#x} at order {}",
                current.offset,
                buddy.offset,
                current.order
            );
            current = current.parent();
            merges += 1;
        }

        self.arena.push_free(current);
        (current, merges)
    }

    /// Get the number of blocks in a specific order
    pub fn get_order_block_count(&self, order: usize) -> usize {
        if order <= self.max_order() {
            self.arena.free_list(order).len()
        } else {
            0
        }
    }

    /// Free blocks of every order, lowest order first, list order within an
    /// order.
    pub fn free_blocks(&self) -> Vec<BuddyBlock> {
        (MIN_ORDER..=self.max_order())
            .flat_map(|order| {
                self.arena
                    .free_offsets(order)
                    .map(move |offset| BuddyBlock::new(order, offset))
            })
            .collect()
    }

    /// Walk every free list and check it against the block headers, then
    /// check that free and `allocated` blocks tile the arena exactly.
    pub fn check_consistency<I>(&self, allocated: I) -> bool
    where
        I: IntoIterator<Item = BuddyBlock>,
    {
        let mut blocks = Vec::new();

        for order in MIN_ORDER..=self.max_order() {
            let mut iter = self.arena.free_offsets(order);
            for offset in iter.by_ref() {
                if offset >= self.arena.size() || !is_aligned(offset, 1 << order) {
                    error!("order {}: free block {:#x} misplaced", order, offset);
                    return false;
                }
                let header = self.arena.header(offset);
                if header != BlockHeader::free(order) {
                    error!(
                        "order {}: free block {:#x} has header {:?}",
                        order, offset, header
                    );
                    return false;
                }
                blocks.push(BuddyBlock::new(order, offset));
            }
            if !iter.ended_at_sentinel() {
                error!(
                    "order {}: list longer than its length {}",
                    order,
                    self.arena.free_list(order).len()
                );
                return false;
            }
        }

        for block in allocated {
            if !is_aligned(block.offset, block.size()) {
                error!("allocated block {:#x}/{} misaligned", block.offset, block.order);
                return false;
            }
            let header = self.arena.header(block.offset);
            if header != BlockHeader::allocated(block.order) {
                error!(
                    "allocated block {:#x} has header {:?}",
                    block.offset, header
                );
                return false;
            }
            blocks.push(block);
        }

        blocks.sort_unstable_by_key(|block| block.offset);
        let mut expected = 0;
        for block in &blocks {
            if block.offset != expected {
                error!(
                    "block {:#x}/{} does not start at {:#x}",
                    block.offset, block.order, expected
                );
                return false;
            }
            expected = block.end();
        }
        if expected != self.arena.size() {
            error!("blocks cover {:#x} of {:#x} bytes", expected, self.arena.size());
            return false;
        }
        true
    }
}
