//! Arena backing buffer and free-list table
//!
//! The arena owns one 2^M byte buffer aligned to 2^M and the free list of
//! every order. Blocks are addressed by their offset from the arena base,
//! which keeps buddy computation a plain XOR on integers.

use alloc::alloc::{alloc_zeroed, dealloc};
use core::alloc::Layout;
use core::ptr::NonNull;

use crate::{AllocError, AllocResult};

#[cfg(feature = "log")]
use log::{debug, error};

use super::{
    buddy_block::{block_size, BlockHeader, BuddyBlock, HEADER_SIZE, MAX_ORDER, MIN_ORDER},
    free_list::{FreeList, FreeListIter},
};

/// Handle to a live allocation: the address of its first payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(pub(crate) NonNull<u8>);

impl Handle {
    /// Pointer to the first payload byte.
    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    /// Address of the first payload byte.
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

/// Owned, size-aligned byte buffer.
struct ArenaBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl ArenaBuffer {
    fn new(order: usize) -> AllocResult<Self> {
        let size = block_size(order);
        let layout = Layout::from_size_align(size, size).map_err(|_| {
            error!("arena order {} has no valid layout on this platform", order);
            AllocError::InvalidOrder
        })?;

        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            error!("failed to reserve {:#x} bytes for the arena", size);
            AllocError::NoMemory
        })?;

        Ok(Self { ptr, layout })
    }

    fn len(&self) -> usize {
        self.layout.size()
    }

    fn bytes(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) }
    }
}

impl Drop for ArenaBuffer {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// The arena: backing buffer plus one free list per order.
pub struct Arena {
    buffer: ArenaBuffer,
    order: usize,
    /// Free lists for each order; only `MIN_ORDER..=order` are used
    free_lists: [FreeList; MAX_ORDER + 1],
}

impl Arena {
    /// Create an arena of 2^`order` bytes holding a single free block.
    pub fn new(order: usize) -> AllocResult<Self> {
        if !(MIN_ORDER..=MAX_ORDER).contains(&order) {
            error!(
                "arena order {} outside supported range [{}, {}]",
                order, MIN_ORDER, MAX_ORDER
            );
            return Err(AllocError::InvalidOrder);
        }

        let mut arena = Self {
            buffer: ArenaBuffer::new(order)?,
            order,
            free_lists: core::array::from_fn(FreeList::new),
        };
        arena.push_free(BuddyBlock::new(order, 0));

        debug!(
            "arena: {:#x} bytes at {:#x}",
            arena.size(),
            arena.base_addr()
        );
        Ok(arena)
    }

    /// Order of the whole arena.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Size of the arena in bytes.
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Address of the first arena byte.
    pub fn base_addr(&self) -> usize {
        self.buffer.ptr.as_ptr() as usize
    }

    /// Read the header of the block at `offset`.
    pub fn header(&self, offset: usize) -> BlockHeader {
        BlockHeader::from_byte(self.buffer.bytes()[offset])
    }

    /// Overwrite the header of the block at `offset`.
    pub fn set_header(&mut self, offset: usize, header: BlockHeader) {
        self.buffer.bytes_mut()[offset] = header.to_byte();
    }

    /// Get the free list for `order`
    pub fn free_list(&self, order: usize) -> &FreeList {
        &self.free_lists[order]
    }

    /// Offsets of the free blocks of `order`, head first.
    pub fn free_offsets(&self, order: usize) -> FreeListIter<'_> {
        self.free_lists[order].iter(self.buffer.bytes())
    }

    /// Mark `block` free and push it at the head of its list.
    pub fn push_free(&mut self, block: BuddyBlock) {
        self.free_lists[block.order].push_front(self.buffer.bytes_mut(), block.offset);
    }

    /// Pop the head of the free list for `order`.
    pub fn pop_free(&mut self, order: usize) -> Option<BuddyBlock> {
        self.free_lists[order]
            .pop_front(self.buffer.bytes_mut())
            .map(|offset| BuddyBlock::new(order, offset))
    }

    /// Remove a free `block` from wherever it sits in its list.
    pub fn unlink_free(&mut self, block: BuddyBlock) {
        self.free_lists[block.order].unlink(self.buffer.bytes_mut(), block.offset);
    }

    /// Handle for the block whose header is at `offset`.
    pub fn handle_of(&self, offset: usize) -> Handle {
        debug_assert!(offset + HEADER_SIZE < self.size());
        let ptr = unsafe { self.buffer.ptr.as_ptr().add(offset + HEADER_SIZE) };
        Handle(unsafe { NonNull::new_unchecked(ptr) })
    }

    /// Block offset for `handle`, or `None` if it cannot point into this arena.
    pub fn offset_of(&self, handle: Handle) -> Option<usize> {
        let relative = handle.addr().checked_sub(self.base_addr())?;
        if relative >= self.size() {
            return None;
        }
        relative.checked_sub(HEADER_SIZE)
    }

    /// Payload bytes of `block` (everything after its header).
    pub fn payload(&self, block: BuddyBlock) -> &[u8] {
        &self.buffer.bytes()[block.offset + HEADER_SIZE..block.end()]
    }

    /// Mutable payload bytes of `block`.
    pub fn payload_mut(&mut self, block: BuddyBlock) -> &mut [u8] {
        &mut self.buffer.bytes_mut()[block.offset + HEADER_SIZE..block.end()]
    }
}
