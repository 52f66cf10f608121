//! Buddy block metadata
//!
//! Represents a block of the arena by its offset and order, and the one-byte
//! header stored at the front of every block.

use core::cmp::PartialOrd;

/// Bytes reserved at the front of every block for its header.
pub const HEADER_SIZE: usize = 1;

/// Size of one free-list link stored inside a free block.
pub(crate) const LINK_SIZE: usize = core::mem::size_of::<u32>();

/// Bytes a free block needs for its header and both list links.
pub(crate) const FREE_BLOCK_FOOTPRINT: usize = HEADER_SIZE + 2 * LINK_SIZE;

/// Smallest block order (16 bytes).
pub const MIN_ORDER: usize = FREE_BLOCK_FOOTPRINT.next_power_of_two().trailing_zeros() as usize;

/// Largest supported arena order. Block offsets must fit in a `u32` link
/// with `u32::MAX` left over for the sentinel.
pub const MAX_ORDER: usize = 31;

const FREE_BIT: u8 = 0x80;
const ORDER_MASK: u8 = 0x3f;

/// Size in bytes of a block of the given order.
#[inline]
pub const fn block_size(order: usize) -> usize {
    1 << order
}

/// Smallest order whose block can hold `size` payload bytes plus the header.
///
/// Returns `None` when the block size cannot be represented.
pub const fn order_for_size(size: usize) -> Option<usize> {
    let required = match size.checked_add(HEADER_SIZE) {
        Some(required) => required,
        None => return None,
    };
    let order = match required.checked_next_power_of_two() {
        Some(block) => block.trailing_zeros() as usize,
        None => return None,
    };
    if order < MIN_ORDER {
        Some(MIN_ORDER)
    } else {
        Some(order)
    }
}

/// The header byte at the start of every block.
///
/// Bit 7 holds the free flag, bits 0..=5 the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub order: usize,
    pub is_free: bool,
}

impl BlockHeader {
    pub const fn free(order: usize) -> Self {
        Self {
            order,
            is_free: true,
        }
    }

    pub const fn allocated(order: usize) -> Self {
        Self {
            order,
            is_free: false,
        }
    }

    pub const fn to_byte(self) -> u8 {
        let flag = if self.is_free { FREE_BIT } else { 0 };
        flag | (self.order as u8 & ORDER_MASK)
    }

    pub const fn from_byte(byte: u8) -> Self {
        Self {
            order: (byte & ORDER_MASK) as usize,
            is_free: byte & FREE_BIT != 0,
        }
    }
}

/// Buddy block metadata
#[derive(Debug, Clone, Copy)]
pub struct BuddyBlock {
    pub order: usize,
    /// Offset of the block's header from the arena base.
    pub offset: usize,
}

impl BuddyBlock {
    /// Create a new buddy block
    pub const fn new(order: usize, offset: usize) -> Self {
        Self { order, offset }
    }

    /// Size of this block in bytes, header included
    pub const fn size(&self) -> usize {
        block_size(self.order)
    }

    /// Calculate the buddy offset for this block
    /// The buddy is the other half of the parent block at the next higher order
    /// For a block at order k with offset O, its buddy is at O ^ 2^k
    pub const fn buddy_offset(&self) -> usize {
        self.offset ^ block_size(self.order)
    }

    /// The block this one and its buddy were split from.
    pub const fn parent(&self) -> Self {
        Self {
            order: self.order + 1,
            offset: self.offset & !block_size(self.order),
        }
    }

    /// Split into the lower half (same offset) and the upper half (its buddy).
    pub const fn split(&self) -> (Self, Self) {
        let order = self.order - 1;
        (
            Self::new(order, self.offset),
            Self::new(order, self.offset ^ block_size(order)),
        )
    }

    /// Offset one past the last byte of this block.
    pub const fn end(&self) -> usize {
        self.offset + self.size()
    }
}

impl PartialOrd for BuddyBlock {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        self.offset.partial_cmp(&other.offset)
    }
}

impl PartialEq for BuddyBlock {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.order == other.order
    }
}

impl Eq for BuddyBlock {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_order_holds_free_block() {
        assert_eq!(MIN_ORDER, 4);
        assert!(block_size(MIN_ORDER) >= FREE_BLOCK_FOOTPRINT);
        assert!(block_size(MIN_ORDER) > HEADER_SIZE);
        assert!(block_size(MAX_ORDER) - 1 < u32::MAX as usize);
    }

    #[test]
    fn test_order_for_size() {
        assert_eq!(order_for_size(1), Some(MIN_ORDER));
        assert_eq!(order_for_size(11), Some(4));
        assert_eq!(order_for_size(15), Some(4));
        assert_eq!(order_for_size(16), Some(5));
        assert_eq!(order_for_size(255), Some(8));
        assert_eq!(order_for_size(256), Some(9));
        assert_eq!(order_for_size(usize::MAX), None);
        assert_eq!(order_for_size(usize::MAX / 2 + 1), None);
    }

    #[test]
    fn test_header_byte() {
        let free = BlockHeader::free(31);
        assert_eq!(BlockHeader::from_byte(free.to_byte()), free);

        let used = BlockHeader::allocated(4);
        assert_eq!(used.to_byte(), 4);
        assert_eq!(BlockHeader::from_byte(used.to_byte()), used);

        assert_eq!(BlockHeader::from_byte(0), BlockHeader::allocated(0));
    }

    #[test]
    fn test_buddy_math() {
        let block = BuddyBlock::new(4, 0x30);
        assert_eq!(block.buddy_offset(), 0x20);
        assert_eq!(block.parent(), BuddyBlock::new(5, 0x20));

        let (low, high) = BuddyBlock::new(8, 0).split();
        assert_eq!(low, BuddyBlock::new(7, 0));
        assert_eq!(high, BuddyBlock::new(7, 0x80));
        assert_eq!(low.buddy_offset(), high.offset);
        assert_eq!(high.buddy_offset(), low.offset);
        assert_eq!(low.parent(), high.parent());
        assert_eq!(high.end(), 0x100);
        assert!(low < high);
    }
}
