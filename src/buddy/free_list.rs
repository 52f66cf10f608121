//! Offset-linked free list stored inside the arena
//!
//! Each free block carries its own `prev`/`next` links right after its header
//! byte. Links are arena offsets encoded as little-endian `u32`, so the list
//! never holds a machine pointer. The sentinel lives outside the arena in the
//! `FreeList` value itself.

#[cfg(feature = "log")]
use log::error;

use super::buddy_block::{BlockHeader, HEADER_SIZE, LINK_SIZE};

const PREV_FIELD: usize = HEADER_SIZE;
const NEXT_FIELD: usize = HEADER_SIZE + LINK_SIZE;
const SENTINEL_LINK: u32 = u32::MAX;

/// A link from one list node to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    /// The list's own sentinel.
    Sentinel,
    /// A free block at this arena offset.
    Block(usize),
}

impl Link {
    fn encode(self) -> u32 {
        match self {
            Link::Sentinel => SENTINEL_LINK,
            Link::Block(offset) => {
                debug_assert!(offset < SENTINEL_LINK as usize);
                offset as u32
            }
        }
    }

    fn decode(raw: u32) -> Self {
        if raw == SENTINEL_LINK {
            Link::Sentinel
        } else {
            Link::Block(raw as usize)
        }
    }
}

fn read_link(bytes: &[u8], offset: usize, field: usize) -> Link {
    let start = offset + field;
    let mut raw = [0u8; LINK_SIZE];
    raw.copy_from_slice(&bytes[start..start + LINK_SIZE]);
    Link::decode(u32::from_le_bytes(raw))
}

fn write_link(bytes: &mut [u8], offset: usize, field: usize, link: Link) {
    let start = offset + field;
    bytes[start..start + LINK_SIZE].copy_from_slice(&link.encode().to_le_bytes());
}

/// Circular doubly-linked list of free blocks of one order.
///
/// The list value is the sentinel: `next` is the head, `prev` is the tail.
/// The list is empty when the sentinel's `next` points back at itself.
#[derive(Debug)]
pub struct FreeList {
    order: usize,
    next: Link,
    prev: Link,
    len: usize,
}

impl FreeList {
    /// Create a new empty free list for blocks of `order`
    pub const fn new(order: usize) -> Self {
        Self {
            order,
            next: Link::Sentinel,
            prev: Link::Sentinel,
            len: 0,
        }
    }

    /// The order of every block on this list.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.next == Link::Sentinel
    }

    /// Get the length of the list
    pub fn len(&self) -> usize {
        self.len
    }

    /// Offset of the first block, if any.
    pub fn head(&self) -> Option<usize> {
        match self.next {
            Link::Sentinel => None,
            Link::Block(offset) => Some(offset),
        }
    }

    /// Mark the block at `offset` free and insert it at the head.
    pub fn push_front(&mut self, bytes: &mut [u8], offset: usize) {
        bytes[offset] = BlockHeader::free(self.order).to_byte();

        let old_head = self.next;
        write_link(bytes, offset, PREV_FIELD, Link::Sentinel);
        write_link(bytes, offset, NEXT_FIELD, old_head);

        match old_head {
            Link::Block(head) => write_link(bytes, head, PREV_FIELD, Link::Block(offset)),
            Link::Sentinel => self.prev = Link::Block(offset),
        }
        self.next = Link::Block(offset);
        self.len += 1;
    }

    /// Pop the block at the head of the list
    pub fn pop_front(&mut self, bytes: &mut [u8]) -> Option<usize> {
        let head = self.head()?;
        self.unlink(bytes, head);
        Some(head)
    }

    /// Remove the block at `offset` from the list (O(1) operation)
    ///
    /// The block must currently be on this list; its own links locate its
    /// neighbours.
    pub fn unlink(&mut self, bytes: &mut [u8], offset: usize) {
        let prev = read_link(bytes, offset, PREV_FIELD);
        let next = read_link(bytes, offset, NEXT_FIELD);

        match prev {
            Link::Block(p) => write_link(bytes, p, NEXT_FIELD, next),
            Link::Sentinel => self.next = next,
        }
        match next {
            Link::Block(n) => write_link(bytes, n, PREV_FIELD, prev),
            Link::Sentinel => self.prev = prev,
        }

        if self.len == 0 {
            error!("order {}: unlink of {:#x} from an empty list", self.order, offset);
        } else {
            self.len -= 1;
        }
    }

    /// Get iterator over block offsets, head first
    pub fn iter<'a>(&self, bytes: &'a [u8]) -> FreeListIter<'a> {
        FreeListIter {
            bytes,
            current: self.next,
            remaining: self.len,
        }
    }
}

/// Iterator for FreeList
///
/// Stops after `len` blocks even if the links form a cycle.
pub struct FreeListIter<'a> {
    bytes: &'a [u8],
    current: Link,
    remaining: usize,
}

impl Iterator for FreeListIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current {
            Link::Block(offset) if self.remaining > 0 => {
                self.remaining -= 1;
                self.current = read_link(self.bytes, offset, NEXT_FIELD);
                Some(offset)
            }
            _ => None,
        }
    }
}

impl FreeListIter<'_> {
    /// Whether the walk ended on the sentinel, i.e. the list is not longer
    /// than its recorded length.
    pub fn ended_at_sentinel(&self) -> bool {
        self.current == Link::Sentinel
    }
}
