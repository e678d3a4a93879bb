// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! In-band block headers and the typed handle returned by the arena.
//!
//! Every live block is laid out as:
//!
//! ```text
//! offset ──► ┌──────────────┬──────────────────────────┐
//!            │ BlockHeader  │ data (size, 8-aligned)   │
//!            │ 32 bytes     │                          │
//!            └──────────────┴──────────────────────────┘
//! ```
//!
//! A [`BlockHandle`] records the header offset and the generation stamped
//! into the header at allocation. It is neither `Copy` nor `Clone`, so
//! freeing it twice is a compile error; a handle that outlives its block in
//! some other way is caught by the generation check.

/// Integrity tag written into every live header.
pub const BLOCK_MAGIC: u32 = 0xABCD_EF01;

/// Allocation granularity and buffer alignment.
pub const ALIGNMENT: usize = 8;

/// Size of the in-band header preceding each data region.
pub const HEADER_SIZE: usize = std::mem::size_of::<BlockHeader>();

/// Sentinel for "no next block" in the live list.
pub(crate) const NIL: u32 = u32::MAX;

/// Set once a block has been counted as a suspected leak.
pub(crate) const FLAG_LEAK_REPORTED: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockHeader {
    pub tag: u32,
    pub generation: u32,
    /// Data size, already rounded to [`ALIGNMENT`].
    pub size: u32,
    /// Offset of the next (older) live block, or [`NIL`].
    pub next: u32,
    /// Nanoseconds since the arena epoch.
    pub created_nanos: u64,
    pub flags: u32,
    _reserved: u32,
}

impl BlockHeader {
    pub(crate) fn new(generation: u32, size: u32, next: u32, created_nanos: u64) -> Self {
        Self {
            tag: BLOCK_MAGIC,
            generation,
            size,
            next,
            created_nanos,
            flags: 0,
            _reserved: 0,
        }
    }

    /// Header plus data, in bytes.
    pub(crate) fn total_size(&self) -> usize {
        HEADER_SIZE + self.size as usize
    }
}

/// A checked reference to one live arena block.
///
/// Obtained from [`Arena::allocate`](crate::Arena::allocate) and consumed by
/// [`Arena::free`](crate::Arena::free).
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a dropped handle leaks its block until the arena is rebuilt"]
pub struct BlockHandle {
    /// Id of the arena that issued the handle.
    pub(crate) arena: u32,
    pub(crate) offset: u32,
    pub(crate) generation: u32,
    pub(crate) size: u32,
    pub(crate) requested: u32,
}

impl BlockHandle {
    /// Usable length of the data region (the size originally requested).
    pub fn len(&self) -> usize {
        self.requested as usize
    }

    /// Always `false`: zero-sized blocks are rejected at allocation.
    pub fn is_empty(&self) -> bool {
        self.requested == 0
    }

    /// Bytes this block charges against capacity, header included.
    pub fn footprint(&self) -> usize {
        HEADER_SIZE + self.size as usize
    }

    /// Offset of the block header within the arena buffer.
    pub fn offset(&self) -> usize {
        self.offset as usize
    }
}

/// Rounds `size` up to [`ALIGNMENT`], or `None` on overflow.
pub(crate) fn align_up(size: usize) -> Option<usize> {
    size.checked_add(ALIGNMENT - 1).map(|s| s & !(ALIGNMENT - 1))
}
