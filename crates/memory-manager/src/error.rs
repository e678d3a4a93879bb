// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the arena allocator.

/// Errors that can occur while reserving, allocating from, or freeing to
/// an [`Arena`](crate::Arena).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// The block (header included) does not fit in the remaining capacity.
    #[error("insufficient memory: block of {requested_bytes} bytes, {available_bytes} available (capacity: {capacity_bytes})")]
    InsufficientMemory {
        requested_bytes: usize,
        available_bytes: usize,
        capacity_bytes: usize,
    },

    /// Attempted to allocate a zero-sized block.
    #[error("cannot allocate zero-sized block")]
    ZeroSizedAllocation,

    /// The arena was configured with zero capacity.
    #[error("arena capacity must be non-zero")]
    ZeroCapacity,

    /// The requested capacity exceeds what block offsets can address.
    #[error("arena capacity {requested_bytes} exceeds the addressable maximum {max_bytes}")]
    CapacityTooLarge {
        requested_bytes: usize,
        max_bytes: usize,
    },

    /// The backing buffer could not be reserved at startup.
    #[error("cannot reserve {capacity_bytes} bytes for the arena")]
    ReservationFailed { capacity_bytes: usize },

    /// A block header failed its integrity check (double free, stale
    /// handle, or overwritten header). The free was refused.
    #[error("block at offset {offset} failed integrity check: {detail}")]
    Corruption { offset: usize, detail: &'static str },

    /// The critical section could not be entered within its spin bound.
    #[error("arena critical section busy after {spins} spins")]
    Contended { spins: u32 },

    /// A capacity string could not be parsed.
    #[error("invalid capacity '{input}': {detail}")]
    InvalidBudget { input: String, detail: String },
}

impl MemoryError {
    /// Returns `true` for integrity failures that are counted as leak events.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption { .. })
    }
}
