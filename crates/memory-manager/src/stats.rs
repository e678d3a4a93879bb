// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Arena usage counters.
//!
//! [`ArenaStats`] is a plain snapshot: reading it has no side effects on the
//! arena. Byte counts include the per-block header.

/// Point-in-time counters for an [`Arena`](crate::Arena).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ArenaStats {
    /// Fixed capacity in bytes.
    pub capacity_bytes: usize,
    /// Bytes held by live blocks, headers included.
    pub allocated_bytes: usize,
    /// High-water mark of `allocated_bytes`.
    pub peak_allocated_bytes: usize,
    /// Successful allocations since startup.
    pub allocation_count: u64,
    /// Successful frees since startup.
    pub free_count: u64,
    /// Allocation requests refused for lack of space.
    pub failed_allocations: u64,
    /// Suspected leaks plus refused (corrupt) frees.
    pub leak_count: u64,
    /// Blocks currently on the live list.
    pub live_blocks: usize,
}

impl ArenaStats {
    pub(crate) fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            ..Self::default()
        }
    }

    /// Bytes still available to allocations.
    pub fn free_bytes(&self) -> usize {
        self.capacity_bytes.saturating_sub(self.allocated_bytes)
    }

    /// Fraction of capacity in use, in `[0.0, 1.0]`.
    pub fn utilisation(&self) -> f64 {
        if self.capacity_bytes == 0 {
            return 0.0;
        }
        self.allocated_bytes as f64 / self.capacity_bytes as f64
    }

    pub(crate) fn record_allocation(&mut self, total_bytes: usize) {
        self.allocated_bytes += total_bytes;
        self.allocation_count += 1;
        self.live_blocks += 1;
        if self.allocated_bytes > self.peak_allocated_bytes {
            self.peak_allocated_bytes = self.allocated_bytes;
        }
    }

    pub(crate) fn record_free(&mut self, total_bytes: usize) {
        self.allocated_bytes -= total_bytes;
        self.free_count += 1;
        self.live_blocks -= 1;
    }

    /// Returns a one-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "Arena: {} / {} KB used ({:.0}%), peak {} KB, {} allocs, {} frees, \
             {} live, {} failed, {} leaks",
            self.allocated_bytes / 1024,
            self.capacity_bytes / 1024,
            self.utilisation() * 100.0,
            self.peak_allocated_bytes / 1024,
            self.allocation_count,
            self.free_count,
            self.live_blocks,
            self.failed_allocations,
            self.leak_count,
        )
    }
}
