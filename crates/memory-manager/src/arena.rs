// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fixed-capacity bump arena with integrity-checked blocks.
//!
//! The [`Arena`] reserves one contiguous, 8-byte-aligned buffer at startup
//! and never grows or returns it until it is dropped. It:
//!
//! 1. Bump-allocates blocks, each preceded by an in-band header carrying an
//!    integrity tag, generation, size and creation time.
//! 2. Keeps live blocks on an intrusive singly-linked list, newest first.
//!    Since blocks are placed at increasing offsets, the list head is always
//!    the highest live block, so freeing it rolls the bump cursor back in
//!    O(1). Freeing every block resets the cursor to zero.
//! 3. Validates every free (tag, generation and size) in one place and
//!    refuses corrupt frees, counting them as leak events.
//! 4. Reports blocks older than the leak age without reclaiming them.
//!
//! # Fragmentation
//! Frees below the top block reduce `allocated_bytes` but cannot move the
//! cursor. Allocation therefore also requires the block to fit between the
//! cursor and the end of the buffer. Per-cycle scratch use, where every
//! block is freed before the next cycle starts, always returns to a cursor
//! of zero.

use crate::block::{
    align_up, BlockHandle, BlockHeader, ALIGNMENT, BLOCK_MAGIC, FLAG_LEAK_REPORTED, HEADER_SIZE,
    NIL,
};
use crate::critical::{CriticalSection, DEFAULT_MAX_SPINS};
use crate::{ArenaStats, MemoryBudget, MemoryError, ScopedBlock};
use std::cell::UnsafeCell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Age after which a live block is reported as a suspected leak.
pub const DEFAULT_LEAK_AGE: Duration = Duration::from_secs(30);

/// Largest capacity whose offsets fit the header's `u32` links.
const MAX_CAPACITY: usize = (NIL as usize) & !(ALIGNMENT - 1);

/// Source of per-arena ids stamped into every handle.
static NEXT_ARENA_ID: AtomicU32 = AtomicU32::new(1);

struct ArenaState {
    /// First byte past the highest live block.
    cursor: usize,
    /// Newest live block, or [`NIL`].
    head: u32,
    next_generation: u32,
    stats: ArenaStats,
}

/// The runtime's single bounded memory region.
///
/// # Example
/// ```
/// use memory_manager::{Arena, MemoryBudget};
///
/// let arena = Arena::new(MemoryBudget::from_kb(64)).unwrap();
///
/// let mut block = arena.allocate(100).unwrap();
/// arena.bytes_mut(&mut block).unwrap()[0] = 7;
/// assert_eq!(arena.bytes(&block).unwrap()[0], 7);
///
/// arena.free(block).unwrap();
/// assert_eq!(arena.stats().allocated_bytes, 0);
/// ```
pub struct Arena {
    id: u32,
    base: NonNull<u64>,
    words: usize,
    capacity: usize,
    leak_age: Duration,
    epoch: Instant,
    section: CriticalSection,
    state: UnsafeCell<ArenaState>,
}

impl Arena {
    /// Reserves an arena with the default leak age.
    pub fn new(budget: MemoryBudget) -> Result<Self, MemoryError> {
        Self::with_leak_age(budget, DEFAULT_LEAK_AGE)
    }

    /// Reserves an arena whose leak scan flags blocks older than `leak_age`.
    ///
    /// The capacity is rounded down to the 8-byte alignment. Fails with
    /// [`MemoryError::ZeroCapacity`] if nothing remains, or
    /// [`MemoryError::ReservationFailed`] if the buffer cannot be reserved.
    pub fn with_leak_age(budget: MemoryBudget, leak_age: Duration) -> Result<Self, MemoryError> {
        let capacity = budget.as_bytes() & !(ALIGNMENT - 1);
        if capacity == 0 {
            return Err(MemoryError::ZeroCapacity);
        }
        if capacity > MAX_CAPACITY {
            return Err(MemoryError::CapacityTooLarge {
                requested_bytes: capacity,
                max_bytes: MAX_CAPACITY,
            });
        }

        let words = capacity / ALIGNMENT;
        let mut storage: Vec<u64> = Vec::new();
        storage
            .try_reserve_exact(words)
            .map_err(|_| MemoryError::ReservationFailed {
                capacity_bytes: capacity,
            })?;
        storage.resize(words, 0);
        let raw = Box::into_raw(storage.into_boxed_slice()) as *mut u64;
        let base = NonNull::new(raw).ok_or(MemoryError::ReservationFailed {
            capacity_bytes: capacity,
        })?;

        tracing::info!(
            "arena reserved: {} ({} bytes, leak age {:?})",
            MemoryBudget::from_bytes(capacity),
            capacity,
            leak_age,
        );

        Ok(Self {
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            base,
            words,
            capacity,
            leak_age,
            epoch: Instant::now(),
            section: CriticalSection::new(DEFAULT_MAX_SPINS),
            state: UnsafeCell::new(ArenaState {
                cursor: 0,
                head: NIL,
                next_generation: 1,
                stats: ArenaStats::with_capacity(capacity),
            }),
        })
    }

    /// Allocates a block of at least `size` bytes.
    ///
    /// The block costs `HEADER_SIZE + align_up(size)` bytes of capacity.
    /// Fails cleanly with [`MemoryError::InsufficientMemory`], leaving the
    /// arena untouched apart from the failure counter.
    pub fn allocate(&self, size: usize) -> Result<BlockHandle, MemoryError> {
        if size == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }

        let _guard = self.section.enter()?;
        // SAFETY: the section guard grants exclusive access to the state.
        let state = unsafe { &mut *self.state.get() };

        let total = align_up(size)
            .filter(|&aligned| aligned <= self.capacity)
            .map(|aligned| aligned + HEADER_SIZE);
        let fits = |total: usize| {
            state.stats.allocated_bytes + total <= self.capacity
                && state.cursor + total <= self.capacity
        };

        let total = match total {
            Some(total) if fits(total) => total,
            _ => {
                state.stats.failed_allocations += 1;
                let available = self.capacity - state.cursor;
                tracing::debug!(
                    "arena allocation of {size} bytes refused: {available} of {} bytes available",
                    self.capacity,
                );
                return Err(MemoryError::InsufficientMemory {
                    requested_bytes: size.saturating_add(HEADER_SIZE),
                    available_bytes: available,
                    capacity_bytes: self.capacity,
                });
            }
        };

        let offset = state.cursor;
        let generation = state.next_generation;
        state.next_generation = generation.wrapping_add(1);
        let aligned = total - HEADER_SIZE;

        let header = BlockHeader::new(generation, aligned as u32, state.head, self.nanos_since_epoch(Instant::now()));
        // SAFETY: `offset + total <= capacity` and `offset` is 8-aligned.
        unsafe { self.write_header(offset, header) };

        state.head = offset as u32;
        state.cursor = offset + total;
        state.stats.record_allocation(total);

        tracing::trace!(offset, size, total, "arena block allocated");

        Ok(BlockHandle {
            arena: self.id,
            offset: offset as u32,
            generation,
            size: aligned as u32,
            requested: size as u32,
        })
    }

    /// Allocates a block that is freed automatically when dropped.
    pub fn allocate_scoped(&self, size: usize) -> Result<ScopedBlock<'_>, MemoryError> {
        let handle = self.allocate(size)?;
        Ok(ScopedBlock::new(self, handle))
    }

    /// Returns a block to the arena.
    ///
    /// The header preceding the data region must carry the integrity tag and
    /// the handle's generation. Otherwise the free is refused with
    /// [`MemoryError::Corruption`], the leak counter is incremented, and the
    /// block's bytes stay accounted as allocated.
    pub fn free(&self, handle: BlockHandle) -> Result<(), MemoryError> {
        let _guard = self.section.enter()?;
        // SAFETY: the section guard grants exclusive access to the state.
        let state = unsafe { &mut *self.state.get() };

        let header = match self.validate(&handle) {
            Ok(header) => header,
            Err(e) => {
                state.stats.leak_count += 1;
                tracing::error!("arena free refused: {e}");
                return Err(e);
            }
        };

        if let Err(e) = self.unlink(state, handle.offset, header.next) {
            state.stats.leak_count += 1;
            tracing::error!("arena free refused: {e}");
            return Err(e);
        }

        let mut cleared = header;
        cleared.tag = 0;
        // SAFETY: validated above, the header lies inside the buffer.
        unsafe { self.write_header(handle.offset as usize, cleared) };
        state.stats.record_free(header.total_size());

        // The list head is the highest live block; the cursor follows it.
        if state.head == NIL {
            state.cursor = 0;
        } else if let Some(top) = self.live_header_at(state.head) {
            state.cursor = state.head as usize + top.total_size();
        }

        tracing::trace!(offset = handle.offset, size = header.size, "arena block freed");
        Ok(())
    }

    /// Immutable view of a live block's data region.
    pub fn bytes<'a>(&'a self, handle: &'a BlockHandle) -> Result<&'a [u8], MemoryError> {
        let _guard = self.section.enter()?;
        self.validate(handle)?;
        // SAFETY: the block is live and inside the buffer; data regions of
        // live blocks never overlap, and the handle is borrowed for `'a` so
        // the block cannot be freed while the slice exists.
        Ok(unsafe {
            std::slice::from_raw_parts(self.data_ptr(handle.offset as usize), handle.len())
        })
    }

    /// Mutable view of a live block's data region.
    pub fn bytes_mut<'a>(&'a self, handle: &'a mut BlockHandle) -> Result<&'a mut [u8], MemoryError> {
        let _guard = self.section.enter()?;
        self.validate(handle)?;
        // SAFETY: as in `bytes`; exclusivity follows from `&mut BlockHandle`
        // since handles are neither `Copy` nor `Clone`.
        Ok(unsafe {
            std::slice::from_raw_parts_mut(self.data_ptr(handle.offset as usize), handle.len())
        })
    }

    /// Counts live blocks older than the leak age, as of now.
    pub fn check_leaks(&self) -> Result<usize, MemoryError> {
        self.check_leaks_at(Instant::now())
    }

    /// Counts live blocks older than the leak age, as of `now`.
    ///
    /// Detection only: suspected leaks stay allocated, since the
    /// accelerator may still reference them. Each block adds to the leak
    /// counter once, the first time it is reported.
    pub fn check_leaks_at(&self, now: Instant) -> Result<usize, MemoryError> {
        let _guard = self.section.enter()?;
        // SAFETY: the section guard grants exclusive access to the state.
        let state = unsafe { &mut *self.state.get() };

        let now_nanos = self.nanos_since_epoch(now);
        let threshold = self.leak_age.as_nanos() as u64;
        let mut suspected = 0;
        let mut current = state.head;
        let mut visited = 0;

        while current != NIL && visited < state.stats.live_blocks {
            let Some(mut header) = self.live_header_at(current) else {
                tracing::warn!("leak scan stopped at damaged header (offset {current})");
                break;
            };
            let age = now_nanos.saturating_sub(header.created_nanos);
            if age > threshold {
                suspected += 1;
                if header.flags & FLAG_LEAK_REPORTED == 0 {
                    header.flags |= FLAG_LEAK_REPORTED;
                    // SAFETY: `live_header_at` checked the bounds.
                    unsafe { self.write_header(current as usize, header) };
                    state.stats.leak_count += 1;
                    tracing::warn!(
                        "suspected arena leak: offset {current}, {} bytes, age {} ms",
                        header.size,
                        age / 1_000_000,
                    );
                }
            }
            current = header.next;
            visited += 1;
        }

        Ok(suspected)
    }

    /// Returns a snapshot of the arena counters.
    ///
    /// If the critical section cannot be entered the contention is logged and
    /// the snapshot carries only the capacity. Callers that feed the counters
    /// onward should use [`Arena::try_stats`] and keep their previous values.
    pub fn stats(&self) -> ArenaStats {
        self.try_stats().unwrap_or_else(|e| {
            tracing::warn!("arena stats unavailable: {e}");
            ArenaStats::with_capacity(self.capacity)
        })
    }

    /// Returns a snapshot of the arena counters, or
    /// [`MemoryError::Contended`] if the section is held.
    pub fn try_stats(&self) -> Result<ArenaStats, MemoryError> {
        let _guard = self.section.enter()?;
        // SAFETY: the section guard grants exclusive access to the state.
        Ok(unsafe { (*self.state.get()).stats.clone() })
    }

    /// Bytes currently held by live blocks, headers included.
    pub fn allocated_bytes(&self) -> usize {
        self.stats().allocated_bytes
    }

    /// The fixed capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The configured leak age.
    pub fn leak_age(&self) -> Duration {
        self.leak_age
    }

    // ── Private helpers ────────────────────────────────────────

    /// The one integrity check every access goes through.
    fn validate(&self, handle: &BlockHandle) -> Result<BlockHeader, MemoryError> {
        let offset = handle.offset as usize;
        let corrupt = |detail| MemoryError::Corruption { offset, detail };

        if handle.arena != self.id {
            return Err(corrupt("handle from another arena"));
        }
        let header = self
            .header_at(handle.offset)
            .ok_or_else(|| corrupt("handle offset outside arena"))?;
        if header.tag != BLOCK_MAGIC {
            return Err(corrupt("integrity tag mismatch"));
        }
        if header.generation != handle.generation {
            return Err(corrupt("stale handle generation"));
        }
        if header.size != handle.size || offset + header.total_size() > self.capacity {
            return Err(corrupt("block size mismatch"));
        }
        Ok(header)
    }

    /// Removes `offset` from the live list.
    fn unlink(&self, state: &mut ArenaState, offset: u32, next: u32) -> Result<(), MemoryError> {
        if state.head == offset {
            state.head = next;
            return Ok(());
        }

        let mut current = state.head;
        for _ in 0..state.stats.live_blocks {
            let Some(mut header) = self.live_header_at(current) else {
                break;
            };
            if header.next == offset {
                header.next = next;
                // SAFETY: `live_header_at` checked the bounds.
                unsafe { self.write_header(current as usize, header) };
                return Ok(());
            }
            current = header.next;
        }

        Err(MemoryError::Corruption {
            offset: offset as usize,
            detail: "block not on live list",
        })
    }

    /// Reads the header at `offset` if it lies inside the buffer.
    fn header_at(&self, offset: u32) -> Option<BlockHeader> {
        let offset = offset as usize;
        if offset % ALIGNMENT != 0 || offset + HEADER_SIZE > self.capacity {
            return None;
        }
        // SAFETY: bounds and alignment checked above.
        Some(unsafe { self.read_header(offset) })
    }

    /// Like [`header_at`](Self::header_at), but only for tagged headers.
    fn live_header_at(&self, offset: u32) -> Option<BlockHeader> {
        if offset == NIL {
            return None;
        }
        self.header_at(offset).filter(|h| h.tag == BLOCK_MAGIC)
    }

    fn nanos_since_epoch(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_nanos() as u64
    }

    fn byte_ptr(&self) -> *mut u8 {
        self.base.as_ptr().cast::<u8>()
    }

    fn data_ptr(&self, offset: usize) -> *mut u8 {
        // SAFETY: callers pass validated offsets.
        unsafe { self.byte_ptr().add(offset + HEADER_SIZE) }
    }

    unsafe fn read_header(&self, offset: usize) -> BlockHeader {
        std::ptr::read(self.byte_ptr().add(offset).cast::<BlockHeader>())
    }

    unsafe fn write_header(&self, offset: usize, header: BlockHeader) {
        std::ptr::write(self.byte_ptr().add(offset).cast::<BlockHeader>(), header);
    }

    #[cfg(test)]
    pub(crate) fn overwrite_tag(&self, handle: &BlockHandle, tag: u32) {
        let _guard = self.section.enter().unwrap();
        let mut header = self.header_at(handle.offset).unwrap();
        header.tag = tag;
        unsafe { self.write_header(handle.offset as usize, header) };
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: `base`/`words` came from `Box::into_raw` on a `Box<[u64]>`.
        unsafe {
            drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                self.base.as_ptr(),
                self.words,
            )));
        }
    }
}

// Arena is Send + Sync: the buffer is owned exclusively, all bookkeeping is
// behind the critical section, and data regions are only reachable through
// unique handles.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Arena")
            .field("capacity", &self.capacity)
            .field("allocated_bytes", &stats.allocated_bytes)
            .field("live_blocks", &stats.live_blocks)
            .field("leak_age", &self.leak_age)
            .finish()
    }
}
