// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Scope-bound arena block that frees itself on drop.
//!
//! [`ScopedBlock`] is how per-cycle scratch buffers are held: every path out
//! of a cycle (success, early return via `?`, panic unwinding) releases the
//! block. A free that fails on drop is logged, since `Drop` cannot return it;
//! call [`ScopedBlock::release`] to observe the result instead.

use crate::{Arena, BlockHandle, MemoryError};

/// An arena block tied to the lifetime of a borrow of its arena.
///
/// # Example
/// ```
/// use memory_manager::{Arena, MemoryBudget};
///
/// let arena = Arena::new(MemoryBudget::from_kb(4)).unwrap();
/// {
///     let mut scratch = arena.allocate_scoped(256).unwrap();
///     scratch.bytes_mut().unwrap().fill(0);
/// }
/// assert_eq!(arena.stats().allocated_bytes, 0);
/// ```
pub struct ScopedBlock<'a> {
    arena: &'a Arena,
    /// `None` once released.
    handle: Option<BlockHandle>,
}

impl<'a> ScopedBlock<'a> {
    pub(crate) fn new(arena: &'a Arena, handle: BlockHandle) -> Self {
        Self {
            arena,
            handle: Some(handle),
        }
    }

    /// Immutable view of the block's data.
    pub fn bytes(&self) -> Result<&[u8], MemoryError> {
        match &self.handle {
            Some(handle) => self.arena.bytes(handle),
            None => Err(released()),
        }
    }

    /// Mutable view of the block's data.
    pub fn bytes_mut(&mut self) -> Result<&mut [u8], MemoryError> {
        match &mut self.handle {
            Some(handle) => self.arena.bytes_mut(handle),
            None => Err(released()),
        }
    }

    /// Usable length in bytes.
    pub fn len(&self) -> usize {
        self.handle.as_ref().map_or(0, BlockHandle::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frees the block now and reports the outcome.
    pub fn release(mut self) -> Result<(), MemoryError> {
        match self.handle.take() {
            Some(handle) => self.arena.free(handle),
            None => Ok(()),
        }
    }

    /// Detaches the handle; the caller becomes responsible for freeing it.
    pub fn into_handle(mut self) -> Option<BlockHandle> {
        self.handle.take()
    }
}

fn released() -> MemoryError {
    MemoryError::Corruption {
        offset: 0,
        detail: "scoped block already released",
    }
}

impl Drop for ScopedBlock<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.arena.free(handle) {
                tracing::error!("scoped block free failed: {e}");
            }
        }
    }
}

impl std::fmt::Debug for ScopedBlock<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedBlock")
            .field("len", &self.len())
            .field("live", &self.handle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Arena, MemoryBudget};

    #[test]
    fn test_drop_frees() {
        let arena = Arena::new(MemoryBudget::from_kb(1)).unwrap();
        {
            let block = arena.allocate_scoped(100).unwrap();
            assert_eq!(block.len(), 100);
            assert!(arena.stats().allocated_bytes > 0);
        }
        assert_eq!(arena.stats().allocated_bytes, 0);
        assert_eq!(arena.stats().free_count, 1);
    }

    #[test]
    fn test_early_return_frees() {
        fn fails(arena: &Arena) -> Result<(), crate::MemoryError> {
            let _a = arena.allocate_scoped(64)?;
            let _b = arena.allocate_scoped(64)?;
            arena.allocate_scoped(1 << 20)?;
            Ok(())
        }

        let arena = Arena::new(MemoryBudget::from_kb(1)).unwrap();
        assert!(fails(&arena).is_err());
        assert_eq!(arena.stats().allocated_bytes, 0);
        assert_eq!(arena.stats().live_blocks, 0);
    }

    #[test]
    fn test_release_reports_result() {
        let arena = Arena::new(MemoryBudget::from_kb(1)).unwrap();
        let mut block = arena.allocate_scoped(16).unwrap();
        block.bytes_mut().unwrap().copy_from_slice(&[9u8; 16]);
        assert_eq!(block.bytes().unwrap(), &[9u8; 16]);
        block.release().unwrap();
        assert_eq!(arena.stats().allocated_bytes, 0);
    }

    #[test]
    fn test_into_handle_detaches() {
        let arena = Arena::new(MemoryBudget::from_kb(1)).unwrap();
        let block = arena.allocate_scoped(16).unwrap();
        let handle = block.into_handle().unwrap();
        assert_eq!(arena.stats().live_blocks, 1);
        arena.free(handle).unwrap();
    }
}
