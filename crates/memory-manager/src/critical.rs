// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Short, non-reentrant critical section around the arena's bookkeeping.
//!
//! The arena is owned by a single task, so the section is normally
//! uncontended. It exists so the allocator stays sound if it is ever entered
//! from an interrupt-like context. Entering never waits unboundedly: after
//! `max_spins` failed attempts [`CriticalSection::enter`] returns
//! [`MemoryError::Contended`]. Work done while holding the section is O(1)
//! apart from walking the live-block list, which is bounded by the number of
//! live blocks.

use crate::MemoryError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default spin bound used by [`Arena`](crate::Arena).
pub const DEFAULT_MAX_SPINS: u32 = 1_000;

/// An atomic-flag lock with a bounded busy-wait.
#[derive(Debug)]
pub struct CriticalSection {
    locked: AtomicBool,
    max_spins: u32,
}

impl CriticalSection {
    /// Creates an unlocked section that gives up after `max_spins` attempts.
    pub const fn new(max_spins: u32) -> Self {
        Self {
            locked: AtomicBool::new(false),
            max_spins,
        }
    }

    /// Enters the section, spinning at most `max_spins` times.
    ///
    /// Not reentrant: entering twice from the same context fails with
    /// [`MemoryError::Contended`] rather than deadlocking.
    pub fn enter(&self) -> Result<SectionGuard<'_>, MemoryError> {
        for _ in 0..=self.max_spins {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(SectionGuard { section: self });
            }
            std::hint::spin_loop();
        }
        Err(MemoryError::Contended {
            spins: self.max_spins,
        })
    }

    /// Returns `true` while some guard is alive.
    pub fn is_held(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

impl Default for CriticalSection {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SPINS)
    }
}

/// Releases the section on drop.
#[derive(Debug)]
pub struct SectionGuard<'a> {
    section: &'a CriticalSection,
}

impl Drop for SectionGuard<'_> {
    fn drop(&mut self) {
        self.section.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_and_release() {
        let cs = CriticalSection::default();
        {
            let _g = cs.enter().unwrap();
            assert!(cs.is_held());
        }
        assert!(!cs.is_held());
        assert!(cs.enter().is_ok());
    }

    #[test]
    fn test_not_reentrant() {
        let cs = CriticalSection::new(8);
        let _g = cs.enter().unwrap();
        assert_eq!(cs.enter().unwrap_err(), MemoryError::Contended { spins: 8 });
    }

    #[test]
    fn test_contended_across_threads() {
        use std::sync::Arc;

        let cs = Arc::new(CriticalSection::new(u32::MAX));
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cs = Arc::clone(&cs);
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let _g = cs.enter().unwrap();
                        let v = counter.load(Ordering::Relaxed);
                        counter.store(v + 1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 4000);
    }
}
