// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! A fixed-capacity arena allocator for hard-real-time inference loops.
//! All working memory is reserved once at startup; nothing is allocated
//! from the system heap afterwards.
//!
//! # Key Components
//!
//! - [`MemoryBudget`]: the arena capacity, with human-readable parsing
//!   (`"2.5M"`, `"512K"`).
//! - [`Arena`]: the allocator. Bump allocation, integrity-tagged block
//!   headers, corruption-refusing frees and age-based leak detection.
//! - [`BlockHandle`]: a non-`Clone`, generation-checked reference to one
//!   block. Handing it to [`Arena::free`] consumes it.
//! - [`ScopedBlock`]: a block freed automatically when it leaves scope.
//! - [`ArenaStats`]: usage counters (peak, live blocks, leaks).
//!
//! # Ownership Model
//!
//! ```text
//! Arena::allocate(size) ──► BlockHandle ──► Arena::bytes / bytes_mut
//!                                │
//!                                │ Arena::free(handle)   (moves the handle)
//!                                ▼
//!                    header validated ──► unlinked, cursor rolled back
//! ```
//!
//! # Example
//! ```
//! use memory_manager::{Arena, MemoryBudget};
//!
//! let arena = Arena::new(MemoryBudget::parse("2.5M").unwrap()).unwrap();
//!
//! let a = arena.allocate(1024).unwrap();
//! let b = arena.allocate(512).unwrap();
//! assert_eq!(arena.stats().live_blocks, 2);
//!
//! arena.free(b).unwrap();
//! arena.free(a).unwrap();
//! assert_eq!(arena.stats().allocated_bytes, 0);
//! ```

mod arena;
mod block;
mod budget;
mod critical;
mod error;
mod guard;
mod stats;

pub use arena::{Arena, DEFAULT_LEAK_AGE};
pub use block::{BlockHandle, ALIGNMENT, BLOCK_MAGIC, HEADER_SIZE};
pub use budget::MemoryBudget;
pub use critical::{CriticalSection, SectionGuard, DEFAULT_MAX_SPINS};
pub use error::MemoryError;
pub use guard::ScopedBlock;
pub use stats::ArenaStats;
