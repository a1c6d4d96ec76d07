#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A thread-safe fixed-block memory pool and a LIFO stack that draws its storage from it.
//!
//! [`PoolAllocator`] obtains one contiguous arena up front and divides it into blocks of equal
//! size. Every allocation is served with exactly one whole block, so there is no fragmentation
//! bookkeeping, no splitting and no coalescing. The price is a hard ceiling: no single
//! allocation can be larger than one block.
//!
//! [`PoolStack`] is a growable last-in-first-out container that obtains its buffer exclusively
//! through the [`BlockAllocator`] trait. Combined with a pool, the ceiling becomes visible as a
//! maximum stack length of `block_size / size_of::<T>()` elements (rounded down to the
//! doubling sequence), beyond which a push fails instead of growing.
//!
//! # Key Features
//!
//! - **Single arena**: all blocks come from one allocation made at construction
//! - **Thread-safe pool**: concurrent callers never receive the same block
//! - **Strict or lenient release**: double releases and foreign handles are reported by
//!   [`PoolAllocator::deallocate()`] and ignored by [`PoolAllocator::release()`]
//! - **Identity equality**: two pools are equal only if they are the same instance
//! - **Pluggable storage**: [`PoolStack`] works with any [`BlockAllocator`], including the
//!   pass-through [`HeapAllocator`]
//! - **Diagnostics**: [`PoolAllocator::stats()`] reports block usage and requested bytes
//!
//! # Examples
//!
//! ```rust
//! use std::num::NonZero;
//!
//! use block_pool::{PoolAllocator, PoolStack};
//!
//! // 64-byte blocks in a 1 KiB arena.
//! let pool = PoolAllocator::new(NonZero::new(64).unwrap(), NonZero::new(1024).unwrap()).unwrap();
//!
//! let mut stack = PoolStack::new_in(&pool);
//! for value in 1..=10 {
//!     stack.push(value * 10).unwrap();
//! }
//!
//! assert_eq!(stack.top(), Some(&100));
//! assert_eq!(stack.iter().copied().sum::<i32>(), 550);
//!
//! // The whole stack lives in a single block.
//! assert_eq!(pool.stats().live_blocks, 1);
//! ```
//!
//! Working with raw blocks:
//!
//! ```rust
//! use std::num::NonZero;
//!
//! use block_pool::{Error, PoolAllocator};
//!
//! let pool = PoolAllocator::new(NonZero::new(32).unwrap(), NonZero::new(64).unwrap()).unwrap();
//!
//! assert!(matches!(pool.allocate(33, 1), Err(Error::OversizedRequest { .. })));
//!
//! let block = pool.allocate(32, 32).unwrap();
//! pool.deallocate(block, 32, 32).unwrap();
//!
//! // A second release of the same block is reported...
//! assert!(matches!(pool.deallocate(block, 32, 32), Err(Error::UnknownBlock { .. })));
//!
//! // ...unless the caller opts into ignoring it.
//! pool.release(block, 32, 32);
//! ```

mod allocator;
mod builder;
mod constants;
mod drop_policy;
mod error;
mod handle;
mod heap;
mod pool;
mod registry;
mod stack;
mod stats;

pub use allocator::*;
pub use builder::*;
pub use drop_policy::*;
pub use error::*;
pub use handle::*;
pub use heap::*;
pub use pool::*;
pub(crate) use registry::*;
pub use stack::*;
pub use stats::*;
