use std::cell::Cell;
use std::marker::PhantomData;
use std::num::NonZero;

use crate::{DropPolicy, PoolAllocator, Result};

/// Builder for creating an instance of [`PoolAllocator`].
///
/// The block size is mandatory, whereas other settings are optional. The pool size defaults
/// to [`PoolAllocator::DEFAULT_POOL_SIZE`].
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// use block_pool::PoolAllocator;
///
/// let pool = PoolAllocator::builder()
///     .block_size(NonZero::new(128).unwrap())
///     .pool_size(NonZero::new(4096).unwrap())
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.block_count(), 32);
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) and can be safely transferred between threads,
/// allowing pool configuration to happen on different threads than where the pool is used.
/// However, it is not thread-safe ([`Sync`]) as it contains mutable configuration state.
#[derive(Debug)]
#[must_use]
pub struct PoolAllocatorBuilder {
    block_size: Option<NonZero<usize>>,
    pool_size: NonZero<usize>,
    drop_policy: DropPolicy,

    // Prevents Sync while allowing Send - builders are thread-mobile but not thread-safe
    _not_sync: PhantomData<Cell<()>>,
}

impl PoolAllocatorBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            block_size: None,
            pool_size: PoolAllocator::DEFAULT_POOL_SIZE,
            drop_policy: DropPolicy::default(),
            _not_sync: PhantomData,
        }
    }

    /// Sets the size of every block in bytes. This is also the largest allocation the pool
    /// can serve and the largest alignment it can honour.
    #[inline]
    pub fn block_size(mut self, block_size: NonZero<usize>) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Sets the total size of the arena in bytes.
    ///
    /// If this is not a multiple of the block size, the remainder is never used.
    #[inline]
    pub fn pool_size(mut self, pool_size: NonZero<usize>) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs how
    /// to treat live blocks when the pool is dropped.
    #[inline]
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the pool with the specified configuration, obtaining its arena.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailure`][crate::Error::AllocationFailure] if the arena
    /// cannot be obtained.
    ///
    /// # Panics
    ///
    /// Panics if no block size has been set using [`block_size`](Self::block_size).
    pub fn build(self) -> Result<PoolAllocator> {
        let block_size = self
            .block_size
            .expect("block size must be set using .block_size() before calling .build()");

        PoolAllocator::new_inner(block_size, self.pool_size, self.drop_policy)
    }
}
