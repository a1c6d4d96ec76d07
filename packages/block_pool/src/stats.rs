/// A point-in-time snapshot of the bookkeeping of a [`PoolAllocator`][crate::PoolAllocator].
///
/// `free_blocks + live_blocks == block_count` holds for every snapshot.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// use block_pool::PoolAllocator;
///
/// let pool = PoolAllocator::new(NonZero::new(64).unwrap(), NonZero::new(256).unwrap()).unwrap();
/// let _block = pool.allocate(10, 1).unwrap();
///
/// let stats = pool.stats();
/// assert_eq!(stats.block_count, 4);
/// assert_eq!(stats.live_blocks, 1);
/// assert_eq!(stats.free_blocks, 3);
/// assert_eq!(stats.live_requested_bytes, 10);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct PoolStats {
    /// Size of every block in bytes.
    pub block_size: usize,

    /// Number of blocks the arena is divided into.
    pub block_count: usize,

    /// Number of blocks available for allocation.
    pub free_blocks: usize,

    /// Number of blocks currently allocated.
    pub live_blocks: usize,

    /// Sum of the byte counts that were requested for the live blocks. The difference to
    /// `live_blocks * block_size` is memory lost to partially used blocks.
    pub live_requested_bytes: usize,
}
