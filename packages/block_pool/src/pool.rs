use std::alloc::{Layout, alloc, dealloc};
use std::num::NonZero;
use std::ptr::{self, NonNull};
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::{debug, trace, warn};

use crate::constants::ERR_POISONED_LOCK;
use crate::{
    BlockAllocator, BlockHandle, BlockRegistry, DropPolicy, Error, PoolAllocatorBuilder,
    PoolStats, Result,
};

/// A thread-safe allocator that serves every request with one block of a fixed-size arena.
///
/// The pool obtains a single contiguous arena of `pool_size` bytes when it is created and
/// divides it into `pool_size / block_size` blocks. Each successful allocation hands out
/// exactly one whole block, no matter how few bytes were asked for. Blocks are never split,
/// never coalesced, and the arena never grows.
///
/// # Limits
///
/// A request is served only if both its byte count and its alignment fit into one block.
/// Larger requests fail with [`Error::OversizedRequest`] instead of spanning blocks. When
/// every block is live, further requests fail with [`Error::OutOfMemory`] immediately.
///
/// Every block starts at a multiple of `block_size` from an arena base aligned to
/// [`block_align()`](Self::block_align), the largest power of two dividing `block_size`.
/// For power-of-two block sizes every alignment up to `block_size` can be honoured.
///
/// # Returning blocks
///
/// [`deallocate()`](Self::deallocate) validates every handle and reports handles it does
/// not consider live with [`Error::UnknownBlock`]. [`release()`](Self::release) does the
/// same but ignores such handles, for callers that prefer tolerating a double release.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// use block_pool::{Error, PoolAllocator};
///
/// let pool = PoolAllocator::new(NonZero::new(64).unwrap(), NonZero::new(128).unwrap()).unwrap();
///
/// let first = pool.allocate(64, 8).unwrap();
/// let _second = pool.allocate(1, 1).unwrap();
///
/// // Both blocks are live, so the pool is exhausted.
/// assert!(matches!(pool.allocate(1, 1), Err(Error::OutOfMemory { .. })));
///
/// // Returning a block makes it available again.
/// pool.deallocate(first, 64, 8).unwrap();
/// assert_eq!(pool.allocate(32, 4).unwrap(), first);
/// ```
///
/// # Identity
///
/// Two pools are equal only if they are the same instance. Blocks allocated from one pool
/// can never be returned to another.
///
/// # Thread safety
///
/// The pool is thread-safe. Allocation and deallocation are serialized by an internal lock,
/// so concurrent callers never receive the same block.
#[derive(Debug)]
pub struct PoolAllocator {
    /// Base of the arena. Never changes for the lifetime of the pool.
    arena: NonNull<u8>,

    /// Layout the arena was allocated with, required to release it.
    arena_layout: Layout,

    block_size: NonZero<usize>,

    pool_size: NonZero<usize>,

    /// Number of whole blocks that fit into the arena. Fixed at construction.
    block_count: usize,

    registry: Mutex<BlockRegistry>,

    drop_policy: DropPolicy,
}

// SAFETY: The arena is exclusively owned by the pool and only ever handed out one block at a
// time under the registry lock. Nothing about it is tied to the thread that created it.
unsafe impl Send for PoolAllocator {}

// SAFETY: All mutation of shared state happens under the registry lock. The arena pointer
// itself is never modified after construction.
unsafe impl Sync for PoolAllocator {}

impl PoolAllocator {
    /// Pool size used by the builder when none is specified: 1 MiB.
    pub const DEFAULT_POOL_SIZE: NonZero<usize> = NonZero::new(1024 * 1024)
        .expect("default pool size is non-zero");

    /// Creates a pool with blocks of `block_size` bytes in an arena of `pool_size` bytes.
    ///
    /// If `pool_size` is not a multiple of `block_size`, the remainder is never used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailure`] if the arena cannot be obtained.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZero;
    ///
    /// use block_pool::PoolAllocator;
    ///
    /// let pool = PoolAllocator::new(NonZero::new(32).unwrap(), NonZero::new(1024).unwrap()).unwrap();
    /// assert_eq!(pool.block_count(), 32);
    /// ```
    pub fn new(block_size: NonZero<usize>, pool_size: NonZero<usize>) -> Result<Self> {
        Self::new_inner(block_size, pool_size, DropPolicy::default())
    }

    /// Returns a builder for creating a [`PoolAllocator`] with custom configuration.
    pub fn builder() -> PoolAllocatorBuilder {
        PoolAllocatorBuilder::new()
    }

    pub(crate) fn new_inner(
        block_size: NonZero<usize>,
        pool_size: NonZero<usize>,
        drop_policy: DropPolicy,
    ) -> Result<Self> {
        let block_align = block_align_of(block_size);

        let failure = Error::AllocationFailure {
            pool_size: pool_size.get(),
            block_align,
        };

        let Ok(arena_layout) = Layout::from_size_align(pool_size.get(), block_align) else {
            return Err(failure);
        };

        // SAFETY: The layout has a non-zero size because pool_size is non-zero.
        let arena = NonNull::new(unsafe { alloc(arena_layout) }).ok_or(failure)?;

        let (block_count, wasted) = block_geometry(block_size, pool_size);

        if wasted != 0 {
            warn!(
                pool_size = pool_size.get(),
                block_size = block_size.get(),
                wasted,
                "pool size is not a multiple of the block size - the remainder is never used"
            );
        }

        debug!(
            block_size = block_size.get(),
            block_count,
            block_align,
            "created block pool"
        );

        Ok(Self {
            arena,
            arena_layout,
            block_size,
            pool_size,
            block_count,
            registry: Mutex::new(BlockRegistry::new(block_size, block_count)),
            drop_policy,
        })
    }

    /// Size of every block in bytes.
    #[must_use]
    #[inline]
    pub fn block_size(&self) -> NonZero<usize> {
        self.block_size
    }

    /// Size of the arena in bytes, including any remainder too small to form a block.
    #[must_use]
    #[inline]
    pub fn pool_size(&self) -> NonZero<usize> {
        self.pool_size
    }

    /// Alignment every block is guaranteed to have.
    #[must_use]
    #[inline]
    pub fn block_align(&self) -> usize {
        self.arena_layout.align()
    }

    /// Number of blocks the arena is divided into.
    #[must_use]
    #[inline]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Takes a consistent snapshot of the block bookkeeping.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let registry = self.registry.lock().expect(ERR_POISONED_LOCK);

        PoolStats {
            block_size: self.block_size.get(),
            block_count: registry.block_count(),
            free_blocks: registry.free_count(),
            live_blocks: registry.live_count(),
            live_requested_bytes: registry.live_requested_bytes(),
        }
    }

    /// The byte count that was requested when the block behind `handle` was allocated, or
    /// `None` if the handle does not refer to a live block of this pool.
    #[must_use]
    pub fn requested_bytes(&self, handle: BlockHandle) -> Option<usize> {
        let offset = self.offset_of(handle)?;

        self.registry
            .lock()
            .expect(ERR_POISONED_LOCK)
            .requested_bytes(offset)
    }

    /// Allocates one block for a request of `bytes` bytes aligned to `alignment`.
    ///
    /// The block most recently returned to the pool is handed out first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OversizedRequest`] if `bytes` exceeds the block size or if
    /// `alignment` is not a power of two no larger than [`block_align()`](Self::block_align).
    /// Returns [`Error::OutOfMemory`] if every block is live.
    pub fn allocate(&self, bytes: usize, alignment: usize) -> Result<BlockHandle> {
        if bytes > self.block_size.get()
            || !alignment.is_power_of_two()
            || alignment > self.block_align()
        {
            return Err(Error::OversizedRequest {
                bytes,
                alignment,
                block_size: self.block_size.get(),
            });
        }

        let offset = {
            let mut registry = self.registry.lock().expect(ERR_POISONED_LOCK);

            registry.acquire(bytes).ok_or(Error::OutOfMemory {
                block_count: registry.block_count(),
            })?
        };

        trace!(offset, bytes, alignment, "allocated block");

        // SAFETY: Every offset in the registry is smaller than the arena size, so the result
        // stays within the arena allocation.
        let ptr = unsafe { self.arena.add(offset) };

        Ok(BlockHandle::new(ptr))
    }

    /// Returns a block to the pool, making it available for future allocations.
    ///
    /// `bytes` and `alignment` are only used for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownBlock`] if the handle does not refer to a live block of this
    /// pool, for example because it was already returned or belongs to another allocator.
    /// Nothing changes in that case.
    pub fn deallocate(&self, handle: BlockHandle, bytes: usize, alignment: usize) -> Result<()> {
        let unknown = Error::UnknownBlock {
            address: handle.addr(),
        };

        let offset = self.offset_of(handle).ok_or_else(|| unknown.clone())?;

        self.registry
            .lock()
            .expect(ERR_POISONED_LOCK)
            .release(offset)
            .ok_or(unknown)?;

        trace!(offset, bytes, alignment, "released block");

        Ok(())
    }

    /// Returns a block to the pool, silently ignoring handles that do not refer to a live block
    /// of this pool.
    pub fn release(&self, handle: BlockHandle, bytes: usize, alignment: usize) {
        if let Err(error) = self.deallocate(handle, bytes, alignment) {
            debug!(%error, "ignoring release of a block this pool does not track");
        }
    }

    /// Translates a handle into an arena offset, if it points into the arena at all.
    fn offset_of(&self, handle: BlockHandle) -> Option<usize> {
        let offset = handle.addr().checked_sub(self.arena.addr().get())?;

        (offset < self.pool_size.get()).then_some(offset)
    }
}

impl BlockAllocator for PoolAllocator {
    fn allocate(&self, bytes: usize, alignment: usize) -> Result<BlockHandle> {
        Self::allocate(self, bytes, alignment)
    }

    /// Every handle is validated, so this is safe to call with any handle. It is only
    /// `unsafe` because other implementations cannot validate.
    unsafe fn deallocate(&self, handle: BlockHandle, bytes: usize, alignment: usize) -> Result<()> {
        Self::deallocate(self, handle, bytes, alignment)
    }

    fn is_equal(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl PartialEq for PoolAllocator {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Eq for PoolAllocator {}

impl Drop for PoolAllocator {
    fn drop(&mut self) {
        let live_blocks = self
            .registry
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .live_count();

        // SAFETY: The arena was allocated in new_inner() with this exact layout and is released
        // exactly once, here.
        unsafe {
            dealloc(self.arena.as_ptr(), self.arena_layout);
        }

        debug!(
            block_size = self.block_size.get(),
            live_blocks, "dropped block pool"
        );

        if live_blocks == 0 {
            return;
        }

        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if !thread::panicking() && matches!(self.drop_policy, DropPolicy::MustNotReleaseLiveBlocks)
        {
            panic!(
                "dropped a PoolAllocator with {live_blocks} live blocks - this is forbidden by DropPolicy::MustNotReleaseLiveBlocks"
            );
        }

        warn!(
            live_blocks,
            "dropped a block pool while blocks were still live - their handles now dangle"
        );
    }
}

/// Number of whole blocks in the arena and the number of trailing bytes too few to form one.
#[expect(
    clippy::integer_division,
    reason = "a partial block at the end of the arena is never handed out"
)]
#[expect(
    clippy::arithmetic_side_effects,
    reason = "block_size is non-zero, so neither division nor remainder can panic"
)]
fn block_geometry(block_size: NonZero<usize>, pool_size: NonZero<usize>) -> (usize, usize) {
    let (pool_size, block_size) = (pool_size.get(), block_size.get());

    (pool_size / block_size, pool_size % block_size)
}

/// The largest power of two dividing `block_size`, which is the alignment every block start
/// inherits from a suitably aligned arena base.
fn block_align_of(block_size: NonZero<usize>) -> usize {
    1_usize << block_size.trailing_zeros()
}
