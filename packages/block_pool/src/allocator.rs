use tracing::debug;

use crate::{BlockHandle, Result};

/// A source of raw memory blocks, keyed by byte count and alignment.
///
/// This is the only interface through which [`PoolStack`][crate::PoolStack] obtains storage.
/// The container never looks behind it, so any strategy can be substituted as long as it
/// honours the contract below.
///
/// # Contract
///
/// * A successful [`allocate()`](Self::allocate) returns a handle to at least `bytes` bytes
///   aligned to at least `alignment`, which stay valid until the handle is returned.
/// * Two live handles never overlap.
/// * Failures are reported synchronously and leave the allocator unchanged. Implementations
///   never block waiting for memory to be returned.
/// * Implementations are internally synchronized if they are [`Sync`].
pub trait BlockAllocator {
    /// Allocates one block of at least `bytes` bytes aligned to at least `alignment`.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot serve a request of this shape or has no memory
    /// left for it. Which variants are used depends on the implementation, see
    /// [`PoolAllocator::allocate()`][crate::PoolAllocator::allocate] and
    /// [`HeapAllocator`][crate::HeapAllocator].
    fn allocate(&self, bytes: usize, alignment: usize) -> Result<BlockHandle>;

    /// Returns a block to the allocator.
    ///
    /// `bytes` and `alignment` must be the values the block was allocated with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownBlock`][crate::Error::UnknownBlock] if the allocator can tell that
    /// the handle does not refer to one of its live blocks. Allocators that cannot tell rely on
    /// the safety contract instead.
    ///
    /// # Safety
    ///
    /// Unless the implementing type documents that it validates handles, the caller must ensure
    /// that the handle was returned by `allocate()` on this allocator or on one that
    /// [`is_equal()`](Self::is_equal) to it, that it has not been returned since, and that no
    /// references into the block outlive this call.
    unsafe fn deallocate(&self, handle: BlockHandle, bytes: usize, alignment: usize) -> Result<()>;

    /// Returns a block to the allocator, silently ignoring handles the allocator does not know.
    ///
    /// This is the permissive form of [`deallocate()`](Self::deallocate) for callers that prefer
    /// tolerating a double release over reporting it.
    ///
    /// # Safety
    ///
    /// Same as [`deallocate()`](Self::deallocate).
    unsafe fn release(&self, handle: BlockHandle, bytes: usize, alignment: usize) {
        // SAFETY: Forwarding safety requirements to the caller.
        if let Err(error) = unsafe { self.deallocate(handle, bytes, alignment) } {
            debug!(%error, "ignoring release of a block this allocator does not track");
        }
    }

    /// Whether memory allocated from `self` can be returned to `other` and vice versa.
    ///
    /// Containers use this to decide whether they can adopt each other's storage or whether
    /// they have to copy.
    fn is_equal(&self, other: &Self) -> bool;
}
