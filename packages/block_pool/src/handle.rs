use std::ptr::NonNull;

/// An opaque reference to a block of memory obtained from a [`BlockAllocator`][1].
///
/// The handle is only an address. It does not own the memory, does not know which allocator
/// produced it and does not keep that allocator alive. Returning it to the allocator that
/// issued it makes the block available again; returning it anywhere else is either rejected
/// (by allocators that can validate handles) or forbidden by the safety contract of
/// [`BlockAllocator::deallocate()`][2].
///
/// Handles are [`Copy`] so that they can be stored alongside the data they describe. Copying
/// a handle does not copy the block.
///
/// [1]: crate::BlockAllocator
/// [2]: crate::BlockAllocator::deallocate
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BlockHandle {
    ptr: NonNull<u8>,
}

// SAFETY: The handle is an address without any access rights attached to it. Turning it into
// an access requires unsafe code that has to justify itself independently of the handle.
unsafe impl Send for BlockHandle {}

// SAFETY: See above, shared references to an address grant nothing beyond the address itself.
unsafe impl Sync for BlockHandle {}

impl BlockHandle {
    #[must_use]
    pub(crate) fn new(ptr: NonNull<u8>) -> Self {
        Self { ptr }
    }

    /// Returns a pointer to the first byte of the block.
    ///
    /// The pointer is valid for reads and writes of the number of bytes that was requested
    /// when the block was allocated, until the block is returned to its allocator or the
    /// allocator is dropped.
    #[must_use]
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Returns the address of the first byte of the block.
    #[must_use]
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.addr().get()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(BlockHandle: Send, Sync, Copy, std::fmt::Debug);

    #[test]
    fn addr_matches_pointer() {
        let mut byte = 0_u8;
        let handle = BlockHandle::new(NonNull::from(&mut byte));

        assert_eq!(handle.addr(), handle.as_ptr().as_ptr().addr());
    }

    #[test]
    fn copies_compare_equal() {
        let mut byte = 0_u8;
        let handle = BlockHandle::new(NonNull::from(&mut byte));
        let copy = handle;

        assert_eq!(handle, copy);
    }
}
