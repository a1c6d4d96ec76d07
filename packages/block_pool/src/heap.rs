use std::alloc::{Layout, alloc, dealloc};
use std::ptr::{self, NonNull};

use crate::{BlockAllocator, BlockHandle, Error, Result};

/// A pass-through [`BlockAllocator`] backed by the global allocator.
///
/// This exists so that [`PoolStack`][crate::PoolStack] can run without a pool, for example to
/// compare behaviour or to lift the growth limit a pool imposes. Any byte count the global
/// allocator can satisfy is accepted.
///
/// The allocator is stateless, so all instances are interchangeable and compare equal.
///
/// Zero-byte requests are served with a dangling, suitably aligned handle and never reach the
/// global allocator.
///
/// Requests that do not form a valid [`Layout`] fail with [`Error::InvalidLayout`]. If the global
/// allocator returns null, the request fails with [`Error::HeapExhausted`].
///
/// # Examples
///
/// ```
/// use block_pool::{HeapAllocator, PoolStack};
///
/// let heap = HeapAllocator;
/// let mut stack = PoolStack::new_in(&heap);
///
/// for value in 0..1000 {
///     stack.push(value).unwrap();
/// }
///
/// assert_eq!(stack.len(), 1000);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HeapAllocator;

impl BlockAllocator for HeapAllocator {
    fn allocate(&self, bytes: usize, alignment: usize) -> Result<BlockHandle> {
        let Ok(layout) = Layout::from_size_align(bytes, alignment) else {
            return Err(Error::InvalidLayout { bytes, alignment });
        };

        if layout.size() == 0 {
            return Ok(BlockHandle::new(dangling_for(layout)));
        }

        // SAFETY: The layout has a non-zero size, checked above.
        let ptr = unsafe { alloc(layout) };

        NonNull::new(ptr)
            .map(BlockHandle::new)
            .ok_or(Error::HeapExhausted { bytes, alignment })
    }

    /// # Safety
    ///
    /// The handle must have been returned by [`allocate()`](Self::allocate) with the same
    /// `bytes` and `alignment` and must not have been returned since.
    unsafe fn deallocate(&self, handle: BlockHandle, bytes: usize, alignment: usize) -> Result<()> {
        // SAFETY: The caller guarantees these are the values the handle was allocated with,
        // which formed a valid layout at that time.
        let layout = unsafe { Layout::from_size_align_unchecked(bytes, alignment) };

        if layout.size() == 0 {
            return Ok(());
        }

        // SAFETY: The caller guarantees the handle came from alloc() with this layout and is
        // still live.
        unsafe {
            dealloc(handle.as_ptr().as_ptr(), layout);
        }

        Ok(())
    }

    fn is_equal(&self, _other: &Self) -> bool {
        true
    }
}

fn dangling_for(layout: Layout) -> NonNull<u8> {
    let ptr = ptr::without_provenance_mut::<u8>(layout.align());

    // SAFETY: Alignments are non-zero powers of two, so the address is never null.
    unsafe { NonNull::new_unchecked(ptr) }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(HeapAllocator: Send, Sync, Copy, std::fmt::Debug);

    #[test]
    fn allocates_writable_memory() {
        let heap = HeapAllocator;

        let handle = heap.allocate(256, 16).unwrap();
        assert_eq!(handle.addr() % 16, 0);

        // SAFETY: The block is 256 bytes long and we are its only user.
        unsafe {
            handle.as_ptr().write_bytes(0xAB, 256);
            assert_eq!(handle.as_ptr().add(255).read(), 0xAB);

            heap.deallocate(handle, 256, 16).unwrap();
        }
    }

    #[test]
    fn zero_sized_request_is_dangling_and_aligned() {
        let heap = HeapAllocator;

        let handle = heap.allocate(0, 64).unwrap();
        assert_eq!(handle.addr(), 64);

        // SAFETY: Zero-sized handles are never passed to the global allocator.
        unsafe {
            heap.deallocate(handle, 0, 64).unwrap();
        }
    }

    #[test]
    fn invalid_alignment_is_rejected() {
        let heap = HeapAllocator;

        assert!(matches!(
            heap.allocate(8, 3),
            Err(Error::InvalidLayout {
                bytes: 8,
                alignment: 3
            })
        ));
    }

    #[test]
    fn impossible_size_is_rejected() {
        let heap = HeapAllocator;

        assert!(matches!(
            heap.allocate(usize::MAX, 8),
            Err(Error::InvalidLayout { .. })
        ));
    }

    #[test]
    fn all_instances_are_equal() {
        assert!(HeapAllocator.is_equal(&HeapAllocator));
        assert_eq!(HeapAllocator, HeapAllocator::default());
    }
}
