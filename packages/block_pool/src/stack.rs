use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::slice;

use tracing::trace;

use crate::{BlockAllocator, BlockHandle, Error, PoolAllocator, Result};

/// Each growth step multiplies the capacity by this.
const GROWTH_FACTOR: usize = 2;

/// A last-in-first-out stack whose storage comes exclusively from a [`BlockAllocator`].
///
/// The stack keeps its elements in one contiguous buffer obtained from the allocator it was
/// created with. When the buffer is full, a push requests a new buffer of twice the capacity,
/// moves the elements over and returns the old buffer. The stack never falls back to the global
/// heap.
///
/// # Growth limit
///
/// Every buffer is a single allocation. With a [`PoolAllocator`] that means a single block, so
/// the stack can never hold more than `block_size / size_of::<T>()` elements, rounded down to
/// the last capacity the doubling sequence reaches. The push that would need a larger buffer
/// fails with the allocator's error and leaves the stack as it was.
///
/// ```
/// use std::num::NonZero;
///
/// use block_pool::{Error, PoolAllocator, PoolStack};
///
/// let pool = PoolAllocator::new(NonZero::new(64).unwrap(), NonZero::new(1024).unwrap()).unwrap();
/// let mut stack = PoolStack::new_in(&pool);
///
/// // 16 * 4 bytes fill one 64-byte block exactly.
/// for value in 0..16_i32 {
///     stack.push(value).unwrap();
/// }
///
/// // The 17th element would need a 128-byte buffer.
/// assert!(matches!(stack.push(16), Err(Error::OversizedRequest { .. })));
/// assert_eq!(stack.len(), 16);
/// assert_eq!(stack.top(), Some(&15));
/// ```
///
/// # Allocator lifetime
///
/// The stack borrows its allocator, so the compiler guarantees that the allocator outlives every
/// stack using it. Any number of stacks can share one allocator, each with its own buffer.
///
/// # Thread safety
///
/// The stack has no internal synchronization and requires `&mut` access for every mutation.
/// It is [`Send`] and [`Sync`] under the usual conditions on `T`, provided the allocator is
/// [`Sync`], which lets independently owned stacks on different threads share one pool.
pub struct PoolStack<'a, T, A = PoolAllocator>
where
    A: BlockAllocator,
{
    allocator: &'a A,

    /// The current backing allocation. `None` while the capacity is zero and always `None` for
    /// zero-sized element types.
    buffer: Option<Buffer>,

    /// Number of initialized elements at the start of the buffer.
    len: usize,

    /// Number of elements the buffer has room for.
    capacity: usize,

    _elements: PhantomData<T>,
}

/// One allocation obtained from the allocator, with the layout needed to return it.
#[derive(Clone, Copy, Debug)]
struct Buffer {
    handle: BlockHandle,
    layout: Layout,
}

impl<'a, T, A> PoolStack<'a, T, A>
where
    A: BlockAllocator,
{
    /// Creates an empty stack that will draw its storage from `allocator`.
    ///
    /// No memory is allocated until the first push.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZero;
    ///
    /// use block_pool::{PoolAllocator, PoolStack};
    ///
    /// let pool = PoolAllocator::new(NonZero::new(64).unwrap(), NonZero::new(1024).unwrap()).unwrap();
    /// let stack = PoolStack::<u64>::new_in(&pool);
    ///
    /// assert!(stack.is_empty());
    /// assert_eq!(stack.capacity(), 0);
    /// assert_eq!(pool.stats().live_blocks, 0);
    /// ```
    #[must_use]
    pub fn new_in(allocator: &'a A) -> Self {
        Self {
            allocator,
            buffer: None,
            len: 0,
            capacity: if is_zero_sized::<T>() { usize::MAX } else { 0 },
            _elements: PhantomData,
        }
    }

    /// Creates an empty stack with room for exactly `capacity` elements.
    ///
    /// # Errors
    ///
    /// Returns whatever the allocator reports if it cannot provide a buffer of that size, or
    /// [`Error::CapacityOverflow`] if the size cannot even be expressed.
    pub fn with_capacity_in(allocator: &'a A, capacity: usize) -> Result<Self> {
        let mut stack = Self::new_in(allocator);

        if capacity > stack.capacity {
            let buffer = stack.allocate_buffer(capacity)?;
            stack.buffer = Some(buffer);
            stack.capacity = capacity;
        }

        Ok(stack)
    }

    /// The allocator this stack draws its storage from.
    #[must_use]
    #[inline]
    pub fn allocator(&self) -> &'a A {
        self.allocator
    }

    /// Number of elements in the stack.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the stack has no elements.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the current buffer has room for.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pushes a value on top of the stack, growing the buffer if it is full.
    ///
    /// # Errors
    ///
    /// Returns the allocator's error if growing is necessary and the allocator cannot provide
    /// the larger buffer, or [`Error::CapacityOverflow`] if the larger buffer's size cannot be
    /// expressed. The stack is unchanged in that case and `value` is dropped.
    pub fn push(&mut self, value: T) -> Result<()> {
        if self.len == self.capacity {
            self.grow()?;
        }

        // SAFETY: There is room for at least one more element after the check above.
        unsafe {
            self.push_within_capacity(value);
        }

        Ok(())
    }

    /// Removes the most recently pushed element and returns it, or `None` if the stack is
    /// empty. The buffer is kept.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        // Cannot underflow, checked above.
        self.len = self.len.wrapping_sub(1);

        // SAFETY: The element at the old top index is initialized and, with the length reduced,
        // no longer considered part of the stack, so reading it out transfers ownership.
        Some(unsafe { self.elements_ptr().add(self.len).read() })
    }

    /// The most recently pushed element, or `None` if the stack is empty.
    #[must_use]
    pub fn top(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// Mutable access to the most recently pushed element, or `None` if the stack is empty.
    #[must_use]
    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().last_mut()
    }

    /// The element at `index`, counting from the oldest element.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Drops every element but keeps the buffer for reuse.
    pub fn clear(&mut self) {
        let len = self.len;

        // Forget the elements first, so a panicking destructor cannot cause a double drop.
        self.len = 0;

        // SAFETY: The first `len` elements are initialized and no longer part of the stack.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.elements_ptr().as_ptr(),
                len,
            ));
        }
    }

    /// The elements in push order, oldest first.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: The pointer is aligned and non-null even without a buffer, and the first
        // `len` elements behind it are initialized.
        unsafe { slice::from_raw_parts(self.elements_ptr().as_ptr(), self.len) }
    }

    /// The elements in push order, oldest first, mutably.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: As in as_slice(), plus we hold the only reference to the stack.
        unsafe { slice::from_raw_parts_mut(self.elements_ptr().as_ptr(), self.len) }
    }

    /// Iterates over the elements in push order, oldest first.
    ///
    /// The iterator borrows the buffer directly. Iterating again starts from the oldest element.
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Iterates mutably over the elements in push order, oldest first.
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// Moves the contents out into a new stack, leaving this one empty with zero capacity.
    ///
    /// The buffer changes owner without any allocator involvement. Both stacks keep using the
    /// same allocator.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZero;
    ///
    /// use block_pool::{PoolAllocator, PoolStack};
    ///
    /// let pool = PoolAllocator::new(NonZero::new(64).unwrap(), NonZero::new(1024).unwrap()).unwrap();
    /// let mut first = PoolStack::new_in(&pool);
    /// first.push(1).unwrap();
    /// first.push(2).unwrap();
    ///
    /// let second = first.take();
    ///
    /// assert!(first.is_empty());
    /// assert_eq!(first.capacity(), 0);
    /// assert_eq!(second.as_slice(), &[1, 2]);
    /// ```
    #[must_use]
    pub fn take(&mut self) -> Self {
        let allocator = self.allocator;
        mem::replace(self, Self::new_in(allocator))
    }

    /// Replaces the contents of this stack with the contents of `source`, leaving `source`
    /// empty with zero capacity.
    ///
    /// If both stacks use the same allocator instance, this stack adopts the buffer of `source`
    /// and no allocation takes place. Otherwise the elements are moved into a buffer from this
    /// stack's allocator and the buffer of `source` is returned to its allocator.
    ///
    /// # Errors
    ///
    /// Returns the allocator's error if a new buffer is needed and cannot be obtained. Both
    /// stacks are unchanged in that case.
    pub fn assign(&mut self, source: &mut Self) -> Result<()> {
        if self.allocator.is_equal(source.allocator) {
            *self = source.take();
            return Ok(());
        }

        let count = source.len;

        if count > self.capacity {
            let buffer = self.allocate_buffer(count)?;

            self.clear();
            self.replace_buffer(buffer, count);
        } else {
            self.clear();
        }

        // SAFETY: Both buffers have room for `count` elements and belong to different
        // allocations. Setting the source length to zero afterwards transfers ownership.
        unsafe {
            ptr::copy_nonoverlapping(
                source.elements_ptr().as_ptr(),
                self.elements_ptr().as_ptr(),
                count,
            );
        }

        source.len = 0;
        self.len = count;

        drop(source.take());

        Ok(())
    }

    /// Grows the buffer by one growth step.
    fn grow(&mut self) -> Result<()> {
        let new_capacity = self
            .capacity
            .checked_mul(GROWTH_FACTOR)
            .ok_or(Error::CapacityOverflow {
                capacity: self.capacity,
            })?
            .max(1);

        let buffer = self.allocate_buffer(new_capacity)?;

        trace!(
            old_capacity = self.capacity,
            new_capacity,
            bytes = buffer.layout.size(),
            "growing stack buffer"
        );

        // SAFETY: The new buffer has room for at least `len` elements and is a different
        // allocation than the current one. The old copies are forgotten with the old buffer.
        unsafe {
            ptr::copy_nonoverlapping(
                self.elements_ptr().as_ptr(),
                buffer.handle.as_ptr().cast::<T>().as_ptr(),
                self.len,
            );
        }

        self.replace_buffer(buffer, new_capacity);

        Ok(())
    }

    /// Installs `buffer` as the backing allocation and returns the previous one, if any.
    ///
    /// Elements in the previous buffer are not dropped, the caller must have moved or dropped
    /// them already.
    fn replace_buffer(&mut self, buffer: Buffer, capacity: usize) {
        let previous = self.buffer.replace(buffer);
        self.capacity = capacity;

        if let Some(previous) = previous {
            // SAFETY: The buffer came from our allocator and nothing refers to it any more.
            unsafe {
                self.release_buffer(previous);
            }
        }
    }

    fn allocate_buffer(&self, capacity: usize) -> Result<Buffer> {
        let layout = Layout::array::<T>(capacity).or(Err(Error::CapacityOverflow { capacity }))?;

        let handle = self.allocator.allocate(layout.size(), layout.align())?;

        Ok(Buffer { handle, layout })
    }

    /// # Safety
    ///
    /// The buffer must have been allocated by this stack's allocator and must not be used after.
    unsafe fn release_buffer(&self, buffer: Buffer) {
        // SAFETY: Forwarding safety requirements to the caller.
        unsafe {
            self.allocator
                .release(buffer.handle, buffer.layout.size(), buffer.layout.align());
        }
    }

    /// Writes `value` into the next free slot.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `len < capacity`.
    unsafe fn push_within_capacity(&mut self, value: T) {
        // SAFETY: The caller guarantees the slot at `len` is within the buffer.
        unsafe {
            self.elements_ptr().add(self.len).write(value);
        }

        // Cannot overflow, bounded by capacity.
        self.len = self.len.wrapping_add(1);
    }

    fn elements_ptr(&self) -> NonNull<T> {
        self.buffer
            .map_or(NonNull::dangling(), |buffer| buffer.handle.as_ptr().cast())
    }
}

impl<'a, T, A> PoolStack<'a, T, A>
where
    T: Clone,
    A: BlockAllocator,
{
    /// Creates a copy of the stack with its own buffer from the same allocator.
    ///
    /// The copy's capacity equals the current length.
    ///
    /// # Errors
    ///
    /// Returns the allocator's error if the buffer for the copy cannot be obtained.
    pub fn try_clone(&self) -> Result<Self> {
        let mut clone = Self::with_capacity_in(self.allocator, self.len)?;

        for value in self {
            // SAFETY: The clone was created with room for every element of `self`.
            unsafe {
                clone.push_within_capacity(value.clone());
            }
        }

        Ok(clone)
    }
}

impl<T, A> Drop for PoolStack<'_, T, A>
where
    A: BlockAllocator,
{
    fn drop(&mut self) {
        self.clear();

        if let Some(buffer) = self.buffer.take() {
            // SAFETY: The buffer came from our allocator and the stack is going away.
            unsafe {
                self.release_buffer(buffer);
            }
        }
    }
}

impl<T, A> fmt::Debug for PoolStack<'_, T, A>
where
    T: fmt::Debug,
    A: BlockAllocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'s, T, A> IntoIterator for &'s PoolStack<'_, T, A>
where
    A: BlockAllocator,
{
    type Item = &'s T;
    type IntoIter = slice::Iter<'s, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'s, T, A> IntoIterator for &'s mut PoolStack<'_, T, A>
where
    A: BlockAllocator,
{
    type Item = &'s mut T;
    type IntoIter = slice::IterMut<'s, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

fn is_zero_sized<T>() -> bool {
    size_of::<T>() == 0
}
