/// Determines what a [`PoolAllocator`][crate::PoolAllocator] does when it is dropped while
/// some of its blocks are still live.
///
/// By default, the pool releases its whole arena regardless of live blocks. Whoever still
/// holds a handle into the arena is then holding a dangling address.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// use block_pool::{DropPolicy, PoolAllocator};
///
/// let pool = PoolAllocator::builder()
///     .block_size(NonZero::new(64).unwrap())
///     .drop_policy(DropPolicy::MustNotReleaseLiveBlocks)
///     .build()
///     .unwrap();
/// # drop(pool);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// The pool releases its arena when dropped, even if blocks are still live. A warning is
    /// logged if any were. This is the default.
    #[default]
    MayReleaseLiveBlocks,

    /// The pool panics if it still has live blocks when it is dropped.
    ///
    /// This may be valuable when handles are stored out of band and the application wants a
    /// loud failure instead of dangling addresses if it gets the teardown order wrong.
    MustNotReleaseLiveBlocks,
}
