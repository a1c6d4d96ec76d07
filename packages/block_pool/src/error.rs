use thiserror::Error;

/// Errors that can occur when creating a pool or exchanging blocks with an allocator.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The arena backing a pool could not be obtained from the global allocator.
    ///
    /// Either the requested geometry cannot be expressed as a memory layout or the
    /// global allocator refused the request.
    #[error("failed to obtain a {pool_size}-byte arena aligned to {block_align} bytes")]
    AllocationFailure {
        /// Total arena size that was requested.
        pool_size: usize,

        /// Alignment that was requested for the arena base.
        block_align: usize,
    },

    /// Every block of the pool is already live.
    ///
    /// The pool never grows and never waits for a block to be returned, so the caller
    /// must release something or use a larger pool.
    #[error("all {block_count} blocks of the pool are in use")]
    OutOfMemory {
        /// Total number of blocks the pool manages.
        block_count: usize,
    },

    /// The request does not fit into a single block.
    ///
    /// Either the byte count or the alignment exceeds what one block can provide.
    /// Requests are never split across blocks and never truncated.
    #[error(
        "request of {bytes} bytes aligned to {alignment} cannot be served by {block_size}-byte blocks"
    )]
    OversizedRequest {
        /// Number of bytes that was requested.
        bytes: usize,

        /// Alignment that was requested.
        alignment: usize,

        /// Size of a single block of the allocator that rejected the request.
        block_size: usize,
    },

    /// A block was returned that the allocator does not consider live.
    ///
    /// This is what a double release or a handle from a different allocator looks like.
    /// The registries are left untouched when this is reported.
    #[error("block at address {address:#x} is not a live block of this allocator")]
    UnknownBlock {
        /// Address carried by the rejected handle.
        address: usize,
    },

    /// The byte count and alignment do not describe a valid memory layout.
    ///
    /// Reported by allocators without a block size of their own, such as
    /// [`HeapAllocator`][crate::HeapAllocator], when the alignment is not a power of two or the
    /// size rounded up to the alignment overflows.
    #[error("request of {bytes} bytes aligned to {alignment} is not a valid memory layout")]
    InvalidLayout {
        /// Number of bytes that was requested.
        bytes: usize,

        /// Alignment that was requested.
        alignment: usize,
    },

    /// The global allocator could not satisfy the request.
    #[error("the global allocator refused a request of {bytes} bytes aligned to {alignment}")]
    HeapExhausted {
        /// Number of bytes that was requested.
        bytes: usize,

        /// Alignment that was requested.
        alignment: usize,
    },

    /// A container capacity was requested whose size in bytes cannot be represented.
    ///
    /// Containers report this before consulting their allocator.
    #[error("a capacity of {capacity} elements exceeds the addressable size")]
    CapacityOverflow {
        /// Number of elements the container tried to make room for.
        capacity: usize,
    },
}

/// A specialized `Result` type for block pool operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
