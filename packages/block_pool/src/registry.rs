use std::num::NonZero;

use foldhash::{HashMap, HashMapExt};

/// Bookkeeping of which blocks of an arena are free and which are live.
///
/// Blocks are identified by their byte offset from the start of the arena. The registry knows
/// nothing about the arena memory itself, it only partitions the set of block offsets into a
/// free stack and a live map.
///
/// The free registry is a stack: the block released most recently is the next one handed out.
/// On a fresh registry the block with the highest offset is handed out first.
#[derive(Debug)]
pub(crate) struct BlockRegistry {
    block_size: NonZero<usize>,

    block_count: usize,

    /// Offsets of blocks that are available for allocation.
    free: Vec<usize>,

    /// Offsets of allocated blocks, mapped to the byte count that was requested for each.
    /// The byte count is kept for diagnostics only and never influences reuse.
    live: HashMap<usize, usize>,
}

impl BlockRegistry {
    /// Creates a registry in which all `block_count` blocks are free.
    #[must_use]
    pub(crate) fn new(block_size: NonZero<usize>, block_count: usize) -> Self {
        let mut free = Vec::with_capacity(block_count);

        for index in 0..block_count {
            // Cannot overflow because the arena of block_count blocks fits in memory.
            free.push(index.wrapping_mul(block_size.get()));
        }

        Self {
            block_size,
            block_count,
            free,
            // Grows with use, so a pool that never fills up never pays for a full map.
            live: HashMap::new(),
        }
    }

    /// Moves one block from the free registry to the live registry and returns its offset.
    ///
    /// Returns `None` if no block is free.
    #[must_use]
    pub(crate) fn acquire(&mut self, requested_bytes: usize) -> Option<usize> {
        let offset = self.free.pop()?;

        let previous = self.live.insert(offset, requested_bytes);
        debug_assert!(
            previous.is_none(),
            "block at offset {offset} was free and live at the same time"
        );

        #[cfg(debug_assertions)]
        self.integrity_check();

        Some(offset)
    }

    /// Moves a live block back to the free registry.
    ///
    /// Returns the byte count the block was requested with, or `None` if the offset does not
    /// belong to a live block, in which case nothing changes.
    pub(crate) fn release(&mut self, offset: usize) -> Option<usize> {
        let requested_bytes = self.live.remove(&offset)?;
        self.free.push(offset);

        #[cfg(debug_assertions)]
        self.integrity_check();

        Some(requested_bytes)
    }

    #[must_use]
    pub(crate) fn block_count(&self) -> usize {
        self.block_count
    }

    #[must_use]
    pub(crate) fn free_count(&self) -> usize {
        self.free.len()
    }

    #[must_use]
    pub(crate) fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Sum of the byte counts requested for all live blocks.
    #[must_use]
    pub(crate) fn live_requested_bytes(&self) -> usize {
        self.live.values().sum()
    }

    /// The byte count requested for the live block at `offset`, if there is one.
    #[must_use]
    pub(crate) fn requested_bytes(&self, offset: usize) -> Option<usize> {
        self.live.get(&offset).copied()
    }

    #[cfg(debug_assertions)]
    #[cfg_attr(test, mutants::skip)] // Only a debug-time safety net, tested indirectly.
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "the block size is non-zero, so the remainder cannot panic"
    )]
    fn integrity_check(&self) {
        assert_eq!(
            self.free.len().wrapping_add(self.live.len()),
            self.block_count,
            "free ({}) and live ({}) block counts do not add up to {} blocks",
            self.free.len(),
            self.live.len(),
            self.block_count
        );

        // The full scan is quadratic in the free list, so only small registries get it.
        if self.block_count <= 64 {
            for offset in &self.free {
                assert!(
                    !self.live.contains_key(offset),
                    "block at offset {offset} is both free and live"
                );
                assert_eq!(
                    *offset % self.block_size.get(),
                    0,
                    "free offset {offset} is not a multiple of the block size {}",
                    self.block_size
                );
            }
        }
    }
}
