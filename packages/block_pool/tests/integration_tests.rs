//! Integration tests for `block_pool`.
//!
//! These tests exercise the public API end to end: stacks drawing from a shared pool,
//! the growth limit a pool imposes, block reuse and the bookkeeping that tracks it.
#![allow(
    clippy::arithmetic_side_effects,
    clippy::float_cmp,
    clippy::modulo_arithmetic,
    clippy::indexing_slicing,
    reason = "test code with small, known values"
)]

use std::num::NonZero;

use block_pool::{
    BlockAllocator, BlockHandle, DropPolicy, Error, HeapAllocator, PoolAllocator, PoolStack,
};

fn nz(value: usize) -> NonZero<usize> {
    NonZero::new(value).unwrap()
}

fn pool(block_size: usize, pool_size: usize) -> PoolAllocator {
    PoolAllocator::new(nz(block_size), nz(pool_size)).unwrap()
}

/// Asserts that every block is accounted for exactly once.
fn assert_conserved(pool: &PoolAllocator) {
    let stats = pool.stats();
    assert_eq!(stats.free_blocks + stats.live_blocks, stats.block_count);
}

#[derive(Clone, Debug, PartialEq)]
struct Record {
    id: u32,
    value: f64,
    name: String,
}

impl Record {
    fn new(id: u32, value: f64, name: &str) -> Self {
        Self {
            id,
            value,
            name: name.to_string(),
        }
    }
}

#[test]
fn int_stack_in_default_sized_pool() {
    let pool = PoolAllocator::builder().block_size(nz(64)).build().unwrap();
    assert_eq!(pool.block_count(), 16_384);

    let mut stack = PoolStack::new_in(&pool);
    for i in 1..=10 {
        stack.push(i * 10).unwrap();
    }

    assert_eq!(stack.len(), 10);
    assert_eq!(
        stack.iter().copied().collect::<Vec<_>>(),
        [10, 20, 30, 40, 50, 60, 70, 80, 90, 100]
    );
    assert_eq!(stack.top(), Some(&100));

    assert_eq!(stack.pop(), Some(100));
    assert_eq!(stack.len(), 9);
    assert_eq!(stack.top(), Some(&90));

    assert_eq!(pool.stats().live_blocks, 1);
    assert_conserved(&pool);
}

#[test]
fn record_stack_clear_and_reuse() {
    let pool = pool(256, 64 * 1024);
    let mut stack = PoolStack::new_in(&pool);

    stack.push(Record::new(1, 1.5, "first")).unwrap();
    stack.push(Record::new(2, 2.5, "second")).unwrap();
    stack.push(Record::new(3, 3.5, "third")).unwrap();

    assert_eq!(stack.len(), 3);
    assert_eq!(stack.top().map(|r| r.name.as_str()), Some("third"));

    let ids: Vec<_> = stack.iter().map(|r| r.id).collect();
    assert_eq!(ids, [1, 2, 3]);

    stack.clear();
    assert!(stack.is_empty());

    stack.push(Record::new(4, 4.5, "fourth")).unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(stack.top(), Some(&Record::new(4, 4.5, "fourth")));
}

#[test]
fn growth_limit_is_one_block() {
    let pool = pool(64, 1024);
    let mut stack = PoolStack::new_in(&pool);

    for value in 0..16_i32 {
        stack.push(value).unwrap();
    }

    let error = stack.push(16).unwrap_err();

    assert_eq!(
        error,
        Error::OversizedRequest {
            bytes: 128,
            alignment: 4,
            block_size: 64,
        }
    );
    assert_eq!(stack.len(), 16);
    assert_eq!(stack.top(), Some(&15));

    // The stack keeps working within its capacity.
    assert_eq!(stack.pop(), Some(15));
    stack.push(99).unwrap();
    assert_eq!(stack.top(), Some(&99));
}

#[test]
fn small_pool_still_fits_five_ints() {
    // Four 64-byte blocks. Growth holds at most two of them at a time.
    let pool = pool(64, 256);
    let mut stack = PoolStack::new_in(&pool);

    for value in 0..4 {
        stack.push(value).unwrap();
    }

    stack.push(4).unwrap();

    assert_eq!(stack.len(), 5);
    assert_eq!(pool.stats().live_blocks, 1);
    assert_conserved(&pool);
}

#[test]
fn stacks_created_in_sequence_return_all_blocks() {
    let pool = pool(64, 1024);

    for _ in 0..3 {
        let mut scratch = PoolStack::new_in(&pool);

        for value in 0..5 {
            scratch.push(value).unwrap();
        }

        assert_eq!(scratch.len(), 5);
        assert_eq!(scratch.top(), Some(&4));
        assert_eq!(pool.stats().live_blocks, 1);
    }

    let stats = pool.stats();
    assert_eq!(stats.live_blocks, 0);
    assert_eq!(stats.free_blocks, 16);
    assert_eq!(stats.live_requested_bytes, 0);
}

#[test]
fn stacks_of_different_types_share_one_pool() {
    let pool = pool(64, 1024);

    let mut ints = PoolStack::new_in(&pool);
    let mut floats = PoolStack::new_in(&pool);
    let mut bytes = PoolStack::new_in(&pool);

    for i in 0..8 {
        ints.push(i).unwrap();
        floats.push(f64::from(i) / 2.0).unwrap();
        bytes.push(u8::try_from(i).unwrap()).unwrap();
    }

    assert_eq!(pool.stats().live_blocks, 3);
    assert_eq!(ints.top(), Some(&7));
    assert_eq!(floats.top(), Some(&3.5));
    assert_eq!(bytes.as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7]);

    drop(floats);
    assert_eq!(pool.stats().live_blocks, 2);
}

#[test]
fn exhaustion_and_recovery() {
    let pool = pool(32, 32 * 8);

    let handles: Vec<BlockHandle> = (0..8).map(|_| pool.allocate(16, 8).unwrap()).collect();

    assert_eq!(
        pool.allocate(1, 1),
        Err(Error::OutOfMemory { block_count: 8 })
    );

    pool.deallocate(handles[3], 16, 8).unwrap();
    assert_eq!(pool.allocate(32, 32).unwrap(), handles[3]);

    for handle in handles {
        pool.deallocate(handle, 16, 8).unwrap();
    }

    assert_eq!(pool.stats().free_blocks, 8);
}

#[test]
fn bookkeeping_is_conserved_across_mixed_traffic() {
    let pool = pool(16, 16 * 32);
    let mut live = Vec::new();

    for step in 0..1000_usize {
        // Two allocations for every release, until the pool runs dry.
        if step % 3 == 2 {
            if let Some(handle) = live.pop() {
                pool.deallocate(handle, 8, 8).unwrap();
            }
        } else {
            match pool.allocate(8, 8) {
                Ok(handle) => live.push(handle),
                Err(Error::OutOfMemory { .. }) => {
                    while let Some(handle) = live.pop() {
                        pool.deallocate(handle, 8, 8).unwrap();
                    }
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_conserved(&pool);
        assert_eq!(pool.stats().live_blocks, live.len());
        assert_eq!(pool.stats().live_requested_bytes, live.len() * 8);
    }
}

#[test]
fn strict_and_lenient_release() {
    let pool = pool(64, 256);
    let handle = pool.allocate(64, 64).unwrap();

    pool.deallocate(handle, 64, 64).unwrap();

    assert_eq!(
        pool.deallocate(handle, 64, 64),
        Err(Error::UnknownBlock {
            address: handle.addr()
        })
    );

    pool.release(handle, 64, 64);

    let stats = pool.stats();
    assert_eq!(stats.free_blocks, 4);
    assert_eq!(stats.live_blocks, 0);
}

#[test]
fn blocks_cannot_cross_pools() {
    let pool_a = pool(64, 256);
    let pool_b = pool(64, 256);

    let handle = pool_a.allocate(8, 8).unwrap();

    assert!(matches!(
        pool_b.deallocate(handle, 8, 8),
        Err(Error::UnknownBlock { .. })
    ));
    assert_eq!(pool_a.stats().live_blocks, 1);
    assert_eq!(pool_b.stats().live_blocks, 0);
    assert_ne!(pool_a, pool_b);
}

/// Drives an allocator through its trait only.
fn allocate_write_release<A: BlockAllocator>(allocator: &A) {
    let handle = allocator.allocate(32, 8).unwrap();

    // SAFETY: The block is at least 32 bytes long, 8-byte aligned and exclusively ours. It is
    // returned with the values it was allocated with.
    unsafe {
        handle.as_ptr().cast::<u64>().write(42);
        assert_eq!(handle.as_ptr().cast::<u64>().read(), 42);

        allocator.deallocate(handle, 32, 8).unwrap();
    }
}

#[test]
fn pool_and_heap_through_allocator_trait() {
    let pool = pool(64, 256);

    allocate_write_release(&pool);
    allocate_write_release(&HeapAllocator);

    assert_eq!(pool.stats().live_blocks, 0);
    assert!(pool.is_equal(&pool));
    assert!(HeapAllocator.is_equal(&HeapAllocator));
}

#[test]
fn heap_stacks_adopt_buffers_on_assign() {
    let heap = HeapAllocator;

    let mut source = PoolStack::new_in(&heap);
    for value in 0..100 {
        source.push(value).unwrap();
    }

    let mut target = PoolStack::new_in(&heap);
    target.push(-1).unwrap();

    let buffer = source.as_slice().as_ptr();
    target.assign(&mut source).unwrap();

    assert_eq!(target.len(), 100);
    assert_eq!(target.as_slice().as_ptr(), buffer);
    assert!(source.is_empty());
}

#[test]
fn assign_between_pools_moves_block_ownership() {
    let pool_a = pool(64, 256);
    let pool_b = pool(64, 256);

    let mut target = PoolStack::new_in(&pool_a);
    let mut source = PoolStack::new_in(&pool_b);
    source.push("x".to_string()).unwrap();
    source.push("y".to_string()).unwrap();

    target.assign(&mut source).unwrap();

    assert_eq!(target.as_slice(), &["x".to_string(), "y".to_string()]);
    assert!(source.is_empty());
    assert_eq!(pool_a.stats().live_blocks, 1);
    assert_eq!(pool_b.stats().live_blocks, 0);

    // The emptied source remains usable.
    source.push("z".to_string()).unwrap();
    assert_eq!(pool_b.stats().live_blocks, 1);
}

#[test]
fn taken_stack_keeps_its_block() {
    let pool = pool(64, 256);

    let mut original = PoolStack::new_in(&pool);
    original.push(1_u64).unwrap();
    original.push(2_u64).unwrap();

    let moved = original.take();

    assert_eq!(moved.as_slice(), &[1, 2]);
    assert_eq!(pool.stats().live_blocks, 1);

    drop(original);
    assert_eq!(pool.stats().live_blocks, 1);

    drop(moved);
    assert_eq!(pool.stats().live_blocks, 0);
}

#[test]
fn strict_drop_policy_is_satisfied_once_stacks_are_gone() {
    let pool = PoolAllocator::builder()
        .block_size(nz(64))
        .pool_size(nz(512))
        .drop_policy(DropPolicy::MustNotReleaseLiveBlocks)
        .build()
        .unwrap();

    {
        let mut stack = PoolStack::new_in(&pool);
        stack.push(1).unwrap();
    }

    drop(pool);
}

#[test]
fn stats_reflect_requested_not_block_bytes() {
    let pool = pool(64, 256);
    let mut stack = PoolStack::new_in(&pool);

    for value in 0..3_u16 {
        stack.push(value).unwrap();
    }

    // Capacity 4 * 2 bytes, even though a whole 64-byte block is occupied.
    let stats = pool.stats();
    assert_eq!(stats.live_blocks, 1);
    assert_eq!(stats.live_requested_bytes, 8);
    assert_eq!(stats.block_size, 64);
}
