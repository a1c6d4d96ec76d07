//! Walkthrough of `PoolStack` on top of a shared `PoolAllocator`.
//!
//! Two stacks with different element types draw from the same pool, followed by a loop that
//! creates and drops short-lived stacks to show that their blocks are returned and reused.
#![allow(
    clippy::arithmetic_side_effects,
    reason = "example code with small, known values"
)]

use std::fmt;
use std::num::NonZero;

use block_pool::{PoolAllocator, PoolStack};

/// A record with a heap-owning field, to show that element destructors run correctly.
#[derive(Clone, Debug)]
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

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record{{id={}, value={}, name='{}'}}",
            self.id, self.value, self.name
        )
    }
}

fn main() -> block_pool::Result<()> {
    // 64-byte blocks in a 1 MiB arena.
    let pool = PoolAllocator::builder()
        .block_size(NonZero::new(64).expect("64 is non-zero"))
        .build()?;

    println!("=== PoolStack<i32> ===");

    let mut numbers = PoolStack::new_in(&pool);

    for i in 1..=10 {
        numbers.push(i * 10)?;
    }

    println!("Size: {}", numbers.len());

    let contents: Vec<String> = numbers.iter().map(ToString::to_string).collect();
    println!("Contents (oldest first): {}", contents.join(" "));

    println!("Top: {:?}", numbers.top());
    numbers.pop();
    println!(
        "After pop: size {}, top {:?}",
        numbers.len(),
        numbers.top()
    );

    println!();
    println!("=== PoolStack<Record> ===");

    // Records are 40 bytes, so a 64-byte block holds one and the second push needs 80 bytes.
    // Use a pool with larger blocks for them.
    let record_pool = PoolAllocator::builder()
        .block_size(NonZero::new(256).expect("256 is non-zero"))
        .pool_size(NonZero::new(64 * 1024).expect("64 KiB is non-zero"))
        .build()?;

    let mut records = PoolStack::new_in(&record_pool);

    records.push(Record::new(1, 3.5, "first"))?;
    records.push(Record::new(2, 2.25, "second"))?;
    records.push(Record::new(3, 1.25, "third"))?;

    println!("Size: {}", records.len());

    if let Some(top) = records.top() {
        println!("Top: {top}");
    }

    for record in &records {
        println!("  {record}");
    }

    records.clear();
    println!(
        "After clear: empty {}, size {}, capacity kept {}",
        records.is_empty(),
        records.len(),
        records.capacity()
    );

    records.push(Record::new(4, 1.75, "fourth"))?;
    if let Some(top) = records.top() {
        println!("After push: size {}, top {top}", records.len());
    }

    println!();
    println!("=== Block reuse ===");

    for round in 1..=3 {
        let mut scratch = PoolStack::new_in(&pool);

        for i in 0..5 {
            scratch.push(i)?;
        }

        println!(
            "Round {round}: size {}, top {:?}, live blocks {}",
            scratch.len(),
            scratch.top(),
            pool.stats().live_blocks
        );

        // Dropping the stack returns its block to the pool.
    }

    println!();
    println!("=== Growth limit ===");

    let mut limited = PoolStack::new_in(&pool);
    let mut pushed = 0_i32;

    let error = loop {
        match limited.push(pushed) {
            Ok(()) => pushed += 1,
            Err(error) => break error,
        }
    };

    println!("Pushed {pushed} i32 values into 64-byte blocks before: {error}");

    let stats = pool.stats();
    println!(
        "Pool: {} of {} blocks live, {} bytes requested",
        stats.live_blocks, stats.block_count, stats.live_requested_bytes
    );

    Ok(())
}
