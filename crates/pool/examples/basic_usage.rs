//! Basic usage of the fixed-region pool allocator.
//!
//! Run with `cargo run --example basic_usage`.

use strata_pool::{MemoryPool, PoolConfig, PoolError, PoolResult};

fn main() -> PoolResult<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== strata-pool basic usage ===\n");

    // A 1 KiB pool with statistics tracking on.
    let mut pool = MemoryPool::with_config(1024, PoolConfig::debug())?;

    // Requests are rounded onto the size-class ladder: 10 bytes lands in a
    // 16-byte, 16-aligned block.
    let a = pool.alloc(10)?;
    let b = pool.alloc(100)?;
    let c = pool.alloc(3)?;
    println!(
        "allocated 3 blocks: {} bytes used, {} bytes free",
        pool.used_bytes(),
        pool.free_bytes()
    );

    // Free the middle block: the pool coalesces adjacent free spans, so
    // fragmentation stays bounded.
    pool.free(b)?;
    println!(
        "freed the middle block: {} free spans, largest {} bytes",
        pool.free_blocks(),
        pool.largest_free_block()
    );

    // Out-of-memory is a recoverable error, not a crash.
    match pool.alloc(4096) {
        Err(err @ PoolError::OutOfMemory { .. }) => {
            println!("oversized request rejected: {err} (retryable: {})", err.is_retryable());
        },
        other => println!("unexpected: {other:?}"),
    }

    // Double-free is caught.
    match pool.free(b) {
        Err(err) => println!("double-free rejected: {err}"),
        Ok(()) => println!("unexpected: double-free succeeded"),
    }

    if let Some(stats) = pool.stats() {
        println!(
            "\nstats: {} allocs, {} frees, {} failed, peak {} bytes, utilization {:.1}%",
            stats.total_allocs,
            stats.total_frees,
            stats.failed_allocs,
            stats.peak_used_bytes,
            stats.utilization() * 100.0
        );
    }

    // Checked teardown: destroy reports outstanding allocations.
    pool.free(a)?;
    pool.free(c)?;
    pool.destroy()?;
    println!("\npool destroyed cleanly");

    Ok(())
}
