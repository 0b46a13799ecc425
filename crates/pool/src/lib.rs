//! # strata-pool
//!
//! A fixed-region memory-pool allocator: one contiguous byte region reserved
//! up front, sub-allocation and release serviced against it with no further
//! reservation from the host.
//!
//! The pool tracks every byte of its region through two sorted lists of
//! block descriptors — allocated spans and free spans — and places requests
//! first-fit, splitting free spans as needed and coalescing released spans
//! with their offset-adjacent neighbors immediately. Request sizes map onto a
//! coarse power-of-two size-class ladder capped at 16-byte alignment.
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_pool::{MemoryPool, PoolError};
//!
//! fn main() -> strata_pool::PoolResult<()> {
//!     let mut pool = MemoryPool::create(1024)?;
//!
//!     // A 10-byte request lands in a 16-byte, 16-aligned block.
//!     let addr = pool.alloc(10)?;
//!
//!     // Addresses are opaque: meaningful only to `free` on the same pool.
//!     pool.free(addr)?;
//!
//!     // Double-free is caught, not undefined.
//!     assert!(matches!(pool.free(addr), Err(PoolError::InvalidAddress { .. })));
//!
//!     // Checked teardown: leaks are reported loudly.
//!     pool.destroy()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `logging` (default): structured logging via `tracing` on error and
//!   lifecycle paths.
//!
//! ## Design
//!
//! A pool is single-threaded by construction: every mutating operation takes
//! `&mut self`, so the borrow checker enforces the one-operation-at-a-time
//! rule and the pool carries no internal locking. Descriptors are plain
//! values owned by exactly one list at a time; the caller only ever sees an
//! address derived from the region base. The block container is
//! [`strata_list::SlabList`], a doubly-linked sequence with generation-checked
//! handles.

#![warn(rust_2018_idioms)]

pub mod block;
pub mod class;
mod config;
pub mod error;
mod pool;
mod stats;

pub use block::BlockDescriptor;
pub use class::SizeClass;
pub use config::PoolConfig;
pub use error::{PoolError, PoolResult};
pub use pool::MemoryPool;
pub use stats::PoolStats;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient re-exports of commonly used types.
pub mod prelude {
    pub use crate::config::PoolConfig;
    pub use crate::error::{PoolError, PoolResult};
    pub use crate::pool::MemoryPool;
    pub use crate::stats::PoolStats;
}
