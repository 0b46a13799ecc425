//! Error types for pool operations.
//!
//! Every fallible pool operation returns [`PoolResult`]; nothing panics on a
//! caller mistake. Constructors log through `tracing` when the `logging`
//! feature is enabled, so failure sites carry context without every call site
//! repeating it.

use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::{error, warn};

/// Result type for pool operations.
pub type PoolResult<T> = core::result::Result<T, PoolError>;

/// Errors reported by a [`MemoryPool`](crate::MemoryPool).
///
/// All variants are recoverable: the pool stays usable after any of them, and
/// none of them mutate pool state (beyond the failure counter when statistics
/// tracking is enabled).
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No free block (after attempted splitting) can satisfy the request.
    ///
    /// `free` is the total number of free bytes at the time of the failure;
    /// enough total space may exist while no single block fits `block_size`
    /// at its alignment (fragmentation).
    #[error(
        "out of memory: requested {requested} bytes ({block_size} byte block), {free} bytes free"
    )]
    OutOfMemory {
        requested: usize,
        block_size: usize,
        free: usize,
    },

    /// `free` was called with an address that is not the start of a live
    /// allocation: a double-free, an interior pointer, or an address from
    /// another pool entirely.
    #[error("invalid address: offset {offset} is not the start of a live allocation")]
    InvalidAddress { offset: usize },

    /// The request violates the caller contract (zero-size create or alloc).
    #[error("invalid request: {reason} (size {size})")]
    InvalidRequest { size: usize, reason: &'static str },

    /// The pool was destroyed while allocations were still outstanding.
    ///
    /// The backing region has been released regardless; the error surfaces
    /// the caller-side leak.
    #[error("pool destroyed with {live_blocks} live allocation(s) ({live_bytes} bytes) outstanding")]
    LeakDetected {
        live_blocks: usize,
        live_bytes: usize,
    },
}

impl PoolError {
    /// Whether retrying the operation can succeed without fixing a bug
    /// (e.g. after freeing other blocks).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    /// Stable error code for categorization and log scraping.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::OutOfMemory { .. } => "POOL:ALLOC:OOM",
            Self::InvalidAddress { .. } => "POOL:FREE:ADDRESS",
            Self::InvalidRequest { .. } => "POOL:REQUEST:INVALID",
            Self::LeakDetected { .. } => "POOL:DESTROY:LEAK",
        }
    }

    /// Create an out-of-memory error.
    pub fn out_of_memory(requested: usize, block_size: usize, free: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(
            "pool out of memory: requested {} bytes ({} byte block), {} bytes free",
            requested, block_size, free
        );

        Self::OutOfMemory {
            requested,
            block_size,
            free,
        }
    }

    /// Create an invalid-address error.
    pub fn invalid_address(offset: usize) -> Self {
        #[cfg(feature = "logging")]
        error!("invalid free: offset {} is not a live block start", offset);

        Self::InvalidAddress { offset }
    }

    /// Create an invalid-request error.
    #[must_use]
    pub const fn invalid_request(size: usize, reason: &'static str) -> Self {
        Self::InvalidRequest { size, reason }
    }

    /// Create a leak-detected error.
    pub fn leak_detected(live_blocks: usize, live_bytes: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(
            "pool destroyed with {} live allocation(s) ({} bytes) outstanding",
            live_blocks, live_bytes
        );

        Self::LeakDetected {
            live_blocks,
            live_bytes,
        }
    }
}
