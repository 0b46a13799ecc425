//! The pool core: one owned byte region, two sorted block lists, and the
//! first-fit placement algorithm that moves spans between them.
//!
//! # Invariants
//!
//! - `allocated` and `free` are both sorted by ascending offset and their
//!   spans never overlap.
//! - Together the two lists exactly partition `[0, region.len())` — every
//!   byte belongs to exactly one span in exactly one list.
//! - No two spans on `free` are offset-adjacent once a public operation
//!   returns; coalescing completes inside [`MemoryPool::free`].
//!
//! The checks behind these invariants run after every mutating operation in
//! debug builds and compile out in release builds.

use core::ptr::NonNull;

use strata_list::{NodeHandle, SlabList};

#[cfg(feature = "logging")]
use tracing::debug;

use crate::block::BlockDescriptor;
use crate::class::{SizeClass, align_up};
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::stats::PoolStats;

/// Fixed-region memory pool.
///
/// Reserves one contiguous byte region up front and services sub-allocation
/// and release requests against it with no further reservation from the host.
/// Placement is first-fit over free spans in ascending-offset order; released
/// spans are coalesced with offset-adjacent neighbors immediately.
///
/// All mutation goes through `&mut self` — a pool is single-threaded by
/// construction and provides no internal locking.
///
/// ```rust
/// use strata_pool::MemoryPool;
///
/// # fn main() -> strata_pool::PoolResult<()> {
/// let mut pool = MemoryPool::create(64)?;
/// let addr = pool.alloc(10)?; // lands in a 16-byte, 16-aligned block
/// pool.free(addr)?;
/// pool.destroy()?;
/// # Ok(())
/// # }
/// ```
pub struct MemoryPool {
    /// The backing region. Offsets in the two lists index into this buffer;
    /// descriptors never hold pointers into it.
    region: Box<[u8]>,
    /// Live allocations, sorted ascending by offset.
    allocated: SlabList<BlockDescriptor>,
    /// Free spans, sorted ascending by offset, never adjacent.
    free: SlabList<BlockDescriptor>,
    config: PoolConfig,
    counters: Counters,
}

// Summarizes instead of dumping the region bytes.
impl core::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("size", &self.region.len())
            .field("used_bytes", &self.counters.used_bytes)
            .field("allocated_blocks", &self.allocated.len())
            .field("free_blocks", &self.free.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_allocs: u64,
    total_frees: u64,
    failed_allocs: u64,
    /// Maintained unconditionally; error payloads need it even with
    /// statistics tracking off.
    used_bytes: usize,
    peak_used_bytes: usize,
}

impl MemoryPool {
    /// Creates a pool backed by a zero-initialized region of exactly `size`
    /// bytes, with the default configuration.
    ///
    /// `size` must be non-zero; a zero-size pool is rejected with
    /// [`PoolError::InvalidRequest`].
    pub fn create(size: usize) -> PoolResult<Self> {
        Self::with_config(size, PoolConfig::default())
    }

    /// Creates a pool with an explicit configuration.
    pub fn with_config(size: usize, config: PoolConfig) -> PoolResult<Self> {
        if size == 0 {
            return Err(PoolError::invalid_request(0, "zero-size pool"));
        }

        let region = vec![0u8; size].into_boxed_slice();
        let mut free = SlabList::with_capacity(8);
        free.push_back(BlockDescriptor::free_span(0, size));

        let pool = Self {
            region,
            allocated: SlabList::with_capacity(8),
            free,
            config,
            counters: Counters::default(),
        };

        #[cfg(feature = "logging")]
        debug!("created pool: {} bytes", size);

        pool.debug_validate();
        Ok(pool)
    }

    /// Total region size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.region.len()
    }

    /// Bytes currently handed out (rounded block sizes, not raw requests).
    #[must_use]
    pub const fn used_bytes(&self) -> usize {
        self.counters.used_bytes
    }

    /// Bytes currently on the free list.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.region.len() - self.counters.used_bytes
    }

    /// Number of live allocations.
    #[must_use]
    pub fn allocated_blocks(&self) -> usize {
        self.allocated.len()
    }

    /// Number of free spans.
    #[must_use]
    pub fn free_blocks(&self) -> usize {
        self.free.len()
    }

    /// Size of the largest single free span; an allocation larger than this
    /// cannot succeed no matter how much total space is free.
    #[must_use]
    pub fn largest_free_block(&self) -> usize {
        self.free.iter().map(|span| span.size).max().unwrap_or(0)
    }

    /// Whether the pool has no live allocations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allocated.is_empty()
    }

    /// Whether the pool has no free space left at all.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.free.is_empty()
    }

    /// Whether `addr` points into this pool's region.
    #[must_use]
    pub fn contains(&self, addr: NonNull<u8>) -> bool {
        let base = self.region.as_ptr() as usize;
        let addr = addr.as_ptr() as usize;
        addr >= base && addr < base + self.region.len()
    }

    /// Statistics snapshot; `None` when tracking is disabled in the config.
    #[must_use]
    pub fn stats(&self) -> Option<PoolStats> {
        if !self.config.track_stats {
            return None;
        }
        Some(PoolStats {
            total_allocs: self.counters.total_allocs,
            total_frees: self.counters.total_frees,
            failed_allocs: self.counters.failed_allocs,
            used_bytes: self.counters.used_bytes,
            peak_used_bytes: self.counters.peak_used_bytes,
            free_bytes: self.free_bytes(),
            largest_free_block: self.largest_free_block(),
            free_blocks: self.free.len(),
            allocated_blocks: self.allocated.len(),
        })
    }

    /// Allocates a block for `size` bytes and returns its address.
    ///
    /// The request is rounded to its size class (see
    /// [`SizeClass`](crate::class::SizeClass)); the returned address is
    /// aligned to the class alignment. First-fit: the first free span (in
    /// ascending-offset order) that can hold an aligned block wins, splitting
    /// off prefix and suffix remainders as needed.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidRequest`] for `size == 0`; no side effects.
    /// - [`PoolError::OutOfMemory`] when no free span fits; the pool is left
    ///   untouched and stays usable; freeing other blocks can make a retry
    ///   succeed.
    pub fn alloc(&mut self, size: usize) -> PoolResult<NonNull<u8>> {
        if size == 0 {
            return Err(PoolError::invalid_request(0, "zero-size allocation"));
        }

        let class = SizeClass::for_request(size);
        let Some((span_handle, start)) = self.find_placement(class) else {
            if self.config.track_stats {
                self.counters.failed_allocs += 1;
            }
            return Err(PoolError::out_of_memory(size, class.size, self.free_bytes()));
        };

        // Split: the chosen span leaves the free list; whatever the block
        // does not cover goes back in, still sorted. Inserting both
        // remainders before the old successor keeps ascending-offset order
        // without a search.
        let successor = self.free.next(span_handle);
        let Some(span) = self.free.remove(span_handle) else {
            unreachable!("placement handle comes from the scan above");
        };

        let block_end = start + class.size;
        if span.offset < start {
            self.insert_free_before(successor, BlockDescriptor::free_span(span.offset, start - span.offset));
        }
        if block_end < span.end() {
            self.insert_free_before(successor, BlockDescriptor::free_span(block_end, span.end() - block_end));
        }

        Self::sorted_insert(
            &mut self.allocated,
            BlockDescriptor::allocated(start, class.size, size),
        );

        if let Some(pattern) = self.config.alloc_pattern {
            self.region[start..block_end].fill(pattern);
        }

        self.counters.used_bytes += class.size;
        if self.config.track_stats {
            self.counters.total_allocs += 1;
            self.counters.peak_used_bytes = self.counters.peak_used_bytes.max(self.counters.used_bytes);
        }

        self.debug_validate();

        // SAFETY: deriving the caller-facing address from the region base.
        // - `start + class.size <= region.len()` (placement contract above)
        //   and `class.size >= 1`, so `start < region.len()` and the offset
        //   pointer stays inside the region allocation.
        // - `region` is a live Box<[u8]> with non-zero length, so the base
        //   pointer is non-null and the offset pointer cannot wrap.
        let addr = unsafe { NonNull::new_unchecked(self.region.as_mut_ptr().add(start)) };
        Ok(addr)
    }

    /// Releases the block starting at `addr`.
    ///
    /// `addr` must be an address previously returned by [`alloc`](Self::alloc)
    /// on this same pool and not yet freed. Block identity is the exact
    /// block start, not containment. The released span is re-inserted into
    /// the free list at its sorted position and immediately coalesced with
    /// any offset-adjacent free neighbor.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidAddress`] when `addr` is not the start of a live
    /// allocation (double-free, interior pointer, foreign address). Nothing
    /// is mutated.
    pub fn free(&mut self, addr: NonNull<u8>) -> PoolResult<()> {
        let offset = self.offset_of(addr)?;
        let handle = self
            .allocated
            .iter_handles()
            .find(|(_, block)| block.offset == offset)
            .map(|(handle, _)| handle)
            .ok_or_else(|| PoolError::invalid_address(offset))?;

        let Some(block) = self.allocated.remove(handle) else {
            unreachable!("handle comes from the scan above");
        };

        if let Some(pattern) = self.config.dealloc_pattern {
            self.region[block.offset..block.end()].fill(pattern);
        }

        // The free copy drops the request: free spans carry no request.
        Self::sorted_insert(
            &mut self.free,
            BlockDescriptor::free_span(block.offset, block.size),
        );
        self.coalesce();

        self.counters.used_bytes -= block.size;
        if self.config.track_stats {
            self.counters.total_frees += 1;
        }

        self.debug_validate();
        Ok(())
    }

    /// Tears the pool down, checking for leaked allocations.
    ///
    /// The region and both lists are released either way (consuming `self`
    /// releases unconditionally); the error is the loud diagnostic for
    /// allocations the caller never freed.
    ///
    /// # Errors
    ///
    /// [`PoolError::LeakDetected`] when live allocations are outstanding.
    pub fn destroy(self) -> PoolResult<()> {
        let live_blocks = self.allocated.len();
        if live_blocks > 0 {
            let live_bytes = self.allocated.iter().map(|block| block.size).sum();
            return Err(PoolError::leak_detected(live_blocks, live_bytes));
        }

        #[cfg(feature = "logging")]
        debug!("pool destroyed cleanly: {} bytes", self.region.len());

        Ok(())
    }

    /// First-fit scan: the first free span that can hold an aligned
    /// `class.size` block, together with the chosen start offset.
    ///
    /// The start is the lowest aligned offset inside the span, computed by
    /// rounding the span offset up; a byte-by-byte scan from the span start
    /// would land on the same position. A span big enough
    /// in total but with no room after alignment padding is rejected and the
    /// scan continues.
    fn find_placement(&self, class: SizeClass) -> Option<(NodeHandle, usize)> {
        self.free.iter_handles().find_map(|(handle, span)| {
            if span.size < class.size {
                return None;
            }
            let start = align_up(span.offset, class.alignment);
            (start + class.size <= span.end()).then_some((handle, start))
        })
    }

    /// Maps a caller address back to a region offset.
    fn offset_of(&self, addr: NonNull<u8>) -> PoolResult<usize> {
        let base = self.region.as_ptr() as usize;
        let addr = addr.as_ptr() as usize;
        if addr < base || addr >= base + self.region.len() {
            // Foreign address: report the raw delta for diagnostics.
            return Err(PoolError::invalid_address(addr.wrapping_sub(base)));
        }
        Ok(addr - base)
    }

    /// Inserts a free span directly before `anchor`, or at the tail when the
    /// removed span had no successor. Callers guarantee this is the sorted
    /// position.
    fn insert_free_before(&mut self, anchor: Option<NodeHandle>, span: BlockDescriptor) {
        match anchor {
            Some(anchor) => {
                self.free.insert_before(Some(anchor), span);
            },
            None => {
                self.free.push_back(span);
            },
        }
    }

    /// Inserts `block` at its sorted (ascending-offset) position: before the
    /// first entry with a greater offset, at the tail when there is none.
    /// Ties cannot occur since spans never overlap.
    fn sorted_insert(list: &mut SlabList<BlockDescriptor>, block: BlockDescriptor) {
        let before = list
            .iter_handles()
            .find(|(_, existing)| existing.offset > block.offset)
            .map(|(handle, _)| handle);
        match before {
            Some(handle) => {
                list.insert_before(Some(handle), block);
            },
            None => {
                list.push_back(block);
            },
        }
    }

    /// One head-to-tail pass merging offset-adjacent free spans: the earlier
    /// span absorbs the later one, then the pass retries from the grown span
    /// so runs of three or more collapse too. A single pass suffices because
    /// the list stays offset-sorted.
    fn coalesce(&mut self) {
        let mut cursor = self.free.head();
        while let Some(current) = cursor {
            let Some(next) = self.free.next(current) else {
                break;
            };
            let (Some(&first), Some(&second)) = (self.free.get(current), self.free.get(next))
            else {
                unreachable!("cursor handles are live");
            };
            if first.abuts(&second) {
                if let Some(span) = self.free.get_mut(current) {
                    span.size += second.size;
                }
                self.free.remove(next);
                // Stay on `current`: it may now abut its new successor.
            } else {
                cursor = Some(next);
            }
        }
    }

    /// Validates the partition and ordering invariants; debug builds only.
    fn debug_validate(&self) {
        #[cfg(debug_assertions)]
        {
            let mut spans: Vec<BlockDescriptor> = self
                .allocated
                .iter()
                .chain(self.free.iter())
                .copied()
                .collect();
            spans.sort_by_key(|span| span.offset);

            let mut expected = 0;
            for span in &spans {
                debug_assert!(span.size > 0, "zero-size descriptor at {}", span.offset);
                debug_assert_eq!(
                    span.offset, expected,
                    "partition gap or overlap at offset {}",
                    span.offset
                );
                expected = span.end();
            }
            debug_assert_eq!(expected, self.region.len(), "partition does not cover the region");

            for list in [&self.allocated, &self.free] {
                for window in list.iter().collect::<Vec<_>>().windows(2) {
                    debug_assert!(
                        window[0].offset < window[1].offset,
                        "list out of ascending-offset order"
                    );
                }
            }
            for window in self.free.iter().collect::<Vec<_>>().windows(2) {
                debug_assert!(
                    !window[0].abuts(window[1]),
                    "adjacent free spans survived coalescing"
                );
            }

            let used: usize = self.allocated.iter().map(|block| block.size).sum();
            debug_assert_eq!(used, self.counters.used_bytes, "used-bytes counter drifted");
        }
    }
}
