//! # Pool Address Allocator
//!
//! Fixed-size block strategy with a LIFO free list.
//!
//! Can only allocate up to the size of a single block; there is no support
//! for allocations spanning several blocks.
//!
//! ## Layout
//!
//! ```text
//!  data region (consumer owned)
//!  ┌────────┬─────────┬─────────┬─────┬───────────────┬──────┐
//!  │ offset │ block 0 │ block 1 │ ... │ block count-1 │ tail │
//!  └────────┴─────────┴─────────┴─────┴───────────────┴──────┘
//!
//!  reserved region (free stack, bottom → top)
//!  [ block count-1, ..., block 1, block 0 ]   ← pop yields block 0 first
//! ```

use std::collections::BinaryHeap;

use tracing::{debug, trace};

use super::base::AddressAllocatorBase;
use super::reserved::ReservedSpace;
use super::AddressAllocator;
use crate::address::Address;
use crate::error::{AllocError, AllocResult};

/// Fixed-block allocator over a caller-owned data region.
///
/// Every allocation consumes exactly one block. Allocation pops the top of
/// the free stack, free pushes onto it, both in O(1).
///
/// # Thread Safety
///
/// This allocator is NOT thread-safe. Wrap it in a
/// [`ConcurrencyAdaptor`](crate::sync::ConcurrencyAdaptor) to share it.
///
/// # Example
///
/// ```rust,ignore
/// let reserved = ReservedSpace::<u32>::for_pool(512, 64, 64)?;
/// let mut pool = PoolAddressAllocator::new(reserved, None, 64, 512, 64)?;
///
/// let addr = pool.alloc_addr(64, 16, 0);
/// assert_ne!(addr, u32::MAX);
/// pool.free_addr(addr, 64);
/// ```
#[derive(Debug)]
pub struct PoolAddressAllocator<A: Address> {
    /// Alignment bookkeeping.
    pub(super) base: AddressAllocatorBase<A>,
    /// Number of blocks in the data region.
    pub(super) block_count: A,
    /// Size of a single block.
    pub(super) block_size: A,
    /// Free block offsets.
    pub(super) free_stack: ReservedSpace<A>,
}

impl<A: Address> PoolAddressAllocator<A> {
    /// Creates a pool over `buffer_size` bytes of data.
    ///
    /// The usable alignment is the largest power of two dividing
    /// `block_size`, capped at `max_alignment`. When `buffer` is `None` the
    /// allocator hands out plain offsets, which suits regions that live
    /// elsewhere (e.g. device memory).
    ///
    /// # Arguments
    ///
    /// * `reserved` - Metadata region, see [`reserved_size`](Self::reserved_size)
    /// * `buffer` - Data region whose start address drives alignment
    /// * `max_alignment` - Largest alignment callers may request
    /// * `buffer_size` - Bytes of the data region to manage
    /// * `block_size` - Size of every allocation
    ///
    /// # Errors
    ///
    /// Fails on a zero block size, a bad alignment, a data buffer shorter
    /// than `buffer_size`, or a reserved region too small for the free list.
    pub fn new(
        reserved: ReservedSpace<A>,
        buffer: Option<&[u8]>,
        max_alignment: A,
        buffer_size: A,
        block_size: A,
    ) -> AllocResult<Self> {
        if let Some(buffer) = buffer {
            check_buffer_len(buffer, buffer_size)?;
        }
        Self::with_buffer_start(
            reserved,
            buffer.map(|b| b.as_ptr() as usize),
            max_alignment,
            buffer_size,
            block_size,
        )
    }

    /// Creates a pool over a data region known only by its start address.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new), minus the buffer length check.
    pub fn with_buffer_start(
        reserved: ReservedSpace<A>,
        buffer_start: Option<usize>,
        max_alignment: A,
        buffer_size: A,
        block_size: A,
    ) -> AllocResult<Self> {
        let alignment = block_alignment(max_alignment, block_size)?;
        let base = AddressAllocatorBase::new(buffer_start, alignment)?;
        let block_count = buffer_size.saturating_sub(base.align_offset()) / block_size;
        reserved.ensure_capacity(block_count.try_to_usize()?)?;

        let mut pool = Self {
            base,
            block_count,
            block_size,
            free_stack: reserved,
        };
        pool.reset();

        debug!(
            block_size = block_size.to_u64(),
            block_count = block_count.to_u64(),
            align_offset = base.align_offset().to_u64(),
            max_alignment = alignment.to_u64(),
            "pool allocator created"
        );
        Ok(pool)
    }

    /// Bytes of reserved space a pool over `buffer_size` bytes needs.
    ///
    /// Sized for the worst case, an already aligned buffer, where no bytes
    /// are lost to the alignment offset and the block count is largest.
    ///
    /// # Errors
    ///
    /// Fails on a zero block size, a bad alignment, or if the byte count does
    /// not fit the address type.
    pub fn reserved_size(buffer_size: A, max_alignment: A, block_size: A) -> AllocResult<A> {
        block_alignment(max_alignment, block_size)?;
        let worst_block_count = buffer_size / block_size;
        let entry_size = A::try_from_usize(std::mem::size_of::<A>())?;
        worst_block_count
            .checked_mul(entry_size)
            .ok_or(AllocError::AddressOverflow(worst_block_count.to_u64()))
    }

    /// [`reserved_size`](Self::reserved_size) using the parameters of `other`.
    ///
    /// # Errors
    ///
    /// Same as [`reserved_size`](Self::reserved_size).
    pub fn reserved_size_like(buffer_size: A, other: &Self) -> AllocResult<A> {
        Self::reserved_size(
            buffer_size,
            other.base.max_requestable_alignment(),
            other.block_size,
        )
    }

    /// Size of a single block.
    #[inline]
    #[must_use]
    pub fn block_size(&self) -> A {
        self.block_size
    }

    /// Number of blocks in the data region.
    #[inline]
    #[must_use]
    pub fn block_count(&self) -> A {
        self.block_count
    }

    /// Number of free blocks.
    #[inline]
    #[must_use]
    pub fn free_block_count(&self) -> usize {
        self.free_stack.len()
    }

    /// Offset of block 0 within the data region.
    #[inline]
    #[must_use]
    pub fn align_offset(&self) -> A {
        self.base.align_offset()
    }

    /// Shared alignment bookkeeping.
    #[inline]
    #[must_use]
    pub fn base(&self) -> &AddressAllocatorBase<A> {
        &self.base
    }

    /// Block index of `addr`, or `None` if it is not a block start.
    #[must_use]
    pub fn address_to_block_id(&self, addr: A) -> Option<A> {
        let offset = self.base.align_offset();
        if addr == A::INVALID || addr < offset {
            return None;
        }
        let relative = addr - offset;
        if relative % self.block_size != A::ZERO {
            return None;
        }
        let block = relative / self.block_size;
        (block < self.block_count).then_some(block)
    }

    /// Start offset of block `block`.
    #[inline]
    #[must_use]
    pub fn block_id_to_address(&self, block: A) -> A {
        debug_assert!(block < self.block_count, "block index out of bounds");
        self.base.align_offset() + block * self.block_size
    }

    /// True if `addr` is currently on the free list. O(free blocks).
    #[must_use]
    pub fn is_block_free(&self, addr: A) -> bool {
        self.free_stack.iter().any(|entry| entry == addr)
    }

    /// Free offsets, bottom of the stack first.
    pub fn free_addresses(&self) -> impl Iterator<Item = A> + '_ {
        self.free_stack.iter()
    }

    /// Releases the allocator, handing back its reserved region.
    #[must_use]
    pub fn into_reserved(self) -> ReservedSpace<A> {
        self.free_stack
    }
}

impl<A: Address> AddressAllocator for PoolAddressAllocator<A> {
    type Addr = A;

    fn try_alloc_addr(&mut self, bytes: A, alignment: A, _hint: A) -> AllocResult<A> {
        if self.free_stack.is_empty() {
            return Err(AllocError::Exhausted {
                block_count: self.block_count.to_u64(),
            });
        }
        self.base.check_alignment(alignment)?;
        if bytes == A::ZERO {
            return Err(AllocError::ZeroSize);
        }
        if bytes > self.block_size {
            return Err(AllocError::RequestTooLarge {
                requested: bytes.to_u64(),
                block_size: self.block_size.to_u64(),
            });
        }

        let addr = self.free_stack.pop().ok_or(AllocError::Exhausted {
            block_count: self.block_count.to_u64(),
        })?;
        trace!(addr = addr.to_u64(), "pool alloc");
        Ok(addr)
    }

    fn try_free_addr(&mut self, addr: A, _bytes: A) -> AllocResult<()> {
        if self.address_to_block_id(addr).is_none() {
            return Err(AllocError::InvalidAddress(addr.to_u64()));
        }
        if self.free_stack.len() >= self.block_count.try_to_usize()? {
            return Err(AllocError::DoubleFree(addr.to_u64()));
        }
        #[cfg(debug_assertions)]
        if self.is_block_free(addr) {
            return Err(AllocError::DoubleFree(addr.to_u64()));
        }

        self.free_stack
            .push(addr)
            .map_err(|_| AllocError::DoubleFree(addr.to_u64()))?;
        trace!(addr = addr.to_u64(), "pool free");
        Ok(())
    }

    fn reset(&mut self) {
        let blocks = descending_blocks(
            A::ZERO,
            self.block_count,
            self.block_size,
            self.base.align_offset(),
        );
        self.free_stack.refill(blocks);
    }

    /// Conservative estimate, does not account for space lost to alignment.
    #[inline]
    fn max_size(&self) -> A {
        self.block_size
    }

    #[inline]
    fn max_alignment(&self) -> A {
        self.base.max_requestable_alignment()
    }

    /// Saturates at [`Address::INVALID`] when the slack block does not fit `A`.
    fn safe_shrink_size(&self, byte_bound: A, guaranteed_alignment: A) -> A {
        // A new buffer of unknown alignment may need up to one block of offset.
        let slack = if guaranteed_alignment >= self.base.max_requestable_alignment() {
            A::ZERO
        } else {
            self.block_size
        };
        let with_slack = |kept: A| kept.checked_add(slack).unwrap_or(A::INVALID).max(byte_bound);

        // Never overflows: the blocks fit inside `buffer_size`.
        let total = self.get_total_size();
        if self.free_stack.is_empty() {
            return with_slack(total);
        }

        let bound = byte_bound.max(self.get_allocated_size());
        let offset = self.base.align_offset();
        let candidates: Vec<A> = self
            .free_stack
            .iter()
            .filter(|&entry| entry - offset >= bound)
            .collect();
        let sorted = BinaryHeap::from(candidates).into_sorted_vec();

        // Count the run of free blocks ending at the last block.
        let mut expected = self.block_count;
        let mut reclaimable = A::ZERO;
        for &addr in sorted.iter().rev() {
            if expected == A::ZERO || (addr - offset) / self.block_size != expected - A::ONE {
                break;
            }
            expected = expected - A::ONE;
            reclaimable = reclaimable + A::ONE;
        }

        with_slack(total - reclaimable * self.block_size)
    }

    #[inline]
    fn get_free_size(&self) -> A {
        free_len::<A>(self.free_stack.len()) * self.block_size
    }

    #[inline]
    fn get_allocated_size(&self) -> A {
        (self.block_count - free_len::<A>(self.free_stack.len())) * self.block_size
    }

    #[inline]
    fn get_total_size(&self) -> A {
        self.block_count * self.block_size
    }
}

impl<A: Address> Default for PoolAddressAllocator<A> {
    /// An inert pool with no blocks, usable as a placeholder.
    fn default() -> Self {
        Self {
            base: AddressAllocatorBase::default(),
            block_count: A::ZERO,
            block_size: A::ONE,
            free_stack: ReservedSpace::default(),
        }
    }
}

/// Alignment a pool of `block_size` blocks can guarantee.
fn block_alignment<A: Address>(max_alignment: A, block_size: A) -> AllocResult<A> {
    if block_size == A::ZERO {
        return Err(AllocError::InvalidBlockSize(0));
    }
    if !max_alignment.is_power_of_two() {
        return Err(AllocError::InvalidAlignment(max_alignment.to_u64()));
    }
    let natural = A::pow2(block_size.trailing_zeros()).unwrap_or(max_alignment);
    Ok(natural.min(max_alignment))
}

/// Offsets of blocks `first..end`, highest first.
pub(super) fn descending_blocks<A: Address>(
    first: A,
    end: A,
    block_size: A,
    offset: A,
) -> impl Iterator<Item = A> {
    let mut next = end;
    std::iter::from_fn(move || {
        if next <= first {
            return None;
        }
        next = next - A::ONE;
        Some(offset + next * block_size)
    })
}

/// Fails if `buffer` is shorter than `required` bytes.
pub(super) fn check_buffer_len<A: Address>(buffer: &[u8], required: A) -> AllocResult<()> {
    if (buffer.len() as u64) < required.to_u64() {
        return Err(AllocError::BufferTooSmall {
            required: required.to_u64(),
            available: buffer.len() as u64,
        });
    }
    Ok(())
}

/// Free stack height as an address; bounded by the block count.
#[inline]
fn free_len<A: Address>(len: usize) -> A {
    A::from_usize(len).unwrap_or(A::ZERO)
}
