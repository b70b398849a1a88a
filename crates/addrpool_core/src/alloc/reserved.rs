//! # Reserved Space
//!
//! Metadata region holding an allocator's free list.
//!
//! The reserved region is separate from the data region it describes and is
//! never handed out as allocatable space. Its capacity is fixed when it is
//! created, so pushing past it is reported instead of overrunning.

use crate::address::Address;
use crate::error::{AllocError, AllocResult};

/// Fixed-capacity stack of addresses used as allocator bookkeeping.
///
/// # Example
///
/// ```rust,ignore
/// let reserved = ReservedSpace::<u32>::for_pool(4096, 16, 64)?;
/// let pool = PoolAddressAllocator::new(reserved, None, 16, 4096, 64)?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct ReservedSpace<A: Address> {
    /// Stack entries; never grows past `capacity`.
    entries: Vec<A>,
    /// Maximum number of entries.
    capacity: usize,
}

impl<A: Address> ReservedSpace<A> {
    /// Creates a region holding up to `capacity` entries.
    ///
    /// All memory is pre-allocated upfront.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Creates a region from a byte budget, as returned by a sizing query.
    ///
    /// Trailing bytes that cannot hold a whole entry are ignored.
    #[must_use]
    pub fn from_bytes(bytes: usize) -> Self {
        Self::with_capacity(bytes / std::mem::size_of::<A>())
    }

    /// Creates a region sized for a pool over `buffer_size` bytes.
    ///
    /// # Errors
    ///
    /// Propagates the errors of
    /// [`PoolAddressAllocator::reserved_size`](super::PoolAddressAllocator::reserved_size).
    pub fn for_pool(buffer_size: A, max_alignment: A, block_size: A) -> AllocResult<Self> {
        let bytes =
            super::PoolAddressAllocator::reserved_size(buffer_size, max_alignment, block_size)?;
        Ok(Self::from_bytes(bytes.try_to_usize()?))
    }

    /// Maximum number of entries.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity_bytes(&self) -> usize {
        self.capacity * std::mem::size_of::<A>()
    }

    /// Number of entries currently stored.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries are stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if the stack has reached its capacity.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Fails unless the region can hold `required` entries.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::ReservedTooSmall`].
    pub fn ensure_capacity(&self, required: usize) -> AllocResult<()> {
        if required > self.capacity {
            return Err(AllocError::ReservedTooSmall {
                required: required as u64,
                available: self.capacity as u64,
            });
        }
        Ok(())
    }

    /// Pushes an entry.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::ReservedTooSmall`] when the stack is full.
    #[inline]
    pub fn push(&mut self, entry: A) -> AllocResult<()> {
        self.ensure_capacity(self.entries.len() + 1)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Pops the top entry.
    #[inline]
    pub fn pop(&mut self) -> Option<A> {
        self.entries.pop()
    }

    /// Removes every entry, keeping the capacity.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replaces the contents, bottom first, dropping entries past capacity.
    pub(crate) fn refill(&mut self, entries: impl Iterator<Item = A>) {
        self.entries.clear();
        self.entries.extend(entries.take(self.capacity));
    }

    /// Entries from the bottom of the stack to the top.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[A] {
        &self.entries
    }

    /// Raw byte view of the stored entries, e.g. for uploading to a device.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.entries.as_slice())
    }

    /// Iterates from the bottom of the stack to the top.
    pub fn iter(&self) -> impl Iterator<Item = A> + '_ {
        self.entries.iter().copied()
    }
}
