//! # Allocator Base
//!
//! Alignment bookkeeping shared by every allocation strategy.

use crate::address::Address;
use crate::error::{AllocError, AllocResult};

/// Shared state of an address allocator.
///
/// Records where the data region starts, how far into it the first aligned
/// address lies, and the largest alignment a request may ask for. The data
/// region itself is never touched; only its start address matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressAllocatorBase<A: Address> {
    /// Start address of the data region, `None` for offset-only allocators.
    buffer_start: Option<usize>,
    /// Offset of the first address aligned to `max_requestable_alignment`.
    align_offset: A,
    /// Largest alignment a request may ask for.
    max_requestable_alignment: A,
}

impl<A: Address> AddressAllocatorBase<A> {
    /// Creates the base for a data region starting at `buffer_start`.
    ///
    /// A detached allocator (`buffer_start == None`) hands out plain offsets
    /// and has an alignment offset of zero.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidAlignment`] if `max_alignment` is not a
    /// non-zero power of two.
    pub fn new(buffer_start: Option<usize>, max_alignment: A) -> AllocResult<Self> {
        if !max_alignment.is_power_of_two() {
            return Err(AllocError::InvalidAlignment(max_alignment.to_u64()));
        }

        let align_offset = Self::align_up_offset(buffer_start.unwrap_or(0), max_alignment)?;

        Ok(Self {
            buffer_start,
            align_offset,
            max_requestable_alignment: max_alignment,
        })
    }

    /// Smallest offset at which `addr` satisfies `alignment`.
    ///
    /// `alignment` must be a non-zero power of two.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidAlignment`] for a bad alignment and
    /// [`AllocError::AddressOverflow`] if it does not fit `usize`.
    pub fn align_up_offset(addr: usize, alignment: A) -> AllocResult<A> {
        if !alignment.is_power_of_two() {
            return Err(AllocError::InvalidAlignment(alignment.to_u64()));
        }
        let align = alignment.try_to_usize()?;
        let misalignment = addr & (align - 1);
        let offset = if misalignment == 0 { 0 } else { align - misalignment };
        A::try_from_usize(offset)
    }

    /// Smallest offset at which `addr` satisfies `alignment`, or
    /// [`Address::INVALID`] if `alignment` exceeds the configured maximum.
    #[must_use]
    pub fn aligned_start_offset(&self, addr: usize, alignment: A) -> A {
        self.try_aligned_start_offset(addr, alignment)
            .unwrap_or(A::INVALID)
    }

    /// Checked form of [`aligned_start_offset`](Self::aligned_start_offset).
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::AlignmentTooLarge`] if `alignment` exceeds the
    /// configured maximum.
    pub fn try_aligned_start_offset(&self, addr: usize, alignment: A) -> AllocResult<A> {
        self.check_alignment(alignment)?;
        Self::align_up_offset(addr, alignment)
    }

    /// Fails if `alignment` exceeds the maximum requestable alignment.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::AlignmentTooLarge`].
    #[inline]
    pub fn check_alignment(&self, alignment: A) -> AllocResult<()> {
        if alignment > self.max_requestable_alignment {
            return Err(AllocError::AlignmentTooLarge {
                requested: alignment.to_u64(),
                max: self.max_requestable_alignment.to_u64(),
            });
        }
        Ok(())
    }

    /// Same maximum alignment over a different data region.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`new`](Self::new).
    pub fn rebased(&self, buffer_start: Option<usize>) -> AllocResult<Self> {
        Self::new(buffer_start, self.max_requestable_alignment)
    }

    /// Start address of the data region.
    #[inline]
    #[must_use]
    pub const fn buffer_start(&self) -> Option<usize> {
        self.buffer_start
    }

    /// Offset of the first aligned address.
    #[inline]
    #[must_use]
    pub fn align_offset(&self) -> A {
        self.align_offset
    }

    /// Largest alignment a request may ask for.
    #[inline]
    #[must_use]
    pub fn max_requestable_alignment(&self) -> A {
        self.max_requestable_alignment
    }
}

impl<A: Address> Default for AddressAllocatorBase<A> {
    fn default() -> Self {
        Self {
            buffer_start: None,
            align_offset: A::ZERO,
            max_requestable_alignment: A::ONE,
        }
    }
}
