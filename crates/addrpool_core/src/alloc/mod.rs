//! # Address Allocators
//!
//! Strategies that hand out offsets into a caller-owned data region.
//!
//! ## Design Philosophy
//!
//! The allocator never owns the memory it manages:
//! - The data region belongs to the consumer; only its start address is read
//! - Bookkeeping lives in a separate [`ReservedSpace`] sized up front
//! - Allocation and free are O(1) with no heap calls

mod base;
mod pool;
mod reserved;
mod resize;

pub use base::AddressAllocatorBase;
pub use pool::PoolAddressAllocator;
pub use reserved::ReservedSpace;
pub use resize::{BufferPair, RelocatedRange, Resized};

use crate::address::Address;
use crate::error::AllocResult;

/// Capability set shared by every allocation strategy.
///
/// Two flavours of each mutating call are offered. The `try_` methods
/// report the precise failure. [`alloc_addr`](Self::alloc_addr) returns
/// [`Address::INVALID`] instead, and [`free_addr`](Self::free_addr) treats
/// misuse as a fatal fault in debug builds.
pub trait AddressAllocator {
    /// Address type handed out by the allocator.
    type Addr: Address;

    /// Allocates `bytes` with the given alignment.
    ///
    /// `hint` is a placement hint that strategies may ignore.
    ///
    /// # Errors
    ///
    /// Returns the reason the request could not be satisfied.
    fn try_alloc_addr(
        &mut self,
        bytes: Self::Addr,
        alignment: Self::Addr,
        hint: Self::Addr,
    ) -> AllocResult<Self::Addr>;

    /// Allocates `bytes`, returning [`Address::INVALID`] on failure.
    #[inline]
    fn alloc_addr(&mut self, bytes: Self::Addr, alignment: Self::Addr, hint: Self::Addr) -> Self::Addr {
        self.try_alloc_addr(bytes, alignment, hint)
            .unwrap_or(Self::Addr::INVALID)
    }

    /// Returns `addr` to the allocator.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidAddress`](crate::AllocError::InvalidAddress)
    /// or [`AllocError::DoubleFree`](crate::AllocError::DoubleFree) on misuse.
    fn try_free_addr(&mut self, addr: Self::Addr, bytes: Self::Addr) -> AllocResult<()>;

    /// Returns `addr` to the allocator.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the free is invalid. Release builds log the
    /// misuse and leave the bookkeeping untouched.
    fn free_addr(&mut self, addr: Self::Addr, bytes: Self::Addr) {
        if let Err(err) = self.try_free_addr(addr, bytes) {
            if cfg!(debug_assertions) {
                panic!("free_addr misuse: {err}");
            }
            tracing::error!(error = %err, "free_addr misuse ignored");
        }
    }

    /// Marks every block free again.
    fn reset(&mut self);

    /// Conservative upper bound on a single satisfiable request.
    fn max_size(&self) -> Self::Addr;

    /// Largest alignment a request may ask for.
    fn max_alignment(&self) -> Self::Addr;

    /// Smallest data size `>= byte_bound` that keeps every live allocation.
    fn safe_shrink_size(&self, byte_bound: Self::Addr, guaranteed_alignment: Self::Addr) -> Self::Addr;

    /// Bytes currently free.
    fn get_free_size(&self) -> Self::Addr;

    /// Bytes currently allocated.
    fn get_allocated_size(&self) -> Self::Addr;

    /// Bytes managed in total.
    fn get_total_size(&self) -> Self::Addr;
}
