//! # ADDRPOOL Core
//!
//! Address allocation over pre-allocated arenas, designed for:
//! - Handing out sub-regions without per-allocation heap calls
//! - O(1) allocate and free
//! - Growing and shrinking arenas without losing live data
//!
//! ## Architecture Rules
//!
//! 1. **The consumer owns the memory** - Allocators only do offset bookkeeping
//! 2. **Metadata is separate from data** - The free list lives in its own reserved region
//! 3. **Failures are explicit** - Every `try_` call says why it failed; sentinel calls return `INVALID`
//!
//! ## Example
//!
//! ```rust,ignore
//! use addrpool_core::{AddressAllocator, PoolAddressAllocator, ReservedSpace};
//!
//! let reserved = ReservedSpace::<u32>::for_pool(512, 64, 64)?;
//! let mut pool = PoolAddressAllocator::new(reserved, None, 64, 512, 64)?;
//!
//! let addr = pool.alloc_addr(64, 16, 0);
//! assert_ne!(addr, u32::MAX);
//! pool.free_addr(addr, 64);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod address;
pub mod alloc;
pub mod config;
pub mod error;
pub mod memory;
pub mod sync;

pub use address::Address;
pub use alloc::{
    AddressAllocator, AddressAllocatorBase, BufferPair, PoolAddressAllocator, RelocatedRange,
    ReservedSpace, Resized,
};
pub use config::PoolConfig;
pub use error::{AllocError, AllocResult};
pub use memory::PoolArena;
pub use sync::{ConcurrencyAdaptor, PoolAddressAllocatorMT, PoolAddressAllocatorST};
