//! # Synchronization for Shared Allocators
//!
//! The allocation strategies assume a single writer. Sharing one across
//! threads goes through [`ConcurrencyAdaptor`], which serializes every call
//! under one lock per adaptor.
//!
//! ```text
//!   Thread 1 ──┐
//!   Thread 2 ──┼──> [ lock ] ──> strategy (alloc / free / reset / queries)
//!   Thread N ──┘
//! ```
//!
//! Coarse-grained by choice of the caller: single-threaded users keep using
//! the bare strategy with no locking cost.

mod concurrency;

pub use concurrency::{ConcurrencyAdaptor, PoolAddressAllocatorMT, PoolAddressAllocatorST};
