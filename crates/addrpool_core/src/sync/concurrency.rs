//! # Concurrency Adaptor
//!
//! Lock-based decorator around any [`AddressAllocator`].
//!
//! Every public call acquires the lock for its duration and releases it on
//! every exit path through the guard. The adaptor never re-enters itself
//! and never runs caller code under the lock, except the closure passed to
//! [`ConcurrencyAdaptor::with_locked`].

use parking_lot::lock_api::{Mutex, MutexGuard, RawMutex};

use crate::alloc::{AddressAllocator, PoolAddressAllocator};
use crate::error::AllocResult;

/// Single-threaded pool allocator.
pub type PoolAddressAllocatorST<A> = PoolAddressAllocator<A>;

/// Pool allocator shareable across threads.
pub type PoolAddressAllocatorMT<A, R = parking_lot::RawMutex> =
    ConcurrencyAdaptor<PoolAddressAllocator<A>, R>;

/// Thread-safe wrapper serializing all calls to an allocation strategy.
///
/// `R` is the mutual-exclusion primitive; any `lock_api` raw mutex works,
/// `parking_lot`'s is the default.
///
/// # Example
///
/// ```rust,ignore
/// let pool = PoolAddressAllocator::new(reserved, None, 64, 4096, 64)?;
/// let shared = Arc::new(ConcurrencyAdaptor::new(pool));
///
/// let addr = shared.alloc_addr(64, 16, 0);
/// shared.free_addr(addr, 64);
/// ```
pub struct ConcurrencyAdaptor<S, R: RawMutex = parking_lot::RawMutex> {
    /// The wrapped strategy.
    inner: Mutex<R, S>,
}

impl<S: AddressAllocator, R: RawMutex> ConcurrencyAdaptor<S, R> {
    /// Wraps `strategy`.
    #[must_use]
    pub fn new(strategy: S) -> Self {
        Self {
            inner: Mutex::new(strategy),
        }
    }

    /// Unwraps the strategy, e.g. to resize it.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }

    /// Unlocked access; exclusivity is proven by `&mut self`.
    pub fn get_mut(&mut self) -> &mut S {
        self.inner.get_mut()
    }

    /// Holds the lock across several calls.
    pub fn lock(&self) -> MutexGuard<'_, R, S> {
        self.inner.lock()
    }

    /// Runs `f` under the lock.
    ///
    /// `f` must not call back into this adaptor or it will deadlock.
    pub fn with_locked<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        f(&mut self.inner.lock())
    }

    /// See [`AddressAllocator::try_alloc_addr`].
    ///
    /// # Errors
    ///
    /// Returns the reason the request could not be satisfied.
    pub fn try_alloc_addr(&self, bytes: S::Addr, alignment: S::Addr, hint: S::Addr) -> AllocResult<S::Addr> {
        self.inner.lock().try_alloc_addr(bytes, alignment, hint)
    }

    /// See [`AddressAllocator::alloc_addr`].
    pub fn alloc_addr(&self, bytes: S::Addr, alignment: S::Addr, hint: S::Addr) -> S::Addr {
        self.inner.lock().alloc_addr(bytes, alignment, hint)
    }

    /// See [`AddressAllocator::try_free_addr`].
    ///
    /// # Errors
    ///
    /// Returns the misuse that was detected.
    pub fn try_free_addr(&self, addr: S::Addr, bytes: S::Addr) -> AllocResult<()> {
        self.inner.lock().try_free_addr(addr, bytes)
    }

    /// See [`AddressAllocator::free_addr`].
    ///
    /// # Panics
    ///
    /// Panics in debug builds on an invalid free. The guard is dropped
    /// during unwinding, so the lock is released.
    pub fn free_addr(&self, addr: S::Addr, bytes: S::Addr) {
        self.inner.lock().free_addr(addr, bytes);
    }

    /// See [`AddressAllocator::reset`].
    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    /// See [`AddressAllocator::max_size`].
    #[must_use]
    pub fn max_size(&self) -> S::Addr {
        self.inner.lock().max_size()
    }

    /// See [`AddressAllocator::max_alignment`].
    #[must_use]
    pub fn max_alignment(&self) -> S::Addr {
        self.inner.lock().max_alignment()
    }

    /// See [`AddressAllocator::safe_shrink_size`].
    #[must_use]
    pub fn safe_shrink_size(&self, byte_bound: S::Addr, guaranteed_alignment: S::Addr) -> S::Addr {
        self.inner.lock().safe_shrink_size(byte_bound, guaranteed_alignment)
    }

    /// See [`AddressAllocator::get_free_size`].
    #[must_use]
    pub fn get_free_size(&self) -> S::Addr {
        self.inner.lock().get_free_size()
    }

    /// See [`AddressAllocator::get_allocated_size`].
    #[must_use]
    pub fn get_allocated_size(&self) -> S::Addr {
        self.inner.lock().get_allocated_size()
    }

    /// See [`AddressAllocator::get_total_size`].
    #[must_use]
    pub fn get_total_size(&self) -> S::Addr {
        self.inner.lock().get_total_size()
    }
}

impl<S: AddressAllocator + Default, R: RawMutex> Default for ConcurrencyAdaptor<S, R> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: AddressAllocator, R: RawMutex> From<S> for ConcurrencyAdaptor<S, R> {
    fn from(strategy: S) -> Self {
        Self::new(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::ReservedSpace;
    use crate::error::AllocError;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn shared_pool(blocks: u32) -> PoolAddressAllocatorMT<u32> {
        let size = blocks * 64;
        let reserved = ReservedSpace::for_pool(size, 64, 64).unwrap();
        ConcurrencyAdaptor::new(PoolAddressAllocator::new(reserved, None, 64, size, 64).unwrap())
    }

    #[test]
    fn test_adaptor_delegates() {
        let pool = shared_pool(8);
        assert_eq!(pool.max_size(), 64);
        assert_eq!(pool.get_total_size(), 512);

        let addr = pool.alloc_addr(64, 16, 0);
        assert_eq!(addr, 0);
        assert_eq!(pool.get_allocated_size(), 64);

        pool.free_addr(addr, 64);
        assert_eq!(pool.get_free_size(), 512);
    }

    #[test]
    fn test_lock_spans_several_calls() {
        let pool = shared_pool(4);
        let pair = {
            let mut guard = pool.lock();
            (guard.alloc_addr(64, 1, 0), guard.alloc_addr(64, 1, 0))
        };
        assert_eq!(pair, (0, 64));
        assert_eq!(pool.with_locked(|p| p.free_block_count()), 2);
    }

    #[test]
    fn test_concurrent_alloc_yields_distinct_addresses() {
        let pool = Arc::new(shared_pool(256));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || (0..32).map(|_| pool.alloc_addr(64, 1, 0)).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for addr in handle.join().unwrap() {
                assert_ne!(addr, u32::MAX);
                assert!(seen.insert(addr), "address {addr} handed out twice");
            }
        }
        assert_eq!(seen.len(), 256);
        assert_eq!(pool.alloc_addr(64, 1, 0), u32::MAX);
    }

    #[test]
    fn test_fair_mutex_primitive() {
        let size = 16 * 64;
        let reserved = ReservedSpace::for_pool(size, 64, 64).unwrap();
        let pool: PoolAddressAllocatorMT<u32, parking_lot::RawFairMutex> =
            ConcurrencyAdaptor::new(PoolAddressAllocator::new(reserved, None, 64, size, 64).unwrap());
        let pool = Arc::new(pool);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || (0..4).map(|_| pool.alloc_addr(64, 1, 0)).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for addr in handle.join().unwrap() {
                assert!(seen.insert(addr), "address {addr} handed out twice");
            }
        }
        assert_eq!(seen.len(), 16);
        assert_eq!(pool.try_alloc_addr(64, 1, 0), Err(AllocError::Exhausted { block_count: 16 }));

        pool.reset();
        assert_eq!(pool.get_free_size(), size);
    }

    #[test]
    fn test_into_inner_round_trip() {
        let pool = shared_pool(4);
        pool.alloc_addr(64, 1, 0);
        let inner = pool.into_inner();
        assert_eq!(inner.free_block_count(), 3);
    }
}
