//! # Address Types
//!
//! Unsigned integer types usable as allocator addresses.
//!
//! An address is an offset into a data region. The maximum value of the type
//! is reserved as the [`Address::INVALID`] sentinel and is never handed out.

use std::fmt;
use std::hash::Hash;
use std::ops::{Add, Div, Mul, Rem, Sub};

use bytemuck::Pod;

use crate::error::{AllocError, AllocResult};

/// Unsigned integer usable as an allocator address or size.
///
/// Implemented for `u32`, `u64` and `usize`. The bound on [`Pod`] lets the
/// free list be viewed as raw bytes.
pub trait Address:
    Pod
    + Ord
    + Hash
    + Default
    + fmt::Debug
    + fmt::Display
    + fmt::LowerHex
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Rem<Output = Self>
    + 'static
{
    /// Sentinel signalling allocation failure.
    const INVALID: Self;
    /// Zero.
    const ZERO: Self;
    /// One.
    const ONE: Self;

    /// Converts from `u64`, failing if the value does not fit.
    fn from_u64(value: u64) -> Option<Self>;

    /// Converts from `usize`, failing if the value does not fit.
    fn from_usize(value: usize) -> Option<Self>;

    /// Widens to `u64` for error reporting.
    fn to_u64(self) -> u64;

    /// Converts to `usize`, failing if the value does not fit.
    fn to_usize(self) -> Option<usize>;

    /// Number of trailing zero bits.
    fn trailing_zeros(self) -> u32;

    /// `1 << shift`, or `None` if the shift is out of range.
    fn pow2(shift: u32) -> Option<Self>;

    /// Checked addition.
    fn checked_add(self, rhs: Self) -> Option<Self>;

    /// Checked multiplication.
    fn checked_mul(self, rhs: Self) -> Option<Self>;

    /// Saturating subtraction.
    fn saturating_sub(self, rhs: Self) -> Self;

    /// True for non-zero powers of two.
    fn is_power_of_two(self) -> bool;

    /// Converts from `u64`, reporting overflow as an error.
    #[inline]
    fn try_from_u64(value: u64) -> AllocResult<Self> {
        Self::from_u64(value).ok_or(AllocError::AddressOverflow(value))
    }

    /// Converts from `usize`, reporting overflow as an error.
    #[inline]
    fn try_from_usize(value: usize) -> AllocResult<Self> {
        Self::from_usize(value).ok_or(AllocError::AddressOverflow(value as u64))
    }

    /// Converts to `usize`, reporting overflow as an error.
    #[inline]
    fn try_to_usize(self) -> AllocResult<usize> {
        self.to_usize().ok_or(AllocError::AddressOverflow(self.to_u64()))
    }
}

macro_rules! impl_address {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Address for $ty {
                const INVALID: Self = <$ty>::MAX;
                const ZERO: Self = 0;
                const ONE: Self = 1;

                #[inline]
                fn from_u64(value: u64) -> Option<Self> {
                    <$ty>::try_from(value).ok()
                }

                #[inline]
                fn from_usize(value: usize) -> Option<Self> {
                    <$ty>::try_from(value).ok()
                }

                #[inline]
                #[allow(clippy::cast_lossless, clippy::cast_possible_truncation)]
                fn to_u64(self) -> u64 {
                    self as u64
                }

                #[inline]
                fn to_usize(self) -> Option<usize> {
                    usize::try_from(self).ok()
                }

                #[inline]
                fn trailing_zeros(self) -> u32 {
                    <$ty>::trailing_zeros(self)
                }

                #[inline]
                fn pow2(shift: u32) -> Option<Self> {
                    (1 as $ty).checked_shl(shift)
                }

                #[inline]
                fn checked_add(self, rhs: Self) -> Option<Self> {
                    <$ty>::checked_add(self, rhs)
                }

                #[inline]
                fn checked_mul(self, rhs: Self) -> Option<Self> {
                    <$ty>::checked_mul(self, rhs)
                }

                #[inline]
                fn saturating_sub(self, rhs: Self) -> Self {
                    <$ty>::saturating_sub(self, rhs)
                }

                #[inline]
                fn is_power_of_two(self) -> bool {
                    <$ty>::is_power_of_two(self)
                }
            }
        )*
    };
}

impl_address!(u32, u64, usize);
