//! # Pool Configuration
//!
//! Arena sizing loaded once at startup from TOML.
//!
//! ```toml
//! buffer_size = 65536
//! block_size = 256
//! max_alignment = 64
//! grow_on_exhaustion = true
//! max_buffer_size = 1048576
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{AllocError, AllocResult};

/// Sizing and growth policy of a pool arena.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Initial data buffer size in bytes.
    pub buffer_size: u64,
    /// Size of every block in bytes.
    pub block_size: u64,
    /// Largest alignment callers may request.
    pub max_alignment: u64,
    /// Double the buffer instead of failing when every block is in use.
    pub grow_on_exhaustion: bool,
    /// Upper bound for growth, `None` for no bound.
    pub max_buffer_size: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,
            block_size: 256,
            max_alignment: 64,
            grow_on_exhaustion: false,
            max_buffer_size: None,
        }
    }
}

impl PoolConfig {
    /// Fixed-size pool of `block_count` blocks of `block_size` bytes.
    ///
    /// The buffer size saturates at `u64::MAX`; building an arena from such
    /// a config reports [`AllocError::AddressOverflow`].
    #[must_use]
    pub fn fixed(block_count: u64, block_size: u64) -> Self {
        Self {
            buffer_size: block_count.saturating_mul(block_size),
            block_size,
            max_alignment: 1u64 << block_size.trailing_zeros().min(12),
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidConfig`] on malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> AllocResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|err| AllocError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidConfig`] if the file cannot be read or
    /// fails [`from_toml_str`](Self::from_toml_str).
    pub fn from_toml_file(path: impl AsRef<Path>) -> AllocResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|err| AllocError::InvalidConfig(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Checks the values describe a usable pool.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> AllocResult<()> {
        if self.block_size == 0 {
            return Err(AllocError::InvalidConfig("block_size must be non-zero".into()));
        }
        if !self.max_alignment.is_power_of_two() {
            return Err(AllocError::InvalidConfig(format!(
                "max_alignment {} is not a power of two",
                self.max_alignment
            )));
        }
        if self.buffer_size < self.block_size {
            return Err(AllocError::InvalidConfig(format!(
                "buffer_size {} holds no {}-byte block",
                self.buffer_size, self.block_size
            )));
        }
        if let Some(max) = self.max_buffer_size {
            if max < self.buffer_size {
                return Err(AllocError::InvalidConfig(format!(
                    "max_buffer_size {max} is below buffer_size {}",
                    self.buffer_size
                )));
            }
        }
        Ok(())
    }

    /// Converts the sizes to the address type `A`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::AddressOverflow`] if a value does not fit `A`.
    pub fn sizes<A: Address>(&self) -> AllocResult<(A, A, A)> {
        Ok((
            A::try_from_u64(self.buffer_size)?,
            A::try_from_u64(self.block_size)?,
            A::try_from_u64(self.max_alignment)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_document() {
        let config = PoolConfig::from_toml_str(
            r"
            buffer_size = 4096
            block_size = 64
            max_alignment = 16
            grow_on_exhaustion = true
            max_buffer_size = 16384
            ",
        )
        .unwrap();
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.block_size, 64);
        assert_eq!(config.max_alignment, 16);
        assert!(config.grow_on_exhaustion);
        assert_eq!(config.max_buffer_size, Some(16384));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = PoolConfig::from_toml_str("block_size = 128").unwrap();
        assert_eq!(config.block_size, 128);
        assert_eq!(config.buffer_size, PoolConfig::default().buffer_size);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            PoolConfig::from_toml_str("block_size = 0"),
            Err(AllocError::InvalidConfig(_))
        ));
        assert!(matches!(
            PoolConfig::from_toml_str("max_alignment = 24"),
            Err(AllocError::InvalidConfig(_))
        ));
        assert!(matches!(
            PoolConfig::from_toml_str("bogus = 1"),
            Err(AllocError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_fixed() {
        let config = PoolConfig::fixed(8, 64);
        assert_eq!(config.buffer_size, 512);
        assert_eq!(config.max_alignment, 64);
        config.validate().unwrap();
        assert_eq!(config.sizes::<u32>(), Ok((512, 64, 64)));
    }

    #[test]
    fn test_fixed_saturates() {
        let config = PoolConfig::fixed(u64::MAX, 2);
        assert_eq!(config.buffer_size, u64::MAX);
        assert!(matches!(config.sizes::<u32>(), Err(AllocError::AddressOverflow(_))));
    }
}
