//! Pool geometry: block size, large-buffer sizing rule, and free caps.

use std::num::NonZeroUsize;

/// How permitted large-buffer sizes grow between the multiple and the
/// maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// Buckets at every multiple: `m, 2m, 3m, ..., max`.
    Linear,
    /// Buckets at power-of-two multiples: `m, 2m, 4m, ..., max`.
    Exponential,
}

/// Configuration for a [`PoolManager`](crate::PoolManager).
///
/// Geometry is immutable once the manager is constructed. Per-manager
/// behavior knobs (aggressive return, maximum stream capacity, stack
/// capture) live on the manager itself and may be changed at any time.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Size of every small-pool block. Streams grow in whole blocks until
    /// they migrate to a large buffer.
    pub block_size: NonZeroUsize,
    /// Unit of the large-buffer sizing rule. Every permitted large-buffer
    /// size is a multiple of this.
    pub large_buffer_multiple: NonZeroUsize,
    /// Largest pooled buffer size. Requests above it are satisfied with
    /// oversize buffers that are never pooled on return.
    pub maximum_buffer_size: usize,
    /// Sizing rule between the multiple and the maximum.
    pub growth: Growth,
    /// Cap on bytes held in the small pool's free list. Zero means
    /// unbounded.
    pub maximum_free_small_bytes: usize,
    /// Cap on bytes held across the large pool's free lists. Zero means
    /// unbounded.
    pub maximum_free_large_bytes: usize,
}

impl Default for PoolConfig {
    /// 128 KiB blocks, 1 MiB multiple, 128 MiB maximum, linear growth,
    /// unbounded free pools.
    fn default() -> Self {
        Self {
            block_size: NonZeroUsize::new(128 * 1024).unwrap(),
            large_buffer_multiple: NonZeroUsize::new(1024 * 1024).unwrap(),
            maximum_buffer_size: 128 * 1024 * 1024,
            growth: Growth::Linear,
            maximum_free_small_bytes: 0,
            maximum_free_large_bytes: 0,
        }
    }
}

impl PoolConfig {
    /// Creates a config with the given geometry and unbounded free pools.
    ///
    /// # Panics
    ///
    /// Panics if the geometry is invalid (see [`Self::validate`]).
    pub fn new(
        block_size: usize,
        large_buffer_multiple: usize,
        maximum_buffer_size: usize,
        growth: Growth,
    ) -> Self {
        let config = Self {
            block_size: NonZeroUsize::new(block_size).expect("block size must be non-zero"),
            large_buffer_multiple: NonZeroUsize::new(large_buffer_multiple)
                .expect("large buffer multiple must be non-zero"),
            maximum_buffer_size,
            growth,
            maximum_free_small_bytes: 0,
            maximum_free_large_bytes: 0,
        };
        config.validate();
        config
    }

    /// Returns a copy of this config with a new small-pool free cap.
    pub const fn with_maximum_free_small_bytes(mut self, bytes: usize) -> Self {
        self.maximum_free_small_bytes = bytes;
        self
    }

    /// Returns a copy of this config with a new large-pool free cap.
    pub const fn with_maximum_free_large_bytes(mut self, bytes: usize) -> Self {
        self.maximum_free_large_bytes = bytes;
        self
    }

    /// Validates the geometry, panicking on invalid values.
    ///
    /// # Panics
    ///
    /// - `maximum_buffer_size < block_size`
    /// - linear growth and `maximum_buffer_size` is not an exact multiple of
    ///   `large_buffer_multiple`
    /// - exponential growth and `maximum_buffer_size` is not an exact
    ///   power-of-two multiple of `large_buffer_multiple`
    pub(crate) fn validate(&self) {
        assert!(
            self.maximum_buffer_size >= self.block_size.get(),
            "maximum buffer size ({}) must be >= block size ({})",
            self.maximum_buffer_size,
            self.block_size,
        );
        let multiple = self.large_buffer_multiple.get();
        match self.growth {
            Growth::Linear => {
                assert!(
                    self.maximum_buffer_size % multiple == 0,
                    "maximum buffer size must be a multiple of the large buffer multiple"
                );
            }
            Growth::Exponential => {
                let factor = self.maximum_buffer_size / multiple;
                assert!(
                    self.maximum_buffer_size % multiple == 0 && factor.is_power_of_two(),
                    "maximum buffer size must be a power-of-two multiple of the large buffer multiple"
                );
            }
        }
    }

    /// Returns the number of large-buffer buckets.
    pub(crate) fn num_buckets(&self) -> usize {
        let factor = self.maximum_buffer_size / self.large_buffer_multiple.get();
        match self.growth {
            Growth::Linear => factor,
            Growth::Exponential => factor.trailing_zeros() as usize + 1,
        }
    }

    /// Returns the buffer size for a given bucket index.
    pub(crate) fn bucket_size(&self, index: usize) -> usize {
        let multiple = self.large_buffer_multiple.get();
        match self.growth {
            Growth::Linear => (index + 1) * multiple,
            Growth::Exponential => multiple << index,
        }
    }

    /// Returns the bucket index whose size is the smallest permitted size
    /// >= `required`, or `None` if `required` exceeds the maximum buffer
    /// size.
    pub(crate) fn bucket_for(&self, required: usize) -> Option<usize> {
        if required > self.maximum_buffer_size {
            return None;
        }
        let units = required.max(1).div_ceil(self.large_buffer_multiple.get());
        let index = match self.growth {
            Growth::Linear => units - 1,
            Growth::Exponential => units.next_power_of_two().trailing_zeros() as usize,
        };
        debug_assert!(index < self.num_buckets());
        Some(index)
    }

    /// Returns the bucket index for a buffer of exactly `len` bytes, or
    /// `None` if `len` is not a permitted pool size.
    pub(crate) fn bucket_of_exact(&self, len: usize) -> Option<usize> {
        if len == 0 || len > self.maximum_buffer_size {
            return None;
        }
        let multiple = self.large_buffer_multiple.get();
        if len % multiple != 0 {
            return None;
        }
        let units = len / multiple;
        match self.growth {
            Growth::Linear => Some(units - 1),
            Growth::Exponential => units.is_power_of_two().then(|| units.trailing_zeros() as usize),
        }
    }

    /// Returns the smallest size following the sizing rule that is >=
    /// `required`, without the maximum-size cap. Used for oversize rents.
    pub(crate) fn oversize_size(&self, required: usize) -> usize {
        let multiple = self.large_buffer_multiple.get();
        let units = required.max(1).div_ceil(multiple);
        match self.growth {
            Growth::Linear => units * multiple,
            Growth::Exponential => units.next_power_of_two() * multiple,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: usize = 1024 * 1024;

    fn linear_config() -> PoolConfig {
        PoolConfig::new(16384, MIB, 8 * MIB, Growth::Linear)
    }

    #[test]
    fn test_default_geometry() {
        let config = PoolConfig::default();
        config.validate();
        assert_eq!(config.block_size.get(), 128 * 1024);
        assert_eq!(config.large_buffer_multiple.get(), MIB);
        assert_eq!(config.maximum_buffer_size, 128 * MIB);
        assert_eq!(config.growth, Growth::Linear);
    }

    #[test]
    #[should_panic(expected = "block size must be non-zero")]
    fn test_zero_block_size_panics() {
        let _ = PoolConfig::new(0, MIB, 8 * MIB, Growth::Linear);
    }

    #[test]
    #[should_panic(expected = "large buffer multiple must be non-zero")]
    fn test_zero_multiple_panics() {
        let _ = PoolConfig::new(16384, 0, 8 * MIB, Growth::Linear);
    }

    #[test]
    #[should_panic(expected = "must be >= block size")]
    fn test_maximum_below_block_size_panics() {
        let _ = PoolConfig::new(16384, 1024, 8192, Growth::Linear);
    }

    #[test]
    #[should_panic(expected = "must be a multiple of the large buffer multiple")]
    fn test_linear_non_multiple_maximum_panics() {
        let _ = PoolConfig::new(100, 1000, 2500, Growth::Linear);
    }

    #[test]
    #[should_panic(expected = "power-of-two multiple")]
    fn test_exponential_non_power_maximum_panics() {
        // 3000 = 3 * 1000: a multiple, but not a power-of-two multiple.
        let _ = PoolConfig::new(100, 1000, 3000, Growth::Exponential);
    }

    #[test]
    fn test_linear_buckets() {
        let config = linear_config();
        assert_eq!(config.num_buckets(), 8);
        assert_eq!(config.bucket_size(0), MIB);
        assert_eq!(config.bucket_size(7), 8 * MIB);

        assert_eq!(config.bucket_for(0), Some(0));
        assert_eq!(config.bucket_for(1), Some(0));
        assert_eq!(config.bucket_for(MIB), Some(0));
        assert_eq!(config.bucket_for(MIB + 1), Some(1));
        assert_eq!(config.bucket_for(8 * MIB), Some(7));
        assert_eq!(config.bucket_for(8 * MIB + 1), None);
    }

    #[test]
    fn test_exponential_buckets() {
        let config = PoolConfig::new(100, 1000, 8000, Growth::Exponential);
        assert_eq!(config.num_buckets(), 4);
        assert_eq!(config.bucket_size(0), 1000);
        assert_eq!(config.bucket_size(1), 2000);
        assert_eq!(config.bucket_size(2), 4000);
        assert_eq!(config.bucket_size(3), 8000);

        assert_eq!(config.bucket_for(1000), Some(0));
        assert_eq!(config.bucket_for(2000), Some(1));
        assert_eq!(config.bucket_for(4000), Some(2));
        assert_eq!(config.bucket_for(8000), Some(3));
        assert_eq!(config.bucket_for(5000), Some(3));
        assert_eq!(config.bucket_for(8001), None);
    }

    #[test]
    fn test_exact_bucket_lookup() {
        let config = linear_config();
        assert_eq!(config.bucket_of_exact(MIB), Some(0));
        assert_eq!(config.bucket_of_exact(3 * MIB), Some(2));
        assert_eq!(config.bucket_of_exact(MIB + 1), None);
        assert_eq!(config.bucket_of_exact(9 * MIB), None);
        assert_eq!(config.bucket_of_exact(0), None);

        let exp = PoolConfig::new(100, 1000, 8000, Growth::Exponential);
        assert_eq!(exp.bucket_of_exact(4000), Some(2));
        assert_eq!(exp.bucket_of_exact(3000), None);
    }

    #[test]
    fn test_oversize_sizes() {
        let config = linear_config();
        // Next multiple above the maximum.
        assert_eq!(config.oversize_size(8 * MIB + 1), 9 * MIB);
        assert_eq!(config.oversize_size(9 * MIB), 9 * MIB);

        let exp = PoolConfig::new(100, 1000, 8000, Growth::Exponential);
        assert_eq!(exp.oversize_size(8001), 16000);
        assert_eq!(exp.oversize_size(17000), 32000);
    }
}
