//! The pool manager: owns the small and large pools and mints streams.

mod config;
mod events;
mod large;
mod small;

pub use config::{Growth, PoolConfig};

use crate::{
    buf::{Block, LargeBuffer},
    observer::Observer,
    stream::Stream,
    Error,
};
use events::Events;
use large::LargePool;
use prometheus_client::registry::Registry;
use small::SmallPool;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

/// Shared state behind every clone of a [`PoolManager`].
struct Inner {
    config: PoolConfig,
    small: SmallPool,
    large: LargePool,
    events: Events,
    aggressive_return: AtomicBool,
    maximum_stream_capacity: AtomicU64,
    capture_stacks: AtomicBool,
}

/// A process-wide pool of stream backing storage.
///
/// The manager owns two pools: fixed-size blocks (streams grow through
/// these) and large contiguous buffers (streams migrate to one when a
/// contiguous view is demanded). Cloning is cheap and shares the pools.
///
/// # Thread Safety
///
/// `PoolManager` is `Send + Sync`; rent and return operations may run
/// concurrently from any number of threads. The four byte counters are
/// observable at any time and reflect a consistent point.
#[derive(Clone)]
pub struct PoolManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("config", &self.inner.config)
            .field("small_pool_free_bytes", &self.small_pool_free_bytes())
            .field("small_pool_in_use_bytes", &self.small_pool_in_use_bytes())
            .field("large_pool_free_bytes", &self.large_pool_free_bytes())
            .field("large_pool_in_use_bytes", &self.large_pool_in_use_bytes())
            .finish()
    }
}

impl Default for PoolManager {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl PoolManager {
    /// Creates a manager with the given geometry.
    ///
    /// # Panics
    ///
    /// Panics if the geometry is invalid (see [`PoolConfig::validate`]
    /// rules on [`PoolConfig`]).
    pub fn new(config: PoolConfig) -> Self {
        config.validate();
        let small = SmallPool::new(&config);
        let large = LargePool::new(&config);
        Self {
            inner: Arc::new(Inner {
                config,
                small,
                large,
                events: Events::new(),
                aggressive_return: AtomicBool::new(false),
                maximum_stream_capacity: AtomicU64::new(0),
                capture_stacks: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the manager's geometry.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Registers the manager's metrics (pool size gauges and event
    /// counters) into `registry`.
    pub fn register_metrics(&self, registry: &mut Registry) {
        self.inner.events.register_metrics(registry);
    }

    /// Subscribes an observer to lifecycle events.
    pub fn subscribe(&self, observer: Arc<dyn Observer>) {
        self.inner.events.subscribe(observer);
    }

    /// Whether streams return superseded storage at migration time rather
    /// than at close. Defaults to false.
    pub fn aggressive_return(&self) -> bool {
        self.inner.aggressive_return.load(Ordering::Acquire)
    }

    /// Sets the aggressive-return policy for streams minted by this
    /// manager.
    pub fn set_aggressive_return(&self, aggressive: bool) {
        self.inner.aggressive_return.store(aggressive, Ordering::Release);
    }

    /// Cap on any single stream's capacity in bytes. Zero (the default)
    /// means unbounded.
    pub fn maximum_stream_capacity(&self) -> u64 {
        self.inner.maximum_stream_capacity.load(Ordering::Acquire)
    }

    /// Sets the per-stream capacity cap. Zero means unbounded.
    pub fn set_maximum_stream_capacity(&self, bytes: u64) {
        self.inner
            .maximum_stream_capacity
            .store(bytes, Ordering::Release);
    }

    /// Whether streams capture creation and close backtraces. Defaults to
    /// false; capture is costly and meant for leak hunting.
    pub fn capture_stacks(&self) -> bool {
        self.inner.capture_stacks.load(Ordering::Acquire)
    }

    /// Enables or disables backtrace capture for streams minted from now
    /// on.
    pub fn set_capture_stacks(&self, capture: bool) {
        self.inner.capture_stacks.store(capture, Ordering::Release);
    }

    /// Rents one block from the small pool.
    pub fn get_block(&self) -> Block {
        self.inner.small.acquire(&self.inner.events)
    }

    /// Returns a batch of blocks to the small pool.
    ///
    /// The batch is validated as a whole before any accounting moves; a
    /// single wrong-sized block rejects the entire batch.
    pub fn return_blocks(&self, blocks: Vec<Block>) -> Result<(), Error> {
        self.inner.small.release(blocks, &self.inner.events)
    }

    /// Rents a contiguous buffer of the smallest permitted size >=
    /// `required` from the large pool. Requests above the maximum buffer
    /// size are satisfied with an oversize buffer that is never pooled on
    /// return.
    pub fn get_large_buffer(&self, required: usize) -> LargeBuffer {
        self.inner.large.acquire(required, &self.inner.events)
    }

    /// Returns a buffer to the large pool.
    pub fn return_large_buffer(&self, buffer: LargeBuffer) -> Result<(), Error> {
        self.inner.large.release(buffer, &self.inner.events)
    }

    /// Bytes sitting in the small pool's free list.
    pub fn small_pool_free_bytes(&self) -> u64 {
        self.inner.small.free_bytes()
    }

    /// Bytes currently loaned out as blocks.
    pub fn small_pool_in_use_bytes(&self) -> u64 {
        self.inner.small.in_use_bytes()
    }

    /// Bytes sitting across the large pool's free lists.
    pub fn large_pool_free_bytes(&self) -> u64 {
        self.inner.large.free_bytes()
    }

    /// Bytes currently loaned out as large buffers.
    pub fn large_pool_in_use_bytes(&self) -> u64 {
        self.inner.large.in_use_bytes()
    }

    /// Creates an empty, untagged stream.
    pub fn stream(&self) -> Stream {
        Stream::new(self)
    }

    /// Creates an empty stream carrying a diagnostic tag.
    pub fn tagged_stream(&self, tag: &str) -> Stream {
        Stream::with_tag(self, tag)
    }

    /// Creates a stream whose capacity already covers `capacity` bytes,
    /// backed block-by-block.
    pub fn stream_with_capacity(&self, tag: Option<&str>, capacity: u64) -> Result<Stream, Error> {
        Stream::build(self, tag, capacity, false)
    }

    /// Creates a stream whose initial backing is a single contiguous
    /// buffer covering `capacity` bytes (a single block when `capacity`
    /// fits one).
    pub fn contiguous_stream(&self, tag: Option<&str>, capacity: u64) -> Result<Stream, Error> {
        Stream::build(self, tag, capacity, true)
    }

    /// Creates a stream holding a copy of `source`, positioned at zero.
    ///
    /// The source is not retained; the stream's storage never aliases it.
    pub fn stream_from(&self, tag: Option<&str>, source: &[u8]) -> Result<Stream, Error> {
        let mut stream = Stream::build(self, tag, source.len() as u64, false)?;
        stream.write(source)?;
        stream.set_position(0)?;
        Ok(stream)
    }

    pub(crate) fn events(&self) -> &Events {
        &self.inner.events
    }
}
