//! Event fan-out: prometheus metrics, tracing, and subscribed observers.

use crate::observer::{DiscardReason, Observer};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Label for discard metrics, identifying why the buffer was dropped.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ReasonLabel {
    reason: String,
}

impl From<DiscardReason> for ReasonLabel {
    fn from(reason: DiscardReason) -> Self {
        let reason = match reason {
            DiscardReason::TooLarge => "too_large",
            DiscardReason::PoolFull => "pool_full",
        };
        Self {
            reason: reason.to_string(),
        }
    }
}

/// Metrics for both pools and the streams they back.
struct Metrics {
    /// Bytes sitting in the small pool's free list.
    small_pool_free_bytes: Gauge,
    /// Bytes loaned out as blocks.
    small_pool_in_use_bytes: Gauge,
    /// Bytes sitting across the large pool's free lists.
    large_pool_free_bytes: Gauge,
    /// Bytes loaned out as large buffers.
    large_pool_in_use_bytes: Gauge,
    /// Total fresh block allocations.
    blocks_created: Counter,
    /// Total blocks dropped at return because the free cap was reached.
    blocks_discarded: Counter,
    /// Total fresh pooled large-buffer allocations.
    large_buffers_created: Counter,
    /// Total oversize (never pooled) large-buffer allocations.
    non_pooled_large_buffers_created: Counter,
    /// Total large buffers dropped at return, by reason.
    large_buffers_discarded: Family<ReasonLabel, Counter>,
    /// Total streams created.
    streams_created: Counter,
    /// Total streams disposed.
    streams_disposed: Counter,
    /// Total closes of already-closed streams.
    stream_double_disposes: Counter,
    /// Total logical-content copies into fresh arrays.
    streams_converted_to_array: Counter,
    /// Total refused grows past the maximum stream capacity.
    streams_over_capacity: Counter,
}

impl Metrics {
    fn new() -> Self {
        Self {
            small_pool_free_bytes: Gauge::default(),
            small_pool_in_use_bytes: Gauge::default(),
            large_pool_free_bytes: Gauge::default(),
            large_pool_in_use_bytes: Gauge::default(),
            blocks_created: Counter::default(),
            blocks_discarded: Counter::default(),
            large_buffers_created: Counter::default(),
            non_pooled_large_buffers_created: Counter::default(),
            large_buffers_discarded: Family::default(),
            streams_created: Counter::default(),
            streams_disposed: Counter::default(),
            stream_double_disposes: Counter::default(),
            streams_converted_to_array: Counter::default(),
            streams_over_capacity: Counter::default(),
        }
    }

    fn register(&self, registry: &mut Registry) {
        registry.register(
            "small_pool_free_bytes",
            "Bytes sitting in the small pool's free list",
            self.small_pool_free_bytes.clone(),
        );
        registry.register(
            "small_pool_in_use_bytes",
            "Bytes loaned out as blocks",
            self.small_pool_in_use_bytes.clone(),
        );
        registry.register(
            "large_pool_free_bytes",
            "Bytes sitting across the large pool's free lists",
            self.large_pool_free_bytes.clone(),
        );
        registry.register(
            "large_pool_in_use_bytes",
            "Bytes loaned out as large buffers",
            self.large_pool_in_use_bytes.clone(),
        );
        registry.register(
            "blocks_created_total",
            "Total fresh block allocations",
            self.blocks_created.clone(),
        );
        registry.register(
            "blocks_discarded_total",
            "Total blocks dropped at return because the free cap was reached",
            self.blocks_discarded.clone(),
        );
        registry.register(
            "large_buffers_created_total",
            "Total fresh pooled large-buffer allocations",
            self.large_buffers_created.clone(),
        );
        registry.register(
            "non_pooled_large_buffers_created_total",
            "Total oversize large-buffer allocations",
            self.non_pooled_large_buffers_created.clone(),
        );
        registry.register(
            "large_buffers_discarded_total",
            "Total large buffers dropped at return",
            self.large_buffers_discarded.clone(),
        );
        registry.register(
            "streams_created_total",
            "Total streams created",
            self.streams_created.clone(),
        );
        registry.register(
            "streams_disposed_total",
            "Total streams disposed",
            self.streams_disposed.clone(),
        );
        registry.register(
            "stream_double_disposes_total",
            "Total closes of already-closed streams",
            self.stream_double_disposes.clone(),
        );
        registry.register(
            "streams_converted_to_array_total",
            "Total logical-content copies into fresh arrays",
            self.streams_converted_to_array.clone(),
        );
        registry.register(
            "streams_over_capacity_total",
            "Total refused grows past the maximum stream capacity",
            self.streams_over_capacity.clone(),
        );
    }
}

/// Shared sink the pools and streams report transitions to.
///
/// Every transition updates the matching metric, writes a tracing line, and
/// fans out to subscribers. Callers must not hold a pool lock while
/// emitting.
pub(crate) struct Events {
    metrics: Metrics,
    subscribers: RwLock<Vec<Arc<dyn Observer>>>,
}

impl Events {
    pub(crate) fn new() -> Self {
        Self {
            metrics: Metrics::new(),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn register_metrics(&self, registry: &mut Registry) {
        self.metrics.register(registry);
    }

    pub(crate) fn subscribe(&self, observer: Arc<dyn Observer>) {
        self.subscribers.write().unwrap().push(observer);
    }

    fn each(&self, f: impl Fn(&dyn Observer)) {
        for observer in self.subscribers.read().unwrap().iter() {
            f(observer.as_ref());
        }
    }

    pub(crate) fn small_pool_sizes(&self, free: u64, in_use: u64) {
        self.metrics.small_pool_free_bytes.set(free as i64);
        self.metrics.small_pool_in_use_bytes.set(in_use as i64);
    }

    pub(crate) fn large_pool_sizes(&self, free: u64, in_use: u64) {
        self.metrics.large_pool_free_bytes.set(free as i64);
        self.metrics.large_pool_in_use_bytes.set(in_use as i64);
    }

    pub(crate) fn block_created(&self) {
        self.metrics.blocks_created.inc();
        debug!("block created");
        self.each(|o| o.block_created());
    }

    pub(crate) fn block_discarded(&self) {
        self.metrics.blocks_discarded.inc();
        debug!("block discarded, free pool full");
        self.each(|o| o.block_discarded());
    }

    pub(crate) fn large_buffer_created(&self, size: usize) {
        self.metrics.large_buffers_created.inc();
        debug!(size, "large buffer created");
        self.each(|o| o.large_buffer_created(size));
    }

    pub(crate) fn non_pooled_large_buffer_created(&self, size: usize) {
        self.metrics.non_pooled_large_buffers_created.inc();
        debug!(size, "oversize large buffer created");
        self.each(|o| o.non_pooled_large_buffer_created(size));
    }

    pub(crate) fn large_buffer_discarded(&self, size: usize, reason: DiscardReason) {
        self.metrics
            .large_buffers_discarded
            .get_or_create(&reason.into())
            .inc();
        debug!(size, ?reason, "large buffer discarded");
        self.each(|o| o.large_buffer_discarded(size, reason));
    }

    pub(crate) fn stream_created(&self) {
        self.metrics.streams_created.inc();
        self.each(|o| o.stream_created());
    }

    pub(crate) fn stream_disposed(&self) {
        self.metrics.streams_disposed.inc();
        self.each(|o| o.stream_disposed());
    }

    pub(crate) fn stream_double_dispose(&self, id: &str) {
        self.metrics.stream_double_disposes.inc();
        warn!(id, "stream closed more than once");
        self.each(|o| o.stream_double_dispose());
    }

    pub(crate) fn stream_converted_to_array(&self) {
        self.metrics.streams_converted_to_array.inc();
        self.each(|o| o.stream_converted_to_array());
    }

    pub(crate) fn stream_over_capacity(&self, id: &str) {
        self.metrics.streams_over_capacity.inc();
        warn!(id, "stream refused to grow past capacity limit");
        self.each(|o| o.stream_over_capacity());
    }
}
