//! The frontier: a capacity-bounded priority queue of pending work items
//! (§4.2). Ordered by ascending `order_key`; overlaid with backpressure so a
//! fast producer (e.g. a fan-out `Many` of many children) cannot grow the
//! queue without bound.

use crate::cancellation::CancellationToken;
use crate::error::{EngineError, Result};
use crate::order_key::tie_break_key;
use crate::work_item::WorkItem;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;
use tokio::sync::Notify;

/// Snapshot of the frontier's lifetime counters (§4.2 `metrics()`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierMetrics {
    pub total_enqueued: u64,
    pub total_dequeued: u64,
    pub peak_size: u64,
    pub backpressure_events: u64,
}

struct HeapEntry(WorkItem);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}
impl Eq for HeapEntry {}

impl HeapEntry {
    fn sort_key(&self) -> (u64, (String, String, u32)) {
        let item = &self.0;
        (
            item.order_key,
            tie_break_key(&item.node_id, &item.parent_node_id, item.edge_index),
        )
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest order_key sorts first.
        other.sort_key().cmp(&self.sort_key())
    }
}

struct Counters {
    total_enqueued: AtomicU64,
    total_dequeued: AtomicU64,
    peak_size: AtomicU64,
    backpressure_events: AtomicU64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            total_enqueued: AtomicU64::new(0),
            total_dequeued: AtomicU64::new(0),
            peak_size: AtomicU64::new(0),
            backpressure_events: AtomicU64::new(0),
        }
    }
}

/// The bounded priority queue itself.
pub struct Frontier {
    capacity: usize,
    heap: Mutex<BinaryHeap<HeapEntry>>,
    len: AtomicUsize,
    not_empty: Notify,
    not_full: Notify,
    counters: Counters,
}

impl Frontier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: Mutex::new(BinaryHeap::new()),
            len: AtomicUsize::new(0),
            not_empty: Notify::new(),
            not_full: Notify::new(),
            counters: Counters::default(),
        }
    }

    pub fn size(&self) -> usize {
        self.len.load(AtomicOrdering::SeqCst)
    }

    /// Clone the currently pending items without dequeuing them, for
    /// checkpoint commits. Callers that need ascending `order_key` order
    /// must sort the result themselves.
    pub fn snapshot_items(&self) -> Vec<WorkItem> {
        self.heap.lock().iter().map(|entry| entry.0.clone()).collect()
    }

    pub fn metrics(&self) -> FrontierMetrics {
        FrontierMetrics {
            total_enqueued: self.counters.total_enqueued.load(AtomicOrdering::SeqCst),
            total_dequeued: self.counters.total_dequeued.load(AtomicOrdering::SeqCst),
            peak_size: self.counters.peak_size.load(AtomicOrdering::SeqCst),
            backpressure_events: self.counters.backpressure_events.load(AtomicOrdering::SeqCst),
        }
    }

    /// Admit `item`, blocking while the queue is at capacity.
    ///
    /// Returns [`EngineError::BackpressureTimeout`] if `timeout` elapses
    /// first, or [`EngineError::Cancelled`] if `token` fires first.
    pub async fn enqueue(
        &self,
        token: &CancellationToken,
        item: WorkItem,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if token.is_cancelled() {
                return Err(EngineError::Cancelled(
                    token.reason().unwrap_or_else(|| "run cancelled".into()),
                ));
            }

            {
                let mut heap = self.heap.lock();
                if heap.len() < self.capacity {
                    let node_id = item.node_id.clone();
                    let order_key = item.order_key;
                    heap.push(HeapEntry(item));
                    let new_len = heap.len();
                    drop(heap);
                    self.len.store(new_len, AtomicOrdering::SeqCst);
                    self.counters
                        .total_enqueued
                        .fetch_add(1, AtomicOrdering::SeqCst);
                    self.bump_peak(new_len as u64);
                    if new_len >= self.capacity {
                        self.counters
                            .backpressure_events
                            .fetch_add(1, AtomicOrdering::SeqCst);
                        tracing::warn!(capacity = self.capacity, len = new_len, "frontier at capacity");
                    }
                    tracing::trace!(node_id = %node_id, order_key, "enqueued work item");
                    self.not_empty.notify_waiters();
                    return Ok(());
                }
                // capacity reached; fall through and wait for room.
            }

            let notified = self.not_full.notified();
            tokio::select! {
                _ = notified => {}
                _ = token.cancelled() => {
                    return Err(EngineError::Cancelled(
                        token.reason().unwrap_or_else(|| "run cancelled".into()),
                    ));
                }
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(?timeout, "enqueue timed out waiting for frontier capacity");
                    return Err(EngineError::BackpressureTimeout(timeout));
                }
            }
        }
    }

    /// Remove and return the item with the smallest `order_key` without
    /// blocking; `None` if the queue is currently empty.
    pub fn try_dequeue(&self) -> Option<WorkItem> {
        let mut heap = self.heap.lock();
        let HeapEntry(item) = heap.pop()?;
        let new_len = heap.len();
        drop(heap);
        self.len.store(new_len, AtomicOrdering::SeqCst);
        self.counters
            .total_dequeued
            .fetch_add(1, AtomicOrdering::SeqCst);
        self.not_full.notify_waiters();
        tracing::trace!(node_id = %item.node_id, order_key = item.order_key, "dequeued work item");
        Some(item)
    }

    /// Remove and return the item with the smallest `order_key`, blocking
    /// while the queue is empty.
    pub async fn dequeue(&self, token: &CancellationToken) -> Result<WorkItem> {
        loop {
            {
                let mut heap = self.heap.lock();
                if let Some(HeapEntry(item)) = heap.pop() {
                    let new_len = heap.len();
                    drop(heap);
                    self.len.store(new_len, AtomicOrdering::SeqCst);
                    self.counters
                        .total_dequeued
                        .fetch_add(1, AtomicOrdering::SeqCst);
                    self.not_full.notify_waiters();
                    tracing::trace!(node_id = %item.node_id, order_key = item.order_key, "dequeued work item");
                    return Ok(item);
                }
            }

            if token.is_cancelled() {
                return Err(EngineError::Cancelled(
                    token.reason().unwrap_or_else(|| "run cancelled".into()),
                ));
            }

            let notified = self.not_empty.notified();
            tokio::select! {
                _ = notified => {}
                _ = token.cancelled() => {
                    return Err(EngineError::Cancelled(
                        token.reason().unwrap_or_else(|| "run cancelled".into()),
                    ));
                }
            }
        }
    }

    fn bump_peak(&self, candidate: u64) {
        let mut current = self.counters.peak_size.load(AtomicOrdering::SeqCst);
        while candidate > current {
            match self.counters.peak_size.compare_exchange_weak(
                current,
                candidate,
                AtomicOrdering::SeqCst,
                AtomicOrdering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }
}
