//! The bounded per-subscription FIFO that carries batches from the engine
//! (producer) to the algorithm consumer. Single-producer, single-consumer;
//! capacity is advisory, not enforced — `enqueue` never blocks, the engine
//! instead reads `count` in its own backpressure gate.

use crate::types::data_point::Batch;
use parking_lot::Mutex;
use std::collections::VecDeque;

pub struct BoundedBridge {
    queue: Mutex<VecDeque<Batch>>,
    capacity: usize,
}

impl BoundedBridge {
    pub fn new(capacity: usize) -> Self {
        BoundedBridge {
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn enqueue(&self, batch: Batch) {
        if batch.is_empty() {
            return;
        }
        self.queue.lock().push_back(batch);
    }

    pub fn try_dequeue(&self) -> Option<Batch> {
        self.queue.lock().pop_front()
    }

    pub fn count(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_full(&self) -> bool {
        self.count() >= self.capacity
    }

    /// Drains the queue without emitting anything. Used by `purge_data`
    /// during cancellation; safe to call concurrently with an in-flight
    /// `enqueue` — a batch can race past this and survive, which is
    /// acceptable during a shutdown the consumer has already abandoned.
    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}
