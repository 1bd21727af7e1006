//! Bounded prefetch between batch production and the training loop
//!
//! A single background worker repeatedly asks the sampler for a batch and
//! pushes it into a bounded FIFO; the training loop pops from the other
//! end. The queue's lock is the only synchronization: the snapshot behind
//! the sampler is frozen and every batch owns fresh memory.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use log::{debug, error};

use crate::sampling::batch::{Batch, BatchSampler};

/// Number of batches prepared ahead of the consumer.
pub const PREFETCH_CAPACITY: usize = 3;

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Bounded FIFO for one producer and one consumer. Both ends block;
/// closing wakes everyone and drains cleanly.
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Block until there is room, then enqueue. Returns false if the
    /// queue was closed instead.
    pub fn push(&self, item: T) -> bool {
        let mut state = self.state.lock().unwrap();
        while state.items.len() >= self.capacity && !state.closed {
            state = self.not_full.wait(state).unwrap();
        }
        if state.closed {
            return false;
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
        true
    }

    /// Block until an item is available and dequeue it. Returns None once
    /// the queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        while state.items.is_empty() && !state.closed {
            state = self.not_empty.wait(state).unwrap();
        }
        let item = state.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Block until an item is available and return a copy of the head
    /// without removing it. Returns None once the queue is closed and
    /// drained.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let mut state = self.state.lock().unwrap();
        while state.items.is_empty() && !state.closed {
            state = self.not_empty.wait(state).unwrap();
        }
        state.items.front().cloned()
    }

    /// Close the queue: producers stop, consumers drain what remains.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owns the prefetch queue and its producer thread. Dropping the pipeline
/// closes the queue and joins the worker.
pub struct PrefetchPipeline {
    queue: Arc<BoundedQueue<Batch>>,
    worker: Option<JoinHandle<()>>,
}

impl PrefetchPipeline {
    /// Start producing batches in the background. The sampler moves into
    /// the worker thread; it is the queue's only writer.
    pub fn start(mut sampler: BatchSampler) -> Self {
        let queue = Arc::new(BoundedQueue::new(PREFETCH_CAPACITY));
        let producer_queue = Arc::clone(&queue);
        let worker = std::thread::Builder::new()
            .name("prefetch".into())
            .spawn(move || {
                loop {
                    match sampler.next_batch() {
                        Ok(batch) => {
                            if !producer_queue.push(batch) {
                                debug!("prefetch queue closed, stopping producer");
                                break;
                            }
                        }
                        Err(e) => {
                            // A failed batch cannot be skipped without
                            // breaking delivery order; the whole pipeline
                            // stops and the consumer sees the closure.
                            error!("batch production failed: {e}");
                            producer_queue.close();
                            break;
                        }
                    }
                }
            })
            .expect("failed to spawn prefetch worker");
        Self {
            queue,
            worker: Some(worker),
        }
    }

    /// Dequeue the next batch, blocking until one is ready. None means
    /// the producer has terminated.
    pub fn next(&self) -> Option<Batch> {
        self.queue.pop()
    }

    /// Copy of the head batch without dequeuing it.
    pub fn peek(&self) -> Option<Batch> {
        self.queue.peek()
    }

    /// Batches currently buffered.
    pub fn buffered(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for PrefetchPipeline {
    fn drop(&mut self) {
        self.queue.close();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = BoundedQueue::new(3);
        for i in 0..3 {
            assert!(queue.push(i));
        }
        assert_eq!(queue.pop(), Some(0));
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
    }

    #[test]
    fn test_capacity_blocks_producer() {
        let queue = Arc::new(BoundedQueue::new(3));

        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for i in 0..10 {
                    queue.push(i);
                }
            })
        };

        let mut popped = Vec::new();
        while popped.len() < 10 {
            std::thread::sleep(Duration::from_millis(1));
            assert!(queue.len() <= 3);
            if let Some(v) = queue.pop() {
                popped.push(v);
            }
        }
        producer.join().unwrap();
        // Delivery order equals production order.
        assert_eq!(popped, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let queue = BoundedQueue::new(3);
        assert!(queue.push(42));
        assert_eq!(queue.peek(), Some(42));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(42));
    }

    #[test]
    fn test_close_unblocks_consumer() {
        let queue: Arc<BoundedQueue<i32>> = Arc::new(BoundedQueue::new(3));
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.pop())
        };
        std::thread::sleep(Duration::from_millis(10));
        queue.close();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn test_close_drains_remaining_items() {
        let queue = BoundedQueue::new(3);
        assert!(queue.push(1));
        queue.close();
        assert!(!queue.push(2));
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), None);
    }
}
