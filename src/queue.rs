//! Priority task queues connecting the pipeline stages.
//!
//! `TaskQueue` is the blocking, optionally bounded, priority-ordered queue
//! the orchestrator places between stages. Entries with a lower priority
//! value are dequeued first; entries with equal priority leave in insertion
//! order. `pop` suspends while the queue is empty, `push` suspends while a
//! bounded queue is full, and `close` wakes every suspended caller so worker
//! pools can drain out during shutdown.
//!
//! Waiting is `Notify` based and the `Notified` future is created before the
//! condition is checked, so a notification arriving between the check and
//! the await still completes the wait.

use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Scheduling priority for queue entries. Lower values dequeue first.
pub trait Prioritized {
    fn priority(&self) -> i64;
}

struct Entry<T> {
    priority: i64,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

// BinaryHeap pops its greatest entry; greatest here means lowest priority
// value, then lowest insertion sequence.
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Inner<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

/// A thread-safe priority queue with blocking push and pop.
pub struct TaskQueue<T> {
    inner: Mutex<Inner<T>>,
    capacity: Option<usize>,
    closed: AtomicBool,
    items: Notify,
    space: Notify,
}

impl<T: Prioritized> TaskQueue<T> {
    /// Creates a queue that never blocks producers.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Creates a queue holding at most `capacity` entries.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        TaskQueue {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            capacity,
            closed: AtomicBool::new(false),
            items: Notify::new(),
            space: Notify::new(),
        }
    }

    /// The number of entries currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the queue and wakes every blocked producer and consumer.
    /// Entries still queued are never handed out after this.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.items.notify_waiters();
        self.space.notify_waiters();
    }

    /// Enqueues `item`, suspending while a bounded queue is at capacity.
    ///
    /// Returns the item back to the caller if the queue is closed before
    /// space opens up.
    pub async fn push(&self, item: T) -> Result<(), T> {
        let mut item = item;
        loop {
            let notified = self.space.notified();
            if self.is_closed() {
                return Err(item);
            }
            match self.offer(item) {
                Ok(()) => return Ok(()),
                Err(returned) => item = returned,
            }
            notified.await;
        }
    }

    /// Enqueues `item` only if space is immediately available.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        if self.is_closed() {
            return Err(item);
        }
        self.offer(item)
    }

    fn offer(&self, item: T) -> Result<(), T> {
        let mut inner = self.inner.lock();
        if let Some(capacity) = self.capacity {
            if inner.heap.len() >= capacity {
                return Err(item);
            }
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Entry {
            priority: item.priority(),
            seq,
            item,
        });
        drop(inner);
        self.items.notify_waiters();
        Ok(())
    }

    /// Dequeues the highest-priority entry, suspending while the queue is
    /// empty. Returns `None` once the queue is closed.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.items.notified();
            if self.is_closed() {
                return None;
            }
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            notified.await;
        }
    }

    /// Dequeues immediately if an entry is available.
    pub fn try_pop(&self) -> Option<T> {
        let entry = self.inner.lock().heap.pop()?;
        self.space.notify_waiters();
        Some(entry.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[derive(Debug, PartialEq)]
    struct Job {
        name: &'static str,
        priority: i64,
    }

    impl Job {
        fn new(name: &'static str, priority: i64) -> Self {
            Job { name, priority }
        }
    }

    impl Prioritized for Job {
        fn priority(&self) -> i64 {
            self.priority
        }
    }

    #[tokio::test]
    async fn pops_lowest_priority_value_first_with_fifo_ties() {
        let queue = TaskQueue::unbounded();
        queue.push(Job::new("slow", 5)).await.unwrap();
        queue.push(Job::new("normal", 1)).await.unwrap();
        queue.push(Job::new("slow-second", 5)).await.unwrap();
        queue.push(Job::new("urgent", 0)).await.unwrap();

        let order: Vec<&str> = [
            queue.pop().await.unwrap().name,
            queue.pop().await.unwrap().name,
            queue.pop().await.unwrap().name,
            queue.pop().await.unwrap().name,
        ]
        .to_vec();
        assert_eq!(order, vec!["urgent", "normal", "slow", "slow-second"]);
    }

    #[tokio::test]
    async fn pop_blocks_until_an_item_arrives() {
        let queue = Arc::new(TaskQueue::unbounded());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.push(Job::new("late", 0)).await.unwrap();
        let popped = timeout(Duration::from_secs(1), consumer)
            .await
            .expect("pop never woke")
            .expect("consumer panicked");
        assert_eq!(popped.unwrap().name, "late");
    }

    #[tokio::test]
    async fn bounded_push_blocks_until_space_opens() {
        let queue = Arc::new(TaskQueue::bounded(1));
        queue.push(Job::new("first", 0)).await.unwrap();

        let pushed = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = Arc::clone(&queue);
            let pushed = Arc::clone(&pushed);
            tokio::spawn(async move {
                queue.push(Job::new("second", 0)).await.unwrap();
                pushed.store(true, Ordering::SeqCst);
            })
        };

        sleep(Duration::from_millis(20)).await;
        assert!(!pushed.load(Ordering::SeqCst));

        assert_eq!(queue.pop().await.unwrap().name, "first");
        timeout(Duration::from_secs(1), producer)
            .await
            .expect("push never unblocked")
            .expect("producer panicked");
        assert_eq!(queue.pop().await.unwrap().name, "second");
    }

    #[tokio::test]
    async fn close_wakes_blocked_consumers_with_none() {
        let queue: Arc<TaskQueue<Job>> = Arc::new(TaskQueue::unbounded());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        sleep(Duration::from_millis(10)).await;
        queue.close();

        let popped = timeout(Duration::from_secs(1), consumer)
            .await
            .expect("pop never woke on close")
            .expect("consumer panicked");
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn close_returns_item_to_blocked_producer() {
        let queue = Arc::new(TaskQueue::bounded(1));
        queue.push(Job::new("first", 0)).await.unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.push(Job::new("second", 0)).await })
        };

        sleep(Duration::from_millis(10)).await;
        queue.close();

        let result = timeout(Duration::from_secs(1), producer)
            .await
            .expect("push never woke on close")
            .expect("producer panicked");
        assert_eq!(result, Err(Job::new("second", 0)));
    }

    #[tokio::test]
    async fn pop_after_close_discards_queued_entries() {
        let queue = TaskQueue::unbounded();
        queue.push(Job::new("stranded", 0)).await.unwrap();
        queue.close();
        assert!(queue.pop().await.is_none());
        assert_eq!(queue.len(), 1);
    }
}
