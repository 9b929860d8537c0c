//! Bounded FIFO monitor shared by all producers and the consumer.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::{BufferClosed, Item};

/// A fixed-capacity, blocking FIFO of [`Item`]s.
///
/// All state lives behind one mutex. Producers block in [`push`] while the
/// buffer is full and the consumer blocks in [`pop`] while it is empty; both
/// waits are condition-variable waits, never polling.
///
/// Pushers that have to wait are admitted in the order they arrived: each
/// `push` takes a ticket, and only the oldest waiting ticket may append. A
/// producer pushing in a tight loop therefore cannot overtake a producer
/// that is already waiting, and a waiting producer gets in after at most
/// as many pops as there are pushers ahead of it.
///
/// [`push`]: BoundedBuffer::push
/// [`pop`]: BoundedBuffer::pop
///
/// # Example
///
/// ```
/// use stream_merge::pipeline::BoundedBuffer;
/// use stream_merge::Item;
///
/// let buffer = BoundedBuffer::new(2);
/// buffer.push(Item::Data(b'a')).unwrap();
/// buffer.close();
///
/// assert_eq!(buffer.pop(), Some(Item::Data(b'a')));
/// assert_eq!(buffer.pop(), None); // closed and empty
/// ```
#[derive(Debug)]
pub struct BoundedBuffer {
    state: Mutex<BufferState>,
    /// Signalled when an item is appended or the buffer closes.
    not_empty: Condvar,
    /// Signalled when space frees, a ticket is served, or the buffer closes.
    not_full: Condvar,
    capacity: usize,
}

#[derive(Debug)]
struct BufferState {
    items: VecDeque<Item>,
    open: bool,
    /// Ticket handed to the next caller of `push`.
    next_ticket: u64,
    /// Ticket currently allowed to append.
    now_serving: u64,
    /// Pushers blocked on `not_full`.
    waiting_pushers: usize,
    /// Largest length ever observed.
    high_water: usize,
}

impl BoundedBuffer {
    /// Creates an empty, open buffer holding at most `capacity` items.
    ///
    /// A capacity of zero is raised to one; use
    /// [`MergeConfig`](crate::MergeConfig) validation to reject it earlier.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(BufferState {
                items: VecDeque::with_capacity(capacity),
                open: true,
                next_ticket: 0,
                now_serving: 0,
                waiting_pushers: 0,
                high_water: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Appends `item`, blocking while the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`BufferClosed`] if the buffer is closed before or while
    /// waiting. The item is not enqueued in that case.
    pub fn push(&self, item: Item) -> Result<(), BufferClosed> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(BufferClosed);
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;

        while state.open && (state.now_serving != ticket || state.items.len() >= self.capacity) {
            state.waiting_pushers += 1;
            self.not_full.wait(&mut state);
            state.waiting_pushers -= 1;
        }
        if !state.open {
            return Err(BufferClosed);
        }

        state.items.push_back(item);
        state.now_serving += 1;
        state.high_water = state.high_water.max(state.items.len());
        let wake_pushers = state.waiting_pushers > 0 && state.items.len() < self.capacity;
        drop(state);

        self.not_empty.notify_one();
        if wake_pushers {
            // The next ticket may still fit; only its holder can use it.
            self.not_full.notify_all();
        }
        Ok(())
    }

    /// Removes the oldest item, blocking while the buffer is empty and open.
    ///
    /// Returns `None` once the buffer is closed **and** empty. This is the
    /// end of the stream, not an error.
    pub fn pop(&self) -> Option<Item> {
        let mut state = self.state.lock();
        while state.items.is_empty() && state.open {
            self.not_empty.wait(&mut state);
        }
        let item = state.items.pop_front()?;
        let wake_pushers = state.waiting_pushers > 0;
        drop(state);

        if wake_pushers {
            self.not_full.notify_all();
        }
        Some(item)
    }

    /// Removes up to `max` items at once, blocking like [`pop`](Self::pop).
    ///
    /// Returns `None` once the buffer is closed and empty; otherwise the
    /// returned batch holds at least one item.
    pub fn pop_batch(&self, max: usize) -> Option<Vec<Item>> {
        let max = max.max(1);
        let mut state = self.state.lock();
        while state.items.is_empty() && state.open {
            self.not_empty.wait(&mut state);
        }
        if state.items.is_empty() {
            return None;
        }
        let n = max.min(state.items.len());
        let batch: Vec<Item> = state.items.drain(..n).collect();
        let wake_pushers = state.waiting_pushers > 0;
        drop(state);

        if wake_pushers {
            self.not_full.notify_all();
        }
        Some(batch)
    }

    /// Stops accepting items and wakes every waiting thread.
    ///
    /// Items already queued stay poppable. Returns `true` if this call
    /// closed the buffer, `false` if it was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if !state.open {
            return false;
        }
        state.open = false;
        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();
        true
    }

    /// Returns the maximum number of items the buffer holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of queued items.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns `true` if no items are queued.
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Returns `true` if the buffer holds `capacity` items.
    pub fn is_full(&self) -> bool {
        self.state.lock().items.len() >= self.capacity
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        !self.state.lock().open
    }

    /// Returns the largest number of items ever queued at once.
    pub fn high_water_mark(&self) -> usize {
        self.state.lock().high_water
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// Long enough for a spawned thread to reach its blocking call.
    const SETTLE: Duration = Duration::from_millis(50);

    #[test]
    fn test_fifo_order() {
        let buffer = BoundedBuffer::new(4);
        for byte in b"ABC" {
            buffer.push(Item::Data(*byte)).unwrap();
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.pop(), Some(Item::Data(b'A')));
        assert_eq!(buffer.pop(), Some(Item::Data(b'B')));
        assert_eq!(buffer.pop(), Some(Item::Data(b'C')));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let buffer = BoundedBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
    }

    #[test]
    fn test_push_blocks_when_full() {
        let buffer = Arc::new(BoundedBuffer::new(1));
        buffer.push(Item::Data(1)).unwrap();
        assert!(buffer.is_full());

        let pushed = Arc::new(AtomicBool::new(false));
        let producer = {
            let buffer = Arc::clone(&buffer);
            let pushed = Arc::clone(&pushed);
            thread::spawn(move || {
                buffer.push(Item::Data(2)).unwrap();
                pushed.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(SETTLE);
        assert!(!pushed.load(Ordering::SeqCst));
        assert_eq!(buffer.len(), 1);

        assert_eq!(buffer.pop(), Some(Item::Data(1)));
        producer.join().unwrap();
        assert!(pushed.load(Ordering::SeqCst));
        assert_eq!(buffer.pop(), Some(Item::Data(2)));
        assert_eq!(buffer.high_water_mark(), 1);
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let buffer = Arc::new(BoundedBuffer::new(2));
        let consumer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.pop())
        };

        thread::sleep(SETTLE);
        buffer.push(Item::Data(b'z')).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(Item::Data(b'z')));
    }

    #[test]
    fn test_pop_returns_none_when_closed_and_empty() {
        let buffer = BoundedBuffer::new(2);
        buffer.push(Item::Data(9)).unwrap();
        assert!(buffer.close());

        assert_eq!(buffer.pop(), Some(Item::Data(9)));
        assert_eq!(buffer.pop(), None);
        assert_eq!(buffer.pop(), None);
    }

    #[test]
    fn test_close_is_idempotent() {
        let buffer = BoundedBuffer::new(2);
        assert!(!buffer.is_closed());
        assert!(buffer.close());
        assert!(!buffer.close());
        assert!(buffer.is_closed());
    }

    #[test]
    fn test_push_after_close_fails() {
        let buffer = BoundedBuffer::new(2);
        buffer.close();
        assert_eq!(buffer.push(Item::Data(1)), Err(BufferClosed));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_close_wakes_blocked_pop() {
        let buffer = Arc::new(BoundedBuffer::new(2));
        let consumer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.pop())
        };

        thread::sleep(SETTLE);
        buffer.close();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn test_close_wakes_blocked_push() {
        let buffer = Arc::new(BoundedBuffer::new(1));
        buffer.push(Item::Data(1)).unwrap();

        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.push(Item::Data(2)))
        };

        thread::sleep(SETTLE);
        buffer.close();
        assert_eq!(producer.join().unwrap(), Err(BufferClosed));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_pop_batch_takes_up_to_max() {
        let buffer = BoundedBuffer::new(8);
        for byte in 0..5u8 {
            buffer.push(Item::Data(byte)).unwrap();
        }

        let batch = buffer.pop_batch(3).unwrap();
        assert_eq!(batch, vec![Item::Data(0), Item::Data(1), Item::Data(2)]);
        let batch = buffer.pop_batch(10).unwrap();
        assert_eq!(batch.len(), 2);

        buffer.close();
        assert!(buffer.pop_batch(10).is_none());
    }

    #[test]
    fn test_waiting_pushers_admitted_in_arrival_order() {
        let buffer = Arc::new(BoundedBuffer::new(1));
        buffer.push(Item::Data(0)).unwrap();

        // Each pusher starts only after the previous one is parked.
        let mut handles = Vec::new();
        for byte in 1..=3u8 {
            let buffer = Arc::clone(&buffer);
            handles.push(thread::spawn(move || buffer.push(Item::Data(byte))));
            thread::sleep(SETTLE);
        }

        let popped: Vec<Item> = (0..4).filter_map(|_| buffer.pop()).collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(
            popped,
            vec![Item::Data(0), Item::Data(1), Item::Data(2), Item::Data(3)]
        );
    }

    #[test]
    fn test_length_never_exceeds_capacity_under_contention() {
        for capacity in [1usize, 2, 3, 7, 16] {
            let buffer = Arc::new(BoundedBuffer::new(capacity));
            let producers: Vec<_> = (0..4u8)
                .map(|p| {
                    let buffer = Arc::clone(&buffer);
                    thread::spawn(move || {
                        for _ in 0..250 {
                            buffer.push(Item::Data(p)).unwrap();
                        }
                    })
                })
                .collect();

            let consumer = {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    let mut count = 0usize;
                    while buffer.pop().is_some() {
                        assert!(buffer.len() <= capacity);
                        count += 1;
                    }
                    count
                })
            };

            for producer in producers {
                producer.join().unwrap();
            }
            buffer.close();

            assert_eq!(consumer.join().unwrap(), 1000);
            assert!(buffer.high_water_mark() <= capacity);
        }
    }
}
