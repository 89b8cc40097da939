//! Notification inbox shared between a backend's listener and the write-wait protocol.

use static_assertions::assert_impl_all;
use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::backend::Handle;

type Queues = HashMap<Handle, VecDeque<Vec<u8>>>;

/// Per-handle FIFO queues of notification values.
///
/// The backend's listener [`push`](Inbox::push)es values as they arrive, the device drains them.
/// Every method holds the inbox lock for its whole duration, so [`take`](Inbox::take) checks the
/// queue length and pops in one step.
#[derive(Debug, Default)]
pub struct Inbox {
    queues: Mutex<Queues>,
    arrived: Condvar,
}

assert_impl_all!(Inbox: Send, Sync);

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value received on `handle` and wakes up waiters.
    pub fn push(&self, handle: Handle, value: Vec<u8>) {
        self.lock().entry(handle).or_default().push_back(value);
        self.arrived.notify_all();
    }

    /// Number of values queued for `handle`.
    pub fn len(&self, handle: Handle) -> usize {
        self.lock().get(&handle).map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().values().all(|q| q.is_empty())
    }

    /// Copy of every queue, in arrival order.
    pub fn snapshot(&self) -> HashMap<Handle, Vec<Vec<u8>>> {
        self.lock()
            .iter()
            .map(|(&h, q)| (h, q.iter().cloned().collect()))
            .collect()
    }

    /// Removes the value at `index` of `handle`'s queue.
    pub fn remove(&self, handle: Handle, index: usize) -> Option<Vec<u8>> {
        self.lock().get_mut(&handle)?.remove(index)
    }

    /// Pops exactly `count` values from the head of `handle`'s queue if at least that many are
    /// queued. Otherwise leaves the queue untouched and returns `None`.
    pub fn take(&self, handle: Handle, count: usize) -> Option<Vec<Vec<u8>>> {
        Self::take_locked(&mut self.lock(), handle, count)
    }

    /// Blocks until `handle`'s queue holds at least `count` values or `timeout` elapses.
    /// Returns whether the queue is ready; nothing is removed.
    pub fn wait(&self, handle: Handle, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queues = self.lock();
        loop {
            if queues.get(&handle).map(|q| q.len()).unwrap_or(0) >= count {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            queues = self.arrived.wait_timeout(queues, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Drops every queued value.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn take_locked(queues: &mut Queues, handle: Handle, count: usize) -> Option<Vec<Vec<u8>>> {
        let queue = queues.get_mut(&handle)?;
        if queue.len() < count {
            return None;
        }
        Some(queue.drain(..count).collect())
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const H: Handle = Handle(0x0e);

    #[test]
    fn take_is_fifo() {
        let inbox = Inbox::new();
        inbox.push(H, vec![1]);
        inbox.push(H, vec![2]);
        inbox.push(H, vec![3]);
        assert_eq!(inbox.take(H, 2), Some(vec![vec![1], vec![2]]));
        assert_eq!(inbox.len(H), 1);
        assert_eq!(inbox.take(H, 1), Some(vec![vec![3]]));
        assert!(inbox.is_empty());
    }

    #[test]
    fn short_take_leaves_queue_untouched() {
        let inbox = Inbox::new();
        inbox.push(H, vec![1, 2]);
        assert_eq!(inbox.take(H, 2), None);
        assert_eq!(inbox.take(Handle(1), 1), None);
        assert_eq!(inbox.snapshot()[&H], vec![vec![1, 2]]);
    }

    #[test]
    fn queues_are_per_handle() {
        let inbox = Inbox::new();
        inbox.push(H, vec![1]);
        inbox.push(Handle(0x10), vec![9]);
        assert_eq!(inbox.len(H), 1);
        assert_eq!(inbox.len(Handle(0x10)), 1);
        assert_eq!(inbox.remove(Handle(0x10), 0), Some(vec![9]));
        assert_eq!(inbox.remove(Handle(0x10), 0), None);
        assert_eq!(inbox.len(H), 1);
    }

    #[test]
    fn wait_wakes_on_arrival() {
        let inbox = Arc::new(Inbox::new());
        let producer = {
            let inbox = inbox.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                inbox.push(H, vec![1]);
                inbox.push(H, vec![2]);
            })
        };
        let started = Instant::now();
        assert!(inbox.wait(H, 2, Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
        producer.join().unwrap();
        assert_eq!(inbox.len(H), 2);
    }

    #[test]
    fn wait_times_out() {
        let inbox = Inbox::new();
        inbox.push(H, vec![1]);
        let started = Instant::now();
        assert!(!inbox.wait(H, 2, Duration::from_millis(50)));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(inbox.len(H), 1);
    }
}
