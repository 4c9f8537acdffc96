//! Bounded production capacity with FIFO hand-off.

use crate::scheduler::ProcessId;
use std::collections::VecDeque;

/// Outcome of a capacity request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grant {
    /// The requester now holds one unit.
    Granted,
    /// The requester was appended to the wait queue.
    Queued,
}

/// At most `capacity` processes hold a unit at any instant. Waiters are
/// granted in request order as holders release.
#[derive(Clone, Debug)]
pub struct CapacityPool {
    capacity: usize,
    holders: Vec<ProcessId>,
    waiters: VecDeque<ProcessId>,
    peak: usize,
}

impl CapacityPool {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity: capacity as usize,
            holders: Vec::new(),
            waiters: VecDeque::new(),
            peak: 0,
        }
    }

    pub fn request(&mut self, pid: ProcessId) -> Grant {
        if self.holders.len() < self.capacity && self.waiters.is_empty() {
            self.holders.push(pid);
            self.peak = self.peak.max(self.holders.len());
            Grant::Granted
        } else {
            self.waiters.push_back(pid);
            Grant::Queued
        }
    }

    /// Give up `pid`'s unit (or its place in the queue). When a unit frees up,
    /// it passes straight to the oldest waiter, whose id is returned so the
    /// caller can wake it.
    pub fn release(&mut self, pid: ProcessId) -> Option<ProcessId> {
        if let Some(pos) = self.holders.iter().position(|h| *h == pid) {
            self.holders.swap_remove(pos);
        } else {
            self.waiters.retain(|w| *w != pid);
            return None;
        }
        if self.holders.len() >= self.capacity {
            return None;
        }
        let next = self.waiters.pop_front()?;
        self.holders.push(next);
        self.peak = self.peak.max(self.holders.len());
        Some(next)
    }

    pub fn holds(&self, pid: ProcessId) -> bool {
        self.holders.contains(&pid)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.holders.len()
    }

    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }

    /// Highest number of simultaneous holders seen so far.
    pub fn peak_in_use(&self) -> usize {
        self.peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn grants_up_to_capacity_then_queues() {
        let mut pool = CapacityPool::new(2);
        assert_eq!(pool.request(1), Grant::Granted);
        assert_eq!(pool.request(2), Grant::Granted);
        assert_eq!(pool.request(3), Grant::Queued);
        assert_eq!(pool.request(4), Grant::Queued);
        assert_eq!(pool.in_use(), 2);
        assert_eq!(pool.waiting(), 2);
    }

    #[test]
    fn release_hands_off_in_request_order() {
        let mut pool = CapacityPool::new(1);
        pool.request(1);
        pool.request(2);
        pool.request(3);
        assert_eq!(pool.release(1), Some(2));
        assert!(pool.holds(2));
        assert_eq!(pool.release(2), Some(3));
        assert_eq!(pool.release(3), None);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.peak_in_use(), 1);
    }

    #[test]
    fn releasing_a_waiter_leaves_the_queue() {
        let mut pool = CapacityPool::new(1);
        pool.request(1);
        pool.request(2);
        assert_eq!(pool.release(2), None);
        assert_eq!(pool.waiting(), 0);
        assert_eq!(pool.release(1), None);
        assert_eq!(pool.release(99), None);
    }

    proptest! {
        #[test]
        fn never_more_than_capacity(cap in 1u32..5, ops in proptest::collection::vec((any::<bool>(), 0u64..8), 0..200)) {
            let mut pool = CapacityPool::new(cap);
            let mut next_pid = 100;
            for (is_request, pick) in ops {
                if is_request {
                    pool.request(next_pid);
                    next_pid += 1;
                } else {
                    // release an arbitrary earlier requester
                    pool.release(100 + pick);
                }
                prop_assert!(pool.in_use() <= cap as usize);
                if pool.in_use() < cap as usize {
                    prop_assert_eq!(pool.waiting(), 0);
                }
            }
            prop_assert!(pool.peak_in_use() <= cap as usize);
        }
    }
}
