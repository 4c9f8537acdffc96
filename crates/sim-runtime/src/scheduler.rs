//! Cooperative discrete-event kernel.
//!
//! Processes are explicit state machines. Each resumption runs a process until
//! its next suspension point and returns a [`Step`] telling the kernel how to
//! park it. Pending resumptions are ordered by `(time, insertion sequence)`,
//! so work due at the same instant runs in FIFO order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::trace;

/// Simulated time in days. Only explicit timeouts move it forward.
pub type SimTime = f64;

/// Handle of a process registered with a [`Scheduler`].
pub type ProcessId = u64;

/// What a process does after a resumption.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    /// Resume again after the given delay.
    Timeout(SimTime),
    /// Stay parked until something calls [`Kernel::wake`].
    Wait,
    /// Finished; the process is dropped.
    Done,
}

/// A resumable unit of work operating on shared context `C`.
pub trait Process<C> {
    fn resume(&mut self, pid: ProcessId, ctx: &mut C, kernel: &mut Kernel) -> Step;
}

#[derive(Debug)]
struct Scheduled {
    at: SimTime,
    seq: u64,
    pid: ProcessId,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Clock and resumption queue, handed to processes while they run.
#[derive(Debug, Default)]
pub struct Kernel {
    now: SimTime,
    queue: BinaryHeap<Scheduled>,
    seq: u64,
}

impl Kernel {
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Queue a resumption of `pid` after `delay` (negative or NaN delays count as 0).
    pub fn schedule(&mut self, pid: ProcessId, delay: SimTime) {
        let delay = if delay > 0.0 { delay } else { 0.0 };
        let entry = Scheduled {
            at: self.now + delay,
            seq: self.seq,
            pid,
        };
        self.seq += 1;
        self.queue.push(entry);
    }

    /// Resume a parked process at the current instant, after work already due now.
    pub fn wake(&mut self, pid: ProcessId) {
        self.schedule(pid, 0.0);
    }

    fn peek_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|s| s.at)
    }
}

/// Single-threaded process runner.
#[derive(Debug)]
pub struct Scheduler<P> {
    kernel: Kernel,
    processes: BTreeMap<ProcessId, P>,
    next_pid: ProcessId,
}

impl<P> Default for Scheduler<P> {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl<P> Scheduler<P> {
    pub fn new(start: SimTime) -> Self {
        Self {
            kernel: Kernel {
                now: start,
                ..Kernel::default()
            },
            processes: BTreeMap::new(),
            next_pid: 1,
        }
    }

    pub fn now(&self) -> SimTime {
        self.kernel.now
    }

    /// Register a process; its first resumption is due now.
    pub fn spawn(&mut self, process: P) -> ProcessId {
        let pid = self.next_pid;
        self.next_pid += 1;
        self.processes.insert(pid, process);
        self.kernel.schedule(pid, 0.0);
        pid
    }

    /// Number of live processes, parked ones included.
    pub fn live_processes(&self) -> usize {
        self.processes.len()
    }

    pub fn pending_resumptions(&self) -> usize {
        self.kernel.queue.len()
    }

    /// Resume every entry due strictly before `until` in `(time, seq)` order,
    /// then set the clock to `until`.
    pub fn advance_until<C>(&mut self, until: SimTime, ctx: &mut C) -> usize
    where
        P: Process<C>,
    {
        let mut resumed = 0;
        while let Some(at) = self.kernel.peek_time() {
            if at >= until {
                break;
            }
            let Some(entry) = self.kernel.queue.pop() else {
                break;
            };
            self.kernel.now = entry.at;
            // Entries can outlive a process that already finished.
            let Some(mut process) = self.processes.remove(&entry.pid) else {
                continue;
            };
            resumed += 1;
            match process.resume(entry.pid, ctx, &mut self.kernel) {
                Step::Timeout(delay) => {
                    self.processes.insert(entry.pid, process);
                    self.kernel.schedule(entry.pid, delay);
                }
                Step::Wait => {
                    self.processes.insert(entry.pid, process);
                }
                Step::Done => {
                    trace!(pid = entry.pid, at = entry.at, "process finished");
                }
            }
        }
        if until > self.kernel.now {
            self.kernel.now = until;
        }
        resumed
    }
}
