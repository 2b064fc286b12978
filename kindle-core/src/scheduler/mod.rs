//! Update Scheduler
//!
//! The scheduler batches work into microtasks. Two independent queues share
//! one microtask FIFO:
//!
//! 1. The render queue ([`JobQueue`]) holds effects that were notified since
//!    the last flush, deduplicated by id. The first job queued in a generation
//!    schedules a [`Microtask::FlushJobs`].
//!
//! 2. The next-tick queue ([`TickQueue`]) holds one-shot callbacks and the
//!    senders of every [`NextTick`] waiting on them. The first callback of a
//!    round schedules a [`Microtask::FlushTicks`].
//!
//! # Generations
//!
//! A flush marks its queue not-pending and takes the current contents before
//! running anything. Work queued while the flush runs therefore lands in a
//! fresh generation and schedules a fresh microtask; it is never merged into
//! the generation being drained.
//!
//! The scheduler itself only stores work. [`Runtime::drain_microtasks`]
//! pops microtasks and executes them with no scheduler borrow held, so jobs
//! and callbacks are free to queue more work.
//!
//! [`Runtime::drain_microtasks`]: crate::reactive::Runtime::drain_microtasks

mod jobs;
mod tick;

use std::collections::VecDeque;
use std::rc::Rc;

use crate::reactive::Subscriber;

pub(crate) use jobs::JobQueue;
pub use tick::NextTick;
pub(crate) use tick::{TickQueue, TickRound};

/// A unit of deferred work on the microtask FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Microtask {
    /// Run every effect in the current render-queue generation.
    FlushJobs,
    /// Run every callback in the current next-tick round.
    FlushTicks,
}

/// Both queues plus the microtask FIFO of one runtime.
#[derive(Default)]
pub(crate) struct Scheduler {
    microtasks: VecDeque<Microtask>,
    jobs: JobQueue,
    ticks: TickQueue,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an effect for the next render flush.
    ///
    /// Returns `true` if this call scheduled the flush.
    pub fn queue_job(&mut self, job: Rc<dyn Subscriber>) -> bool {
        let schedule = self.jobs.push(job);
        if schedule {
            self.microtasks.push_back(Microtask::FlushJobs);
        }
        schedule
    }

    /// Queue a next-tick callback.
    ///
    /// Returns the future for this round and whether this call scheduled the
    /// flush.
    pub fn queue_tick(&mut self, callback: Box<dyn FnOnce()>) -> (NextTick, bool) {
        let (tick, schedule) = self.ticks.push(callback);
        if schedule {
            self.microtasks.push_back(Microtask::FlushTicks);
        }
        (tick, schedule)
    }

    pub fn next_microtask(&mut self) -> Option<Microtask> {
        self.microtasks.pop_front()
    }

    /// Put back a microtask that was popped but not executed.
    pub fn requeue_front(&mut self, task: Microtask) {
        self.microtasks.push_front(task);
    }

    /// Start a render flush: clear the pending flag and take one generation.
    pub fn begin_job_flush(&mut self) -> Vec<Rc<dyn Subscriber>> {
        self.jobs.take_generation()
    }

    /// Start a next-tick flush: clear the pending flag and take one round.
    pub fn begin_tick_flush(&mut self) -> TickRound {
        self.ticks.take_round()
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.len()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{ReactiveEffect, Runtime};

    #[test]
    fn first_job_schedules_one_flush() {
        let rt = Runtime::new();
        let a = ReactiveEffect::new(&rt, || ());
        let b = ReactiveEffect::new(&rt, || ());
        let mut scheduler = Scheduler::new();

        assert!(scheduler.queue_job(a.as_subscriber()));
        assert!(!scheduler.queue_job(b.as_subscriber()));
        assert!(!scheduler.queue_job(a.as_subscriber()));

        assert_eq!(scheduler.pending_jobs(), 2);
        assert_eq!(scheduler.pending_microtasks(), 1);
        assert_eq!(scheduler.next_microtask(), Some(Microtask::FlushJobs));
        assert_eq!(scheduler.next_microtask(), None);
    }

    #[test]
    fn job_flush_starts_a_new_generation() {
        let rt = Runtime::new();
        let a = ReactiveEffect::new(&rt, || ());
        let mut scheduler = Scheduler::new();

        scheduler.queue_job(a.as_subscriber());
        scheduler.next_microtask();
        let generation = scheduler.begin_job_flush();
        assert_eq!(generation.len(), 1);
        assert_eq!(scheduler.pending_jobs(), 0);

        // Queued again while "draining": a new flush is scheduled.
        assert!(scheduler.queue_job(a.as_subscriber()));
        assert_eq!(scheduler.pending_microtasks(), 1);
    }

    #[test]
    fn queues_share_one_fifo() {
        let rt = Runtime::new();
        let a = ReactiveEffect::new(&rt, || ());
        let mut scheduler = Scheduler::new();

        let (_tick, scheduled) = scheduler.queue_tick(Box::new(|| {}));
        assert!(scheduled);
        scheduler.queue_job(a.as_subscriber());
        let (_tick, scheduled) = scheduler.queue_tick(Box::new(|| {}));
        assert!(!scheduled);

        assert_eq!(scheduler.next_microtask(), Some(Microtask::FlushTicks));
        assert_eq!(scheduler.next_microtask(), Some(Microtask::FlushJobs));
    }

    #[test]
    fn requeued_task_runs_first() {
        let mut scheduler = Scheduler::new();
        scheduler.queue_tick(Box::new(|| {}));
        let task = scheduler.next_microtask().unwrap();
        scheduler.requeue_front(task);
        assert_eq!(scheduler.pending_microtasks(), 1);
        assert_eq!(scheduler.next_microtask(), Some(Microtask::FlushTicks));
    }
}
