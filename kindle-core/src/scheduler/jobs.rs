//! Render Queue
//!
//! A deduplicating, insertion-ordered set of effects waiting for the next
//! render flush.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::reactive::{EffectId, Subscriber};

#[derive(Default)]
pub(crate) struct JobQueue {
    jobs: IndexMap<EffectId, Rc<dyn Subscriber>>,
    pending: bool,
}

impl JobQueue {
    /// Add a job unless it is already queued in this generation.
    ///
    /// Returns `true` when a flush needs to be scheduled.
    pub fn push(&mut self, job: Rc<dyn Subscriber>) -> bool {
        self.jobs.entry(job.id()).or_insert(job);
        !std::mem::replace(&mut self.pending, true)
    }

    /// Mark not-pending and take every queued job, in queue order.
    pub fn take_generation(&mut self) -> Vec<Rc<dyn Subscriber>> {
        self.pending = false;
        std::mem::take(&mut self.jobs).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}
