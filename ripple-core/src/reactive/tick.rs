//! Tick Queue
//!
//! Deferred computed values batch their change notifications into jobs that
//! run on the next tick. The host decides when a tick happens by calling
//! `flush_jobs`, typically once per turn of its event loop.
//!
//! Jobs queued while a flush is in progress run in the same flush.

use std::cell::RefCell;
use std::collections::VecDeque;

use tracing::trace;

type Job = Box<dyn FnOnce()>;

thread_local! {
    static JOBS: RefCell<VecDeque<Job>> = RefCell::new(VecDeque::new());
}

/// Queue a job for the next tick.
pub fn queue_job(job: impl FnOnce() + 'static) {
    JOBS.with(|jobs| jobs.borrow_mut().push_back(Box::new(job)));
}

/// Whether a tick is pending.
pub fn has_pending_jobs() -> bool {
    JOBS.with(|jobs| !jobs.borrow().is_empty())
}

/// Run queued jobs until the queue is empty. Returns how many ran.
pub fn flush_jobs() -> usize {
    let mut ran = 0;
    loop {
        // The queue is released before the job runs so it can queue more.
        let job = JOBS.with(|jobs| jobs.borrow_mut().pop_front());
        let Some(job) = job else {
            break;
        };
        job();
        ran += 1;
    }
    if ran > 0 {
        trace!(jobs = ran, "tick flushed");
    }
    ran
}
