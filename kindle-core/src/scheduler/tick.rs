//! Next-Tick Queue
//!
//! Callbacks registered with [`Runtime::next_tick_with`] are collected into
//! rounds. A round is flushed by one microtask: every callback runs in
//! registration order, then every [`NextTick`] of the round is resolved.
//!
//! A panicking callback does not stop the round. The panic is caught, the
//! remaining callbacks still run, and every waiter of that round receives
//! [`RuntimeError::TickCallbackPanicked`]. The next round starts clean.
//!
//! [`Runtime::next_tick_with`]: crate::reactive::Runtime::next_tick_with

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::error;

use crate::error::{Result, RuntimeError};

type TickCallback = Box<dyn FnOnce()>;
type TickSender = oneshot::Sender<Result<()>>;

#[derive(Default)]
pub(crate) struct TickQueue {
    callbacks: Vec<TickCallback>,
    waiters: Vec<TickSender>,
    pending: bool,
}

impl TickQueue {
    /// Register a callback for the current round.
    ///
    /// Returns the round's future and `true` if a flush must be scheduled.
    pub fn push(&mut self, callback: TickCallback) -> (NextTick, bool) {
        let (sender, receiver) = oneshot::channel();
        self.callbacks.push(callback);
        self.waiters.push(sender);
        let schedule = !std::mem::replace(&mut self.pending, true);
        (NextTick::new(receiver), schedule)
    }

    /// Mark not-pending and take the current round.
    pub fn take_round(&mut self) -> TickRound {
        self.pending = false;
        TickRound {
            callbacks: std::mem::take(&mut self.callbacks),
            waiters: std::mem::take(&mut self.waiters),
        }
    }
}

/// One snapshot of the next-tick queue, ready to run.
pub(crate) struct TickRound {
    callbacks: Vec<TickCallback>,
    waiters: Vec<TickSender>,
}

impl TickRound {
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Run every callback, then resolve every waiter.
    pub fn run(self) {
        let mut failure: Option<String> = None;

        for callback in self.callbacks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
                let message = panic_message(payload.as_ref());
                error!(%message, "next-tick callback panicked");
                failure.get_or_insert(message);
            }
        }

        let outcome = match failure {
            Some(message) => Err(RuntimeError::TickCallbackPanicked { message }),
            None => Ok(()),
        };
        for waiter in self.waiters {
            // The caller may have dropped its NextTick.
            let _ = waiter.send(outcome.clone());
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Completes once the next-tick round it was registered in has been flushed.
///
/// Resolves to `Err(TickCallbackPanicked)` if any callback of the round
/// panicked, and to `Err(TickDropped)` if the runtime went away first.
///
/// ```rust,ignore
/// state.set("count", 1);
/// let tick = rt.next_tick();
/// rt.drain_microtasks()?;
/// tick.await?; // the render flush for `count` has already happened
/// ```
#[must_use = "a NextTick does nothing unless awaited or inspected"]
#[derive(Debug)]
pub struct NextTick {
    receiver: oneshot::Receiver<Result<()>>,
    settled: Option<Result<()>>,
}

impl NextTick {
    fn new(receiver: oneshot::Receiver<Result<()>>) -> Self {
        Self {
            receiver,
            settled: None,
        }
    }

    /// The outcome if the round has been flushed, without waiting.
    pub fn try_result(&mut self) -> Option<Result<()>> {
        if self.settled.is_none() {
            self.settled = match self.receiver.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => Some(Err(RuntimeError::TickDropped)),
            };
        }
        self.settled.clone()
    }

    /// Whether the round has been flushed (or abandoned).
    pub fn is_resolved(&mut self) -> bool {
        self.try_result().is_some()
    }
}

impl Future for NextTick {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.settled.clone() {
            return Poll::Ready(outcome);
        }
        let outcome = match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => outcome,
            Poll::Ready(Err(_)) => Err(RuntimeError::TickDropped),
            Poll::Pending => return Poll::Pending,
        };
        self.settled = Some(outcome.clone());
        Poll::Ready(outcome)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn round_runs_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut queue = TickQueue::default();

        let mut ticks = Vec::new();
        for i in 0..3 {
            let o = order.clone();
            let (tick, scheduled) = queue.push(Box::new(move || o.borrow_mut().push(i)));
            assert_eq!(scheduled, i == 0);
            ticks.push(tick);
        }

        let round = queue.take_round();
        assert_eq!(round.len(), 3);
        assert!(!ticks[0].is_resolved());
        round.run();

        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        for tick in &mut ticks {
            assert_eq!(tick.try_result(), Some(Ok(())));
        }
    }

    #[test]
    fn panic_fails_the_round_but_later_callbacks_run() {
        let ran = Rc::new(RefCell::new(false));
        let mut queue = TickQueue::default();

        let (mut first, _) = queue.push(Box::new(|| panic!("boom")));
        let r = ran.clone();
        let (mut second, _) = queue.push(Box::new(move || *r.borrow_mut() = true));
        queue.take_round().run();

        assert!(*ran.borrow());
        let expected = Some(Err(RuntimeError::TickCallbackPanicked {
            message: "boom".into(),
        }));
        assert_eq!(first.try_result(), expected);
        assert_eq!(second.try_result(), expected);

        // The next round is unaffected.
        let (mut next, scheduled) = queue.push(Box::new(|| {}));
        assert!(scheduled);
        queue.take_round().run();
        assert_eq!(next.try_result(), Some(Ok(())));
    }

    #[test]
    fn abandoned_round_reports_dropped() {
        let mut queue = TickQueue::default();
        let (mut tick, _) = queue.push(Box::new(|| {}));
        drop(queue);
        assert_eq!(tick.try_result(), Some(Err(RuntimeError::TickDropped)));
    }

    #[tokio::test]
    async fn awaiting_a_flushed_tick() {
        let mut queue = TickQueue::default();
        let (tick, _) = queue.push(Box::new(|| {}));
        queue.take_round().run();
        assert_eq!(tick.await, Ok(()));
    }
}
