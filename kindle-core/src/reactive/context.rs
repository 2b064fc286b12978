//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a container is read,
//! the top of the stack is registered as a dependent.
//!
//! # Implementation
//!
//! Each [`Runtime`] owns a stack of entries. Running an effect pushes it;
//! the [`EffectScope`] guard pops it when dropped, so the previous top is
//! restored even if the computation panics.
//!
//! An entry may also be *untracked* (`None`). Reads inside an untracked scope
//! subscribe nothing, even when an effect further down the stack is running.
//! Component setup runs in such a scope.

use std::rc::Rc;

use super::runtime::Runtime;
use super::subscriber::{EffectId, Subscriber};

/// The active-effect stack of one runtime.
#[derive(Default)]
pub(crate) struct ContextStack {
    entries: Vec<Option<Rc<dyn Subscriber>>>,
}

impl ContextStack {
    /// Push an entry. `None` opens an untracked scope.
    pub fn push(&mut self, entry: Option<Rc<dyn Subscriber>>) {
        self.entries.push(entry);
    }

    /// Pop the top entry and return its id, if it was tracked.
    pub fn pop(&mut self) -> Option<Option<EffectId>> {
        self.entries
            .pop()
            .map(|entry| entry.map(|subscriber| subscriber.id()))
    }

    /// The subscriber that reads should register, if any.
    pub fn current(&self) -> Option<Rc<dyn Subscriber>> {
        self.entries.last().cloned().flatten()
    }

    /// Id of the subscriber at the top of the stack, if tracked.
    pub fn current_id(&self) -> Option<EffectId> {
        self.entries.last()?.as_ref().map(|subscriber| subscriber.id())
    }

    /// Number of entries, tracked or not.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }
}

/// Guard that pops the context when dropped.
///
/// This ensures the stack is properly maintained even if the computation
/// panics.
pub(crate) struct EffectScope {
    runtime: Runtime,
    expected: Option<EffectId>,
}

impl EffectScope {
    /// Enter a new scope. `None` enters an untracked scope.
    pub fn enter(runtime: &Runtime, subscriber: Option<Rc<dyn Subscriber>>) -> Self {
        let expected = subscriber.as_ref().map(|s| s.id());
        runtime.inner().stack.borrow_mut().push(subscriber);
        Self {
            runtime: runtime.clone(),
            expected,
        }
    }
}

impl Drop for EffectScope {
    fn drop(&mut self) {
        let popped = self.runtime.inner().stack.borrow_mut().pop();

        // Verify we're popping the right context.
        if let Some(popped) = popped {
            debug_assert_eq!(
                popped, self.expected,
                "EffectScope mismatch: expected {:?}, got {:?}",
                self.expected, popped
            );
        }
    }
}
