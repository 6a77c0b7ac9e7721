//! Dispatch engine and notification batching
//!
//! Dispatching is split in two halves:
//!
//! 1. **Mutation** runs synchronously inside `dispatch`: the next state is
//!    computed (reducer or plain mode) and written to the record immediately,
//!    so `get_state` observes it right away.
//! 2. **Notification** is deferred. Each record owns one pending slot holding
//!    the `(new, old)` pair to fan out and the clock time it becomes due. The
//!    host delivers due slots by ticking the registry.
//!
//! Without a batch window the slot is due immediately, i.e. on the next tick.
//! With a window `W`, every dispatch re-arms the slot at `now + W`, replacing
//! whatever was pending, so a burst produces one notification carrying the last
//! new state and the state just before the last dispatch.

use smallvec::SmallVec;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::store::{Action, DispatchMode, StoreRecord, Subscriber};
use crate::value::StateValue;

/// Logical clock advanced by the host
#[derive(Debug, Default)]
pub struct Clock {
    now: Cell<Duration>,
}

impl Clock {
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    pub(crate) fn advance(&self, dt: Duration) -> Duration {
        let now = self.now.get().saturating_add(dt);
        self.now.set(now);
        now
    }
}

/// A scheduled notification pass
#[derive(Clone, Debug)]
pub struct PendingNotification {
    pub due: Duration,
    pub new_state: StateValue,
    pub old_state: StateValue,
}

impl StoreRecord {
    /// Compute and store the next state, then schedule a notification
    pub(crate) fn dispatch(&self, action: Action) {
        let old_state = self.state();
        let new_state = match &self.mode {
            DispatchMode::Reducer(reducer) => reducer(&old_state, &action),
            DispatchMode::Plain => match action {
                Action::Value(value) => value,
                Action::Update(update) => update(&old_state),
            },
        };

        *self.state.borrow_mut() = new_state.clone();
        self.schedule(new_state, old_state);
    }

    fn schedule(&self, new_state: StateValue, old_state: StateValue) {
        if self.is_retired() {
            tracing::trace!(store = %self.name(), "dispatch on retired store; nothing to notify");
            return;
        }

        let due = self.clock.now() + self.batch_window.unwrap_or(Duration::ZERO);
        let superseded = self
            .pending
            .borrow_mut()
            .replace(PendingNotification {
                due,
                new_state,
                old_state,
            })
            .is_some();

        tracing::trace!(store = %self.name(), ?due, superseded, "notification scheduled");
    }

    /// When the pending pass becomes due, if any
    pub(crate) fn next_due(&self) -> Option<Duration> {
        self.pending.borrow().as_ref().map(|pending| pending.due)
    }

    pub(crate) fn is_due(&self, now: Duration) -> bool {
        self.next_due().is_some_and(|due| due <= now)
    }

    /// Fan the pending pass out to current listeners if it is due
    ///
    /// Returns whether a pass was delivered. Listeners removed while the pass
    /// is running are skipped; dispatches made by listeners arm a new pass.
    pub(crate) fn deliver_due(&self, now: Duration) -> bool {
        let pending = {
            let mut slot = self.pending.borrow_mut();
            if slot.as_ref().is_some_and(|pending| pending.due <= now) {
                slot.take()
            } else {
                None
            }
        };
        let Some(pending) = pending else {
            return false;
        };

        let listeners: SmallVec<[Subscriber; 4]> =
            self.listeners.borrow().values().cloned().collect();

        tracing::debug!(
            store = %self.name(),
            listeners = listeners.len(),
            "delivering notification"
        );

        for subscriber in listeners {
            if !self.is_subscribed(subscriber.token) {
                continue;
            }
            (subscriber.update)(&pending.new_state, &pending.old_state);
        }
        true
    }
}

/// Stable dispatch handle for one store
#[derive(Clone)]
pub struct Dispatch {
    record: Rc<StoreRecord>,
}

impl Dispatch {
    pub(crate) fn new(record: Rc<StoreRecord>) -> Self {
        Self { record }
    }

    /// Dispatch an action
    pub fn dispatch(&self, action: impl Into<Action>) {
        self.record.dispatch(action.into());
    }

    /// Dispatch a plain value
    pub fn set(&self, value: impl Into<StateValue>) {
        self.dispatch(Action::Value(value.into()));
    }

    /// Dispatch an update closure
    pub fn update<F>(&self, f: F)
    where
        F: Fn(&StateValue) -> StateValue + 'static,
    {
        self.dispatch(Action::update(f));
    }

    /// Whether both handles dispatch into the same record
    pub fn ptr_eq(&self, other: &Dispatch) -> bool {
        Rc::ptr_eq(&self.record, &other.record)
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dispatch").field(&self.record.name()).finish()
    }
}

/// Stable, non-reactive state reader for one store
#[derive(Clone)]
pub struct GetState {
    record: Rc<StoreRecord>,
}

impl GetState {
    pub(crate) fn new(record: Rc<StoreRecord>) -> Self {
        Self { record }
    }

    /// The current authoritative state, ignoring any pending notification
    pub fn get(&self) -> StateValue {
        self.record.state()
    }

    pub fn ptr_eq(&self, other: &GetState) -> bool {
        Rc::ptr_eq(&self.record, &other.record)
    }
}

impl fmt::Debug for GetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GetState").field(&self.record.name()).finish()
    }
}
