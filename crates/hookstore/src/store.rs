//! Store records and handles
//!
//! A [`StoreRecord`] is the single authoritative container behind one store
//! name: the current state, the dispatch mode fixed at creation, the ordered
//! listener set, and the one pending notification slot used by the dispatch
//! engine. Records are created by the [`StoreRegistry`](crate::StoreRegistry)
//! and shared by reference with every [`StoreHandle`] and mounted consumer.
//!
//! # Dispatch modes
//!
//! - **Reducer mode**: every [`Action`] goes through the reducer together with
//!   the current state. Update closures are handed to the reducer unevaluated.
//! - **Plain mode**: an [`Action::Value`] *is* the next state, an
//!   [`Action::Update`] computes it from the current one.

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::dispatch::{Clock, Dispatch, GetState, PendingNotification};
use crate::value::StateValue;

/// A reducer: `(current state, action) -> next state`
pub type Reducer = Rc<dyn Fn(&StateValue, &Action) -> StateValue>;

/// An update closure: `current state -> next state`
pub type UpdateFn = Rc<dyn Fn(&StateValue) -> StateValue>;

/// Something dispatched to a store
#[derive(Clone)]
pub enum Action {
    /// A plain payload: the next state in plain mode, a message in reducer mode
    Value(StateValue),
    /// A function of the current state (evaluated only in plain mode)
    Update(UpdateFn),
}

impl Action {
    pub fn value(value: impl Into<StateValue>) -> Self {
        Action::Value(value.into())
    }

    pub fn update<F>(f: F) -> Self
    where
        F: Fn(&StateValue) -> StateValue + 'static,
    {
        Action::Update(Rc::new(f))
    }

    /// The payload of a value action
    pub fn as_value(&self) -> Option<&StateValue> {
        match self {
            Action::Value(value) => Some(value),
            Action::Update(_) => None,
        }
    }

    pub fn is_update(&self) -> bool {
        matches!(self, Action::Update(_))
    }

    /// Convenience for reducers matching on `{ "type": ... }` payloads
    pub fn kind(&self) -> Option<&str> {
        self.as_value()
            .and_then(|value| value.get("type"))
            .and_then(StateValue::as_str)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Action::Update(_) => f.write_str("Update(<fn>)"),
        }
    }
}

impl From<StateValue> for Action {
    fn from(value: StateValue) -> Self {
        Action::Value(value)
    }
}

impl From<serde_json::Value> for Action {
    fn from(value: serde_json::Value) -> Self {
        Action::Value(value.into())
    }
}

/// What a store is created from: a reducer plus initial state, or a plain value
#[derive(Clone)]
pub enum StoreSource {
    Reducer {
        reducer: Reducer,
        initial_state: StateValue,
    },
    Value(StateValue),
}

impl StoreSource {
    /// A reducer store whose initial state is an empty object
    pub fn reducer<F>(reducer: F) -> Self
    where
        F: Fn(&StateValue, &Action) -> StateValue + 'static,
    {
        StoreSource::Reducer {
            reducer: Rc::new(reducer),
            initial_state: StateValue::object(),
        }
    }

    /// A plain store holding `value`
    pub fn value(value: impl Into<StateValue>) -> Self {
        StoreSource::Value(value.into())
    }

    /// Override the initial state
    ///
    /// For plain stores this replaces the value itself.
    pub fn with_initial_state(self, state: impl Into<StateValue>) -> Self {
        match self {
            StoreSource::Reducer { reducer, .. } => StoreSource::Reducer {
                reducer,
                initial_state: state.into(),
            },
            StoreSource::Value(_) => StoreSource::Value(state.into()),
        }
    }
}

/// Dispatch semantics, fixed for the lifetime of a record
pub(crate) enum DispatchMode {
    Reducer(Reducer),
    Plain,
}

/// Identifies one mounted consumer's subscription
///
/// Tokens come from a per-registry counter and are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberToken(u64);

impl SubscriberToken {
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic source of subscriber tokens
#[derive(Debug, Default)]
pub(crate) struct TokenCounter {
    next: Cell<u64>,
}

impl TokenCounter {
    pub(crate) fn next(&self) -> SubscriberToken {
        let id = self.next.get();
        self.next.set(id + 1);
        SubscriberToken(id)
    }
}

/// Notification callback: `(new state, old state)`
pub(crate) type NotifyFn = Rc<dyn Fn(&StateValue, &StateValue)>;

#[derive(Clone)]
pub(crate) struct Subscriber {
    pub(crate) token: SubscriberToken,
    pub(crate) update: NotifyFn,
}

/// The authoritative record behind one store name
pub struct StoreRecord {
    name: String,
    pub(crate) state: RefCell<StateValue>,
    pub(crate) mode: DispatchMode,
    pub(crate) batch_window: Option<Duration>,
    pub(crate) listeners: RefCell<IndexMap<SubscriberToken, Subscriber, FxBuildHasher>>,
    pub(crate) pending: RefCell<Option<PendingNotification>>,
    pub(crate) retired: Cell<bool>,
    pub(crate) clock: Rc<Clock>,
}

impl StoreRecord {
    pub(crate) fn new(
        name: String,
        source: StoreSource,
        batch_window: Option<Duration>,
        clock: Rc<Clock>,
    ) -> Self {
        let (mode, state) = match source {
            StoreSource::Reducer {
                reducer,
                initial_state,
            } => (DispatchMode::Reducer(reducer), initial_state),
            StoreSource::Value(value) => (DispatchMode::Plain, value),
        };

        Self {
            name,
            state: RefCell::new(state),
            mode,
            batch_window,
            listeners: RefCell::new(IndexMap::default()),
            pending: RefCell::new(None),
            retired: Cell::new(false),
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current authoritative state
    pub fn state(&self) -> StateValue {
        self.state.borrow().clone()
    }

    pub fn is_reducer_mode(&self) -> bool {
        matches!(self.mode, DispatchMode::Reducer(_))
    }

    pub fn batch_window(&self) -> Option<Duration> {
        self.batch_window
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Subscriber tokens in registration order
    pub fn tokens(&self) -> Vec<SubscriberToken> {
        self.listeners.borrow().keys().copied().collect()
    }

    pub fn is_subscribed(&self, token: SubscriberToken) -> bool {
        self.listeners.borrow().contains_key(&token)
    }

    /// Whether this record was replaced or removed from its registry
    pub fn is_retired(&self) -> bool {
        self.retired.get()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    pub(crate) fn subscribe(&self, subscriber: Subscriber) {
        let token = subscriber.token;
        self.listeners.borrow_mut().insert(token, subscriber);
        tracing::trace!(store = %self.name, %token, "subscribed");
    }

    pub(crate) fn unsubscribe(&self, token: SubscriberToken) -> bool {
        let removed = self.listeners.borrow_mut().shift_remove(&token).is_some();
        if removed {
            tracing::trace!(store = %self.name, %token, "unsubscribed");
        }
        removed
    }

    /// Detach the record from its name: drop every listener and the pending pass
    pub(crate) fn retire(&self) {
        self.retired.set(true);
        self.listeners.borrow_mut().clear();
        self.pending.borrow_mut().take();
    }
}

impl fmt::Debug for StoreRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRecord")
            .field("name", &self.name)
            .field("state", &*self.state.borrow())
            .field("is_reducer_mode", &self.is_reducer_mode())
            .field("listeners", &self.listener_count())
            .field("batch_window", &self.batch_window)
            .field("retired", &self.retired.get())
            .finish()
    }
}

/// Handle returned by store creation
///
/// Cheap to clone. Every clone refers to the same record, including after the
/// registry has replaced that record under the same name.
#[derive(Clone)]
pub struct StoreHandle {
    pub(crate) record: Rc<StoreRecord>,
    pub(crate) tokens: Rc<TokenCounter>,
}

impl StoreHandle {
    pub(crate) fn new(record: Rc<StoreRecord>, tokens: Rc<TokenCounter>) -> Self {
        Self { record, tokens }
    }

    pub fn name(&self) -> &str {
        self.record.name()
    }

    pub fn record(&self) -> &Rc<StoreRecord> {
        &self.record
    }

    /// Non-reactive read of the current state
    pub fn get_state(&self) -> StateValue {
        self.record.state()
    }

    /// Dispatch without mounting a consumer
    pub fn dispatch(&self, action: impl Into<Action>) {
        self.record.dispatch(action.into());
    }

    pub fn dispatcher(&self) -> Dispatch {
        Dispatch::new(self.record.clone())
    }

    pub fn getter(&self) -> GetState {
        GetState::new(self.record.clone())
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StoreHandle").field(&self.record.name()).finish()
    }
}
