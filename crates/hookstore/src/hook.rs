//! Consumer-side store hook
//!
//! [`StoreHandle::use_store`] mounts a consumer: it computes the consumer's
//! initial derived value, registers exactly one subscriber under a fresh
//! token, and returns a [`UseStore`] guard that lives as long as the consumer
//! is mounted. Dropping the guard (or calling [`UseStore::unmount`]) removes
//! the subscriber, so every unmount path deregisters.
//!
//! The host UI runtime renders from the guard:
//!
//! ```
//! use hookstore::{StoreOptions, StoreRegistry};
//! use serde_json::json;
//!
//! let mut registry = StoreRegistry::new();
//! let point = json!({ "x": 1, "y": 2 });
//! let store = registry.create_value_store("point", point, StoreOptions::new());
//!
//! let view = store.use_store_with(|s| s.field("x"));
//! let (x, dispatch, get_state) = view.render();
//! assert_eq!(x.as_i64(), Some(1));
//!
//! // `y` changes, `x` does not: the consumer is not re-rendered.
//! dispatch.set(json!({ "x": 1, "y": 3 }));
//! registry.flush();
//! assert_eq!(view.render_count(), 0);
//! assert_eq!(get_state.get().field("y").as_i64(), Some(3));
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::dispatch::{Dispatch, GetState};
use crate::selector::{derive, filter_update, Filtered, Projection};
use crate::store::{StoreHandle, StoreRecord, Subscriber, SubscriberToken};
use crate::value::StateValue;

/// Host callback asked to re-render a consumer with its new derived value
pub type RenderCallback = Rc<dyn Fn(SubscriberToken, &StateValue)>;

/// Per-consumer state that survives re-renders
struct ConsumerState {
    derived: RefCell<StateValue>,
    projection: Option<Projection>,
    renders: Cell<u64>,
    needs_render: Cell<bool>,
    on_render: RefCell<Option<RenderCallback>>,
}

impl ConsumerState {
    fn receive(&self, token: SubscriberToken, new_state: &StateValue, old_state: &StateValue) {
        let prev = self.derived.borrow().clone();
        match filter_update(self.projection.as_ref(), &prev, new_state, old_state) {
            Filtered::Suppress => {
                tracing::trace!(%token, "projection unchanged; render suppressed");
            }
            Filtered::Propagate(next) => {
                tracing::trace!(%token, "projection changed; re-rendering");
                *self.derived.borrow_mut() = next.clone();
                self.renders.set(self.renders.get() + 1);
                self.needs_render.set(true);

                let callback = self.on_render.borrow().clone();
                if let Some(callback) = callback {
                    callback(token, &next);
                }
            }
        }
    }
}

/// A mounted consumer of one store
///
/// Returned by [`StoreHandle::use_store`]. Dropping it unmounts the consumer.
pub struct UseStore {
    token: SubscriberToken,
    consumer: Rc<ConsumerState>,
    record: Rc<StoreRecord>,
    dispatch: Dispatch,
    get_state: GetState,
}

impl StoreHandle {
    /// Mount a consumer that renders the full state
    pub fn use_store(&self) -> UseStore {
        UseStore::mount(self, None)
    }

    /// Mount a consumer that renders a projection of the state
    pub fn use_store_with<F>(&self, projection: F) -> UseStore
    where
        F: Fn(&StateValue) -> StateValue + 'static,
    {
        UseStore::mount(self, Some(Rc::new(projection)))
    }

    /// Mount with an already shared projection
    pub fn use_store_projected(&self, projection: Option<Projection>) -> UseStore {
        UseStore::mount(self, projection)
    }
}

impl UseStore {
    fn mount(handle: &StoreHandle, projection: Option<Projection>) -> Self {
        let record = handle.record.clone();
        let initial = derive(projection.as_ref(), &record.state());

        let consumer = Rc::new(ConsumerState {
            derived: RefCell::new(initial),
            projection,
            renders: Cell::new(0),
            needs_render: Cell::new(false),
            on_render: RefCell::new(None),
        });

        let token = handle.tokens.next();
        if record.is_retired() {
            // A retired record never notifies again
            tracing::warn!(
                store = %record.name(),
                %token,
                "mounting on a store that was re-created or removed; consumer will not update"
            );
        } else {
            let weak: Weak<ConsumerState> = Rc::downgrade(&consumer);
            record.subscribe(Subscriber {
                token,
                update: Rc::new(move |new_state: &StateValue, old_state: &StateValue| {
                    if let Some(consumer) = weak.upgrade() {
                        consumer.receive(token, new_state, old_state);
                    }
                }),
            });
            tracing::debug!(store = %record.name(), %token, "consumer mounted");
        }

        Self {
            token,
            consumer,
            dispatch: Dispatch::new(record.clone()),
            get_state: GetState::new(record.clone()),
            record,
        }
    }

    pub fn token(&self) -> SubscriberToken {
        self.token
    }

    /// The value the consumer currently renders
    pub fn state(&self) -> StateValue {
        self.consumer.derived.borrow().clone()
    }

    /// `(derived state, dispatch, get_state)` for one render
    ///
    /// The dispatch and get_state handles are the same on every call.
    pub fn render(&self) -> (StateValue, Dispatch, GetState) {
        (self.state(), self.dispatch.clone(), self.get_state.clone())
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn getter(&self) -> &GetState {
        &self.get_state
    }

    /// Current authoritative store state, bypassing the projection
    pub fn get_state(&self) -> StateValue {
        self.get_state.get()
    }

    /// How many times a notification forced this consumer to re-render
    pub fn render_count(&self) -> u64 {
        self.consumer.renders.get()
    }

    /// Check and clear the re-render request flag
    pub fn take_needs_render(&self) -> bool {
        self.consumer.needs_render.replace(false)
    }

    /// Register the host's re-render callback, replacing any previous one
    pub fn on_render<F>(&self, callback: F)
    where
        F: Fn(SubscriberToken, &StateValue) + 'static,
    {
        *self.consumer.on_render.borrow_mut() = Some(Rc::new(callback));
    }

    pub fn is_mounted(&self) -> bool {
        self.record.is_subscribed(self.token)
    }

    /// Unmount explicitly (same as dropping)
    pub fn unmount(self) {}
}

impl Drop for UseStore {
    fn drop(&mut self) {
        if self.record.unsubscribe(self.token) {
            tracing::debug!(store = %self.record.name(), token = %self.token, "consumer unmounted");
        }
    }
}

impl fmt::Debug for UseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UseStore")
            .field("store", &self.record.name())
            .field("token", &self.token)
            .field("state", &*self.consumer.derived.borrow())
            .field("renders", &self.consumer.renders.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Projection, StateValue, StoreOptions, StoreRegistry};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_mount_computes_initial_projection() {
        let mut registry = StoreRegistry::new();
        let store = registry.create_value_store("s", json!({ "a": 5 }), StoreOptions::new());

        let view = store.use_store_with(|s| s.field("a"));
        assert_eq!(view.state().as_i64(), Some(5));
        assert_eq!(view.render_count(), 0);
        assert!(!view.take_needs_render());
    }

    #[test]
    fn test_registers_once_per_mount() {
        let mut registry = StoreRegistry::new();
        let store = registry.create_value_store("s", 0, StoreOptions::new());

        let view = store.use_store();
        for _ in 0..5 {
            let _ = view.render();
        }
        assert_eq!(store.record().listener_count(), 1);
        assert!(view.is_mounted());

        let other = store.use_store();
        assert_ne!(view.token(), other.token());
        assert_eq!(store.record().tokens(), vec![view.token(), other.token()]);
    }

    #[test]
    fn test_drop_unmounts() {
        let mut registry = StoreRegistry::new();
        let store = registry.create_value_store("s", 0, StoreOptions::new());

        let view = store.use_store();
        assert_eq!(store.record().listener_count(), 1);
        drop(view);
        assert_eq!(store.record().listener_count(), 0);

        store.use_store().unmount();
        assert_eq!(store.record().listener_count(), 0);
    }

    #[test]
    fn test_render_handles_are_stable() {
        let mut registry = StoreRegistry::new();
        let store = registry.create_value_store("s", 0, StoreOptions::new());
        let view = store.use_store();

        let (_, d1, g1) = view.render();
        view.dispatch().set(1);
        registry.flush();
        let (state, d2, g2) = view.render();

        assert_eq!(state.as_i64(), Some(1));
        assert!(d1.ptr_eq(&d2));
        assert!(g1.ptr_eq(&g2));
    }

    #[test]
    fn test_getter_bypasses_projection() {
        let mut registry = StoreRegistry::new();
        let initial = json!({ "a": 1, "b": 1 });
        let store = registry.create_value_store("s", initial, StoreOptions::new());
        let view = store.use_store_with(|s| s.field("a"));

        view.dispatch().set(json!({ "a": 1, "b": 2 }));
        assert_eq!(view.getter().get().field("b").as_i64(), Some(2));
        assert_eq!(view.get_state().field("b").as_i64(), Some(2));
        assert_eq!(view.state().as_i64(), Some(1));

        let (_, _, get_state) = view.render();
        assert!(view.getter().ptr_eq(&get_state));
    }

    #[test]
    fn test_shared_projection_across_consumers() {
        let mut registry = StoreRegistry::new();
        let store = registry.create_value_store("s", json!({ "n": 1 }), StoreOptions::new());

        let calls = Rc::new(RefCell::new(0));
        let sink = calls.clone();
        let by_n: Projection = Rc::new(move |s: &StateValue| {
            *sink.borrow_mut() += 1;
            s.field("n")
        });

        let first = store.use_store_projected(Some(by_n.clone()));
        let second = store.use_store_projected(Some(by_n));
        let whole = store.use_store_projected(None);
        assert_eq!(*calls.borrow(), 2);

        store.dispatch(crate::Action::value(json!({ "n": 2 })));
        registry.flush();

        assert_eq!(*calls.borrow(), 4);
        assert_eq!(first.state().as_i64(), Some(2));
        assert_eq!(second.render_count(), 1);
        assert_eq!(whole.state().field("n").as_i64(), Some(2));
    }

    #[test]
    fn test_on_render_callback() {
        let mut registry = StoreRegistry::new();
        let store = registry.create_value_store("s", 0, StoreOptions::new());
        let view = store.use_store();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        view.on_render(move |token, value: &StateValue| {
            sink.borrow_mut().push((token, value.as_i64()));
        });

        view.dispatch().set(3);
        registry.flush();

        assert_eq!(*seen.borrow(), vec![(view.token(), Some(3))]);
        assert!(view.take_needs_render());
        assert!(!view.take_needs_render());
    }

    #[test]
    fn test_subscriber_can_dispatch_reentrantly() {
        let mut registry = StoreRegistry::new();
        let store = registry.create_value_store("s", 0, StoreOptions::new());
        let view = store.use_store();

        let dispatch = view.dispatch().clone();
        view.on_render(move |_, value: &StateValue| {
            if value.as_i64() == Some(1) {
                dispatch.set(2);
            }
        });

        view.dispatch().set(1);
        assert_eq!(registry.flush(), 1);
        assert_eq!(view.state().as_i64(), Some(1));

        // The follow-up dispatch was scheduled for the next tick
        assert_eq!(registry.flush(), 1);
        assert_eq!(view.state().as_i64(), Some(2));
        assert_eq!(view.render_count(), 2);
    }
}
