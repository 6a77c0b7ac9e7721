//! Store registry
//!
//! The registry owns the name → record mapping, the logical clock that drives
//! notification delivery, and the subscriber token counter. It is an ordinary
//! value: create one per UI runtime (or per test) and pass it to whatever
//! creates stores.
//!
//! # Re-creating a store
//!
//! Creating a store under a name that is already in use is a reset. The old
//! record is retired: its listeners are dropped, its pending notification is
//! discarded, and handles that still point at it keep reading and writing it
//! without notifying anyone. Consumers that should follow the new record must
//! re-mount from the new handle. Mounting from a stale handle logs a warning
//! and registers nothing, so [`UseStore::is_mounted`](crate::UseStore::is_mounted)
//! reports `false` for such a consumer.
//!
//! # Example
//!
//! ```
//! use hookstore::{Action, StateValue, StoreOptions, StoreRegistry, StoreSource};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let mut registry = StoreRegistry::new();
//! let counter = registry.create_store(
//!     "counter",
//!     StoreSource::reducer(|state: &StateValue, action: &Action| match action.kind() {
//!         Some("inc") => StateValue::from(state.as_f64().unwrap_or(0.0) + 1.0),
//!         _ => state.clone(),
//!     })
//!     .with_initial_state(0),
//!     StoreOptions::new().batch_window_ms(50),
//! );
//!
//! let view = counter.use_store();
//! for _ in 0..3 {
//!     view.dispatch().dispatch(json!({ "type": "inc" }));
//! }
//!
//! registry.tick(Duration::from_millis(49));
//! assert_eq!(view.render_count(), 0);
//! registry.tick(Duration::from_millis(1));
//! assert_eq!(view.render_count(), 1);
//! assert_eq!(view.state().as_i64(), Some(3));
//! ```

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use std::rc::Rc;
use std::time::Duration;

use crate::dispatch::Clock;
use crate::error::{Result, StoreError};
use crate::options::StoreOptions;
use crate::store::{Action, StoreHandle, StoreRecord, StoreSource, TokenCounter};
use crate::value::StateValue;

/// Upper bound on delivery rounds in [`StoreRegistry::settle`]
pub const MAX_SETTLE_ROUNDS: usize = 1024;

/// Owner of every named store
pub struct StoreRegistry {
    stores: IndexMap<String, Rc<StoreRecord>, FxBuildHasher>,
    clock: Rc<Clock>,
    tokens: Rc<TokenCounter>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self {
            stores: IndexMap::default(),
            clock: Rc::new(Clock::default()),
            tokens: Rc::new(TokenCounter::default()),
        }
    }

    // =========================================================================
    // CREATION
    // =========================================================================

    /// Create (or reset) the store called `name`
    pub fn create_store(
        &mut self,
        name: impl Into<String>,
        source: StoreSource,
        options: StoreOptions,
    ) -> StoreHandle {
        let name = name.into();
        let record = Rc::new(StoreRecord::new(
            name.clone(),
            source,
            options.batch_window(),
            self.clock.clone(),
        ));

        if let Some(previous) = self.stores.insert(name.clone(), record.clone()) {
            let listeners = previous.listener_count();
            if listeners > 0 {
                tracing::warn!(
                    store = %name,
                    listeners,
                    "store re-created; mounted consumers of the old record are detached"
                );
            }
            previous.retire();
        }

        tracing::debug!(
            store = %name,
            reducer = record.is_reducer_mode(),
            batch_window = ?record.batch_window(),
            "store created"
        );

        StoreHandle::new(record, self.tokens.clone())
    }

    /// Create a reducer-mode store
    pub fn create_reducer_store<F>(
        &mut self,
        name: impl Into<String>,
        reducer: F,
        initial_state: impl Into<StateValue>,
        options: StoreOptions,
    ) -> StoreHandle
    where
        F: Fn(&StateValue, &Action) -> StateValue + 'static,
    {
        let source = StoreSource::reducer(reducer).with_initial_state(initial_state);
        self.create_store(name, source, options)
    }

    /// Create a plain-mode store
    pub fn create_value_store(
        &mut self,
        name: impl Into<String>,
        value: impl Into<StateValue>,
        options: StoreOptions,
    ) -> StoreHandle {
        self.create_store(name, StoreSource::value(value), options)
    }

    /// Retire and forget the store called `name`
    pub fn remove(&mut self, name: &str) -> bool {
        match self.stores.shift_remove(name) {
            Some(record) => {
                record.retire();
                tracing::debug!(store = %name, "store removed");
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// A new handle to the live store called `name`
    pub fn handle(&self, name: &str) -> Result<StoreHandle> {
        self.stores
            .get(name)
            .map(|record| StoreHandle::new(record.clone(), self.tokens.clone()))
            .ok_or_else(|| StoreError::UnknownStore(name.to_string()))
    }

    /// The live record for `name`
    pub fn get(&self, name: &str) -> Option<Rc<StoreRecord>> {
        self.stores.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Store names in creation order
    pub fn names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    /// Live records in creation order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rc<StoreRecord>)> {
        self.stores.iter().map(|(name, record)| (name.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    // =========================================================================
    // SCHEDULING
    // =========================================================================

    /// Current logical time
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn has_pending(&self) -> bool {
        self.stores.values().any(|record| record.has_pending())
    }

    /// The earliest pending deadline across all stores
    pub fn next_deadline(&self) -> Option<Duration> {
        self.stores
            .values()
            .filter_map(|record| record.next_due())
            .min()
    }

    /// Advance the clock by `dt` and deliver every notification now due
    ///
    /// Returns the number of stores that notified. Each store notifies at most
    /// once per tick; a store re-armed by its own subscribers waits for the next.
    pub fn tick(&self, dt: Duration) -> usize {
        let now = self.clock.advance(dt);

        let due: SmallVec<[Rc<StoreRecord>; 8]> = self
            .stores
            .values()
            .filter(|record| record.is_due(now))
            .cloned()
            .collect();

        let mut delivered = 0;
        for record in &due {
            if record.deliver_due(now) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Deliver notifications that are due without advancing time
    pub fn flush(&self) -> usize {
        self.tick(Duration::ZERO)
    }

    /// Advance through every pending deadline until nothing is scheduled
    ///
    /// Gives up after [`MAX_SETTLE_ROUNDS`] rounds, which only happens when
    /// subscribers keep dispatching in response to their own notifications.
    pub fn settle(&self) -> usize {
        let mut delivered = 0;
        for _ in 0..MAX_SETTLE_ROUNDS {
            let Some(deadline) = self.next_deadline() else {
                return delivered;
            };
            delivered += self.tick(deadline.saturating_sub(self.now()));
        }
        tracing::warn!(
            rounds = MAX_SETTLE_ROUNDS,
            "stores did not settle; notifications are still pending"
        );
        delivered
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}
