//! Hookstore
//!
//! Named global stores for component-based UIs. Components share a piece of
//! state by name instead of threading it through props, and each component
//! re-renders only when the slice of state it projects actually changes.
//!
//! - **Registry**: an owned [`StoreRegistry`] maps names to store records and
//!   drives notification delivery from a host-advanced clock
//! - **Dispatch**: reducer or plain-value updates, applied synchronously,
//!   notified on the next tick or after a debounce window
//! - **Consumers**: [`StoreHandle::use_store`] mounts a consumer that
//!   subscribes once and unsubscribes when dropped
//! - **Selectors**: per-consumer projections plus a one-level shallow compare
//!   that suppresses re-renders for unchanged slices
//!
//! # Example
//!
//! ```rust
//! use hookstore::{StoreOptions, StoreRegistry};
//! use serde_json::json;
//!
//! let mut registry = StoreRegistry::new();
//! let todos = registry.create_value_store(
//!     "todos",
//!     json!({ "items": ["write docs"], "filter": "all" }),
//!     StoreOptions::new(),
//! );
//!
//! let list = todos.use_store_with(|s| s.field("items"));
//! let header = todos.use_store_with(|s| s.field("filter"));
//!
//! list.dispatch().update(|s| s.with_field("filter", "done"));
//! registry.flush();
//!
//! assert_eq!(list.render_count(), 0);
//! assert_eq!(header.render_count(), 1);
//! assert_eq!(header.state().as_str(), Some("done"));
//! ```

pub mod dispatch;
pub mod error;
pub mod hook;
pub mod options;
pub mod registry;
pub mod selector;
pub mod store;
pub mod value;

pub use dispatch::{Clock, Dispatch, GetState, PendingNotification};
pub use error::{Result, StoreError};
pub use hook::{RenderCallback, UseStore};
pub use options::StoreOptions;
pub use registry::{StoreRegistry, MAX_SETTLE_ROUNDS};
pub use selector::{derive, filter_update, shallow_equal, Filtered, Projection};
pub use store::{
    Action, Reducer, StoreHandle, StoreRecord, StoreSource, SubscriberToken, UpdateFn,
};
pub use value::{ObjectMap, StateValue, ValueKind};
