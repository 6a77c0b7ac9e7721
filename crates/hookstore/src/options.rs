//! Per-store configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

/// Options applied when a store is created
///
/// Options can be built in code or read from host configuration:
///
/// ```
/// use hookstore::StoreOptions;
/// use std::time::Duration;
///
/// let built = StoreOptions::new().batch_window_ms(50);
/// let parsed = StoreOptions::from_json(r#"{ "batch_window_ms": 50 }"#).unwrap();
///
/// assert_eq!(built, parsed);
/// assert_eq!(parsed.batch_window(), Some(Duration::from_millis(50)));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreOptions {
    /// Debounce window. `None` notifies on the next tick.
    #[serde(rename = "batch_window_ms", alias = "batchWindowMs", with = "window_ms")]
    batch_window: Option<Duration>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coalesce dispatches that arrive within `window` of each other
    pub fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window = Some(window);
        self
    }

    /// Same as [`with_batch_window`](Self::with_batch_window), in milliseconds
    pub fn batch_window_ms(mut self, ms: u64) -> Self {
        self.batch_window = Some(Duration::from_millis(ms));
        self
    }

    /// The configured debounce window, if any
    pub fn batch_window(&self) -> Option<Duration> {
        self.batch_window
    }

    /// Parse options from a JSON document
    ///
    /// Unknown keys are rejected rather than ignored.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

/// Whole milliseconds on the wire. Sub-millisecond windows round up so they
/// never serialize as an immediate flush.
mod window_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(window: &Option<Duration>, ser: S) -> Result<S::Ok, S::Error> {
        match window {
            Some(window) => {
                let ms = window.as_nanos().div_ceil(1_000_000);
                ser.serialize_some(&u64::try_from(ms).unwrap_or(u64::MAX))
            }
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(de)?.map(Duration::from_millis))
    }
}
