//! Engine capability
//!
//! The handle only needs a small surface from the underlying database client:
//! target it, open it, ask whether it is still open, and read back the
//! parameters of the live connection. Any client satisfying [`Engine`] can be
//! plugged into a [`DatabaseHandle`](crate::database::DatabaseHandle).

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Keys that are never echoed back in DSN parameters or display output.
const SECRET_KEYS: &[&str] = &["password"];

/// Classified engine failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The server could not be reached or refused the connection
    /// (no route, refused, unknown database, role rejected).
    #[error("connection error: {0}")]
    Connection(String),

    /// The parameters themselves are malformed.
    #[error("invalid connection parameters: {0}")]
    Configuration(String),

    /// `connect` was called on an engine that has no target database.
    #[error("engine has no target database")]
    NotInitialized,
}

impl EngineError {
    pub fn is_connection_error(&self) -> bool {
        matches!(self, EngineError::Connection(_))
    }
}

/// Ordered mapping of connection parameter names to values
///
/// Used both for the parameters handed to [`Engine::init`] and for the DSN
/// parameters reported back by a live connection (`host`, `port`, `dbname`,
/// `user`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterMap(BTreeMap<String, String>);

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    /// Copy of the map with secret values replaced by `***`
    pub fn masked(&self) -> ParameterMap {
        let inner = self
            .0
            .iter()
            .map(|(k, v)| {
                if SECRET_KEYS.contains(&k.as_str()) {
                    (k.clone(), "***".to_string())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();
        ParameterMap(inner)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        ParameterMap(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for ParameterMap {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for ParameterMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .masked()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// Minimal database client capability consumed by the handle
pub trait Engine {
    /// Target the engine at `dbname` with the given parameters.
    ///
    /// Any open connection is released. `init(None, ParameterMap::new())`
    /// leaves the engine empty.
    fn init(&mut self, dbname: Option<&str>, params: ParameterMap);

    /// Open a connection to the current target.
    fn connect(&mut self) -> Result<(), EngineError>;

    /// Whether a live connection is held.
    fn is_open(&mut self) -> bool;

    /// Parameters of the live connection, `None` when nothing is open.
    ///
    /// Passwords are never included.
    fn dsn_parameters(&self) -> Option<ParameterMap>;

    /// Release the connection, keeping the current target.
    fn close(&mut self);
}
