//! Error types
//!
//! Connection failures during the initial bootstrap are not errors: they are
//! recorded as [`ConnectionState::Failed`](crate::database::ConnectionState)
//! on the handle. Everything listed here is surfaced to the caller.

use thiserror::Error;

use crate::database::core::EngineError;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The merged configuration has no entry for the requested key.
    #[error("profile '{0}' not found in configuration")]
    ProfileNotFound(String),

    /// The configuration entry exists but cannot be read as a profile or role.
    #[error("profile '{key}' is invalid: {reason}")]
    InvalidProfile { key: String, reason: String },

    #[error("location '{0}' has no associated connection profile")]
    InvalidLocation(String),

    #[error("database has not been initialised")]
    NotInitialized,

    #[error("cannot determine the DSN parameters, the database may be disconnected")]
    DsnUnavailable,

    #[error("cannot connect to database with user {role}")]
    RoleSwitchFailed {
        role: String,
        #[source]
        source: EngineError,
    },

    /// Engine failure that is not a connection error (for example a malformed
    /// port). Only connection errors are absorbed during bootstrap.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A schema registry refers to a table that no known schema defines.
    #[error("schema '{schema}' is inconsistent: {reason}")]
    InvalidSchema { schema: String, reason: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    /// A shared handle's lock was poisoned by a panic in another thread.
    #[error("database handle is unavailable: {0}")]
    HandleUnavailable(String),
}

impl DatabaseError {
    pub fn config(message: impl Into<String>) -> Self {
        DatabaseError::Config {
            message: message.into(),
        }
    }
}

pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;
