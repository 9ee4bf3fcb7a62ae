#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! sdssdb - connection bootstrap for the SDSS observatory databases
//!
//! sdssdb decides which PostgreSQL server a process should talk to (APO, LCO,
//! or a local development server), opens the connection from layered
//! configuration, and lets callers switch the database role on the fly. It
//! can be used as both a command-line application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | The `sdssdb` diagnostic binary | All above + `clap`, `tracing-subscriber` |
//!
//! ```toml
//! # Library only
//! sdssdb = { version = "0.3", default-features = false }
//!
//! # Default (CLI binary)
//! sdssdb = "0.3"
//! ```
//!
//! # Architecture
//!
//! - **[`config`]**: packaged defaults merged with `$HOME/.sdssdb` and
//!   `SDSSDB_*` environment variables
//! - **[`database`]**: engine layer, location detection, and the
//!   [`DatabaseHandle`] state machine
//! - **[`observatory`]**: `platedb` and `mangadb` registries bound to a
//!   shared handle
//! - **[`output`]**: output formats for the command line
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sdssdb::{ConfigProvider, DatabaseHandle, HandleOptions, Observatory, PgEngine};
//!
//! let config = ConfigProvider::global()?;
//! let mut db = DatabaseHandle::new(config, PgEngine::new(), HandleOptions::default())?;
//!
//! // an unreachable server is not an error; it leaves the handle failed
//! if !db.check_connection() {
//!     eprintln!("running without a database");
//! }
//!
//! db.become_admin()?;
//! let observatory = Observatory::new(db.into_shared());
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod observatory;
pub mod output;

pub use config::{ConfigProvider, ConnectionProfile, RoleIdentity};
pub use database::{
    ConnectionState, DatabaseHandle, Engine, EngineError, HandleOptions, Location, MemoryEngine,
    MemoryServer, ParameterMap, PgEngine, SharedHandle,
};
pub use error::{DatabaseError, Result};
pub use observatory::{Observatory, Schema, SchemaDefinition, TableDefinition};
pub use output::OutputFormat;
