//! Database module
//!
//! This module provides the connection bootstrap for the observatory
//! databases, organized into:
//!
//! - **core**: Engine layer (PostgreSQL client, in-process test engine)
//! - **location**: Which observatory the process runs at
//! - **handle**: The connection state machine and role switching
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── engine      # Engine trait, parameter maps, engine errors
//! │   ├── postgres    # sqlx-backed PostgreSQL engine
//! │   └── memory      # simulated server for tests and dry runs
//! │
//! ├── location        # hostname classification
//! └── handle          # DatabaseHandle state machine
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use sdssdb::database::{DatabaseHandle, HandleOptions, Location};
//! use sdssdb::config::ConfigProvider;
//! use sdssdb::database::core::PgEngine;
//!
//! let config = ConfigProvider::global()?;
//! let mut db = DatabaseHandle::new(config, PgEngine::new(), HandleOptions::default())?;
//!
//! if db.check_connection() {
//!     db.become_admin()?;
//! }
//! ```

pub mod core;
mod handle;
mod location;

pub use core::{Engine, EngineError, MemoryEngine, MemoryServer, ParameterMap, PgEngine};
pub use handle::{lock, ConnectionState, DatabaseHandle, HandleOptions, SharedHandle};
pub use location::{Location, LCO_DOMAIN_SUFFIX, SITE_HOST_INFIX};
