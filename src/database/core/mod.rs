//! Core database infrastructure
//!
//! This module provides the engine layer the connection handle is built on:
//! - `Engine`: the capability a database client must offer
//! - `PgEngine`: PostgreSQL client backed by sqlx
//! - `MemoryEngine`: in-process engine against a simulated server

mod engine;
mod memory;
mod postgres;

pub use engine::{Engine, EngineError, ParameterMap};
pub use memory::{MemoryEngine, MemoryServer};
pub use postgres::PgEngine;
