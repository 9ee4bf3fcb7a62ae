//! Observatory schema registries
//!
//! Table and relationship registries for the databases that live at APO and
//! LCO. Each [`Schema`] is bound to a [`SharedHandle`] passed in at
//! construction; schemas built from the same [`Observatory`] share one
//! connection, so a role switch or reconnect is seen by all of them.
//!
//! ```rust,ignore
//! use sdssdb::observatory::Observatory;
//!
//! let observatory = Observatory::new(handle.into_shared());
//! let plate = observatory.platedb().table("plate").unwrap();
//! for link in plate.links {
//!     println!("{} via {}", link.target, link.through);
//! }
//! ```

use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::database::{lock, Engine, PgEngine, SharedHandle};
use crate::error::{DatabaseError, Result};

macro_rules! fk {
    ($column:literal => $references:literal) => {
        $crate::observatory::ForeignKey {
            column: $column,
            references: $references,
        }
    };
}

macro_rules! link {
    ($name:literal, $through:literal, $target:literal $(,)?) => {
        $crate::observatory::ManyToMany {
            name: $name,
            through: $through,
            target: $target,
        }
    };
}

macro_rules! table {
    ($name:literal, $primary_key:expr, $foreign_keys:expr $(,)?) => {
        $crate::observatory::TableDefinition {
            name: $name,
            primary_key: $primary_key,
            foreign_keys: $foreign_keys,
            links: &[],
        }
    };
}

mod mangadb;
mod platedb;

pub use mangadb::MANGADB;
pub use platedb::PLATEDB;

/// Single-column surrogate key used by almost every table
pub const PK: &[&str] = &["pk"];

/// Every schema registry known to the crate
pub static SCHEMAS: &[&SchemaDefinition] = &[&PLATEDB, &MANGADB];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub column: &'static str,
    /// Schema-qualified target table, e.g. `platedb.plate`
    pub references: &'static str,
}

/// Many-to-many relationship resolved through a join table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManyToMany {
    pub name: &'static str,
    pub through: &'static str,
    pub target: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableDefinition {
    pub name: &'static str,
    pub primary_key: &'static [&'static str],
    pub foreign_keys: &'static [ForeignKey],
    pub links: &'static [ManyToMany],
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct SchemaDefinition {
    pub name: &'static str,
    pub tables: &'static [TableDefinition],
}

impl SchemaDefinition {
    pub fn table(&self, name: &str) -> Option<&'static TableDefinition> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// `schema.table`, if the table belongs to this schema
    pub fn qualified_name(&self, table: &str) -> Option<String> {
        self.table(table)
            .map(|t| format!("{}.{}", self.name, t.name))
    }

    /// Foreign keys in this schema that point at `target`
    ///
    /// `target` may be schema-qualified; a bare name is taken to be in this
    /// schema.
    pub fn references_to(&self, target: &str) -> Vec<(&'static str, ForeignKey)> {
        let target = qualify(self.name, target);
        self.tables
            .iter()
            .flat_map(|t| {
                t.foreign_keys
                    .iter()
                    .filter(|fk| fk.references == target)
                    .map(move |fk| (t.name, *fk))
            })
            .collect()
    }

    /// Check that every reference resolves to a table in `known` schemas
    pub fn validate(&self, known: &[&SchemaDefinition]) -> Result<()> {
        let resolves = |target: &str| {
            target
                .split_once('.')
                .and_then(|(schema, table)| {
                    known
                        .iter()
                        .find(|s| s.name == schema)
                        .and_then(|s| s.table(table))
                })
                .is_some()
        };

        for table in self.tables {
            if table.primary_key.is_empty() {
                return Err(self.invalid(format!("table '{}' has no primary key", table.name)));
            }
            for fk in table.foreign_keys {
                if !resolves(fk.references) {
                    return Err(self.invalid(format!(
                        "{}.{} references unknown table '{}'",
                        table.name, fk.column, fk.references
                    )));
                }
            }
            for link in table.links {
                for target in [link.through, link.target] {
                    if !resolves(target) {
                        return Err(self.invalid(format!(
                            "{}.{} links to unknown table '{}'",
                            table.name, link.name, target
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    fn invalid(&self, reason: String) -> DatabaseError {
        DatabaseError::InvalidSchema {
            schema: self.name.to_string(),
            reason,
        }
    }
}

fn qualify(schema: &str, table: &str) -> String {
    if table.contains('.') {
        table.to_string()
    } else {
        format!("{}.{}", schema, table)
    }
}

/// Look up a schema registry by name
pub fn definition(name: &str) -> Option<&'static SchemaDefinition> {
    SCHEMAS.iter().copied().find(|s| s.name == name)
}

/// A schema registry bound to a database handle
pub struct Schema<E: Engine = PgEngine> {
    definition: &'static SchemaDefinition,
    handle: SharedHandle<E>,
}

impl<E: Engine> Schema<E> {
    pub fn new(definition: &'static SchemaDefinition, handle: SharedHandle<E>) -> Self {
        Schema { definition, handle }
    }

    pub fn name(&self) -> &'static str {
        self.definition.name
    }

    pub fn definition(&self) -> &'static SchemaDefinition {
        self.definition
    }

    pub fn tables(&self) -> &'static [TableDefinition] {
        self.definition.tables
    }

    pub fn table(&self, name: &str) -> Option<&'static TableDefinition> {
        self.definition.table(name)
    }

    pub fn qualified_name(&self, table: &str) -> Option<String> {
        self.definition.qualified_name(table)
    }

    pub fn references_to(&self, table: &str) -> Vec<(&'static str, ForeignKey)> {
        self.definition.references_to(table)
    }

    pub fn handle(&self) -> &SharedHandle<E> {
        &self.handle
    }

    /// Check (and if needed re-establish) the bound connection
    pub fn check_connection(&self) -> bool {
        match lock(&self.handle) {
            Ok(mut handle) => handle.check_connection(),
            Err(e) => {
                warn!(schema = self.name(), "cannot check connection: {}", e);
                false
            }
        }
    }
}

/// All observatory schemas, bound to one handle
pub struct Observatory<E: Engine = PgEngine> {
    handle: SharedHandle<E>,
    platedb: Schema<E>,
    mangadb: Schema<E>,
}

impl<E: Engine> Observatory<E> {
    pub fn new(handle: SharedHandle<E>) -> Self {
        Observatory {
            platedb: Schema::new(&PLATEDB, Arc::clone(&handle)),
            mangadb: Schema::new(&MANGADB, Arc::clone(&handle)),
            handle,
        }
    }

    pub fn handle(&self) -> &SharedHandle<E> {
        &self.handle
    }

    pub fn platedb(&self) -> &Schema<E> {
        &self.platedb
    }

    pub fn mangadb(&self) -> &Schema<E> {
        &self.mangadb
    }

    pub fn schema(&self, name: &str) -> Option<&Schema<E>> {
        self.schemas().into_iter().find(|s| s.name() == name)
    }

    pub fn schemas(&self) -> [&Schema<E>; 2] {
        [&self.platedb, &self.mangadb]
    }

    /// Check every registry against the others
    pub fn validate(&self) -> Result<()> {
        let known: Vec<&SchemaDefinition> = self.schemas().iter().map(|s| s.definition()).collect();
        for schema in self.schemas() {
            schema.definition().validate(&known)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigProvider;
    use crate::database::{
        ConnectionState, DatabaseHandle, HandleOptions, Location, MemoryEngine, MemoryServer,
    };

    fn shared(server: &MemoryServer) -> SharedHandle<MemoryEngine> {
        let config = ConfigProvider::from_yaml(
            "local: {database: apodb, host: localhost, port: 5432, user: sdssdb}",
            None,
        )
        .unwrap();
        DatabaseHandle::new(
            Arc::new(config),
            MemoryEngine::new(server.clone()),
            HandleOptions::default().with_location(Location::Local),
        )
        .unwrap()
        .into_shared()
    }

    fn server() -> MemoryServer {
        MemoryServer::new("localhost", 5432).with_database("apodb")
    }

    #[test]
    fn test_registries_are_consistent() {
        for schema in SCHEMAS {
            schema.validate(SCHEMAS).unwrap();
        }
    }

    #[test]
    fn test_cross_schema_reference_needs_platedb() {
        let err = MANGADB.validate(&[&MANGADB]).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidSchema { schema, .. } if schema == "mangadb"));
    }

    #[test]
    fn test_table_lookup() {
        let plate = PLATEDB.table("plate").unwrap();
        assert_eq!(plate.primary_key, &["pk"]);
        assert_eq!(plate.links.len(), 2);
        assert!(plate
            .foreign_keys
            .iter()
            .any(|fk| fk.column == "design_pk" && fk.references == "platedb.design"));

        let composite = PLATEDB.table("plugging_to_boss_sn2_threshold").unwrap();
        assert_eq!(
            composite.primary_key,
            &["boss_sn2_threshold_version", "plugging_pk"]
        );
        assert_eq!(PLATEDB.table("constants").unwrap().primary_key, &["name"]);

        assert!(PLATEDB.table("data_cube").is_none());
        assert_eq!(
            MANGADB.qualified_name("data_cube").as_deref(),
            Some("mangadb.data_cube")
        );
        assert_eq!(definition("mangadb"), Some(&MANGADB));
        assert!(definition("catalogdb").is_none());
    }

    #[test]
    fn test_references_to() {
        let refs = MANGADB.references_to("platedb.plate");
        let tables: Vec<_> = refs.iter().map(|(t, _)| *t).collect();
        assert_eq!(tables, vec!["plate", "data_cube"]);

        let local = MANGADB.references_to("exposure");
        assert_eq!(local.len(), 3);
        assert!(local.iter().all(|(_, fk)| fk.column == "exposure_pk"));
    }

    #[test]
    fn test_schemas_share_handle() {
        let server = server();
        let observatory = Observatory::new(shared(&server));

        assert!(Arc::ptr_eq(
            observatory.platedb().handle(),
            observatory.mangadb().handle()
        ));
        observatory.validate().unwrap();

        lock(observatory.handle())
            .unwrap()
            .become_role("readonly")
            .unwrap();
        let user = lock(observatory.mangadb().handle())
            .unwrap()
            .dsn_parameters()
            .and_then(|dsn| dsn.get("user").map(str::to_string));
        assert_eq!(user.as_deref(), Some("readonly"));
    }

    #[test]
    fn test_schema_check_connection() {
        let server = server();
        let observatory = Observatory::new(shared(&server));
        let platedb = observatory.schema("platedb").unwrap();
        assert!(platedb.check_connection());

        server.set_reachable(false);
        assert!(!platedb.check_connection());
        assert_eq!(
            lock(observatory.handle()).unwrap().state(),
            ConnectionState::Failed
        );

        server.set_reachable(true);
        assert!(observatory.mangadb().check_connection());
        assert!(observatory.schema("catalogdb").is_none());
    }
}
