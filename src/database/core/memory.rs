//! In-process engine
//!
//! `MemoryEngine` talks to a `MemoryServer`, a shared description of a
//! PostgreSQL-like server that can be taken down and brought back up. It lets
//! schema code and connection logic be exercised without a live database.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use super::engine::{Engine, EngineError, ParameterMap};

#[derive(Debug)]
struct ServerState {
    host: String,
    port: u16,
    reachable: bool,
    /// Bumped every time the server goes down; connections from an older
    /// generation are dead.
    generation: u64,
    databases: BTreeSet<String>,
    /// Empty means any role is accepted.
    roles: BTreeSet<String>,
    connections: u64,
}

/// Shared handle to a simulated database server
#[derive(Debug, Clone)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    pub fn new(host: &str, port: u16) -> Self {
        MemoryServer {
            state: Arc::new(Mutex::new(ServerState {
                host: host.to_string(),
                port,
                reachable: true,
                generation: 0,
                databases: BTreeSet::new(),
                roles: BTreeSet::new(),
                connections: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        // a panic while holding the lock leaves plain data behind; keep using it
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_database(self, name: &str) -> Self {
        self.lock().databases.insert(name.to_string());
        self
    }

    /// Restrict the server to the given roles (any role is accepted otherwise)
    pub fn with_role(self, role: &str) -> Self {
        self.lock().roles.insert(role.to_string());
        self
    }

    pub fn host(&self) -> String {
        self.lock().host.clone()
    }

    pub fn port(&self) -> u16 {
        self.lock().port
    }

    /// Take the server down or bring it back up
    ///
    /// Taking it down kills every open connection.
    pub fn set_reachable(&self, reachable: bool) {
        let mut state = self.lock();
        if state.reachable && !reachable {
            state.generation += 1;
        }
        state.reachable = reachable;
    }

    pub fn is_reachable(&self) -> bool {
        self.lock().reachable
    }

    /// Number of successful connections opened so far
    pub fn connection_count(&self) -> u64 {
        self.lock().connections
    }

    fn open(&self, dbname: &str, params: &ParameterMap) -> Result<u64, EngineError> {
        let mut state = self.lock();

        if let Some(host) = params.get("host") {
            if host != state.host {
                return Err(EngineError::Connection(format!(
                    "could not translate host name \"{}\" to address",
                    host
                )));
            }
        }
        if let Some(port) = params.get("port") {
            let port: u16 = port
                .parse()
                .map_err(|_| EngineError::Configuration(format!("invalid port '{}'", port)))?;
            if port != state.port {
                return Err(EngineError::Connection(format!(
                    "connection refused on port {}",
                    port
                )));
            }
        }
        if !state.reachable {
            return Err(EngineError::Connection(format!(
                "could not connect to server at \"{}\"",
                state.host
            )));
        }
        if !state.databases.contains(dbname) {
            return Err(EngineError::Connection(format!(
                "database \"{}\" does not exist",
                dbname
            )));
        }
        if let Some(user) = params.get("user") {
            if !state.roles.is_empty() && !state.roles.contains(user) {
                return Err(EngineError::Connection(format!(
                    "role \"{}\" does not exist",
                    user
                )));
            }
        }

        state.connections += 1;
        Ok(state.generation)
    }

    fn is_alive(&self, generation: u64) -> bool {
        let state = self.lock();
        state.reachable && state.generation == generation
    }
}

struct MemoryConnection {
    generation: u64,
    dsn: ParameterMap,
}

pub struct MemoryEngine {
    server: MemoryServer,
    dbname: Option<String>,
    params: ParameterMap,
    conn: Option<MemoryConnection>,
}

impl MemoryEngine {
    pub fn new(server: MemoryServer) -> Self {
        MemoryEngine {
            server,
            dbname: None,
            params: ParameterMap::new(),
            conn: None,
        }
    }

    pub fn server(&self) -> &MemoryServer {
        &self.server
    }

    pub fn database(&self) -> Option<&str> {
        self.dbname.as_deref()
    }
}

impl Engine for MemoryEngine {
    fn init(&mut self, dbname: Option<&str>, params: ParameterMap) {
        self.conn = None;
        self.dbname = dbname.map(str::to_string);
        self.params = params;
    }

    fn connect(&mut self) -> Result<(), EngineError> {
        let dbname = self.dbname.clone().ok_or(EngineError::NotInitialized)?;
        self.conn = None;

        let generation = self.server.open(&dbname, &self.params)?;

        let mut dsn = ParameterMap::new();
        dsn.insert("host", self.server.host());
        dsn.insert("port", self.server.port().to_string());
        dsn.insert("dbname", dbname);
        dsn.insert(
            "user",
            self.params.get("user").unwrap_or("postgres").to_string(),
        );
        for (key, value) in self.params.iter() {
            if !dsn.contains_key(key) && key != "password" {
                dsn.insert(key.clone(), value.clone());
            }
        }

        self.conn = Some(MemoryConnection { generation, dsn });
        Ok(())
    }

    fn is_open(&mut self) -> bool {
        let alive = match &self.conn {
            Some(conn) => self.server.is_alive(conn.generation),
            None => return false,
        };
        if !alive {
            self.conn = None;
        }
        alive
    }

    fn dsn_parameters(&self) -> Option<ParameterMap> {
        self.conn.as_ref().map(|c| c.dsn.clone())
    }

    fn close(&mut self) {
        self.conn = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> MemoryServer {
        MemoryServer::new("localhost", 5432)
            .with_database("apodb")
            .with_role("sdssdb")
            .with_role("sdssdb_admin")
    }

    fn params(pairs: &[(&str, &str)]) -> ParameterMap {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_connect_and_dsn() {
        let mut engine = MemoryEngine::new(server());
        engine.init(
            Some("apodb"),
            params(&[("host", "localhost"), ("user", "sdssdb"), ("password", "pw")]),
        );
        engine.connect().unwrap();

        assert!(engine.is_open());
        let dsn = engine.dsn_parameters().unwrap();
        assert_eq!(dsn.get("dbname"), Some("apodb"));
        assert_eq!(dsn.get("user"), Some("sdssdb"));
        assert_eq!(dsn.get("port"), Some("5432"));
        assert!(!dsn.contains_key("password"));
    }

    #[test]
    fn test_connect_without_target() {
        let mut engine = MemoryEngine::new(server());
        assert_eq!(engine.connect(), Err(EngineError::NotInitialized));
    }

    #[test]
    fn test_connection_errors() {
        let mut engine = MemoryEngine::new(server());

        engine.init(Some("missing"), ParameterMap::new());
        assert!(engine.connect().unwrap_err().is_connection_error());

        engine.init(Some("apodb"), params(&[("user", "nobody")]));
        assert!(engine.connect().unwrap_err().is_connection_error());

        engine.init(Some("apodb"), params(&[("host", "sdss4-db")]));
        assert!(engine.connect().unwrap_err().is_connection_error());

        engine.init(Some("apodb"), params(&[("port", "abc")]));
        assert!(matches!(
            engine.connect(),
            Err(EngineError::Configuration(_))
        ));
        assert!(engine.dsn_parameters().is_none());
    }

    #[test]
    fn test_server_outage_kills_connections() {
        let server = server();
        let mut engine = MemoryEngine::new(server.clone());
        engine.init(Some("apodb"), ParameterMap::new());
        engine.connect().unwrap();

        server.set_reachable(false);
        assert!(!engine.is_open());
        assert!(engine.dsn_parameters().is_none());
        assert!(engine.connect().unwrap_err().is_connection_error());

        server.set_reachable(true);
        assert!(!engine.is_open());
        engine.connect().unwrap();
        assert!(engine.is_open());
        assert_eq!(server.connection_count(), 2);
    }

    #[test]
    fn test_init_releases_connection() {
        let mut engine = MemoryEngine::new(server());
        engine.init(Some("apodb"), ParameterMap::new());
        engine.connect().unwrap();

        engine.init(None, ParameterMap::new());
        assert!(!engine.is_open());
        assert!(engine.database().is_none());
    }
}
