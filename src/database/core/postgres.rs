//! PostgreSQL engine
//!
//! Wraps a single `sqlx::PgConnection`. The async client is driven from a
//! private current-thread runtime so that every call made by the handle is a
//! plain blocking call.

use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{ConnectOptions, Connection};
use std::str::FromStr;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use super::engine::{Engine, EngineError, ParameterMap};

/// Parameters understood by [`PgEngine`]; anything else is ignored.
const KNOWN_PARAMS: &[&str] = &[
    "host",
    "port",
    "user",
    "password",
    "sslmode",
    "application_name",
];

#[derive(Default)]
pub struct PgEngine {
    runtime: Option<Runtime>,
    dbname: Option<String>,
    params: ParameterMap,
    conn: Option<PgConnection>,
    /// Parameters of the open connection, captured when it was opened.
    live: Option<ParameterMap>,
}

impl PgEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the database the engine is targeted at, if any
    pub fn database(&self) -> Option<&str> {
        self.dbname.as_deref()
    }

    fn runtime(&mut self) -> Result<&Runtime, EngineError> {
        if self.runtime.is_none() {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| EngineError::Connection(format!("failed to start runtime: {}", e)))?;
            self.runtime = Some(rt);
        }
        self.runtime
            .as_ref()
            .ok_or_else(|| EngineError::Connection("runtime unavailable".to_string()))
    }

    /// Build connect options for a target database from a parameter map
    pub fn connect_options(dbname: &str, params: &ParameterMap) -> Result<PgConnectOptions, EngineError> {
        let mut opts = PgConnectOptions::new().database(dbname);

        if let Some(host) = params.get("host") {
            opts = opts.host(host);
        }
        if let Some(port) = params.get("port") {
            let port: u16 = port
                .parse()
                .map_err(|_| EngineError::Configuration(format!("invalid port '{}'", port)))?;
            opts = opts.port(port);
        }
        if let Some(user) = params.get("user") {
            opts = opts.username(user);
        }
        if let Some(password) = params.get("password") {
            opts = opts.password(password);
        }
        if let Some(mode) = params.get("sslmode") {
            let mode = PgSslMode::from_str(mode)
                .map_err(|_| EngineError::Configuration(format!("invalid sslmode '{}'", mode)))?;
            opts = opts.ssl_mode(mode);
        }
        if let Some(name) = params.get("application_name") {
            opts = opts.application_name(name);
        }

        for (key, _) in params.iter() {
            if !KNOWN_PARAMS.contains(&key.as_str()) {
                debug!("ignoring unsupported connection parameter '{}'", key);
            }
        }

        Ok(opts.disable_statement_logging())
    }

    fn describe(opts: &PgConnectOptions, params: &ParameterMap) -> ParameterMap {
        let mut dsn = ParameterMap::new();
        dsn.insert("host", opts.get_host());
        dsn.insert("port", opts.get_port().to_string());
        dsn.insert("user", opts.get_username());
        if let Some(db) = opts.get_database() {
            dsn.insert("dbname", db);
        }
        for key in ["sslmode", "application_name"] {
            if let Some(value) = params.get(key) {
                dsn.insert(key, value);
            }
        }
        dsn
    }

    fn release(&mut self) {
        self.live = None;
        if let Some(conn) = self.conn.take() {
            if let Some(rt) = self.runtime.as_ref() {
                if let Err(e) = rt.block_on(conn.close()) {
                    warn!("error while closing connection: {}", e);
                }
            }
        }
    }
}

impl Drop for PgEngine {
    /// Close the connection while its runtime is still alive
    fn drop(&mut self) {
        self.release();
    }
}

fn classify(err: sqlx::Error) -> EngineError {
    match err {
        sqlx::Error::Configuration(e) => EngineError::Configuration(e.to_string()),
        other => EngineError::Connection(other.to_string()),
    }
}

impl Engine for PgEngine {
    fn init(&mut self, dbname: Option<&str>, params: ParameterMap) {
        self.release();
        self.dbname = dbname.map(str::to_string);
        self.params = params;
    }

    fn connect(&mut self) -> Result<(), EngineError> {
        let dbname = self.dbname.clone().ok_or(EngineError::NotInitialized)?;
        let opts = Self::connect_options(&dbname, &self.params)?;

        self.release();
        let conn = self.runtime()?.block_on(opts.connect()).map_err(classify)?;

        self.live = Some(Self::describe(&opts, &self.params));
        self.conn = Some(conn);
        Ok(())
    }

    fn is_open(&mut self) -> bool {
        let Some(mut conn) = self.conn.take() else {
            return false;
        };
        let alive = match self.runtime.as_ref() {
            Some(rt) => rt.block_on(conn.ping()).is_ok(),
            None => false,
        };
        if alive {
            self.conn = Some(conn);
        } else {
            debug!("connection ping failed, dropping connection");
            self.live = None;
        }
        alive
    }

    fn dsn_parameters(&self) -> Option<ParameterMap> {
        self.conn.as_ref().and(self.live.clone())
    }

    fn close(&mut self) {
        self.release();
    }
}
