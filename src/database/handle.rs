//! Database handle
//!
//! A [`DatabaseHandle`] owns exactly one engine connection and moves through
//! three states:
//!
//! ```text
//! Uninitialized ──connect──▶ Connected ◀──retry── Failed
//!        └────────failure────────▶ Failed ◀──lost──┘
//! ```
//!
//! An unreachable database during bootstrap is expected (off-site
//! development, no route to the observatory network): the handle records
//! `Failed` and stays usable as an inert placeholder. Role switches, on the
//! other hand, report their failures to the caller.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::{ConfigProvider, ConnectionProfile, RoleIdentity};
use crate::database::core::{Engine, ParameterMap, PgEngine};
use crate::database::location::Location;
use crate::error::{DatabaseError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Uninitialized,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Uninitialized => write!(f, "uninitialized"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// Construction options for [`DatabaseHandle::new`]
#[derive(Debug, Clone)]
pub struct HandleOptions {
    /// Skip hostname detection and use this location
    pub location: Option<Location>,
    /// Connect to the location's profile right away
    pub autoconnect: bool,
    /// Switch to the location's admin role once connected
    pub admin: bool,
}

impl Default for HandleOptions {
    fn default() -> Self {
        HandleOptions {
            location: None,
            autoconnect: true,
            admin: false,
        }
    }
}

impl HandleOptions {
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn autoconnect(mut self, autoconnect: bool) -> Self {
        self.autoconnect = autoconnect;
        self
    }

    pub fn admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }
}

/// A handle shared between schema registries
///
/// The handle itself does no locking; the mutex is what serializes
/// connection changes and queries between users of the same handle.
pub type SharedHandle<E = PgEngine> = Arc<Mutex<DatabaseHandle<E>>>;

/// Lock a shared handle
pub fn lock<E: Engine>(shared: &SharedHandle<E>) -> Result<MutexGuard<'_, DatabaseHandle<E>>> {
    shared
        .lock()
        .map_err(|e| DatabaseError::HandleUnavailable(e.to_string()))
}

/// Single logical connection to one of the observatory databases
pub struct DatabaseHandle<E: Engine = PgEngine> {
    config: Arc<ConfigProvider>,
    engine: E,
    state: ConnectionState,
    location: Location,
    /// Last profile a connection was attempted with; bound while connected.
    profile: Option<ConnectionProfile>,
}

impl DatabaseHandle<PgEngine> {
    /// PostgreSQL handle using the process-wide configuration and the
    /// detected location
    pub fn open_default() -> Result<Self> {
        let config = ConfigProvider::global()?;
        DatabaseHandle::new(config, PgEngine::new(), HandleOptions::default())
    }
}

impl<E: Engine> DatabaseHandle<E> {
    /// Create a handle, detecting the location unless one is given
    ///
    /// With `autoconnect`, an unreachable database leaves the handle in
    /// [`ConnectionState::Failed`] instead of returning an error. Missing
    /// profiles and unknown locations are still errors.
    pub fn new(config: Arc<ConfigProvider>, engine: E, options: HandleOptions) -> Result<Self> {
        let location = options.location.unwrap_or_else(Location::detect);
        let mut handle = Self::unconnected(config, engine, location);

        if options.autoconnect {
            handle.autoconnect()?;
        }

        if options.admin && handle.is_connected() {
            handle.become_admin()?;
        }

        Ok(handle)
    }

    /// Create a handle without attempting any connection
    pub fn unconnected(config: Arc<ConfigProvider>, engine: E, location: Location) -> Self {
        DatabaseHandle {
            config,
            engine,
            state: ConnectionState::Uninitialized,
            location,
            profile: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Profile of the live connection
    pub fn profile(&self) -> Option<&ConnectionProfile> {
        if self.is_connected() {
            self.profile.as_ref()
        } else {
            None
        }
    }

    /// Profile of the last connection attempt, successful or not
    pub fn last_profile(&self) -> Option<&ConnectionProfile> {
        self.profile.as_ref()
    }

    pub fn config(&self) -> &Arc<ConfigProvider> {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_shared(self) -> SharedHandle<E> {
        Arc::new(Mutex::new(self))
    }

    /// Connect using a profile from the configuration
    ///
    /// Connection errors are absorbed: the returned state is `Failed` and the
    /// engine is reset to an empty target.
    pub fn connect_from_profile(&mut self, key: &str) -> Result<ConnectionState> {
        let profile = self.config.resolve(key)?;
        self.connect_profile(profile)
    }

    /// Connect using an explicit profile
    pub fn connect_profile(&mut self, profile: ConnectionProfile) -> Result<ConnectionState> {
        if self.is_connected() && self.profile.as_ref() == Some(&profile) && self.engine.is_open()
        {
            debug!("already connected with profile '{}'", profile.key);
            return Ok(self.state);
        }

        info!(
            profile = %profile.key,
            database = %profile.database,
            "connecting to database"
        );

        self.engine
            .init(Some(profile.database.as_str()), profile.parameters());
        let result = self.engine.connect();
        let key = profile.key.clone();
        self.profile = Some(profile);

        match result {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                info!(profile = %key, "connected");
                Ok(self.state)
            }
            Err(e) => {
                self.engine.init(None, ParameterMap::new());
                self.state = ConnectionState::Failed;
                if e.is_connection_error() {
                    warn!(profile = %key, "database unavailable, continuing disconnected: {}", e);
                    Ok(self.state)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Connect to the profile matching the handle's location
    pub fn autoconnect(&mut self) -> Result<ConnectionState> {
        let key = self
            .location
            .profile_key()
            .ok_or_else(|| DatabaseError::InvalidLocation(self.location.to_string()))?;
        self.connect_from_profile(key)
    }

    /// Whether the handle can be used, reconnecting once if it cannot
    ///
    /// Never fails: any error during the reconnect attempt is logged and
    /// reported as `false`.
    pub fn check_connection(&mut self) -> bool {
        if self.is_connected() && self.engine.is_open() {
            return true;
        }

        debug!(state = %self.state, "connection not open, attempting reconnect");
        let result = match self.profile.clone() {
            Some(profile) => self.connect_profile(profile),
            None => self.autoconnect(),
        };

        match result {
            Ok(state) => state == ConnectionState::Connected,
            Err(e) => {
                warn!("reconnect failed: {}", e);
                false
            }
        }
    }

    /// Parameters of the live connection (`host`, `port`, `dbname`, `user`, ...)
    pub fn dsn_parameters(&self) -> Option<ParameterMap> {
        if !self.is_connected() {
            return None;
        }
        self.engine.dsn_parameters()
    }

    /// Reopen the current database as another role
    pub fn become_role(&mut self, role: &str) -> Result<()> {
        self.become_identity(&RoleIdentity::new(role))
    }

    /// Reopen the current database with the given identity
    ///
    /// The previous connection is released before the new one is attempted,
    /// so a rejected identity leaves the handle `Failed`; the profile from
    /// before the switch is kept for [`check_connection`](Self::check_connection).
    pub fn become_identity(&mut self, identity: &RoleIdentity) -> Result<()> {
        if !self.is_connected() {
            return Err(DatabaseError::NotInitialized);
        }

        let mut params = self
            .engine
            .dsn_parameters()
            .ok_or(DatabaseError::DsnUnavailable)?;
        let role = identity.user().to_string();
        params.insert("user", role.as_str());
        if let Some(password) = identity.password() {
            params.insert("password", password);
        }
        let dbname = params
            .remove("dbname")
            .ok_or(DatabaseError::DsnUnavailable)?;

        info!(role = %role, database = %dbname, "switching database role");
        self.engine.init(Some(dbname.as_str()), params.clone());

        match self.engine.connect() {
            Ok(()) => {
                let negotiated = self.engine.dsn_parameters().unwrap_or_else(|| {
                    params.insert("dbname", dbname.as_str());
                    params
                });
                self.profile =
                    ConnectionProfile::from_dsn(&role, &negotiated, identity.password());
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(source) => {
                warn!(role = %role, "role switch failed: {}", source);
                self.engine.init(None, ParameterMap::new());
                self.state = ConnectionState::Failed;
                Err(DatabaseError::RoleSwitchFailed { role, source })
            }
        }
    }

    /// Switch to the admin role of the handle's location
    pub fn become_admin(&mut self) -> Result<()> {
        self.become_site_role("admin")
    }

    /// Switch to the regular user role of the handle's location
    pub fn become_user(&mut self) -> Result<()> {
        self.become_site_role("user")
    }

    fn become_site_role(&mut self, kind: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(DatabaseError::NotInitialized);
        }
        let site = self
            .location
            .profile_key()
            .ok_or_else(|| DatabaseError::InvalidLocation(self.location.to_string()))?;
        let identity = self.config.resolve_role(&format!("{}_{}", site, kind))?;
        self.become_identity(&identity)
    }

    /// Release the connection
    ///
    /// From any state, the handle goes back to
    /// [`ConnectionState::Uninitialized`]. The last profile is kept, so
    /// [`check_connection`](Self::check_connection) can reopen it.
    pub fn close(&mut self) {
        self.engine.close();
        self.state = ConnectionState::Uninitialized;
    }
}

impl<E: Engine> fmt::Debug for DatabaseHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("state", &self.state)
            .field("location", &self.location)
            .field("profile", &self.profile.as_ref().map(|p| p.key.as_str()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{EngineError, MemoryEngine, MemoryServer};

    const TEST_CONFIG: &str = r#"
local:
  database: apodb
  host: localhost
  port: 5432
  user: sdssdb
apo:
  database: apodb
  host: sdss4-db
  port: 5432
lco:
  database: lcodb
  host: sdss4-db.lco.cl
  port: 5432
offsite:
  database: apodb
  host: localhost
  port: 6000
local_admin: sdssdb_admin
local_user: sdssdb
apo_admin: apo_admin_role
"#;

    fn config() -> Arc<ConfigProvider> {
        Arc::new(ConfigProvider::from_yaml(TEST_CONFIG, None).unwrap())
    }

    fn server() -> MemoryServer {
        MemoryServer::new("localhost", 5432).with_database("apodb")
    }

    fn local_handle(server: &MemoryServer) -> DatabaseHandle<MemoryEngine> {
        DatabaseHandle::new(
            config(),
            MemoryEngine::new(server.clone()),
            HandleOptions::default().with_location(Location::Local),
        )
        .unwrap()
    }

    #[test]
    fn test_autoconnect_local() {
        let server = server();
        let handle = local_handle(&server);

        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(handle.location(), &Location::Local);
        assert_eq!(handle.profile().map(|p| p.key.as_str()), Some("local"));

        let dsn = handle.dsn_parameters().unwrap();
        assert_eq!(dsn.get("dbname"), Some("apodb"));
        assert_eq!(dsn.get("user"), Some("sdssdb"));
    }

    #[test]
    fn test_no_autoconnect_stays_uninitialized() {
        let handle = DatabaseHandle::new(
            config(),
            MemoryEngine::new(server()),
            HandleOptions::default()
                .with_location(Location::Local)
                .autoconnect(false),
        )
        .unwrap();

        assert_eq!(handle.state(), ConnectionState::Uninitialized);
        assert!(handle.profile().is_none());
        assert!(handle.dsn_parameters().is_none());
    }

    #[test]
    fn test_unreachable_target_fails_quietly() {
        let server = server();
        server.set_reachable(false);
        let handle = local_handle(&server);

        assert_eq!(handle.state(), ConnectionState::Failed);
        assert!(handle.dsn_parameters().is_none());
        assert!(handle.profile().is_none());
        assert_eq!(handle.last_profile().map(|p| p.key.as_str()), Some("local"));
        assert!(handle.engine().database().is_none());
    }

    #[test]
    fn test_connect_from_profile_wrong_port_fails_quietly() {
        let mut handle = local_handle(&server());
        let state = handle.connect_from_profile("offsite").unwrap();

        assert_eq!(state, ConnectionState::Failed);
        assert!(handle.dsn_parameters().is_none());
    }

    #[test]
    fn test_profile_not_found_propagates() {
        let mut handle = local_handle(&server());
        assert!(matches!(
            handle.connect_from_profile("nowhere"),
            Err(DatabaseError::ProfileNotFound(k)) if k == "nowhere"
        ));
        // the live connection was not touched
        assert!(handle.is_connected());
    }

    #[test]
    fn test_autoconnect_invalid_location() {
        let result = DatabaseHandle::new(
            config(),
            MemoryEngine::new(server()),
            HandleOptions::default().with_location(Location::Other("jhu".into())),
        );
        assert!(matches!(result, Err(DatabaseError::InvalidLocation(l)) if l == "jhu"));
    }

    #[test]
    fn test_connect_same_profile_is_noop() {
        let server = server();
        let mut handle = local_handle(&server);
        assert_eq!(server.connection_count(), 1);

        assert_eq!(
            handle.connect_from_profile("local").unwrap(),
            ConnectionState::Connected
        );
        assert_eq!(server.connection_count(), 1);
    }

    #[test]
    fn test_check_connection_recovers() {
        let server = server();
        server.set_reachable(false);
        let mut handle = local_handle(&server);
        assert!(!handle.check_connection());
        assert_eq!(handle.state(), ConnectionState::Failed);

        server.set_reachable(true);
        assert!(handle.check_connection());
        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(
            handle.dsn_parameters().unwrap().get("dbname"),
            Some("apodb")
        );

        // idempotent once connected
        assert!(handle.check_connection());
        assert_eq!(server.connection_count(), 1);
    }

    #[test]
    fn test_check_connection_detects_lost_connection() {
        let server = server();
        let mut handle = local_handle(&server);
        assert!(handle.check_connection());

        server.set_reachable(false);
        assert!(!handle.check_connection());
        assert_eq!(handle.state(), ConnectionState::Failed);

        server.set_reachable(true);
        assert!(handle.check_connection());
    }

    #[test]
    fn test_check_connection_without_prior_attempt() {
        let mut handle = DatabaseHandle::unconnected(
            config(),
            MemoryEngine::new(server()),
            Location::Local,
        );
        assert!(handle.check_connection());
        assert!(handle.is_connected());

        let mut orphan = DatabaseHandle::unconnected(
            config(),
            MemoryEngine::new(server()),
            Location::Other("jhu".into()),
        );
        assert!(!orphan.check_connection());
        assert_eq!(orphan.state(), ConnectionState::Uninitialized);
    }

    #[test]
    fn test_become_role_keeps_database() {
        let server = server();
        let mut handle = local_handle(&server);

        handle.become_role("readonly").unwrap();

        let dsn = handle.dsn_parameters().unwrap();
        assert_eq!(dsn.get("user"), Some("readonly"));
        assert_eq!(dsn.get("dbname"), Some("apodb"));
        assert_eq!(dsn.get("host"), Some("localhost"));
        assert_eq!(handle.state(), ConnectionState::Connected);

        let profile = handle.profile().unwrap();
        assert_eq!(profile.key, "readonly");
        assert_eq!(profile.database, "apodb");
        assert_eq!(profile.user.as_deref(), Some("readonly"));
    }

    #[test]
    fn test_become_role_uninitialized() {
        let mut handle = DatabaseHandle::unconnected(
            config(),
            MemoryEngine::new(server()),
            Location::Local,
        );
        assert!(matches!(
            handle.become_role("readonly"),
            Err(DatabaseError::NotInitialized)
        ));
        assert_eq!(handle.state(), ConnectionState::Uninitialized);
        assert!(matches!(
            handle.become_admin(),
            Err(DatabaseError::NotInitialized)
        ));
    }

    #[test]
    fn test_become_role_on_failed_handle() {
        let server = server();
        server.set_reachable(false);
        let mut handle = local_handle(&server);

        assert!(matches!(
            handle.become_role("readonly"),
            Err(DatabaseError::NotInitialized)
        ));
        assert_eq!(handle.state(), ConnectionState::Failed);
    }

    #[test]
    fn test_become_rejected_role() {
        let server = server().with_role("sdssdb").with_role("sdssdb_admin");
        let mut handle = local_handle(&server);

        let err = handle.become_role("intruder").unwrap_err();
        match err {
            DatabaseError::RoleSwitchFailed { role, source } => {
                assert_eq!(role, "intruder");
                assert!(source.is_connection_error());
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(handle.state(), ConnectionState::Failed);
        assert!(handle.dsn_parameters().is_none());

        // the pre-switch profile is still there to recover with
        assert!(handle.check_connection());
        assert_eq!(
            handle.dsn_parameters().unwrap().get("user"),
            Some("sdssdb")
        );
    }

    #[test]
    fn test_become_admin_and_back() {
        let server = server().with_role("sdssdb").with_role("sdssdb_admin");
        let mut handle = local_handle(&server);

        handle.become_admin().unwrap();
        assert_eq!(
            handle.dsn_parameters().unwrap().get("user"),
            Some("sdssdb_admin")
        );

        handle.become_user().unwrap();
        assert_eq!(
            handle.dsn_parameters().unwrap().get("user"),
            Some("sdssdb")
        );
    }

    #[test]
    fn test_reconnect_after_switch_keeps_role() {
        let server = server();
        let mut handle = local_handle(&server);
        handle.become_admin().unwrap();

        server.set_reachable(false);
        assert!(!handle.check_connection());
        server.set_reachable(true);
        assert!(handle.check_connection());

        assert_eq!(
            handle.dsn_parameters().unwrap().get("user"),
            Some("sdssdb_admin")
        );
    }

    #[test]
    fn test_become_admin_missing_role_entry() {
        // the test configuration has no lco_admin entry
        let mut lco = DatabaseHandle::unconnected(
            config(),
            MemoryEngine::new(server()),
            Location::Lco,
        );
        lco.connect_from_profile("local").unwrap();
        assert!(matches!(
            lco.become_admin(),
            Err(DatabaseError::ProfileNotFound(k)) if k == "lco_admin"
        ));
        // nothing was torn down
        assert!(lco.is_connected());
    }

    #[test]
    fn test_become_admin_other_location() {
        let mut handle = DatabaseHandle::unconnected(
            config(),
            MemoryEngine::new(server()),
            Location::Other("jhu".into()),
        );
        handle.connect_from_profile("local").unwrap();
        assert!(matches!(
            handle.become_admin(),
            Err(DatabaseError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_admin_option() {
        let server = server();
        let handle = DatabaseHandle::new(
            config(),
            MemoryEngine::new(server.clone()),
            HandleOptions::default()
                .with_location(Location::Local)
                .admin(true),
        )
        .unwrap();
        assert_eq!(
            handle.dsn_parameters().unwrap().get("user"),
            Some("sdssdb_admin")
        );

        // admin is skipped when the bootstrap connection failed
        server.set_reachable(false);
        let offline = DatabaseHandle::new(
            config(),
            MemoryEngine::new(server),
            HandleOptions::default()
                .with_location(Location::Local)
                .admin(true),
        )
        .unwrap();
        assert_eq!(offline.state(), ConnectionState::Failed);
    }

    #[test]
    fn test_close_and_reopen() {
        let mut handle = local_handle(&server());
        handle.close();
        assert_eq!(handle.state(), ConnectionState::Uninitialized);
        assert!(handle.dsn_parameters().is_none());

        assert!(handle.check_connection());
        assert!(handle.is_connected());
    }

    #[test]
    fn test_close_failed_handle() {
        let server = server();
        server.set_reachable(false);
        let mut handle = local_handle(&server);
        assert_eq!(handle.state(), ConnectionState::Failed);

        handle.close();
        assert_eq!(handle.state(), ConnectionState::Uninitialized);
        assert!(handle.last_profile().is_some());

        server.set_reachable(true);
        assert!(handle.check_connection());
    }

    #[test]
    fn test_unreachable_postgres_fails_quietly() {
        let config = ConfigProvider::from_yaml(
            "local: {database: apodb, host: 127.0.0.1, port: 1, user: sdssdb, sslmode: disable}",
            None,
        )
        .unwrap();
        let mut handle = DatabaseHandle::new(
            Arc::new(config),
            PgEngine::new(),
            HandleOptions::default().with_location(Location::Local),
        )
        .unwrap();

        assert_eq!(handle.state(), ConnectionState::Failed);
        assert!(handle.dsn_parameters().is_none());
        assert!(!handle.check_connection());
        assert_eq!(handle.state(), ConnectionState::Failed);
    }

    /// Engine that connects but cannot report its parameters
    struct OpaqueEngine(MemoryEngine);

    impl Engine for OpaqueEngine {
        fn init(&mut self, dbname: Option<&str>, params: ParameterMap) {
            self.0.init(dbname, params)
        }

        fn connect(&mut self) -> std::result::Result<(), EngineError> {
            self.0.connect()
        }

        fn is_open(&mut self) -> bool {
            self.0.is_open()
        }

        fn dsn_parameters(&self) -> Option<ParameterMap> {
            None
        }

        fn close(&mut self) {
            self.0.close()
        }
    }

    #[test]
    fn test_become_without_dsn() {
        let mut handle = DatabaseHandle::new(
            config(),
            OpaqueEngine(MemoryEngine::new(server())),
            HandleOptions::default().with_location(Location::Local),
        )
        .unwrap();
        assert!(handle.is_connected());

        assert!(matches!(
            handle.become_role("readonly"),
            Err(DatabaseError::DsnUnavailable)
        ));
        assert!(handle.is_connected());
    }

    #[test]
    fn test_shared_handle() {
        let shared = local_handle(&server()).into_shared();
        let other = Arc::clone(&shared);

        lock(&shared).unwrap().become_role("readonly").unwrap();
        let guard = lock(&other).unwrap();
        assert_eq!(
            guard.dsn_parameters().unwrap().get("user"),
            Some("readonly")
        );
    }
}
