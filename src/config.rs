use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::database::core::ParameterMap;
use crate::error::{DatabaseError, Result};

/// Packaged default configuration
pub const DEFAULT_CONFIG: &str = include_str!("../etc/sdssdb.yaml");

/// Name of the user override file in the home directory
pub const USER_CONFIG_FILE: &str = ".sdssdb";

/// Prefix of environment variables overriding the configuration,
/// e.g. `SDSSDB_LOCAL__HOST=db.example.org`
pub const ENV_PREFIX: &str = "SDSSDB";

static GLOBAL: OnceLock<Arc<ConfigProvider>> = OnceLock::new();

/// Merge a user configuration onto the default one
///
/// Keys missing from `user` are copied from `default`. When both sides hold a
/// mapping the merge recurses; otherwise the user value wins. A `null` user
/// value falls back to the default entirely.
pub fn merge(user: Value, default: Value) -> Value {
    match (user, default) {
        (Value::Null, default) => default,
        (Value::Object(mut user), Value::Object(default)) => {
            for (key, default_value) in default {
                let merged = match user.remove(&key) {
                    Some(user_value) => merge(user_value, default_value),
                    None => default_value,
                };
                user.insert(key, merged);
            }
            Value::Object(user)
        }
        (user, _) => user,
    }
}

/// Read a single configuration source into a JSON value tree
fn read_source<S>(source: S, name: &str) -> Result<Value>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings = config::Config::builder()
        .add_source(source)
        .build()
        .map_err(|e| DatabaseError::config(format!("Failed to read {}: {}", name, e)))?;

    settings
        .try_deserialize::<Value>()
        .map_err(|e| DatabaseError::config(format!("Failed to deserialize {}: {}", name, e)))
}

fn parse_yaml(text: &str, name: &str) -> Result<Value> {
    read_source(config::File::from_str(text, config::FileFormat::Yaml), name)
}

fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Option::<Port>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Port::Number(port)) => Ok(Some(port)),
        Some(Port::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{}'", text))),
    }
}

/// A YAML or environment scalar read back as text (`password: 123456`)
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Signed(n) => n.to_string(),
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn deserialize_scalar<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(Scalar::into_string)
}

fn deserialize_opt_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_string))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Connection parameters for one target database
///
/// Produced fresh by [`ConfigProvider::resolve`]; never shared with the
/// configuration it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    /// Configuration key this profile was resolved from
    #[serde(default)]
    pub key: String,
    #[serde(deserialize_with = "deserialize_scalar")]
    pub database: String,
    #[serde(default, deserialize_with = "deserialize_opt_scalar")]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
    #[serde(default, deserialize_with = "deserialize_opt_scalar")]
    pub user: Option<String>,
    #[serde(default, skip_serializing, deserialize_with = "deserialize_opt_scalar")]
    pub password: Option<String>,
    /// Any other engine parameter (`sslmode`, `application_name`, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ConnectionProfile {
    pub fn new(key: &str, database: &str) -> Self {
        ConnectionProfile {
            key: key.to_string(),
            database: database.to_string(),
            host: None,
            port: None,
            user: None,
            password: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    /// Engine parameters for this profile, without the database name
    pub fn parameters(&self) -> ParameterMap {
        let mut params = ParameterMap::new();
        if let Some(host) = &self.host {
            params.insert("host", host.as_str());
        }
        if let Some(port) = self.port {
            params.insert("port", port.to_string());
        }
        if let Some(user) = &self.user {
            params.insert("user", user.as_str());
        }
        if let Some(password) = &self.password {
            params.insert("password", password.as_str());
        }
        for (key, value) in &self.extra {
            match scalar_to_string(value) {
                Some(v) => {
                    params.insert(key.as_str(), v);
                }
                None => debug!("profile '{}': skipping non-scalar parameter '{}'", self.key, key),
            }
        }
        params
    }

    /// Rebuild a profile from the DSN parameters of a live connection
    ///
    /// Returns `None` if the parameters do not name a database.
    pub fn from_dsn(key: &str, dsn: &ParameterMap, password: Option<&str>) -> Option<Self> {
        let mut profile = ConnectionProfile::new(key, dsn.get("dbname")?);
        for (name, value) in dsn.iter() {
            match name.as_str() {
                "dbname" | "password" => {}
                "host" => profile.host = Some(value.clone()),
                "port" => profile.port = value.parse().ok(),
                "user" => profile.user = Some(value.clone()),
                _ => {
                    profile
                        .extra
                        .insert(name.clone(), Value::String(value.clone()));
                }
            }
        }
        profile.password = password.map(str::to_string);
        Some(profile)
    }
}

impl fmt::Display for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: dbname={}", self.key, self.database)?;
        let params = self.parameters();
        if !params.is_empty() {
            write!(f, " {}", params)?;
        }
        Ok(())
    }
}

/// Identity to assume when switching roles on an open connection
///
/// Written in the configuration either as a bare role name or as a mapping
/// with `user` and an optional `password`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleIdentity {
    Name(#[serde(deserialize_with = "deserialize_scalar")] String),
    Credentials {
        #[serde(deserialize_with = "deserialize_scalar")]
        user: String,
        #[serde(default, skip_serializing, deserialize_with = "deserialize_opt_scalar")]
        password: Option<String>,
    },
}

impl RoleIdentity {
    pub fn new(user: &str) -> Self {
        RoleIdentity::Name(user.to_string())
    }

    pub fn user(&self) -> &str {
        match self {
            RoleIdentity::Name(user) => user,
            RoleIdentity::Credentials { user, .. } => user,
        }
    }

    pub fn password(&self) -> Option<&str> {
        match self {
            RoleIdentity::Name(_) => None,
            RoleIdentity::Credentials { password, .. } => password.as_deref(),
        }
    }
}

/// Merged view of the packaged defaults and the user's overrides
#[derive(Debug, Clone)]
pub struct ConfigProvider {
    values: Value,
}

impl ConfigProvider {
    /// Build a provider from already-parsed layers
    pub fn from_values(default: Value, user: Option<Value>) -> Result<Self> {
        let values = match user {
            Some(user) => merge(user, default),
            None => default,
        };
        match values {
            Value::Object(_) => Ok(ConfigProvider { values }),
            Value::Null => Ok(ConfigProvider {
                values: Value::Object(Default::default()),
            }),
            _ => Err(DatabaseError::config(
                "configuration root must be a mapping of profile names",
            )),
        }
    }

    /// Build a provider from YAML documents
    pub fn from_yaml(default: &str, user: Option<&str>) -> Result<Self> {
        let default = parse_yaml(default, "default configuration")?;
        let user = user
            .map(|text| parse_yaml(text, "user configuration"))
            .transpose()?;
        Self::from_values(default, user)
    }

    /// Load the packaged defaults, the user override file, and the
    /// environment
    ///
    /// `user_path` replaces the default `$HOME/.sdssdb` location. A missing
    /// override file is not an error.
    pub fn load_from(user_path: Option<&Path>) -> Result<Self> {
        let default = parse_yaml(DEFAULT_CONFIG, "default configuration")?;

        let user_path = match user_path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::user_config_path(),
        };
        let user = match user_path {
            Some(path) if path.exists() => {
                debug!("reading user configuration from {}", path.display());
                let source = config::File::from(path.as_path())
                    .format(config::FileFormat::Yaml)
                    .required(true);
                Some(read_source(source, &format!("{}", path.display()))?)
            }
            _ => None,
        };

        let env = read_source(Self::environment(), "environment")?;

        let mut provider = Self::from_values(default, user)?;
        provider.values = merge(env, provider.values);
        Ok(provider)
    }

    /// Load with the default user override location
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Process-wide provider, loaded once and cached
    pub fn global() -> Result<Arc<ConfigProvider>> {
        if let Some(provider) = GLOBAL.get() {
            return Ok(provider.clone());
        }
        let loaded = Arc::new(Self::load()?);
        Ok(GLOBAL.get_or_init(|| loaded).clone())
    }

    /// `$HOME/.sdssdb`, if a home directory exists
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(USER_CONFIG_FILE))
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Resolve a connection profile
    pub fn resolve(&self, key: &str) -> Result<ConnectionProfile> {
        let value = self.entry(key)?;
        if !value.is_object() {
            return Err(DatabaseError::InvalidProfile {
                key: key.to_string(),
                reason: "expected a mapping of connection parameters".to_string(),
            });
        }

        let mut profile: ConnectionProfile =
            serde_json::from_value(value.clone()).map_err(|e| DatabaseError::InvalidProfile {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        profile.key = key.to_string();
        Ok(profile)
    }

    /// Resolve a role identity (`apo_admin`, `lco_user`, ...)
    pub fn resolve_role(&self, key: &str) -> Result<RoleIdentity> {
        let value = self.entry(key)?;
        serde_json::from_value(value.clone()).map_err(|_| DatabaseError::InvalidProfile {
            key: key.to_string(),
            reason: "expected a role name or a mapping with 'user'".to_string(),
        })
    }

    fn entry(&self, key: &str) -> Result<&Value> {
        match self.values.get(key) {
            None | Some(Value::Null) => Err(DatabaseError::ProfileNotFound(key.to_string())),
            Some(value) => Ok(value),
        }
    }

    /// Raw configuration value for a key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entry(key).is_ok()
    }

    /// Keys that hold connection profiles (mappings with a `database`)
    pub fn profile_keys(&self) -> Vec<String> {
        match &self.values {
            Value::Object(map) => map
                .iter()
                .filter(|(_, v)| v.get("database").is_some())
                .map(|(k, _)| k.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The whole merged configuration
    pub fn values(&self) -> &Value {
        &self.values
    }
}
