//! Observatory location detection
//!
//! Which database a process should prefer depends on where it runs. The
//! database hosts at both observatories share a hostname infix; the Las
//! Campanas ones additionally live under the `lco.cl` domain.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Hostname fragment shared by the observatory database hosts
pub const SITE_HOST_INFIX: &str = "sdss4-db";

/// Domain suffix of hosts at Las Campanas Observatory
pub const LCO_DOMAIN_SUFFIX: &str = "lco.cl";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Apache Point Observatory
    Apo,
    /// Las Campanas Observatory
    Lco,
    /// Anywhere else
    Local,
    /// A named site without built-in support
    #[serde(untagged)]
    Other(String),
}

impl Location {
    /// Classify a hostname
    pub fn from_hostname(hostname: &str) -> Location {
        if hostname.contains(SITE_HOST_INFIX) {
            if hostname.ends_with(LCO_DOMAIN_SUFFIX) {
                Location::Lco
            } else {
                Location::Apo
            }
        } else {
            Location::Local
        }
    }

    /// Classify the machine this process runs on
    ///
    /// A hostname that cannot be read (or is not valid UTF-8) is treated as
    /// local.
    pub fn detect() -> Location {
        match hostname::get() {
            Ok(name) => {
                let name = name.to_string_lossy();
                let location = Location::from_hostname(&name);
                debug!("hostname '{}' classified as {}", name, location);
                location
            }
            Err(e) => {
                debug!("unable to read hostname ({}), assuming local", e);
                Location::Local
            }
        }
    }

    /// Configuration key of the connection profile for this location
    pub fn profile_key(&self) -> Option<&'static str> {
        match self {
            Location::Apo => Some("apo"),
            Location::Lco => Some("lco"),
            Location::Local => Some("local"),
            Location::Other(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Location::Apo => "apo",
            Location::Lco => "lco",
            Location::Local => "local",
            Location::Other(name) => name.as_str(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("location cannot be empty".to_string());
        }
        Ok(match s.to_lowercase().as_str() {
            "apo" => Location::Apo,
            "lco" => Location::Lco,
            "local" => Location::Local,
            other => Location::Other(other.to_string()),
        })
    }
}
