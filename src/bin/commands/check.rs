use std::path::Path;

use anyhow::{anyhow, Result};
use clap::Args;
use sdssdb::database::{ConnectionState, DatabaseHandle, HandleOptions, Location, PgEngine};
use sdssdb::{OutputFormat, ParameterMap};
use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use super::{load_config, print_json};

/// Arguments for the Check command
#[derive(Args)]
pub struct CheckArgs {
    /// Use this location instead of detecting it from the hostname
    #[clap(short, long)]
    pub location: Option<Location>,

    /// Connect with this profile instead of the location's
    #[clap(short, long)]
    pub profile: Option<String>,

    /// Switch to the location's admin role once connected
    #[clap(long)]
    pub admin: bool,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    location: Location,
    state: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dsn: Option<ParameterMap>,
}

#[derive(Tabled)]
struct FieldRow {
    field: String,
    value: String,
}

pub fn run(config_path: Option<&Path>, args: CheckArgs, output_format: OutputFormat) -> Result<()> {
    let CheckArgs {
        location,
        profile,
        admin,
    } = args;

    let config = load_config(config_path)?;

    let mut options = HandleOptions::default()
        .autoconnect(profile.is_none())
        .admin(admin);
    if let Some(location) = location {
        options = options.with_location(location);
    }

    let mut handle = DatabaseHandle::new(config, PgEngine::new(), options)
        .map_err(|e| anyhow!("Failed to open database handle: {}", e))?;

    if let Some(key) = &profile {
        handle
            .connect_from_profile(key)
            .map_err(|e| anyhow!("Failed to connect with profile '{}': {}", key, e))?;
        if admin && handle.is_connected() {
            handle
                .become_admin()
                .map_err(|e| anyhow!("Failed to switch to admin role: {}", e))?;
        }
    }

    info!("database handle is {}", handle.state());

    let report = CheckReport {
        location: handle.location().clone(),
        state: handle.state(),
        profile: handle.last_profile().map(|p| p.key.clone()),
        dsn: handle.dsn_parameters(),
    };

    if output_format.is_json() {
        print_json(&report, output_format)?;
    } else {
        let mut rows = vec![
            FieldRow {
                field: "location".to_string(),
                value: report.location.to_string(),
            },
            FieldRow {
                field: "state".to_string(),
                value: report.state.to_string(),
            },
        ];
        if let Some(profile) = &report.profile {
            rows.push(FieldRow {
                field: "profile".to_string(),
                value: profile.clone(),
            });
        }
        if let Some(dsn) = &report.dsn {
            rows.extend(dsn.masked().into_iter().map(|(k, v)| FieldRow {
                field: k,
                value: v,
            }));
        }
        println!("{}", output_format.to_table(rows));
    }

    handle.close();

    if report.state == ConnectionState::Connected {
        Ok(())
    } else {
        Err(anyhow!("database is not connected"))
    }
}
