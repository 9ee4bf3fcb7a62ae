use std::path::Path;

use anyhow::{anyhow, Result};
use clap::Args;
use sdssdb::OutputFormat;
use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use super::{load_config, print_json};

/// Arguments for the Profile command
#[derive(Args)]
pub struct ProfileArgs {
    /// Profile key, e.g. "apo" or "local"
    pub key: String,
}

#[derive(Serialize, Tabled)]
struct ProfileRow {
    key: String,
    database: String,
    host: String,
    port: String,
    user: String,
}

#[derive(Tabled)]
struct ParameterRow {
    parameter: String,
    value: String,
}

fn or_dash(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}

pub fn run_list(config_path: Option<&Path>, output_format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;

    let rows: Vec<ProfileRow> = config
        .profile_keys()
        .into_iter()
        .filter_map(|key| match config.resolve(&key) {
            Ok(profile) => Some(ProfileRow {
                key,
                database: profile.database,
                host: or_dash(profile.host),
                port: or_dash(profile.port.map(|p| p.to_string())),
                user: or_dash(profile.user),
            }),
            Err(e) => {
                warn!("skipping profile '{}': {}", key, e);
                None
            }
        })
        .collect();

    if output_format.is_table() {
        println!("{}", output_format.to_table(rows));
        Ok(())
    } else {
        print_json(&rows, output_format)
    }
}

pub fn run_show(
    config_path: Option<&Path>,
    args: ProfileArgs,
    output_format: OutputFormat,
) -> Result<()> {
    let ProfileArgs { key } = args;
    let config = load_config(config_path)?;
    let profile = config
        .resolve(&key)
        .map_err(|e| anyhow!("Failed to resolve profile: {}", e))?;

    if !output_format.is_table() {
        return print_json(&profile, output_format);
    }

    let mut rows = vec![ParameterRow {
        parameter: "dbname".to_string(),
        value: profile.database.clone(),
    }];
    rows.extend(
        profile
            .parameters()
            .masked()
            .into_iter()
            .map(|(parameter, value)| ParameterRow { parameter, value }),
    );
    println!("{}", output_format.to_table(rows));
    Ok(())
}
