use anyhow::Result;
use clap::Args;
use sdssdb::database::Location;
use sdssdb::OutputFormat;
use serde::Serialize;
use tabled::Tabled;

use super::print_json;

/// Arguments for the Location command
#[derive(Args)]
pub struct LocationArgs {
    /// Hostname to classify instead of this machine's, e.g. "sdss4-db.lco.cl"
    #[clap(long)]
    pub hostname: Option<String>,
}

#[derive(Serialize, Tabled)]
struct LocationRow {
    hostname: String,
    location: String,
    profile: String,
}

pub fn run(args: LocationArgs, output_format: OutputFormat) -> Result<()> {
    let LocationArgs { hostname } = args;

    let (hostname, location) = match hostname {
        Some(name) => {
            let location = Location::from_hostname(&name);
            (name, location)
        }
        None => {
            let name = hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_default();
            (name, Location::detect())
        }
    };

    let row = LocationRow {
        hostname,
        profile: location.profile_key().unwrap_or("-").to_string(),
        location: location.to_string(),
    };

    if output_format.is_table() {
        println!("{}", output_format.to_table(vec![row]));
        Ok(())
    } else {
        print_json(&row, output_format)
    }
}
