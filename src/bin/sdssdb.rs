use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sdssdb::OutputFormat;
use tracing::Level;

mod commands;

use commands::check::CheckArgs;
use commands::location::LocationArgs;
use commands::profiles::ProfileArgs;
use commands::schema::SchemaArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// User configuration file, instead of $HOME/.sdssdb
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify this machine (or a hostname) as APO, LCO, or local
    Location(LocationArgs),

    /// List the connection profiles in the merged configuration
    Profiles,

    /// Show one resolved connection profile
    Profile(ProfileArgs),

    /// Connect to the database and report the handle state
    Check(CheckArgs),

    /// List the tables of the observatory schema registries
    Schema(SchemaArgs),
}

fn main() {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level DEBUG or higher.
            .with_max_level(Level::DEBUG)
            .init();
    }

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Location(args) => commands::location::run(args, cli.format),
        Commands::Profiles => commands::profiles::run_list(config_path, cli.format),
        Commands::Profile(args) => commands::profiles::run_show(config_path, args, cli.format),
        Commands::Check(args) => commands::check::run(config_path, args, cli.format),
        Commands::Schema(args) => commands::schema::run(args, cli.format),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
