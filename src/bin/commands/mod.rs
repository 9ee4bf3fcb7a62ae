pub mod check;
pub mod location;
pub mod profiles;
pub mod schema;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use sdssdb::{ConfigProvider, OutputFormat};
use serde::Serialize;

/// Load the merged configuration, optionally from an alternate user file
pub(crate) fn load_config(path: Option<&Path>) -> Result<Arc<ConfigProvider>> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(anyhow!(
                "Configuration file '{}' does not exist",
                path.display()
            ));
        }
    }
    ConfigProvider::load_from(path)
        .map(Arc::new)
        .map_err(|e| anyhow!("Failed to load configuration: {}", e))
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T, output_format: OutputFormat) -> Result<()> {
    let json = output_format
        .to_json(value)
        .map_err(|e| anyhow!("Failed to serialize output: {}", e))?;
    println!("{}", json);
    Ok(())
}
