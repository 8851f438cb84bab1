//! Layered CLI settings: defaults, optional YAML file, `ASHA__*` environment.

use anyhow::{Context, Result};
use asha_sync::SyncConfig;
use config::{Config, Environment, File, FileFormat};

pub const ENV_PREFIX: &str = "ASHA";

pub fn load(path: &str) -> Result<SyncConfig> {
    let settings = Config::builder()
        .add_source(File::new(path, FileFormat::Yaml).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to read settings from {}", path))?;

    let config: SyncConfig = settings
        .try_deserialize()
        .context("Invalid sync settings")?;
    config.validate().context("Invalid sync settings")?;
    Ok(config)
}
