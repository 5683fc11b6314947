mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use settings::{LoggingSettings, PlainSettings, QueueSettings, Settings};

/// Prefix for environment overrides, e.g. `ROCKETMQ_QUEUE__WAIT_SECONDS=5`.
pub const ENV_PREFIX: &str = "ROCKETMQ";

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct containing the queue and logging configurations
pub fn load_config() -> Result<Settings, ConfigError> {
    build(File::with_name("config/default").required(false))
}

/// Same as [`load_config`] but reads the given file, which must exist.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    build(File::from(path.as_ref()).required(true))
}

fn build<F>(file: F) -> Result<Settings, ConfigError>
where
    F: config::Source + Send + Sync + 'static,
{
    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}
