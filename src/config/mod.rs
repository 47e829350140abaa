//! Settings and channel mapping persistence.

pub mod env;
pub mod store;
pub mod types;
pub mod validate;

pub use store::ConfigStore;

use crate::common::error::ConfigError;
use types::Settings;

/// Load settings from the environment and validate them.
pub fn load_and_validate() -> Result<Settings, ConfigError> {
    let settings = env::load_settings()?;
    validate::validate_settings(&settings)?;
    Ok(settings)
}
