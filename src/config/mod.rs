//! Configuration schema and loading

mod schema;
mod store;

pub use schema::{AndroidConfig, AppConfig, ConfigfsConfig, WindowsProfileConfig};
pub use store::{ConfigStore, CONFIG_ENV, DEFAULT_CONFIG_PATH};
