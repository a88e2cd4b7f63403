mod config;

pub use config::{default_config_path, Config, ConfigKeys, DEFAULT_DEVICE_NAME};
